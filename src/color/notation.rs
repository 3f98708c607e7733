use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{CubeColor, FACE_ORDER};

/// Code written for a color that has no entry in the map.
pub const UNMAPPED_CODE: char = 'X';

/// Color to single-letter cube notation (`White` → `U`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotationMap(BTreeMap<CubeColor, char>);

impl Default for NotationMap {
    fn default() -> Self {
        Self(BTreeMap::from([
            (CubeColor::White, 'U'),
            (CubeColor::Red, 'R'),
            (CubeColor::Green, 'F'),
            (CubeColor::Yellow, 'D'),
            (CubeColor::Orange, 'L'),
            (CubeColor::Blue, 'B'),
        ]))
    }
}

impl NotationMap {
    pub fn new(codes: BTreeMap<CubeColor, char>) -> Self {
        Self(codes)
    }

    pub fn code(&self, color: CubeColor) -> char {
        self.0.get(&color).copied().unwrap_or(UNMAPPED_CODE)
    }

    pub fn encode(&self, colors: &[CubeColor]) -> String {
        colors.iter().map(|color| self.code(*color)).collect()
    }

    /// Inverse lookup. `None` for codes no color maps to.
    pub fn color_for(&self, code: char) -> Option<CubeColor> {
        self.0
            .iter()
            .find(|(_, mapped)| **mapped == code)
            .map(|(color, _)| *color)
    }

    /// Code to color, for every mapped color.
    pub fn inverse(&self) -> BTreeMap<char, CubeColor> {
        self.0.iter().map(|(color, code)| (*code, *color)).collect()
    }

    pub fn decode(&self, cube_string: &str) -> Option<Vec<CubeColor>> {
        cube_string.chars().map(|code| self.color_for(code)).collect()
    }

    /// Colors in face order with their codes, for surfaces listing what is supported.
    pub fn entries(&self) -> Vec<(CubeColor, char)> {
        FACE_ORDER
            .iter()
            .map(|color| (*color, self.code(*color)))
            .collect()
    }
}
