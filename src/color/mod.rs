pub mod classifier;
pub mod notation;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use classifier::{classify, ClassifierConfig};
pub use notation::NotationMap;

/// One of the six sticker colors of a standard cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CubeColor {
    White,
    Red,
    Green,
    Yellow,
    Orange,
    Blue,
}

/// The order faces are captured in. Also the order of faces in a `CubeState`.
pub const FACE_ORDER: [CubeColor; 6] = [
    CubeColor::White,
    CubeColor::Red,
    CubeColor::Green,
    CubeColor::Yellow,
    CubeColor::Orange,
    CubeColor::Blue,
];

impl CubeColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            CubeColor::White => "White",
            CubeColor::Red => "Red",
            CubeColor::Green => "Green",
            CubeColor::Yellow => "Yellow",
            CubeColor::Orange => "Orange",
            CubeColor::Blue => "Blue",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        FACE_ORDER
            .iter()
            .copied()
            .find(|color| color.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for CubeColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Averaged HSV reading of one sticker.
///
/// Uses the 8-bit camera convention: `hue` is in half-degrees (0..180),
/// `saturation` and `value` are 0..255.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorSample {
    pub hue: f32,
    pub saturation: f32,
    pub value: f32,
}

impl ColorSample {
    /// Substituted when a sample region is empty. Classifies as White.
    pub const NEUTRAL: ColorSample = ColorSample {
        hue: 0.0,
        saturation: 0.0,
        value: 255.0,
    };

    pub fn new(hue: f32, saturation: f32, value: f32) -> Self {
        Self {
            hue,
            saturation,
            value,
        }
    }
}

impl Default for ColorSample {
    fn default() -> Self {
        Self::NEUTRAL
    }
}
