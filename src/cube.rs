use serde::{Deserialize, Serialize};

use crate::color::CubeColor;

pub const STICKERS_PER_FACE: usize = 9;
pub const FACE_COUNT: usize = 6;
pub const TOTAL_STICKERS: usize = STICKERS_PER_FACE * FACE_COUNT;

/// The nine stickers of one face, row-major from the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceCapture([CubeColor; STICKERS_PER_FACE]);

impl FaceCapture {
    pub fn new(colors: [CubeColor; STICKERS_PER_FACE]) -> Self {
        Self(colors)
    }

    /// A face painted one color. Used as the fallback when a face fails to capture.
    pub fn uniform(color: CubeColor) -> Self {
        Self([color; STICKERS_PER_FACE])
    }

    pub fn colors(&self) -> &[CubeColor] {
        &self.0
    }
}

/// Stickers captured so far, in face-visit order.
///
/// Only grows by whole faces, so `len() == 9 * faces_completed()` holds for any
/// state built through `push_face`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CubeState(Vec<CubeColor>);

impl CubeState {
    pub fn new() -> Self {
        Self(Vec::with_capacity(TOTAL_STICKERS))
    }

    /// Wraps an arbitrary sticker list, e.g. a reconciler's corrected output.
    pub fn from_raw(colors: Vec<CubeColor>) -> Self {
        Self(colors)
    }

    pub fn push_face(&mut self, face: FaceCapture) {
        self.0.extend_from_slice(face.colors());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn faces_completed(&self) -> usize {
        self.0.len() / STICKERS_PER_FACE
    }

    pub fn is_complete(&self) -> bool {
        self.0.len() == TOTAL_STICKERS
    }

    pub fn colors(&self) -> &[CubeColor] {
        &self.0
    }
}
