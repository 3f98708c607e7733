use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::color::CubeColor;
use crate::cube::{CubeState, FACE_COUNT};

/// Status values written to the status file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CaptureStatusKind {
    Starting,
    Ready,
    Capturing,
    Processing,
    Fixing,
    Complete,
    Cancelled,
    Incomplete,
    Error,
}

impl CaptureStatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureStatusKind::Starting => "starting",
            CaptureStatusKind::Ready => "ready",
            CaptureStatusKind::Capturing => "capturing",
            CaptureStatusKind::Processing => "processing",
            CaptureStatusKind::Fixing => "fixing",
            CaptureStatusKind::Complete => "complete",
            CaptureStatusKind::Cancelled => "cancelled",
            CaptureStatusKind::Incomplete => "incomplete",
            CaptureStatusKind::Error => "error",
        }
    }

}

/// Contents of the status file. Overwritten on every transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureStatus {
    pub status: CaptureStatusKind,
    pub message: String,
    pub progress: f64,
    pub timestamp: DateTime<Local>,
}

/// Contents of the result file: a partial snapshot after each face, then the
/// final state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CubeResult {
    pub cube_state: Vec<CubeColor>,
    pub cube_string: String,
    pub is_valid: bool,
    pub timestamp: DateTime<Local>,
    pub face_count: usize,
    pub total_stickers: usize,
}

/// Where a session currently is. Published on the controller's watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Starting,
    Ready { face_index: usize },
    Capturing { face_index: usize },
    Processing,
    Fixing,
    Complete,
    Incomplete,
    Cancelled,
    Error,
}

impl CapturePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CapturePhase::Complete
                | CapturePhase::Incomplete
                | CapturePhase::Cancelled
                | CapturePhase::Error
        )
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Complete { state: CubeState, is_valid: bool },
    Incomplete { stickers: usize },
    Cancelled { stickers: usize },
    Error { message: String },
}

impl CaptureOutcome {
    pub fn status_kind(&self) -> CaptureStatusKind {
        match self {
            CaptureOutcome::Complete { .. } => CaptureStatusKind::Complete,
            CaptureOutcome::Incomplete { .. } => CaptureStatusKind::Incomplete,
            CaptureOutcome::Cancelled { .. } => CaptureStatusKind::Cancelled,
            CaptureOutcome::Error { .. } => CaptureStatusKind::Error,
        }
    }
}

/// Percent of faces done before capturing `face_index`.
pub fn face_progress(face_index: usize) -> f64 {
    face_index as f64 / FACE_COUNT as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&CaptureStatusKind::Incomplete).unwrap();
        assert_eq!(json, r#""incomplete""#);
        for kind in [CaptureStatusKind::Starting, CaptureStatusKind::Fixing] {
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
        }
    }

    #[test]
    fn progress_steps_through_faces() {
        assert_eq!(face_progress(0), 0.0);
        assert_eq!(face_progress(3), 50.0);
    }

    #[test]
    fn terminal_phases() {
        assert!(CapturePhase::Error.is_terminal());
        assert!(!CapturePhase::Ready { face_index: 2 }.is_terminal());
    }
}
