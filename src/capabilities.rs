//! Optional external services the capture session hands the finished cube to.
//!
//! Both are black boxes: the reconciler reorders and rotates faces into a
//! canonical layout, the validator answers whether the result is a legal cube.
//! Either may be absent; the session checks once at start and skips what is
//! missing.

use anyhow::Result;
use std::sync::Arc;

use crate::color::{CubeColor, FACE_ORDER};
use crate::cube::FACE_COUNT;

/// What a reconciler hands back for a 54-sticker input.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub state: Vec<CubeColor>,
    /// `face_mapping[captured] == canonical` for each of the six faces.
    pub face_mapping: Vec<usize>,
    /// Clockwise rotation applied to each face, in degrees.
    pub rotations: [u16; FACE_COUNT],
    pub is_valid: bool,
}

impl Reconciliation {
    pub fn reordered(&self) -> bool {
        self.face_mapping
            .iter()
            .enumerate()
            .any(|(captured, canonical)| captured != *canonical)
    }

    /// `"Red(90°)"`-style labels for faces that were rotated.
    pub fn rotated_faces(&self) -> Vec<String> {
        self.rotations
            .iter()
            .zip(FACE_ORDER)
            .filter(|(degrees, _)| **degrees != 0)
            .map(|(degrees, face)| format!("{face}({degrees}°)"))
            .collect()
    }
}

pub trait CubeReconciler: Send + Sync {
    fn reconcile(&self, state: &[CubeColor]) -> Result<Reconciliation>;
}

pub trait CubeValidator: Send + Sync {
    fn validate(&self, state: &[CubeColor]) -> Result<bool>;
}

/// The services available to a session.
#[derive(Clone, Default)]
pub struct Capabilities {
    pub reconciler: Option<Arc<dyn CubeReconciler>>,
    pub validator: Option<Arc<dyn CubeValidator>>,
}

impl Capabilities {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_reconciler(mut self, reconciler: Arc<dyn CubeReconciler>) -> Self {
        self.reconciler = Some(reconciler);
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn CubeValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn describe(&self) -> String {
        let availability = |present: bool| if present { "available" } else { "unavailable" };
        format!(
            "reconciler {}, validator {}",
            availability(self.reconciler.is_some()),
            availability(self.validator.is_some())
        )
    }
}
