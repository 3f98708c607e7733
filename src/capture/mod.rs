pub mod commands;
pub mod controller;
pub mod session;
pub mod state;

pub use controller::CaptureController;
pub use session::{CaptureSession, SessionConfig};
pub use state::{CaptureOutcome, CapturePhase, CaptureStatus, CaptureStatusKind, CubeResult};
