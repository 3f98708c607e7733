use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use std::sync::Arc;
use tokio::{
    sync::{mpsc, watch},
    time::{timeout, Duration},
};
use tokio_util::sync::CancellationToken;

use crate::{
    capabilities::Capabilities,
    color::{ClassifierConfig, CubeColor, NotationMap, FACE_ORDER},
    cube::{CubeState, FaceCapture, FACE_COUNT, TOTAL_STICKERS},
    sensing::{classify_face, Camera, CameraLease, SamplerConfig},
    store::ResultStore,
};

use super::state::{face_progress, CaptureOutcome, CapturePhase, CaptureStatusKind};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

const FACE_PROCESSING_TIMEOUT_SECS: u64 = 10;
const PROCESSING_PROGRESS: f64 = 90.0;
const FIXING_PROGRESS: f64 = 95.0;
const FALLBACK_COLOR: CubeColor = CubeColor::White;

/// Turns one grabbed frame into nine sticker colors. Runs on a blocking worker.
type FaceWorker = Arc<dyn Fn(&RgbImage) -> FaceCapture + Send + Sync>;

/// Tunables a session needs to turn frames into notation.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub sampler: SamplerConfig,
    pub classifier: ClassifierConfig,
    pub notation: NotationMap,
    /// Longest a face may spend in classification before it falls back to White.
    pub face_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig::default(),
            classifier: ClassifierConfig::default(),
            notation: NotationMap::default(),
            face_timeout: Duration::from_secs(FACE_PROCESSING_TIMEOUT_SECS),
        }
    }
}

/// The controller's side of a running session.
pub struct SessionChannels {
    pub triggers: mpsc::Receiver<()>,
    pub cancel_token: CancellationToken,
    pub phase: watch::Sender<CapturePhase>,
}

enum LoopExit {
    AllFaces,
    SourceExhausted,
    Cancelled,
}

/// One pass over the six faces: acquire the camera, capture each face on
/// trigger, then reconcile, validate and persist the result.
pub struct CaptureSession {
    camera: Box<dyn Camera>,
    driver: SessionDriver,
}

/// Everything a session needs once the camera has been handed to its lease.
struct SessionDriver {
    id: String,
    store: Arc<ResultStore>,
    capabilities: Capabilities,
    config: SessionConfig,
    channels: SessionChannels,
    face_worker: FaceWorker,
}

impl CaptureSession {
    pub fn new(
        id: String,
        camera: Box<dyn Camera>,
        store: Arc<ResultStore>,
        capabilities: Capabilities,
        config: SessionConfig,
        channels: SessionChannels,
    ) -> Self {
        let sampler = config.sampler.clone();
        let classifier = config.classifier.clone();
        let face_worker: FaceWorker =
            Arc::new(move |frame: &RgbImage| classify_face(frame, &sampler, &classifier));

        Self {
            camera,
            driver: SessionDriver {
                id,
                store,
                capabilities,
                config,
                channels,
                face_worker,
            },
        }
    }

    pub async fn run(self) -> CaptureOutcome {
        let Self { camera, mut driver } = self;
        driver.run(camera).await
    }
}

impl SessionDriver {
    async fn run(&mut self, camera: Box<dyn Camera>) -> CaptureOutcome {
        self.enter(CapturePhase::Starting);
        self.report(CaptureStatusKind::Starting, "Initializing camera system...", 0.0);

        let mut lease = match CameraLease::acquire(camera) {
            Ok(lease) => lease,
            Err(err) => {
                log_error!("session {}: {err:#}", self.id);
                return self.fail("Camera not accessible. Please check camera connection.");
            }
        };

        log_info!(
            "session {} started ({})",
            self.id,
            self.capabilities.describe()
        );
        self.report(
            CaptureStatusKind::Ready,
            format!("Ready to capture {FACE_COUNT} faces"),
            0.0,
        );

        let mut state = CubeState::new();
        let exit = self.capture_faces(&mut lease, &mut state).await;
        lease.release();

        match exit {
            LoopExit::Cancelled => {
                self.report(CaptureStatusKind::Cancelled, "Capture cancelled by user", 0.0);
                self.enter(CapturePhase::Cancelled);
                CaptureOutcome::Cancelled {
                    stickers: state.len(),
                }
            }
            LoopExit::AllFaces | LoopExit::SourceExhausted => self.finish(state).await,
        }
    }

    async fn capture_faces(
        &mut self,
        lease: &mut CameraLease,
        state: &mut CubeState,
    ) -> LoopExit {
        for (face_index, face) in FACE_ORDER.iter().enumerate() {
            let progress = face_progress(face_index);
            let position = format!("({}/{FACE_COUNT})", face_index + 1);

            self.enter(CapturePhase::Ready { face_index });
            self.report(
                CaptureStatusKind::Ready,
                format!("Ready to capture {face} face {position} - trigger capture when ready"),
                progress,
            );

            tokio::select! {
                biased;
                _ = self.channels.cancel_token.cancelled() => return LoopExit::Cancelled,
                trigger = self.channels.triggers.recv() => {
                    if trigger.is_none() {
                        log_warn!(
                            "session {}: trigger channel closed, treating as cancel",
                            self.id
                        );
                        return LoopExit::Cancelled;
                    }
                }
            }

            self.enter(CapturePhase::Capturing { face_index });
            self.report(
                CaptureStatusKind::Capturing,
                format!("Capturing {face} face {position}"),
                progress,
            );

            let capture = match self.capture_face(lease).await {
                Ok(Some(capture)) => capture,
                Ok(None) => {
                    log_warn!(
                        "session {}: frame source ran dry before the {face} face",
                        self.id
                    );
                    return LoopExit::SourceExhausted;
                }
                Err(err) => {
                    log_warn!(
                        "session {}: failed to capture {face} face: {err:#}; using fallback colors",
                        self.id
                    );
                    FaceCapture::uniform(FALLBACK_COLOR)
                }
            };

            state.push_face(capture);
            log_info!(
                "{face}: {}",
                self.config.notation.encode(capture.colors())
            );

            let partial = self.config.notation.encode(state.colors());
            if let Err(err) = self.store.persist_result(state, &partial, false) {
                log_warn!("Could not save cube state: {err:#}");
            }
        }

        LoopExit::AllFaces
    }

    async fn capture_face(&mut self, lease: &mut CameraLease) -> Result<Option<FaceCapture>> {
        let Some(frame) = lease.grab_frame().context("failed to read frame")? else {
            return Ok(None);
        };

        let worker = self.face_worker.clone();
        let job = tokio::task::spawn_blocking(move || worker(&frame));

        let limit = self.config.face_timeout;
        let capture = timeout(limit, job)
            .await
            .map_err(|_| anyhow!("face processing timed out (> {}ms)", limit.as_millis()))?
            .context("face processing worker failed")?;

        Ok(Some(capture))
    }

    /// Everything after the capture loop. Only a full cube goes to the reconciler.
    async fn finish(&mut self, state: CubeState) -> CaptureOutcome {
        if !state.is_complete() {
            let stickers = state.len();
            self.report(
                CaptureStatusKind::Incomplete,
                format!("Incomplete capture: {stickers}/{TOTAL_STICKERS} stickers"),
                face_progress(state.faces_completed()),
            );
            self.enter(CapturePhase::Incomplete);
            return CaptureOutcome::Incomplete { stickers };
        }

        self.enter(CapturePhase::Processing);
        self.report(
            CaptureStatusKind::Processing,
            "Processing and validating cube state...",
            PROCESSING_PROGRESS,
        );
        log_info!(
            "Captured {}/{TOTAL_STICKERS} stickers, raw cube string: {}",
            state.len(),
            self.config.notation.encode(state.colors())
        );

        self.enter(CapturePhase::Fixing);
        self.report(
            CaptureStatusKind::Fixing,
            "Applying cube fixes and validation...",
            FIXING_PROGRESS,
        );
        let state = self.reconcile(state).await;
        let is_valid = self.validate(&state).await;

        let cube_string = self.config.notation.encode(state.colors());
        let saved = match self.store.persist_result(&state, &cube_string, is_valid) {
            Ok(_) => true,
            Err(err) => {
                log_error!("Could not save final cube state: {err:#}");
                false
            }
        };

        let mut message = format!(
            "Cube faces captured successfully! {} stickers detected {}",
            state.len(),
            if is_valid {
                "(Valid cube)"
            } else {
                "(Validation failed - but colors captured)"
            }
        );
        if !saved {
            message.push_str(" - results could not be saved");
        }

        self.report(CaptureStatusKind::Complete, message, 100.0);
        self.enter(CapturePhase::Complete);
        log_info!("session {} complete: {cube_string}", self.id);

        CaptureOutcome::Complete { state, is_valid }
    }

    async fn reconcile(&mut self, raw: CubeState) -> CubeState {
        let Some(reconciler) = self.capabilities.reconciler.clone() else {
            log_info!("Reconciler unavailable - using raw capture");
            return raw;
        };

        let colors = raw.colors().to_vec();
        let result = tokio::task::spawn_blocking(move || reconciler.reconcile(&colors))
            .await
            .context("reconciler worker failed")
            .and_then(|result| result);

        match result {
            Ok(fixed) if fixed.state.len() == TOTAL_STICKERS => {
                if fixed.reordered() {
                    log_info!("Faces reordered by center pieces: {:?}", fixed.face_mapping);
                } else {
                    log_info!("Face order was already correct");
                }
                let rotated = fixed.rotated_faces();
                if rotated.is_empty() {
                    log_info!("No face rotations needed");
                } else {
                    log_info!("Rotated faces: {}", rotated.join(", "));
                }
                if !fixed.is_valid {
                    log_warn!("Reconciler could not produce a valid cube - best attempt returned");
                }
                CubeState::from_raw(fixed.state)
            }
            Ok(fixed) => {
                log_warn!(
                    "Reconciler returned {} stickers - using raw capture",
                    fixed.state.len()
                );
                raw
            }
            Err(err) => {
                log_warn!("Could not apply fixes: {err:#} - using raw capture");
                raw
            }
        }
    }

    async fn validate(&mut self, state: &CubeState) -> bool {
        let Some(validator) = self.capabilities.validator.clone() else {
            return false;
        };

        let colors = state.colors().to_vec();
        let result = tokio::task::spawn_blocking(move || validator.validate(&colors))
            .await
            .context("validator worker failed")
            .and_then(|result| result);

        match result {
            Ok(is_valid) => is_valid,
            Err(err) => {
                log_warn!("Cube validation unavailable: {err:#}");
                false
            }
        }
    }

    fn fail(&self, message: &str) -> CaptureOutcome {
        self.report(CaptureStatusKind::Error, message, 0.0);
        self.enter(CapturePhase::Error);
        CaptureOutcome::Error {
            message: message.to_string(),
        }
    }

    fn enter(&self, phase: CapturePhase) {
        self.channels.phase.send_replace(phase);
    }

    fn report(&self, status: CaptureStatusKind, message: impl Into<String>, progress: f64) {
        if let Err(err) = self.store.persist_status(status, message, progress) {
            log_warn!("Could not update status file: {err:#}");
        }
    }
}
