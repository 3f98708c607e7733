use anyhow::{anyhow, bail, Result};
use log::{error, info};
use std::sync::Arc;
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    watch,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{capabilities::Capabilities, sensing::Camera, store::ResultStore};

use super::session::{CaptureSession, SessionChannels, SessionConfig};
use super::state::{CaptureOutcome, CapturePhase, CaptureStatusKind};

/// Owns the background task of at most one capture session.
pub struct CaptureController {
    store: Arc<ResultStore>,
    session_id: Option<String>,
    handle: Option<JoinHandle<CaptureOutcome>>,
    cancel_token: Option<CancellationToken>,
    trigger_tx: Option<mpsc::Sender<()>>,
    phase_rx: Option<watch::Receiver<CapturePhase>>,
}

impl CaptureController {
    pub fn new(store: Arc<ResultStore>) -> Self {
        Self {
            store,
            session_id: None,
            handle: None,
            cancel_token: None,
            trigger_tx: None,
            phase_rx: None,
        }
    }

    /// Spawns a session. Fails while another session is still running.
    pub fn start_capture(
        &mut self,
        camera: Box<dyn Camera>,
        capabilities: Capabilities,
        config: SessionConfig,
    ) -> Result<String> {
        if self.is_active() {
            bail!("capture already active");
        }

        let session_id = Uuid::new_v4().to_string();
        let cancel_token = CancellationToken::new();
        // One pending trigger at most: repeated presses don't skip faces.
        let (trigger_tx, triggers) = mpsc::channel(1);
        let (phase_tx, phase_rx) = watch::channel(CapturePhase::Starting);

        let session = CaptureSession::new(
            session_id.clone(),
            camera,
            self.store.clone(),
            capabilities,
            config,
            SessionChannels {
                triggers,
                cancel_token: cancel_token.clone(),
                phase: phase_tx,
            },
        );

        info!("Starting capture session {session_id}");
        let handle = tokio::spawn(session.run());

        self.session_id = Some(session_id.clone());
        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        self.trigger_tx = Some(trigger_tx);
        self.phase_rx = Some(phase_rx);
        Ok(session_id)
    }

    /// Signals the session to capture the face it is waiting on.
    pub fn trigger(&self) -> Result<()> {
        let tx = self
            .trigger_tx
            .as_ref()
            .ok_or_else(|| anyhow!("no active capture session"))?;

        match tx.try_send(()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(())) => {
                info!("Capture trigger already pending");
                Ok(())
            }
            Err(TrySendError::Closed(())) => Err(anyhow!("capture session has finished")),
        }
    }

    /// Requests cancellation. Observed when the session next waits for a trigger.
    pub fn cancel(&self) {
        if let Some(token) = &self.cancel_token {
            token.cancel();
            info!("Cancel signal sent to capture session");
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn subscribe(&self) -> Option<watch::Receiver<CapturePhase>> {
        self.phase_rx.clone()
    }

    /// Waits for the current session to end. `None` if nothing was started.
    ///
    /// The trigger sender and cancel token stay in place while waiting, so the
    /// session keeps accepting triggers and is not cancelled by the wait itself.
    pub async fn wait(&mut self) -> Option<CaptureOutcome> {
        let handle = self.handle.as_mut()?;
        let joined = handle.await;
        self.handle = None;
        self.trigger_tx = None;
        self.cancel_token = None;

        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(join_err) => {
                error!("capture session task failed: {join_err}");
                let message = format!("Camera capture failed: {join_err}");
                if let Err(err) = self
                    .store
                    .persist_status(CaptureStatusKind::Error, message.clone(), 0.0)
                {
                    error!("Could not update status file: {err:#}");
                }
                CaptureOutcome::Error { message }
            }
        };

        info!(
            "Capture session {} ended: {}",
            self.session_id.as_deref().unwrap_or("?"),
            outcome.status_kind().as_str()
        );
        Some(outcome)
    }

    /// Cancels and waits for the session.
    pub async fn stop_capture(&mut self) -> Option<CaptureOutcome> {
        self.cancel();
        self.wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensing::camera::testing::{ScriptedCamera, ScriptedFrame};
    use crate::store::StoreConfig;
    use image::{Rgb, RgbImage};
    use std::time::Duration;
    use tempfile::TempDir;

    fn controller() -> (TempDir, CaptureController) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ResultStore::new(StoreConfig {
            output_dir: dir.path().to_path_buf(),
            ..StoreConfig::default()
        }));
        (dir, CaptureController::new(store))
    }

    fn camera(faces: usize) -> Box<ScriptedCamera> {
        let frames = (0..faces)
            .map(|_| ScriptedFrame::Image(RgbImage::from_pixel(30, 30, Rgb([255, 0, 0]))))
            .collect();
        Box::new(ScriptedCamera::new(frames))
    }

    async fn wait_for_ready(controller: &CaptureController, face_index: usize) {
        let mut rx = controller.subscribe().unwrap();
        rx.wait_for(|phase| *phase == CapturePhase::Ready { face_index })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn refuses_a_second_session_while_one_runs() {
        let (_dir, mut controller) = controller();
        controller
            .start_capture(camera(6), Capabilities::none(), SessionConfig::default())
            .unwrap();

        let err = controller
            .start_capture(camera(6), Capabilities::none(), SessionConfig::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "capture already active");

        let outcome = controller.stop_capture().await.unwrap();
        assert_eq!(outcome, CaptureOutcome::Cancelled { stickers: 0 });
        assert!(!controller.is_active());
    }

    #[tokio::test]
    async fn triggers_drive_the_session_to_completion() {
        let (_dir, mut controller) = controller();
        controller
            .start_capture(camera(6), Capabilities::none(), SessionConfig::default())
            .unwrap();

        for face_index in 0..6 {
            wait_for_ready(&controller, face_index).await;
            controller.trigger().unwrap();
        }

        let outcome = controller.wait().await.unwrap();
        assert_eq!(outcome.status_kind(), CaptureStatusKind::Complete);
        assert_eq!(*controller.subscribe().unwrap().borrow(), CapturePhase::Complete);
        assert!(controller.trigger().is_err());
    }

    #[tokio::test]
    async fn waiting_does_not_cancel_a_session_awaiting_triggers() {
        let (_dir, mut controller) = controller();
        controller
            .start_capture(camera(6), Capabilities::none(), SessionConfig::default())
            .unwrap();

        wait_for_ready(&controller, 0).await;
        controller.trigger().unwrap();
        wait_for_ready(&controller, 1).await;

        let waited = tokio::time::timeout(Duration::from_millis(50), controller.wait()).await;
        assert!(waited.is_err(), "session ended while waiting for face 1");
        assert!(controller.is_active());
        assert_eq!(
            *controller.subscribe().unwrap().borrow(),
            CapturePhase::Ready { face_index: 1 }
        );

        for face_index in 1..6 {
            wait_for_ready(&controller, face_index).await;
            controller.trigger().unwrap();
        }
        let outcome = controller.wait().await.unwrap();
        assert_eq!(outcome.status_kind(), CaptureStatusKind::Complete);
    }

    #[tokio::test]
    async fn cancel_mid_session_reports_cancelled() {
        let (dir, mut controller) = controller();
        controller
            .start_capture(camera(6), Capabilities::none(), SessionConfig::default())
            .unwrap();

        wait_for_ready(&controller, 0).await;
        controller.trigger().unwrap();
        wait_for_ready(&controller, 1).await;

        let outcome = controller.stop_capture().await.unwrap();
        assert_eq!(outcome, CaptureOutcome::Cancelled { stickers: 9 });

        let store = ResultStore::new(StoreConfig {
            output_dir: dir.path().to_path_buf(),
            ..StoreConfig::default()
        });
        assert_eq!(
            store.read_status().unwrap().unwrap().status,
            CaptureStatusKind::Cancelled
        );
    }

    #[tokio::test]
    async fn new_session_can_start_after_the_previous_one_ends() {
        let (_dir, mut controller) = controller();
        let first = controller
            .start_capture(camera(6), Capabilities::none(), SessionConfig::default())
            .unwrap();
        controller.stop_capture().await.unwrap();

        let second = controller
            .start_capture(camera(6), Capabilities::none(), SessionConfig::default())
            .unwrap();
        assert_ne!(first, second);
        controller.stop_capture().await.unwrap();
    }

    #[tokio::test]
    async fn trigger_without_session_fails() {
        let (_dir, controller) = controller();
        assert!(controller.trigger().is_err());
        assert!(controller.subscribe().is_none());
    }
}
