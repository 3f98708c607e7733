//! File-based status and result records polled by the front end.
//!
//! Both files are rewritten whole on every update:
//!
//! ```text
//! <output_dir>/
//!   status.json       # {status, message, progress, timestamp}
//!   cube_state.json   # {cube_state, cube_string, is_valid, timestamp, face_count, total_stickers}
//! ```
//!
//! There is no cross-file transaction: a reader can see a new status next to
//! the previous result, or catch a file mid-write.

use anyhow::{Context, Result};
use chrono::Local;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::RwLock,
};

use crate::capture::state::{CaptureStatus, CaptureStatusKind, CubeResult};
use crate::cube::{CubeState, STICKERS_PER_FACE};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub output_dir: PathBuf,
    pub status_file: String,
    pub result_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("web_output"),
            status_file: "status.json".into(),
            result_file: "cube_state.json".into(),
        }
    }
}

pub struct ResultStore {
    config: StoreConfig,
    last_status: RwLock<Option<CaptureStatus>>,
}

impl ResultStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            last_status: RwLock::new(None),
        }
    }

    pub fn status_path(&self) -> PathBuf {
        self.config.output_dir.join(&self.config.status_file)
    }

    pub fn result_path(&self) -> PathBuf {
        self.config.output_dir.join(&self.config.result_file)
    }

    /// Overwrites the status file. The in-memory copy is updated even when the
    /// write fails.
    pub fn persist_status(
        &self,
        status: CaptureStatusKind,
        message: impl Into<String>,
        progress: f64,
    ) -> Result<CaptureStatus> {
        let record = CaptureStatus {
            status,
            message: message.into(),
            progress: progress.clamp(0.0, 100.0),
            timestamp: Local::now(),
        };

        {
            let mut guard = self
                .last_status
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *guard = Some(record.clone());
        }

        self.write_json(&self.status_path(), &record)?;
        log_info!("Status: {} - {}", record.status.as_str(), record.message);
        Ok(record)
    }

    /// Overwrites the result file with a snapshot of `state`.
    pub fn persist_result(
        &self,
        state: &CubeState,
        cube_string: &str,
        is_valid: bool,
    ) -> Result<CubeResult> {
        let record = CubeResult {
            cube_state: state.colors().to_vec(),
            cube_string: cube_string.to_string(),
            is_valid,
            timestamp: Local::now(),
            face_count: state.len() / STICKERS_PER_FACE,
            total_stickers: state.len(),
        };

        let path = self.result_path();
        self.write_json(&path, &record)?;
        log_debug!("Saved cube state to {}", path.display());
        Ok(record)
    }

    /// Last status this store was asked to persist, written or not.
    pub fn current_status(&self) -> Option<CaptureStatus> {
        self.last_status
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Reads the status file. `None` when it is missing or caught mid-write.
    pub fn read_status(&self) -> Result<Option<CaptureStatus>> {
        read_json(&self.status_path())
    }

    /// Reads the result file. `None` when it is missing or caught mid-write.
    pub fn read_result(&self) -> Result<Option<CubeResult>> {
        read_json(&self.result_path())
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        fs::create_dir_all(&self.config.output_dir).with_context(|| {
            format!(
                "Failed to create output directory {}",
                self.config.output_dir.display()
            )
        })?;
        let serialized = serde_json::to_string_pretty(value)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to read {}", path.display()))
        }
    };

    match serde_json::from_str(&contents) {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            log_debug!("{} not readable yet: {err}", path.display());
            Ok(None)
        }
    }
}
