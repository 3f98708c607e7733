use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::capture::SessionConfig;
use crate::color::{ClassifierConfig, NotationMap};
use crate::detect::DetectionConfig;
use crate::sensing::{CameraConfig, SamplerConfig};
use crate::store::StoreConfig;

pub const CONFIG_PATH_VAR: &str = "CUBESCAN_CONFIG";
pub const OUTPUT_DIR_VAR: &str = "CUBESCAN_OUTPUT_DIR";
pub const FRAMES_DIR_VAR: &str = "CUBESCAN_FRAMES_DIR";
pub const DEBUG_VAR: &str = "CUBESCAN_DEBUG";
const DEFAULT_CONFIG_FILE: &str = "cubescan.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub camera: CameraConfig,
    pub sampler: SamplerConfig,
    pub classifier: ClassifierConfig,
    pub notation: NotationMap,
    pub detection: DetectionConfig,
}

impl AppConfig {
    /// Reads `path`. A missing or unreadable file yields the defaults.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::read(path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Ignoring config {}: {err:#}", path.display());
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Config file named by `CUBESCAN_CONFIG`, then the directory overrides.
    pub fn from_env() -> Self {
        let path = env::var_os(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let mut config = Self::load(&path);
        config.apply_overrides(|name| env::var(name).ok());
        config
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(OUTPUT_DIR_VAR).filter(|v| !v.is_empty()) {
            self.store.output_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(FRAMES_DIR_VAR).filter(|v| !v.is_empty()) {
            self.camera.frames_dir = PathBuf::from(dir);
        }
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            sampler: self.sampler.clone(),
            classifier: self.classifier.clone(),
            notation: self.notation.clone(),
            ..SessionConfig::default()
        }
    }
}

pub fn debug_mode() -> bool {
    env::var(DEBUG_VAR)
        .map(|value| is_truthy(&value))
        .unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true")
}
