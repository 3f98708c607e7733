use serde::Serialize;
use std::{collections::BTreeMap, path::Path};

use crate::{
    color::{CubeColor, NotationMap},
    cube::TOTAL_STICKERS,
    detect::{self, FaceDetection},
    sensing::check_camera,
};

use super::state::{CaptureStatus, CubeResult};

use crate::AppState;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CameraStatus {
    pub camera_available: bool,
    pub backend_available: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SupportedColor {
    pub color: CubeColor,
    pub notation: char,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ColorMappings {
    pub color_to_cube: NotationMap,
    pub cube_to_color: BTreeMap<char, CubeColor>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValidationWarning {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CubeValidation {
    pub is_valid: bool,
    pub message: String,
    pub warnings: Vec<ValidationWarning>,
    pub cube_state_length: usize,
}

pub async fn start_capture(state: &AppState) -> Result<String, String> {
    let camera = (state.camera_factory)();
    let mut controller = state.capture.lock().await;
    controller
        .start_capture(camera, state.capabilities.clone(), state.config.session())
        .map_err(|e| e.to_string())
}

pub async fn trigger_capture(state: &AppState) -> Result<(), String> {
    let controller = state.capture.lock().await;
    controller.trigger().map_err(|e| e.to_string())
}

pub async fn cancel_capture(state: &AppState) -> Result<(), String> {
    let controller = state.capture.lock().await;
    if !controller.is_active() {
        return Err("no active capture session".to_string());
    }
    controller.cancel();
    Ok(())
}

/// Blocks until the running session ends, then returns its last status.
/// The controller is only locked once the session has finished, so triggers
/// and cancels sent meanwhile still reach it.
pub async fn wait_for_capture(state: &AppState) -> Result<Option<CaptureStatus>, String> {
    let Some(mut phase_rx) = state.capture.lock().await.subscribe() else {
        return Err("no capture session to wait for".to_string());
    };
    // A closed channel means the task is gone; `wait` reports how it ended.
    let _ = phase_rx.wait_for(|phase| phase.is_terminal()).await;

    let outcome = state.capture.lock().await.wait().await;
    if outcome.is_none() {
        return Err("no capture session to wait for".to_string());
    }
    Ok(state.store.current_status())
}

pub async fn get_status(state: &AppState) -> Result<Option<CaptureStatus>, String> {
    state.store.read_status().map_err(|e| e.to_string())
}

pub async fn get_result(state: &AppState) -> Result<Option<CubeResult>, String> {
    state.store.read_result().map_err(|e| e.to_string())
}

/// Detection on a base64 image, optionally wrapped in a data URL.
pub async fn detect_colors(
    state: &AppState,
    image: String,
    face: Option<String>,
) -> Result<FaceDetection, String> {
    let config = state.config.clone();
    tokio::task::spawn_blocking(move || {
        detect::detect_colors_base64(&image, face.as_deref(), &config)
    })
    .await
    .map_err(|e| e.to_string())?
    .map_err(|e| format!("{e:#}"))
}

pub async fn detect_colors_from_file(
    state: &AppState,
    path: &Path,
    face: Option<String>,
) -> Result<FaceDetection, String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| format!("Color detection failed: {}: {e}", path.display()))?;
    let config = state.config.clone();
    tokio::task::spawn_blocking(move || detect::detect_colors(&bytes, face.as_deref(), &config))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| format!("{e:#}"))
}

/// Runs the validator on a 54-sticker state given as color names. When
/// `cube_string` has 54 letters and disagrees with the state, the result
/// carries a `cubestring_mismatch` warning.
pub async fn validate_cube(
    state: &AppState,
    cube_state: Vec<String>,
    cube_string: Option<String>,
) -> Result<CubeValidation, String> {
    let Some(validator) = state.capabilities.validator.clone() else {
        return Err("Cube validation function not available.".to_string());
    };
    if cube_state.len() != TOTAL_STICKERS {
        return Err(format!(
            "Invalid cube_state length: expected {TOTAL_STICKERS}, got {}",
            cube_state.len()
        ));
    }

    let colors = cube_state
        .iter()
        .map(|name| {
            CubeColor::from_name(name)
                .ok_or_else(|| format!("Invalid cube_state: unknown color '{name}'"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let expected = state.config.notation.encode(&colors);

    let is_valid = tokio::task::spawn_blocking(move || validator.validate(&colors))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| format!("Validation failed: {e:#}"))?;

    let warnings = cube_string
        .filter(|actual| actual.chars().count() == TOTAL_STICKERS && *actual != expected)
        .map(|actual| ValidationWarning {
            kind: "cubestring_mismatch".to_string(),
            message: "Cube string does not match cube state".to_string(),
            expected,
            actual,
        })
        .into_iter()
        .collect();

    Ok(CubeValidation {
        is_valid,
        message: if is_valid {
            "Cube state is valid".to_string()
        } else {
            "Cube state is invalid".to_string()
        },
        warnings,
        cube_state_length: cube_state.len(),
    })
}

/// Opens and releases the camera. A camera held by a running session is
/// reported as available without being opened.
pub async fn camera_status(state: &AppState) -> Result<CameraStatus, String> {
    if state.capture.lock().await.is_active() {
        return Ok(CameraStatus {
            camera_available: true,
            backend_available: true,
            message: "Camera in use by active capture session".to_string(),
        });
    }

    let camera = (state.camera_factory)();
    let available = tokio::task::spawn_blocking(move || check_camera(camera))
        .await
        .map_err(|e| e.to_string())?;

    Ok(CameraStatus {
        camera_available: available,
        backend_available: true,
        message: if available {
            "Camera is accessible".to_string()
        } else {
            "Camera not accessible. Please check camera connection.".to_string()
        },
    })
}

pub fn supported_colors(state: &AppState) -> Vec<SupportedColor> {
    state
        .config
        .notation
        .entries()
        .into_iter()
        .map(|(color, notation)| SupportedColor { color, notation })
        .collect()
}

pub fn color_mappings(state: &AppState) -> ColorMappings {
    ColorMappings {
        color_to_cube: state.config.notation.clone(),
        cube_to_color: state.config.notation.inverse(),
    }
}
