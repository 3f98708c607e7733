//! One-shot color detection on a still image supplied by the caller.
//!
//! Front ends show the camera preview mirrored, so the frame is flipped before
//! sampling and the detected rows are reversed again afterwards. The result is
//! in the order the user saw on screen.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{imageops, RgbImage};
use serde::{Deserialize, Serialize};

use crate::color::{notation::UNMAPPED_CODE, CubeColor};
use crate::config::AppConfig;
use crate::sensing::{
    confidence::face_confidence,
    preprocess::{prepare_frame, PreprocessConfig},
    sampler::face_colors,
};

const UNKNOWN_FACE: &str = "unknown";
const GRID_SIDE: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Flip the frame before sampling and reverse each detected row after.
    pub mirror: bool,
    pub preprocess: PreprocessConfig,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            mirror: true,
            preprocess: PreprocessConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    pub success: bool,
    pub colors: Vec<CubeColor>,
    pub cube_notation: String,
    /// Per sticker, 0..1, same order as `colors`.
    pub confidence: Vec<f32>,
    pub face: String,
    pub message: String,
}

/// Turns `data:image/png;base64,...` or bare base64 text into image bytes.
pub fn decode_image_payload(payload: &str) -> Result<Vec<u8>> {
    let trimmed = payload.trim();
    let encoded = match trimmed.split_once(',') {
        Some((header, data)) if header.starts_with("data:") => data,
        _ => trimmed,
    };
    STANDARD
        .decode(encoded.trim())
        .context("invalid base64 image data")
}

/// Samples and classifies the nine stickers of an encoded image.
pub fn detect_colors(
    image_bytes: &[u8],
    face: Option<&str>,
    config: &AppConfig,
) -> Result<FaceDetection> {
    let image = image::load_from_memory(image_bytes)
        .context("Color detection failed: could not decode image")?
        .to_rgb8();
    Ok(detect_in_frame(image, face, config))
}

/// `detect_colors` for a base64 payload, as sent by a browser front end.
pub fn detect_colors_base64(
    payload: &str,
    face: Option<&str>,
    config: &AppConfig,
) -> Result<FaceDetection> {
    let bytes = decode_image_payload(payload).context("Color detection failed")?;
    detect_colors(&bytes, face, config)
}

fn detect_in_frame(image: RgbImage, face: Option<&str>, config: &AppConfig) -> FaceDetection {
    let detection = &config.detection;
    let mut frame = if detection.mirror {
        imageops::flip_horizontal(&image)
    } else {
        image
    };
    if detection.preprocess.enabled {
        frame = prepare_frame(&frame, &detection.preprocess);
    }

    let mut colors = face_colors(&frame, &config.sampler, &config.classifier);
    let mut confidence = face_confidence(&frame, &config.sampler, &colors);
    if detection.mirror {
        colors = unmirror(&colors);
        confidence = unmirror(&confidence);
    }

    let cube_notation = config.notation.encode(&colors);
    let face = face.unwrap_or(UNKNOWN_FACE).to_string();
    let success = !cube_notation.contains(UNMAPPED_CODE);
    let message = if success {
        format!("Successfully detected colors for {face} face")
    } else {
        "Some colors could not be detected".to_string()
    };

    FaceDetection {
        success,
        colors,
        cube_notation,
        confidence,
        face,
        message,
    }
}

/// Reverses each row of a row-major 3×3 grid.
pub fn unmirror<T: Copy>(values: &[T]) -> Vec<T> {
    values
        .chunks(GRID_SIDE)
        .flat_map(|row| row.iter().rev().copied())
        .collect()
}
