//! Frame clean-up applied to still images before their stickers are sampled.

use image::{imageops, imageops::FilterType, Rgb, RgbImage};
use palette::{FromColor, Hsv, Lab, LinSrgb, Srgb};
use serde::{Deserialize, Serialize};

/// Gray-world correction strength, scaled by each pixel's lightness.
const WHITE_BALANCE_GAIN: f32 = 1.1;
/// Frames darker than this (mean V, 0..255) get extra brightening.
const DIM_THRESHOLD: f32 = 100.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub enabled: bool,
    /// Side of the square frame after cropping and resizing. `0` keeps the crop size.
    pub target_size: u32,
    pub white_balance: bool,
    /// Base brightness added to V (0..255). `0` disables brightening.
    pub brightness: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_size: 600,
            white_balance: true,
            brightness: 40.0,
        }
    }
}

/// Center-crops to a square, resizes, then balances and brightens.
pub fn prepare_frame(image: &RgbImage, config: &PreprocessConfig) -> RgbImage {
    let mut frame = crop_to_square(image);
    if frame.width() == 0 {
        return frame;
    }

    if config.target_size > 0 && frame.width() != config.target_size {
        frame = imageops::resize(
            &frame,
            config.target_size,
            config.target_size,
            FilterType::Triangle,
        );
    }
    if config.white_balance {
        frame = correct_white_balance(&frame);
    }
    if config.brightness > 0.0 {
        frame = adaptive_brighten(&frame, config.brightness);
    }
    frame
}

pub fn crop_to_square(image: &RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let size = width.min(height);
    let x = (width - size) / 2;
    let y = (height - size) / 2;
    imageops::crop_imm(image, x, y, size, size).to_image()
}

/// Gray-world white balance: shifts every pixel's a/b chroma against the
/// frame's mean chroma, more strongly for lighter pixels.
pub fn correct_white_balance(image: &RgbImage) -> RgbImage {
    let labs: Vec<Lab> = image
        .pixels()
        .map(|pixel| Lab::from_color(to_srgb(pixel).into_linear()))
        .collect();
    if labs.is_empty() {
        return image.clone();
    }

    let count = labs.len() as f32;
    let mean_a = labs.iter().map(|lab| lab.a).sum::<f32>() / count;
    let mean_b = labs.iter().map(|lab| lab.b).sum::<f32>() / count;

    let mut balanced = labs.into_iter().map(|mut lab| {
        let weight = lab.l / 100.0 * WHITE_BALANCE_GAIN;
        lab.a -= mean_a * weight;
        lab.b -= mean_b * weight;
        to_pixel(Srgb::from_linear(LinSrgb::from_color(lab)))
    });

    RgbImage::from_fn(image.width(), image.height(), |_, _| {
        balanced.next().unwrap_or(Rgb([0, 0, 0]))
    })
}

/// Raises V by `base`, plus half of the shortfall when the frame is dim.
pub fn adaptive_brighten(image: &RgbImage, base: f32) -> RgbImage {
    let pixel_count = u64::from(image.width()) * u64::from(image.height());
    if pixel_count == 0 {
        return image.clone();
    }

    let value_sum: u64 = image
        .pixels()
        .map(|Rgb(channels)| u64::from(channels.iter().copied().max().unwrap_or(0)))
        .sum();
    let mean_value = value_sum as f32 / pixel_count as f32;

    let adjustment = if mean_value < DIM_THRESHOLD {
        base + (DIM_THRESHOLD - mean_value) * 0.5
    } else {
        base * 0.5
    }
    .trunc();

    let mut brightened = image.clone();
    for pixel in brightened.pixels_mut() {
        let mut hsv = Hsv::from_color(to_srgb(pixel));
        hsv.value = ((hsv.value * 255.0).round() + adjustment).min(255.0) / 255.0;
        *pixel = to_pixel(Srgb::from_color(hsv));
    }
    brightened
}

fn to_srgb(pixel: &Rgb<u8>) -> Srgb {
    let Rgb([r, g, b]) = *pixel;
    Srgb::new(r, g, b).into_format()
}

fn to_pixel(color: Srgb) -> Rgb<u8> {
    let (r, g, b) = color.into_components();
    Rgb([r, g, b].map(|c| (c * 255.0).round().clamp(0.0, 255.0) as u8))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(actual: Rgb<u8>, expected: [u8; 3]) -> bool {
        actual
            .0
            .iter()
            .zip(expected)
            .all(|(a, e)| (i16::from(*a) - i16::from(e)).abs() <= 1)
    }

    #[test]
    fn crops_the_center_square() {
        let image = RgbImage::from_fn(40, 20, |x, _| match x {
            0..=9 => Rgb([255, 0, 0]),
            10..=29 => Rgb([0, 255, 0]),
            _ => Rgb([0, 0, 255]),
        });
        let square = crop_to_square(&image);
        assert_eq!(square.dimensions(), (20, 20));
        assert!(square.pixels().all(|p| *p == Rgb([0, 255, 0])));
    }

    #[test]
    fn prepared_frame_has_the_target_size() {
        let image = RgbImage::from_pixel(64, 48, Rgb([90, 90, 90]));
        let config = PreprocessConfig {
            target_size: 30,
            ..PreprocessConfig::default()
        };
        assert_eq!(prepare_frame(&image, &config).dimensions(), (30, 30));
        assert_eq!(
            prepare_frame(&RgbImage::new(0, 0), &config).dimensions(),
            (0, 0)
        );
    }

    #[test]
    fn white_balance_leaves_gray_alone() {
        let image = RgbImage::from_pixel(8, 8, Rgb([128, 128, 128]));
        let balanced = correct_white_balance(&image);
        assert!(balanced.pixels().all(|p| close(*p, [128, 128, 128])));
    }

    #[test]
    fn white_balance_reduces_a_color_cast() {
        let image = RgbImage::from_pixel(8, 8, Rgb([220, 180, 140]));
        let balanced = correct_white_balance(&image);
        let Rgb([r, _, b]) = *balanced.get_pixel(0, 0);
        assert!(i16::from(r) - i16::from(b) < 40, "cast remains: {r} vs {b}");
    }

    #[test]
    fn dim_frames_are_brightened_more() {
        let dim = adaptive_brighten(&RgbImage::from_pixel(4, 4, Rgb([50, 50, 50])), 40.0);
        assert!(close(*dim.get_pixel(0, 0), [115, 115, 115]));

        let bright = adaptive_brighten(&RgbImage::from_pixel(4, 4, Rgb([200, 200, 200])), 40.0);
        assert!(close(*bright.get_pixel(0, 0), [220, 220, 220]));

        let saturated = adaptive_brighten(&RgbImage::from_pixel(4, 4, Rgb([250, 0, 0])), 40.0);
        assert!(close(*saturated.get_pixel(0, 0), [255, 0, 0]));
    }
}
