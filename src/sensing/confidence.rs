//! How uniform a sampled sticker patch is, scored 0..1.
//!
//! A patch whose pixels agree in hue, saturation and value scores high; glare,
//! edges between stickers or motion blur spread the channels and lower it.

use image::{Rgb, RgbImage};

use crate::color::CubeColor;

use super::sampler::{cell_regions, rgb_to_hsv, CellRegion, SamplerConfig};

const HUE_SPREAD: f32 = 30.0;
const SATURATION_SPREAD: f32 = 50.0;
const VALUE_SPREAD: f32 = 50.0;

const HUE_WEIGHT: f32 = 0.5;
const SATURATION_WEIGHT: f32 = 0.25;
const VALUE_WEIGHT: f32 = 0.25;

/// Low-saturation white patches never score below this.
const WHITE_FLOOR: f32 = 0.85;
const WHITE_MAX_SATURATION: f32 = 50.0;

/// Score for a patch with no pixels to measure.
const UNMEASURED: f32 = 0.5;

/// Confidence of each of the nine stickers, in the order `colors` was sampled.
pub fn face_confidence(
    image: &RgbImage,
    sampler: &SamplerConfig,
    colors: &[CubeColor],
) -> Vec<f32> {
    cell_regions(image.width(), image.height(), sampler)
        .iter()
        .zip(colors)
        .map(|(region, color)| sticker_confidence(image, *region, *color))
        .collect()
}

/// Scores one patch, rounded to two decimals.
pub fn sticker_confidence(image: &RgbImage, region: CellRegion, color: CubeColor) -> f32 {
    if region.is_empty() {
        return UNMEASURED;
    }

    let samples: Vec<_> = region
        .pixels(image)
        .map(|Rgb(pixel)| rgb_to_hsv(pixel.map(f32::from)))
        .collect();

    let (_, hue_std) = mean_and_std(samples.iter().map(|s| s.hue));
    let (mean_saturation, saturation_std) = mean_and_std(samples.iter().map(|s| s.saturation));
    let (_, value_std) = mean_and_std(samples.iter().map(|s| s.value));

    let agreement = |std: f32, spread: f32| (1.0 - std / spread).max(0.0);
    let mut confidence = agreement(hue_std, HUE_SPREAD) * HUE_WEIGHT
        + agreement(saturation_std, SATURATION_SPREAD) * SATURATION_WEIGHT
        + agreement(value_std, VALUE_SPREAD) * VALUE_WEIGHT;

    if color == CubeColor::White && mean_saturation < WHITE_MAX_SATURATION {
        confidence = confidence.max(WHITE_FLOOR);
    }

    (confidence * 100.0).round() / 100.0
}

/// Population mean and standard deviation.
fn mean_and_std(values: impl Iterator<Item = f32> + Clone) -> (f32, f32) {
    let count = values.clone().count() as f32;
    if count == 0.0 {
        return (0.0, 0.0);
    }
    let mean = values.clone().sum::<f32>() / count;
    let variance = values.map(|v| (v - mean).powi(2)).sum::<f32>() / count;
    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard(a: [u8; 3], b: [u8; 3]) -> RgbImage {
        RgbImage::from_fn(20, 20, |x, y| if (x + y) % 2 == 0 { Rgb(a) } else { Rgb(b) })
    }

    fn whole(image: &RgbImage) -> CellRegion {
        CellRegion {
            x1: 0,
            y1: 0,
            x2: image.width(),
            y2: image.height(),
        }
    }

    #[test]
    fn uniform_patch_is_fully_confident() {
        let image = RgbImage::from_pixel(20, 20, Rgb([0, 255, 0]));
        assert_eq!(sticker_confidence(&image, whole(&image), CubeColor::Green), 1.0);
    }

    #[test]
    fn spread_in_value_lowers_confidence() {
        let image = checkerboard([0, 0, 0], [255, 255, 255]);
        assert_eq!(sticker_confidence(&image, whole(&image), CubeColor::Red), 0.75);
    }

    #[test]
    fn unsaturated_white_keeps_a_high_floor() {
        let image = checkerboard([0, 0, 0], [255, 255, 255]);
        assert_eq!(sticker_confidence(&image, whole(&image), CubeColor::White), 0.85);
    }

    #[test]
    fn mixed_hues_score_low() {
        let image = checkerboard([255, 0, 0], [0, 0, 255]);
        assert_eq!(sticker_confidence(&image, whole(&image), CubeColor::Blue), 0.5);
    }

    #[test]
    fn empty_region_gets_the_middle_score() {
        let image = RgbImage::new(0, 0);
        let scores = face_confidence(&image, &SamplerConfig::default(), &[CubeColor::White; 9]);
        assert_eq!(scores, vec![0.5; 9]);
    }
}
