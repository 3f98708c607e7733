use image::{Rgb, RgbImage};
use palette::{FromColor, Hsv, Srgb};
use serde::{Deserialize, Serialize};

use crate::color::{ClassifierConfig, ColorSample, CubeColor};
use crate::cube::{FaceCapture, STICKERS_PER_FACE};

const GRID: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Side of the square averaged around each cell midpoint, in pixels.
    pub sample_size: u32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self { sample_size: 20 }
    }
}

/// Samples the nine sticker cells of a face image, row-major from the top-left.
///
/// Each sample is the mean color of a `sample_size` square centered on the cell
/// midpoint and clipped to the image. Cells whose clipped region is empty
/// (zero-size images) get `ColorSample::NEUTRAL`.
pub fn sample_face(image: &RgbImage, config: &SamplerConfig) -> [ColorSample; STICKERS_PER_FACE] {
    let regions = cell_regions(image.width(), image.height(), config);
    regions.map(|region| {
        average_region(image, region)
            .map(rgb_to_hsv)
            .unwrap_or(ColorSample::NEUTRAL)
    })
}

/// Pixel bounds of one sampled cell, `x2`/`y2` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRegion {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl CellRegion {
    pub fn is_empty(&self) -> bool {
        self.x1 >= self.x2 || self.y1 >= self.y2
    }

    pub fn pixels<'a>(&self, image: &'a RgbImage) -> impl Iterator<Item = Rgb<u8>> + 'a {
        let CellRegion { x1, y1, x2, y2 } = *self;
        (y1..y2).flat_map(move |y| (x1..x2).map(move |x| *image.get_pixel(x, y)))
    }
}

/// The nine squares `sample_face` averages, row-major, clipped to the image.
pub fn cell_regions(
    width: u32,
    height: u32,
    config: &SamplerConfig,
) -> [CellRegion; STICKERS_PER_FACE] {
    let half = config.sample_size / 2;
    std::array::from_fn(|index| {
        let index = index as u32;
        let x = cell_midpoint(width, index % GRID);
        let y = cell_midpoint(height, index / GRID);
        CellRegion {
            x1: x.saturating_sub(half),
            y1: y.saturating_sub(half),
            x2: width.min(x.saturating_add(half)),
            y2: height.min(y.saturating_add(half)),
        }
    })
}

/// Samples and classifies one face.
pub fn classify_face(
    image: &RgbImage,
    sampler: &SamplerConfig,
    classifier: &ClassifierConfig,
) -> FaceCapture {
    let samples = sample_face(image, sampler);
    FaceCapture::new(samples.map(|sample| classifier.classify(sample)))
}

/// Convenience for callers that only need the color list.
pub fn face_colors(
    image: &RgbImage,
    sampler: &SamplerConfig,
    classifier: &ClassifierConfig,
) -> Vec<CubeColor> {
    classify_face(image, sampler, classifier).colors().to_vec()
}

fn cell_midpoint(extent: u32, cell: u32) -> u32 {
    (f64::from(extent) * (f64::from(cell) + 0.5) / f64::from(GRID)) as u32
}

fn average_region(image: &RgbImage, region: CellRegion) -> Option<[f32; 3]> {
    if region.is_empty() {
        return None;
    }

    let mut sum = [0u64; 3];
    for Rgb([r, g, b]) in region.pixels(image) {
        sum[0] += u64::from(r);
        sum[1] += u64::from(g);
        sum[2] += u64::from(b);
    }

    let count = (u64::from(region.x2 - region.x1) * u64::from(region.y2 - region.y1)) as f32;
    Some(sum.map(|channel| channel as f32 / count))
}

/// RGB (0..255 per channel) to 8-bit HSV: hue in half-degrees, S and V in 0..255.
pub fn rgb_to_hsv([r, g, b]: [f32; 3]) -> ColorSample {
    let hsv = Hsv::from_color(Srgb::new(r / 255.0, g / 255.0, b / 255.0));
    ColorSample::new(
        hsv.hue.into_positive_degrees() / 2.0,
        hsv.saturation * 255.0,
        hsv.value * 255.0,
    )
}
