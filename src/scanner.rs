//! Scale-space window enumeration.
//!
//! The image is shrunk step by step by the configured scale factor and the
//! classifier's fixed window is slid over every shrunken view. A window at
//! `(x, y)` in a view shrunk by `factor` corresponds to an object of
//! `window * factor` pixels at `(x, y) * factor` in the original image.

use image::GrayImage;
use tracing::{debug, trace};

use crate::classifier::WindowClassifier;
use crate::constants::{FINE_STEP_FACTOR, SKIP_AFTER_HARD_REJECT};
use crate::detector::DetectorConfig;
use crate::error::Result;
use crate::images::{size_of, ScaleBuffer};
use crate::primitives::{cv_round, Rect, Size};

/// A scored window in original image coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub rect: Rect,
    pub reject_level: i32,
    pub level_weight: f64,
}
impl Candidate {
    pub fn new(rect: Rect, reject_level: i32, level_weight: f64) -> Self {
        Self { rect, reject_level, level_weight }
    }

    pub fn confidence(&self) -> f64 { f64::from(self.reject_level) * self.level_weight }
}

/// One scale that is worth scanning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleStep {
    pub factor: f64,
    /// Object size this scale detects, in original pixels
    pub object: Size,
    /// Size of the shrunken view
    pub scaled: Size,
    /// Range of valid top-left window positions in the view
    pub region: Size,
    /// Distance between neighbouring window positions
    pub stride: i32,
}

/// Iterator over the scales of one scan, smallest object first
#[derive(Debug, Clone)]
pub struct ScalePyramid {
    image: Size,
    window: Size,
    min_object: Size,
    max_object: Size,
    scale_factor: f64,
    factor: f64,
    done: bool,
}
impl ScalePyramid {
    pub fn new(image: Size, window: Size, config: &DetectorConfig) -> Self {
        let max_object = if config.max_size > 0 {
            Size::square(config.max_size)
        } else {
            image
        };
        Self {
            image,
            window,
            min_object: Size::square(config.min_size),
            max_object,
            scale_factor: config.scale_factor,
            factor: 1.0,
            done: window.is_empty(),
        }
    }
}
impl Iterator for ScalePyramid {
    type Item = ScaleStep;

    fn next(&mut self) -> Option<ScaleStep> {
        while !self.done {
            let factor = self.factor;
            self.factor *= self.scale_factor;

            let object = self.window.scale(factor);
            let scaled = self.image.shrink(factor);
            let region = scaled - self.window;

            // Both conditions only get worse as the factor grows
            if region.is_empty() || object.exceeds(self.max_object) {
                self.done = true;
                break;
            }
            if object.falls_short_of(self.min_object) {
                continue;
            }

            let stride = if factor > FINE_STEP_FACTOR { 1 } else { 2 };
            return Some(ScaleStep { factor, object, scaled, region, stride });
        }
        None
    }
}

/// Classifies every window of every scale and returns the positive ones.
///
/// A classifier error aborts the scan.
pub fn scan<C>(
    classifier: &C,
    image: &GrayImage,
    config: &DetectorConfig,
) -> Result<Vec<Candidate>>
where
    C: WindowClassifier + ?Sized,
{
    config.validate()?;
    let window = classifier.window_size();
    let mut buffer = ScaleBuffer::for_image(image);
    let mut candidates = Vec::new();

    for step in ScalePyramid::new(size_of(image), window, config) {
        buffer.resize_from(image, step.scaled);
        let before = candidates.len();

        let mut y = 0;
        while y < step.region.height {
            let mut x = 0;
            while x < step.region.width {
                let score = classifier.classify(&buffer.window(x, y, window))?;
                trace!(x, y, factor = step.factor, score, "window");
                if score > 0.0 {
                    let rect = Rect::from_size(
                        cv_round(f64::from(x) * step.factor),
                        cv_round(f64::from(y) * step.factor),
                        step.object,
                    );
                    candidates.push(Candidate::new(rect, 1, f64::from(score)));
                }
                if score == 0.0 && SKIP_AFTER_HARD_REJECT {
                    x += step.stride;
                }
                x += step.stride;
            }
            y += step.stride;
        }

        debug!(
            factor = step.factor,
            object = %step.object,
            view = %step.scaled,
            found = candidates.len() - before,
            "scanned scale"
        );
    }
    Ok(candidates)
}
