use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::images::{ImageData, IntegralImage};
use crate::primitives::{Rect, Size};

/// Smallest weighted error a weak classifier is credited with, keeps the
/// vote weight finite for perfectly separating features
const MIN_ERROR: f64 = 1e-10;

/// Layout of a Haar-like feature
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    /// Left half minus right half
    EdgeHorizontal,
    /// Top half minus bottom half
    EdgeVertical,
    /// Outer thirds minus twice the middle third, side by side
    LineHorizontal,
    /// Outer thirds minus twice the middle third, stacked
    LineVertical,
    /// Main diagonal quadrants minus the other two
    Diagonal,
}
impl FeatureKind {
    pub const ALL: [FeatureKind; 5] = [
        FeatureKind::EdgeHorizontal,
        FeatureKind::EdgeVertical,
        FeatureKind::LineHorizontal,
        FeatureKind::LineVertical,
        FeatureKind::Diagonal,
    ];

    /// Number of cells along x and y
    const fn cells(self) -> (i32, i32) {
        match self {
            FeatureKind::EdgeHorizontal => (2, 1),
            FeatureKind::EdgeVertical => (1, 2),
            FeatureKind::LineHorizontal => (3, 1),
            FeatureKind::LineVertical => (1, 3),
            FeatureKind::Diagonal => (2, 2),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HaarFeature {
    pub kind: FeatureKind,
    /// Bounding box of the feature inside the window
    pub rect: Rect,
}
impl HaarFeature {
    /// Every feature of every kind that fits in `window`, with positions and
    /// cell sizes sampled every `step` pixels
    pub fn enumerate(window: Size, step: u32) -> Vec<HaarFeature> {
        let step = step.max(1) as usize;
        let mut features = Vec::new();
        for kind in FeatureKind::ALL {
            let (cx, cy) = kind.cells();
            for cw in (1..=window.width / cx).step_by(step) {
                for ch in (1..=window.height / cy).step_by(step) {
                    let (w, h) = (cw * cx, ch * cy);
                    for y in (0..=window.height - h).step_by(step) {
                        for x in (0..=window.width - w).step_by(step) {
                            let rect = Rect::new(x, y, w, h);
                            features.push(HaarFeature { kind, rect });
                        }
                    }
                }
            }
        }
        features
    }

    pub fn value(&self, ii: &IntegralImage) -> f32 {
        let (cx, cy) = self.kind.cells();
        let (cw, ch) = (self.rect.width / cx, self.rect.height / cy);
        let cell = |i: i32, j: i32| {
            ii.rect_sum(&Rect::new(self.rect.x + i * cw, self.rect.y + j * ch, cw, ch))
        };
        let v = match self.kind {
            FeatureKind::EdgeHorizontal => cell(0, 0) - cell(1, 0),
            FeatureKind::EdgeVertical => cell(0, 0) - cell(0, 1),
            FeatureKind::LineHorizontal => cell(0, 0) + cell(2, 0) - 2 * cell(1, 0),
            FeatureKind::LineVertical => cell(0, 0) + cell(0, 2) - 2 * cell(0, 1),
            FeatureKind::Diagonal => cell(0, 0) + cell(1, 1) - cell(1, 0) - cell(0, 1),
        };
        v as f32
    }
}

/// A decision stump over a single Haar-like feature
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WeakClassifier {
    pub feature: HaarFeature,
    pub threshold: f32,
    /// +1 votes for the object below the threshold, -1 above it
    pub polarity: i8,
}
impl WeakClassifier {
    /// Gets an untrained weak classifier for every feature in the window
    pub fn get_all(window: Size, step: u32) -> Vec<WeakClassifier> {
        HaarFeature::enumerate(window, step)
            .into_iter()
            .map(|feature| WeakClassifier { feature, threshold: 0.0, polarity: 1 })
            .collect()
    }

    pub fn classify(&self, ii: &IntegralImage) -> bool {
        let p = f32::from(self.polarity);
        p * self.feature.value(ii) < p * self.threshold
    }

    /// Picks the threshold and polarity with the lowest weighted error on
    /// `set`. Returns the fitted classifier and its error.
    pub fn fit(&self, set: &[ImageData]) -> (WeakClassifier, f64) {
        let values: Vec<f32> = set.iter().map(|d| self.feature.value(&d.image)).collect();
        let mut order: Vec<usize> = (0..set.len()).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

        let total_pos: f64 = set.iter().filter(|d| d.is_object).map(|d| d.weight).sum();
        let total_neg: f64 = set.iter().filter(|d| !d.is_object).map(|d| d.weight).sum();

        let n = order.len();
        let (mut below_pos, mut below_neg) = (0.0, 0.0);
        let mut best = (f64::INFINITY, 0.0f32, 1i8);
        let mut k = 0;
        loop {
            // order[..k] lies below the candidate threshold
            let threshold = match (k, n) {
                (_, 0) => 0.0,
                (0, _) => values[order[0]] - 1.0,
                (k, n) if k == n => values[order[n - 1]] + 1.0,
                (k, _) => (values[order[k - 1]] + values[order[k]]) / 2.0,
            };
            let below_is_object = below_neg + (total_pos - below_pos);
            let above_is_object = below_pos + (total_neg - below_neg);
            if below_is_object < best.0 {
                best = (below_is_object, threshold, 1);
            }
            if above_is_object < best.0 {
                best = (above_is_object, threshold, -1);
            }
            if k == n {
                break;
            }
            // Equal values can't be split by a threshold
            let v = values[order[k]];
            while k < n && values[order[k]] == v {
                let d = &set[order[k]];
                if d.is_object {
                    below_pos += d.weight;
                } else {
                    below_neg += d.weight;
                }
                k += 1;
            }
        }

        let (error, threshold, polarity) = best;
        (
            WeakClassifier { feature: self.feature.clone(), threshold, polarity },
            error.max(0.0),
        )
    }

    /// Fits every candidate and returns the one with the lowest weighted
    /// error. Ties go to the earlier candidate.
    pub fn get_best(
        wcs: &[WeakClassifier],
        set: &[ImageData],
    ) -> Option<(WeakClassifier, f64)> {
        wcs.par_iter()
            .enumerate()
            .map(|(i, wc)| {
                let (fitted, error) = wc.fit(set);
                (i, fitted, error)
            })
            .reduce_with(|a, b| {
                if b.2 < a.2 || (b.2 == a.2 && b.0 < a.0) {
                    b
                } else {
                    a
                }
            })
            .map(|(_, wc, error)| (wc, error))
    }

    /// Down-weights the samples this classifier gets right and returns its
    /// vote weight
    pub fn update_weights(&self, set: &mut [ImageData], error: f64) -> f64 {
        let error = error.max(MIN_ERROR);
        let beta = error / (1.0 - error);
        for data in set.iter_mut() {
            if self.classify(&data.image) == data.is_object {
                data.weight *= beta;
            }
        }
        (1.0 / beta).ln()
    }
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, Luma};

    use super::*;

    /// Bright on the left half, dark on the right
    fn split(w: u32, bright: u8, dark: u8) -> GrayImage {
        GrayImage::from_fn(w, w, |x, _| Luma([if x < w / 2 { bright } else { dark }]))
    }

    fn weighted(set: Vec<ImageData>) -> Vec<ImageData> {
        let n = set.len() as f64;
        set.into_iter().map(|d| ImageData { weight: 1.0 / n, ..d }).collect()
    }

    #[test]
    fn enumerates_features_inside_window() {
        let window = Size::square(6);
        let features = HaarFeature::enumerate(window, 1);
        assert!(!features.is_empty());
        for f in &features {
            assert!(f.rect.x >= 0 && f.rect.y >= 0);
            assert!(f.rect.right() <= 6 && f.rect.bottom() <= 6);
        }
        let coarse = HaarFeature::enumerate(window, 2);
        assert!(coarse.len() < features.len());
    }

    #[test]
    fn edge_feature_value() {
        let ii = IntegralImage::new(&split(4, 10, 0));
        let rect = Rect::new(0, 0, 4, 4);
        let f = HaarFeature { kind: FeatureKind::EdgeHorizontal, rect };
        assert_eq!(f.value(&ii), 80.0);
        let f = HaarFeature { kind: FeatureKind::EdgeVertical, rect };
        assert_eq!(f.value(&ii), 0.0);
    }

    #[test]
    fn stump_separates_edges_from_flat_windows() {
        let set = weighted(vec![
            ImageData::new(&split(4, 200, 20), true),
            ImageData::new(&split(4, 180, 40), true),
            ImageData::new(&split(4, 90, 90), false),
            ImageData::new(&split(4, 20, 200), false),
        ]);
        let wc = WeakClassifier {
            feature: HaarFeature {
                kind: FeatureKind::EdgeHorizontal,
                rect: Rect::new(0, 0, 4, 4),
            },
            threshold: 0.0,
            polarity: 1,
        };
        let (fitted, error) = wc.fit(&set);
        assert_eq!(error, 0.0);
        assert_eq!(fitted.polarity, -1);
        for d in &set {
            assert_eq!(fitted.classify(&d.image), d.is_object);
        }
    }

    #[test]
    fn best_classifier_and_weight_update() {
        let mut set = weighted(vec![
            ImageData::new(&split(4, 200, 20), true),
            ImageData::new(&split(4, 90, 90), false),
        ]);
        let wcs = WeakClassifier::get_all(Size::square(4), 1);
        let (best, error) = WeakClassifier::get_best(&wcs, &set).unwrap();
        assert_eq!(error, 0.0);
        let alpha = best.update_weights(&mut set, error);
        assert!(alpha > 20.0);
        assert!(set.iter().all(|d| d.weight < 1e-9));
    }
}
