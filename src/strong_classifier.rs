use serde::{Deserialize, Serialize};

use crate::images::{ImageData, IntegralImage};
use crate::weak_classifier::WeakClassifier;

/// A strong classifier (made up of weighted weak classifiers)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrongClassifier {
    pub wcs: Vec<WeakClassifier>,
    pub weights: Vec<f64>,
    pub threshold: f64,
}
impl StrongClassifier {
    /// Creates an empty strong classifier
    pub const fn new() -> Self {
        Self { wcs: Vec::new(), weights: Vec::new(), threshold: 0.0 }
    }

    /// Trains a weak classifier on the current weights and pushes it onto
    /// self. Returns false when no candidate does better than chance.
    pub fn push(&mut self, wcs: &[WeakClassifier], set: &mut [ImageData]) -> bool {
        // Normalize weights
        ImageData::normalize_weights(set);

        // Get the best weak classifier based off of the training images
        let Some((wc, error)) = WeakClassifier::get_best(wcs, set) else {
            return false;
        };
        if error >= 0.5 {
            return false;
        }

        // Update the weights
        let weight = wc.update_weights(set, error);
        self.wcs.push(wc);
        self.weights.push(weight);

        // Find the threshold of the strong classifier
        self.threshold = self.weights.iter().sum::<f64>() / 2.0;
        true
    }

    /// Lowers the threshold until at least `min_hit_rate` of the objects in
    /// `set` are accepted
    pub fn fit_threshold(&mut self, set: &[ImageData], min_hit_rate: f64) {
        let mut scores: Vec<f64> =
            set.iter().filter(|d| d.is_object).map(|d| self.score(&d.image)).collect();
        if scores.is_empty() {
            return;
        }
        scores.sort_by(|a, b| b.total_cmp(a));
        let n = scores.len();
        let keep = ((min_hit_rate * n as f64).ceil() as usize).clamp(1, n);
        self.threshold = self.threshold.min(scores[keep - 1]);
    }

    /// Sum of the weights of the weak classifiers voting for the object
    pub fn score(&self, ii: &IntegralImage) -> f64 {
        self.wcs
            .iter()
            .zip(self.weights.iter())
            .filter(|(wc, _)| wc.classify(ii))
            .map(|(_, weight)| weight)
            .sum::<f64>()
    }

    /// Classifies a window as being the object or not
    pub fn classify(&self, ii: &IntegralImage) -> bool {
        self.score(ii) >= self.threshold
    }

    /// Fraction of objects in `set` accepted
    pub fn detect_rate(&self, set: &[ImageData]) -> f64 {
        rate(set.iter().filter(|d| d.is_object), |d| self.classify(&d.image))
    }

    /// Fraction of non-objects in `set` accepted
    pub fn false_pos(&self, set: &[ImageData]) -> f64 {
        rate(set.iter().filter(|d| !d.is_object), |d| self.classify(&d.image))
    }

    pub fn len(&self) -> usize { self.wcs.len() }

    pub fn is_empty(&self) -> bool { self.wcs.is_empty() }
}
impl Default for StrongClassifier {
    fn default() -> Self { Self::new() }
}

fn rate<'a>(
    items: impl Iterator<Item = &'a ImageData>,
    hit: impl Fn(&ImageData) -> bool,
) -> f64 {
    let (mut n, mut hits) = (0usize, 0usize);
    for d in items {
        n += 1;
        if hit(d) {
            hits += 1;
        }
    }
    if n == 0 {
        0.0
    } else {
        hits as f64 / n as f64
    }
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, Luma};

    use super::*;
    use crate::primitives::Size;

    fn square(w: u32, f: impl Fn(u32, u32) -> u8) -> GrayImage {
        GrayImage::from_fn(w, w, |x, y| Luma([f(x, y)]))
    }

    fn training_set() -> Vec<ImageData> {
        let mut set = vec![
            ImageData::new(&square(4, |x, _| if x < 2 { 220 } else { 30 }), true),
            ImageData::new(&square(4, |x, _| if x < 2 { 160 } else { 60 }), true),
            ImageData::new(&square(4, |_, _| 100), false),
            ImageData::new(&square(4, |x, _| if x < 2 { 30 } else { 220 }), false),
            ImageData::new(&square(4, |_, y| if y < 2 { 220 } else { 30 }), false),
        ];
        for d in set.iter_mut() {
            d.weight = 1.0;
        }
        set
    }

    #[test]
    fn one_round_separates_the_set() {
        let mut set = training_set();
        let wcs = WeakClassifier::get_all(Size::square(4), 1);
        let mut sc = StrongClassifier::new();
        assert!(sc.push(&wcs, &mut set));
        assert_eq!(sc.len(), 1);
        assert_eq!(sc.detect_rate(&set), 1.0);
        assert_eq!(sc.false_pos(&set), 0.0);
    }

    #[test]
    fn threshold_drops_to_keep_hit_rate() {
        let set = training_set();
        let wcs = WeakClassifier::get_all(Size::square(4), 1);
        let mut sc = StrongClassifier::new();
        sc.push(&wcs, &mut set.clone());
        sc.threshold = f64::MAX;
        sc.fit_threshold(&set, 1.0);
        assert_eq!(sc.detect_rate(&set), 1.0);
    }

    #[test]
    fn empty_classifier_accepts_everything() {
        let set = training_set();
        let sc = StrongClassifier::default();
        assert!(sc.is_empty());
        assert_eq!(sc.false_pos(&set), 1.0);
    }
}
