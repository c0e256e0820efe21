use image::GrayImage;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classifier::{Sample, WindowClassifier};
use crate::constants::*;
use crate::error::{Error, Result};
use crate::images::{fit_to_window, size_of, ImageData, IntegralImage};
use crate::primitives::Size;
use crate::strong_classifier::StrongClassifier;
use crate::weak_classifier::WeakClassifier;

/// Parameters controlling how a cascade is built
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CascadeParams {
    pub num_stages: usize,
    pub min_hit_rate: f64,
    pub max_false_alarm: f64,
    pub max_weak_count: usize,
    pub num_neg: usize,
    pub feature_step: u32,
    pub seed: u64,
}
impl Default for CascadeParams {
    fn default() -> Self {
        Self {
            num_stages: CASCADE_SIZE,
            min_hit_rate: MIN_DETECT_RATE,
            max_false_alarm: MAX_FALSE_POS,
            max_weak_count: MAX_WEAK_COUNT,
            num_neg: NUM_NEG,
            feature_step: FEATURE_STEP,
            seed: TRAINING_SEED,
        }
    }
}

/// A chain of boosted stages. A window is the object only if every stage
/// accepts it.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Cascade {
    window: Size,
    params: CascadeParams,
    stages: Vec<StrongClassifier>,
}
impl Cascade {
    pub fn new(window: Size, params: CascadeParams) -> Cascade {
        Cascade { window, params, stages: Vec::new() }
    }

    pub fn params(&self) -> &CascadeParams { &self.params }

    pub fn stages(&self) -> &[StrongClassifier] { &self.stages }

    pub fn is_trained(&self) -> bool { !self.stages.is_empty() }

    /// True if every stage accepts the window
    pub fn accepts(&self, ii: &IntegralImage) -> bool {
        self.stages.iter().all(|sc| sc.classify(ii))
    }

    /// Scores an integral image of one window.
    ///
    /// Rejection by the first stage scores 0, rejection by stage `k` scores
    /// `-k`, and acceptance scores one plus the margin of the last stage.
    pub fn evaluate(&self, ii: &IntegralImage) -> f32 {
        let mut margin = 0.0;
        for (i, sc) in self.stages.iter().enumerate() {
            let score = sc.score(ii);
            if score < sc.threshold {
                return if i == 0 { 0.0 } else { -(i as f32) };
            }
            margin = score - sc.threshold;
        }
        1.0 + margin as f32
    }

    /// Builds one stage on `set`, adding weak classifiers until the false
    /// positive rate is low enough
    fn train_stage(
        &self,
        wcs: &[WeakClassifier],
        set: &mut [ImageData],
    ) -> StrongClassifier {
        let mut sc = StrongClassifier::new();
        loop {
            if !sc.push(wcs, set) {
                debug!("no weak classifier better than chance, closing stage");
                break;
            }
            sc.fit_threshold(set, self.params.min_hit_rate);

            let fp = sc.false_pos(set);
            debug!(
                weak = sc.len(),
                detect_rate = sc.detect_rate(set),
                false_pos = fp,
                "stage round"
            );
            if fp <= self.params.max_false_alarm
                || sc.len() >= self.params.max_weak_count
            {
                break;
            }
        }
        sc
    }
}

impl WindowClassifier for Cascade {
    fn window_size(&self) -> Size { self.window }

    fn classify(&self, window: &GrayImage) -> Result<f32> {
        if !self.is_trained() {
            return Err(Error::Untrained);
        }
        let actual = size_of(window);
        if actual != self.window {
            return Err(Error::WindowMismatch { expected: self.window, actual });
        }
        Ok(self.evaluate(&IntegralImage::new(window)))
    }

    fn train(&mut self, samples: &[Sample]) -> Result<()> {
        let (objects, others): (Vec<&Sample>, Vec<&Sample>) =
            samples.iter().partition(|s| s.is_object());
        if objects.is_empty() || others.is_empty() {
            return Err(Error::Training(format!(
                "need positive and negative samples, got {} and {}",
                objects.len(),
                others.len()
            )));
        }
        if self.window.is_empty() {
            return Err(Error::Training(format!("invalid window size {}", self.window)));
        }

        let to_data = |s: &&Sample| {
            ImageData::new(&fit_to_window(&s.image, self.window), s.is_object())
        };
        let positives: Vec<ImageData> = objects.iter().map(to_data).collect();
        let negatives: Vec<ImageData> = others.iter().map(to_data).collect();

        let wcs = WeakClassifier::get_all(self.window, self.params.feature_step);
        info!(
            features = wcs.len(),
            positives = positives.len(),
            negatives = negatives.len(),
            "training cascade"
        );

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        self.stages.clear();
        for stage in 0..self.params.num_stages {
            // Only the negatives the cascade still gets wrong are worth training on
            let hard: Vec<&ImageData> =
                negatives.iter().filter(|d| self.accepts(&d.image)).collect();
            if hard.is_empty() {
                info!(stage, "no false positives left, stopping");
                break;
            }
            let hard: Vec<ImageData> = if hard.len() > self.params.num_neg {
                hard.choose_multiple(&mut rng, self.params.num_neg)
                    .map(|d| (*d).clone())
                    .collect()
            } else {
                hard.into_iter().cloned().collect()
            };

            let npos = positives.len() as f64;
            let nneg = hard.len() as f64;
            let weighted = |w: f64| move |d: ImageData| ImageData { weight: w, ..d };
            let mut set: Vec<ImageData> = positives
                .iter()
                .cloned()
                .map(weighted(1.0 / (2.0 * npos)))
                .chain(hard.into_iter().map(weighted(1.0 / (2.0 * nneg))))
                .collect();

            let sc = self.train_stage(&wcs, &mut set);
            if sc.is_empty() {
                info!(stage, "stage could not be trained, stopping");
                break;
            }
            info!(
                stage,
                weak = sc.len(),
                detect_rate = sc.detect_rate(&set),
                false_pos = sc.false_pos(&set),
                "stage trained"
            );
            self.stages.push(sc);
        }

        if self.stages.is_empty() {
            return Err(Error::Training("no stage could be trained".into()));
        }
        Ok(())
    }

    fn read(&mut self, node: &serde_json::Value) -> Result<()> {
        *self = Cascade::deserialize(node)?;
        Ok(())
    }

    fn write(&self) -> Result<serde_json::Value> { Ok(serde_json::to_value(self)?) }
}
