use std::path::Path;

use image::GrayImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::{Sample, WindowClassifier};
use crate::constants::*;
use crate::error::{Error, Result};
use crate::grouping::group_rectangles;
use crate::images::size_of;
use crate::persist::{self, LoadOutcome, StoreOutcome};
use crate::primitives::Rect;
use crate::scanner::scan;
use crate::template::{DetectionRecord, Record, Template};

/// Scanning and grouping parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Smallest object side scanned for, in original pixels
    pub min_size: i32,
    /// Largest object side; <= 0 means the image size
    pub max_size: i32,
    /// Per-scale shrink ratio, must be > 1
    pub scale_factor: f64,
    /// Cluster members needed to keep a detection; 0 disables grouping
    pub min_neighbors: u32,
    /// Relative tolerance of the grouping similarity test
    pub eps: f64,
}
impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_SIZE,
            max_size: DEFAULT_MAX_SIZE,
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
            eps: DEFAULT_EPS,
        }
    }
}
impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.scale_factor.is_finite() || self.scale_factor <= 1.0 {
            return Err(Error::InvalidConfig(format!(
                "scale_factor must be greater than 1, got {}",
                self.scale_factor
            )));
        }
        if !self.eps.is_finite() || self.eps < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "eps must be >= 0, got {}",
                self.eps
            )));
        }
        Ok(())
    }

    /// Reads a JSON config file; absent fields keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
        let config: DetectorConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }
}

/// One merged detection in original image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub rect: Rect,
    pub confidence: f64,
}

/// Runs a window classifier over whole images.
///
/// Detection only borrows the classifier, so one detector can serve many
/// images at once (see [`SlidingWindowDetector::project_batch`]). Training
/// and loading need `&mut self` and so can't overlap with detection.
#[derive(Debug, Clone)]
pub struct SlidingWindowDetector<C> {
    classifier: C,
    config: DetectorConfig,
}
impl<C: WindowClassifier> SlidingWindowDetector<C> {
    pub fn new(classifier: C, config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { classifier, config })
    }

    pub fn classifier(&self) -> &C { &self.classifier }

    pub fn config(&self) -> &DetectorConfig { &self.config }

    pub fn into_classifier(self) -> C { self.classifier }

    /// Scans one image and merges the positive windows
    pub fn detect(&self, image: &GrayImage) -> Result<Vec<Detection>> {
        let candidates = scan(&self.classifier, image, &self.config)?;
        let raw = candidates.len();
        let grouped =
            group_rectangles(candidates, self.config.min_neighbors, self.config.eps);
        debug!(raw, grouped = grouped.len(), "detected");
        Ok(grouped
            .into_iter()
            .map(|c| Detection { rect: c.rect, confidence: c.confidence() })
            .collect())
    }

    /// Like [`detect`](Self::detect), but unless `enroll_all` is set an
    /// image without detections yields a single full-image detection with
    /// confidence 1
    pub fn detect_image(
        &self,
        image: &GrayImage,
        enroll_all: bool,
    ) -> Result<Vec<Detection>> {
        let mut found = self.detect(image)?;
        if found.is_empty() && !enroll_all {
            let size = size_of(image);
            found.push(Detection { rect: Rect::from_size(0, 0, size), confidence: 1.0 });
        }
        Ok(found)
    }

    fn project_template(&self, t: &Template) -> Result<Vec<Record>> {
        // An empty template is forwarded as is unless everything is enrolled
        if t.is_empty() && !t.enroll_all {
            return Ok(vec![Record::PassThrough(t.clone())]);
        }
        let mut out = Vec::new();
        for (i, image) in t.images.iter().enumerate() {
            for d in self.detect_image(image, t.enroll_all)? {
                out.push(Record::Detection(DetectionRecord {
                    source: t.source.clone(),
                    image: i,
                    rect: d.rect,
                    confidence: d.confidence,
                }));
            }
        }
        Ok(out)
    }

    /// Detects in every image of every template, in order
    pub fn project(&self, templates: &[Template]) -> Result<Vec<Record>> {
        let mut out = Vec::new();
        for t in templates {
            out.extend(self.project_template(t)?);
        }
        Ok(out)
    }

    /// The first record produced for a single template, if any
    pub fn project_one(&self, template: &Template) -> Result<Option<Record>> {
        Ok(self.project_template(template)?.into_iter().next())
    }

    /// Same output as [`project`](Self::project) with templates processed
    /// in parallel
    pub fn project_batch(&self, templates: &[Template]) -> Result<Vec<Record>>
    where
        C: Sync,
    {
        let per_template: Vec<Vec<Record>> = templates
            .par_iter()
            .map(|t| self.project_template(t))
            .collect::<Result<_>>()?;
        Ok(per_template.into_iter().flatten().collect())
    }

    /// Trains the classifier on every image of every template
    pub fn train(&mut self, templates: &[Template]) -> Result<()> {
        let samples: Vec<Sample> = templates
            .iter()
            .flat_map(|t| {
                let label = t.label.unwrap_or(-1.0);
                t.images.iter().map(move |img| Sample::new(img.clone(), label))
            })
            .collect();
        self.classifier.train(&samples)
    }

    pub fn load(&mut self, model_dir: &Path) -> Result<LoadOutcome> {
        persist::load_model(&mut self.classifier, model_dir)
    }

    pub fn store(&self, model_dir: &Path) -> Result<StoreOutcome> {
        persist::store_model(&self.classifier, model_dir)
    }
}
