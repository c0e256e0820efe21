use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

use crate::images::to_gray;
use crate::primitives::Rect;

/// One processing unit: a source reference, its images and metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Template {
    pub source: String,
    pub images: Vec<GrayImage>,
    /// Disables the pass-through and full-image fallbacks
    pub enroll_all: bool,
    /// Training label, treated as -1 when absent
    pub label: Option<f32>,
}
impl Template {
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into(), ..Default::default() }
    }

    pub fn with_image(mut self, image: GrayImage) -> Self {
        self.images.push(image);
        self
    }

    /// Adds an image of any pixel format, converted to grayscale
    pub fn with_dynamic(self, image: &DynamicImage) -> Self {
        self.with_image(to_gray(image))
    }

    pub fn with_enroll_all(mut self, enroll_all: bool) -> Self {
        self.enroll_all = enroll_all;
        self
    }

    pub fn with_label(mut self, label: f32) -> Self {
        self.label = Some(label);
        self
    }

    pub fn is_empty(&self) -> bool { self.images.is_empty() }
}

/// One detection in one image of a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub source: String,
    /// Index of the image within its template
    pub image: usize,
    pub rect: Rect,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// An empty template forwarded untouched
    PassThrough(Template),
    Detection(DetectionRecord),
}
impl Record {
    pub fn detection(&self) -> Option<&DetectionRecord> {
        match self {
            Record::Detection(d) => Some(d),
            Record::PassThrough(_) => None,
        }
    }
}
