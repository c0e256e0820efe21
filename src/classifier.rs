use image::GrayImage;

use crate::error::Result;
use crate::primitives::Size;

/// A labelled training image. Labels greater than zero mark the object.
#[derive(Debug, Clone)]
pub struct Sample {
    pub image: GrayImage,
    pub label: f32,
}
impl Sample {
    pub fn new(image: GrayImage, label: f32) -> Self { Self { image, label } }

    pub fn is_object(&self) -> bool { self.label > 0.0 }
}

/// Scores fixed size windows of an image.
///
/// `classify` returns a score whose sign carries the decision: a positive
/// score is a detection, zero is a hard rejection and a negative score is an
/// ordinary rejection. Implementations are read-only while detecting; only
/// `train` and `read` mutate them.
pub trait WindowClassifier {
    /// The window size every call to `classify` expects
    fn window_size(&self) -> Size;

    fn classify(&self, window: &GrayImage) -> Result<f32>;

    fn train(&mut self, samples: &[Sample]) -> Result<()>;

    /// Restores trained state from a model node
    fn read(&mut self, node: &serde_json::Value) -> Result<()>;

    /// Serializes trained state into a model node
    fn write(&self) -> Result<serde_json::Value>;
}
