//! Multi-scale sliding-window object detection.
//!
//! A [`WindowClassifier`] scores fixed size windows. The [`scanner`] slides
//! that window over a pyramid of shrunken views of an image, and
//! [`grouping`] merges the overlapping positive windows into detections.
//! [`Cascade`] is a boosted Haar cascade implementing the classifier side.

pub mod cascade;
pub mod classifier;
pub mod constants;
pub mod detector;
pub mod error;
pub mod grouping;
pub mod images;
pub mod persist;
pub mod primitives;
pub mod scanner;
pub mod strong_classifier;
pub mod template;
pub mod weak_classifier;

pub use cascade::{Cascade, CascadeParams};
pub use classifier::{Sample, WindowClassifier};
pub use detector::{Detection, DetectorConfig, SlidingWindowDetector};
pub use error::{Error, Result};
pub use persist::{load_model, store_model, LoadOutcome, StoreOutcome};
pub use primitives::{Rect, Size};
pub use scanner::{scan, Candidate};
pub use template::{DetectionRecord, Record, Template};
