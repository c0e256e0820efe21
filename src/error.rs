use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::primitives::Size;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("window size mismatch: expected {expected}, got {actual}")]
    WindowMismatch { expected: Size, actual: Size },
    #[error("classifier is not trained")]
    Untrained,
    #[error("training failed: {0}")]
    Training(String),
    #[error("classifier error: {0}")]
    Classifier(String),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("model format error: {0}")]
    Model(#[from] serde_json::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}
