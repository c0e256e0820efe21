//! Loading and storing a classifier's trained state in a model directory.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::classifier::WindowClassifier;
use crate::constants::{MODEL_FILE, MODEL_NODE};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { path: PathBuf },
    /// No readable model was found; the classifier was left as it was
    Missing { path: PathBuf },
}
impl LoadOutcome {
    pub fn is_loaded(&self) -> bool { matches!(self, LoadOutcome::Loaded { .. }) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    Written { path: PathBuf },
    /// The model could not be written; nothing was saved
    Skipped { path: PathBuf, reason: String },
}
impl StoreOutcome {
    pub fn is_written(&self) -> bool { matches!(self, StoreOutcome::Written { .. }) }
}

pub fn model_path(dir: &Path) -> PathBuf { dir.join(MODEL_FILE) }

/// Restores `classifier` from the model in `dir`.
///
/// A model file that can't be opened is reported as
/// [`LoadOutcome::Missing`]. A file that opens but doesn't parse is an error.
/// The first node in the file, in file order, is the model.
pub fn load_model<C>(classifier: &mut C, dir: &Path) -> Result<LoadOutcome>
where
    C: WindowClassifier + ?Sized,
{
    let path = model_path(dir);
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "no model loaded, classifier stays untrained"
            );
            return Ok(LoadOutcome::Missing { path });
        }
    };

    let root: serde_json::Value = serde_json::from_reader(BufReader::new(file))?;
    let node = match root {
        serde_json::Value::Object(map) => map.into_iter().next().map(|(_, v)| v),
        _ => None,
    };
    let Some(node) = node else {
        return Err(Error::Classifier(format!("{} has no model node", path.display())));
    };
    classifier.read(&node)?;
    info!(path = %path.display(), "model loaded");
    Ok(LoadOutcome::Loaded { path })
}

/// Writes `classifier` to the model file in `dir`, creating the directory.
///
/// Filesystem failures are logged and reported as
/// [`StoreOutcome::Skipped`]; only serialization failures are errors.
pub fn store_model<C>(classifier: &C, dir: &Path) -> Result<StoreOutcome>
where
    C: WindowClassifier + ?Sized,
{
    let path = model_path(dir);
    let node = classifier.write()?;
    let mut root = serde_json::Map::new();
    root.insert(MODEL_NODE.to_string(), node);
    let data = serde_json::to_string_pretty(&serde_json::Value::Object(root))?;

    let written = fs::create_dir_all(dir).and_then(|_| fs::write(&path, data));
    match written {
        Ok(()) => {
            info!(path = %path.display(), "model stored");
            Ok(StoreOutcome::Written { path })
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unable to write model");
            Ok(StoreOutcome::Skipped { path, reason: e.to_string() })
        }
    }
}
