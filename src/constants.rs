// DETECTOR DEFAULTS
/// Smallest object side, in original image pixels, that is scanned for
pub const DEFAULT_MIN_SIZE: i32 = 20;

/// Largest object side; any value <= 0 means "bounded by the image"
pub const DEFAULT_MAX_SIZE: i32 = -1;

/// Ratio by which the scanned view shrinks between scales
pub const DEFAULT_SCALE_FACTOR: f64 = 1.2;

/// Minimum number of grouped windows needed to keep a detection
pub const DEFAULT_MIN_NEIGHBORS: u32 = 5;

/// Relative tolerance used when grouping windows
pub const DEFAULT_EPS: f64 = 0.2;

// SCANNING
/// Above this scale factor the window moves one pixel at a time,
/// below it two
pub const FINE_STEP_FACTOR: f64 = 2.0;

/// When a window scores exactly 0 the scan jumps one extra step along the
/// row. Scores below 0 do not trigger the jump.
pub const SKIP_AFTER_HARD_REJECT: bool = true;

// CASCADE TRAINING
/// Side length of the default square detection window
pub const DEFAULT_WINDOW: u32 = 24;

/// The number of strong classifiers in the cascade
pub const CASCADE_SIZE: usize = 10;

/// The minimum detection rate for each layer of the cascade
pub const MIN_DETECT_RATE: f64 = 0.995;

/// Maximum acceptable false positive rate per layer
pub const MAX_FALSE_POS: f64 = 0.5;

/// Upper bound on the number of weak classifiers in one layer
pub const MAX_WEAK_COUNT: usize = 100;

/// The number of negative training windows used per layer
pub const NUM_NEG: usize = 20000;

/// Pixel granularity of feature positions and sizes
pub const FEATURE_STEP: u32 = 1;

/// Seed for negative sub-sampling
pub const TRAINING_SEED: u64 = 0x5eed;

// MODEL FILES
/// Name of the model file inside a model directory
pub const MODEL_FILE: &str = "cascade.json";

/// Name of the top level node written to the model file
pub const MODEL_NODE: &str = "cascade";
