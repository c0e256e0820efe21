//! windowscan CLI: train a cascade and run sliding-window detection.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use image::{io::Reader as ImageReader, DynamicImage};
use tracing::{info, warn};

use windowscan::constants::{DEFAULT_WINDOW, TRAINING_SEED};
use windowscan::images::{draw_rectangle, tiles, to_gray};
use windowscan::{
    load_model, store_model, Cascade, CascadeParams, DetectionRecord, DetectorConfig,
    Record, Sample, Size, SlidingWindowDetector, StoreOutcome, Template,
    WindowClassifier,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "windowscan")]
#[command(
    about = "Train a boosted cascade and detect objects with a multi-scale sliding window"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a cascade from directories of object and background images.
    Train(TrainArgs),

    /// Detect objects in an image with a trained cascade.
    Detect(DetectArgs),
}

#[derive(Debug, Clone, Args)]
struct TrainArgs {
    /// Directory of images of the object.
    #[arg(long)]
    positives: PathBuf,

    /// Directory of images without the object; cut into window-sized tiles.
    #[arg(long)]
    negatives: PathBuf,

    /// Directory to write the model to.
    #[arg(long)]
    model_dir: PathBuf,

    /// Side of the square detection window in pixels.
    #[arg(long, default_value_t = DEFAULT_WINDOW)]
    window: u32,

    /// Number of cascade stages.
    #[arg(long)]
    stages: Option<usize>,

    /// Minimum fraction of objects each stage must keep.
    #[arg(long)]
    min_hit_rate: Option<f64>,

    /// Stage training stops once its false positive rate is at most this.
    #[arg(long)]
    max_false_alarm: Option<f64>,

    /// Maximum weak classifiers per stage.
    #[arg(long)]
    max_weak: Option<usize>,

    /// Maximum negative windows per stage.
    #[arg(long)]
    num_neg: Option<usize>,

    /// Feature position/size granularity in pixels.
    #[arg(long)]
    feature_step: Option<u32>,

    /// Seed for negative sampling.
    #[arg(long, default_value_t = TRAINING_SEED)]
    seed: u64,
}

#[derive(Debug, Clone, Args)]
struct DetectArgs {
    /// Directory holding the trained model.
    #[arg(long)]
    model_dir: PathBuf,

    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// JSON detector config; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    min_size: Option<i32>,

    /// Largest object side; 0 or negative for the image size.
    #[arg(long, allow_hyphen_values = true)]
    max_size: Option<i32>,

    #[arg(long)]
    scale_factor: Option<f64>,

    #[arg(long)]
    min_neighbors: Option<u32>,

    #[arg(long)]
    eps: Option<f64>,

    /// Report only real detections, never the full-image fallback.
    #[arg(long)]
    enroll_all: bool,

    /// Path to write detections (JSON); printed to stdout when absent.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Path to write a copy of the image with detections drawn on it.
    #[arg(long)]
    annotate: Option<PathBuf>,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Train(args) => train(&args),
        Commands::Detect(args) => detect(&args),
    }
}

/// Opens every decodable image in a directory
fn read_images(dir: &Path) -> CliResult<Vec<DynamicImage>> {
    let mut images = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        match ImageReader::open(&path)?.with_guessed_format()?.decode() {
            Ok(img) => images.push(img),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping undecodable file")
            }
        }
    }
    Ok(images)
}

fn train(args: &TrainArgs) -> CliResult<()> {
    let window = Size::square(args.window as i32);
    let defaults = CascadeParams::default();
    let params = CascadeParams {
        num_stages: args.stages.unwrap_or(defaults.num_stages),
        min_hit_rate: args.min_hit_rate.unwrap_or(defaults.min_hit_rate),
        max_false_alarm: args.max_false_alarm.unwrap_or(defaults.max_false_alarm),
        max_weak_count: args.max_weak.unwrap_or(defaults.max_weak_count),
        num_neg: args.num_neg.unwrap_or(defaults.num_neg),
        feature_step: args.feature_step.unwrap_or(defaults.feature_step),
        seed: args.seed,
    };

    // Objects are used whole, backgrounds are sliced into windows
    let mut samples: Vec<Sample> = read_images(&args.positives)?
        .iter()
        .map(|img| Sample::new(to_gray(img), 1.0))
        .collect();
    let positives = samples.len();
    for img in read_images(&args.negatives)? {
        let negatives = tiles(&to_gray(&img), window);
        samples.extend(negatives.into_iter().map(|t| Sample::new(t, -1.0)));
    }
    info!(positives, negatives = samples.len() - positives, "training samples loaded");

    let mut cascade = Cascade::new(window, params);
    cascade.train(&samples)?;

    match store_model(&cascade, &args.model_dir)? {
        StoreOutcome::Written { path } => info!(path = %path.display(), "cascade saved"),
        StoreOutcome::Skipped { path, reason } => {
            return Err(format!("could not save {}: {}", path.display(), reason).into())
        }
    }
    Ok(())
}

fn detect(args: &DetectArgs) -> CliResult<()> {
    let mut config = match &args.config {
        Some(path) => DetectorConfig::from_json_file(path)?,
        None => DetectorConfig::default(),
    };
    if let Some(v) = args.min_size {
        config.min_size = v;
    }
    if let Some(v) = args.max_size {
        config.max_size = v;
    }
    if let Some(v) = args.scale_factor {
        config.scale_factor = v;
    }
    if let Some(v) = args.min_neighbors {
        config.min_neighbors = v;
    }
    if let Some(v) = args.eps {
        config.eps = v;
    }

    let window = Size::square(DEFAULT_WINDOW as i32);
    let mut cascade = Cascade::new(window, CascadeParams::default());
    if !load_model(&mut cascade, &args.model_dir)?.is_loaded() {
        return Err(format!("no model found in {}", args.model_dir.display()).into());
    }
    info!(
        window = %cascade.window_size(),
        stages = cascade.stages().len(),
        "cascade ready"
    );

    let img = ImageReader::open(&args.image)?.with_guessed_format()?.decode()?;
    let template = Template::new(args.image.display().to_string())
        .with_dynamic(&img)
        .with_enroll_all(args.enroll_all);

    let detector = SlidingWindowDetector::new(cascade, config)?;
    let records: Vec<DetectionRecord> = detector
        .project(&[template])?
        .into_iter()
        .filter_map(|r| match r {
            Record::Detection(d) => Some(d),
            Record::PassThrough(_) => None,
        })
        .collect();
    info!(detections = records.len(), "detection finished");

    let data = serde_json::to_string_pretty(&records)?;
    match &args.output {
        Some(path) => fs::write(path, data)?,
        None => println!("{}", data),
    }

    if let Some(path) = &args.annotate {
        let mut canvas = img.to_rgb8();
        for r in &records {
            draw_rectangle(&mut canvas, &r.rect);
        }
        canvas.save(path)?;
    }
    Ok(())
}
