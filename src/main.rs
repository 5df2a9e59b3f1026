//! Command line front end for the expression clip pipeline.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use expression_clips::{
    augment::{AugmentFrames, ClipTransform},
    config::{Config, EXAMPLE_CONFIG},
    dataset::ClipDataset,
    dataset_index::{split_dataset, LabeledVideos},
    labels::Expression,
    loader::{ClipLoader, LoaderConfig},
    model::{evaluate, OnnxClassifier},
    normalizer::{FrameNormalizer, OnnxDetectorFactory},
    utils::image_conversion::unit_array_to_rgb,
};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index the dataset and report the train/validation/test split
    Index {
        /// Training root (overrides the config)
        #[arg(long)]
        train_dir: Option<PathBuf>,

        /// Test root (overrides the config)
        #[arg(long)]
        test_dir: Option<PathBuf>,
    },

    /// Normalize frames and write the results (and landmark overlays) as PNG
    Preview {
        /// Frame images to normalize
        #[arg(required = true)]
        frames: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = "preview")]
        output: PathBuf,
    },

    /// Measure classifier accuracy on a split
    Evaluate {
        /// Split to evaluate
        #[arg(short, long, value_enum, default_value = "test")]
        split: SplitName,

        /// Classifier ONNX model (overrides the config)
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// Extract frames from a video at a target frame rate
    #[cfg(feature = "opencv")]
    ExtractFrames {
        /// Input video file
        video: PathBuf,

        /// Output directory
        output: PathBuf,

        /// Frames kept per second of video
        #[arg(long, default_value = "5")]
        fps: f64,
    },

    /// Write an example configuration file
    InitConfig {
        /// Destination path
        #[arg(default_value = "config.yaml")]
        path: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SplitName {
    Train,
    Val,
    Test,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger
    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Config::from_file(path).with_context(|| format!("Failed to load config {}", path.display()))?
        }
        None => Config::default(),
    };

    match args.command {
        Command::Index { train_dir, test_dir } => {
            if let Some(dir) = train_dir {
                config.data.train_dir = dir;
            }
            if let Some(dir) = test_dir {
                config.data.test_dir = dir;
            }
            config.validate()?;
            run_index(&config)
        }
        Command::Preview { frames, output } => {
            config.validate()?;
            run_preview(&config, &frames, &output)
        }
        Command::Evaluate { split, model } => {
            if model.is_some() {
                config.models.classifier = model;
            }
            config.validate()?;
            run_evaluate(&config, split)
        }
        #[cfg(feature = "opencv")]
        Command::ExtractFrames { video, output, fps } => {
            let written = expression_clips::extract::video_to_frames(&video, &output, fps)?;
            println!("{written} frame(s) written to {}", output.display());
            Ok(())
        }
        Command::InitConfig { path } => {
            if path.exists() {
                bail!("Refusing to overwrite existing file {}", path.display());
            }
            std::fs::write(&path, EXAMPLE_CONFIG)?;
            println!("Example configuration written to {}", path.display());
            Ok(())
        }
    }
}

fn load_split(config: &Config, split: SplitName) -> Result<LabeledVideos> {
    let data = &config.data;
    let split_data = split_dataset(&data.train_dir, &data.test_dir, data.val_ratio, data.seed)?;
    let videos = match split {
        SplitName::Train => split_data.train,
        SplitName::Val => split_data.val,
        SplitName::Test => split_data.test,
    };
    Ok(if data.drop_unlabeled {
        videos.without_unlabeled()
    } else {
        videos
    })
}

fn run_index(config: &Config) -> Result<()> {
    let data = &config.data;
    let split = split_dataset(&data.train_dir, &data.test_dir, data.val_ratio, data.seed)?;

    for (name, videos) in [("train", &split.train), ("val", &split.val), ("test", &split.test)] {
        let frames: usize = videos.groups.iter().map(|g| g.frames.len()).sum();
        println!("{name}: {} video(s), {frames} frame(s)", videos.len());
        for expression in Expression::ALL {
            let count = videos.labels.iter().filter(|&&l| l == expression.id()).count();
            if count > 0 {
                println!("  {expression:<9} {count}");
            }
        }
        let unlabeled = videos.labels.iter().filter(|&&l| Expression::from_id(l).is_none()).count();
        if unlabeled > 0 {
            println!("  {:<9} {unlabeled}", "unlabeled");
        }
    }
    Ok(())
}

fn run_preview(config: &Config, frames: &[PathBuf], output: &std::path::Path) -> Result<()> {
    std::fs::create_dir_all(output)?;
    let factory = OnnxDetectorFactory::from_config(config);
    let mut normalizer = FrameNormalizer::from_factory(&factory, config.preprocess.clone(), config.clip.target_size())?;

    for path in frames {
        let image = expression_clips::clip::load_frame(path)?;
        let frame = normalizer.process(&image)?;

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("frame");
        let normalized_path = output.join(format!("{stem}_normalized.png"));
        unit_array_to_rgb(frame.pixels.view())?.save(&normalized_path)?;
        if let Some(overlay) = &frame.overlay {
            overlay.save(output.join(format!("{stem}_landmarks.png")))?;
        }

        match frame.face {
            Some(face) => println!(
                "{}: face at ({}, {}) {}x{}, {} landmark(s) -> {}",
                path.display(),
                face.x,
                face.y,
                face.width,
                face.height,
                frame.landmarks.len(),
                normalized_path.display()
            ),
            None => println!("{}: no face, full frame -> {}", path.display(), normalized_path.display()),
        }
    }
    Ok(())
}

fn run_evaluate(config: &Config, split: SplitName) -> Result<()> {
    let Some(model_path) = &config.models.classifier else {
        bail!("No classifier model configured; pass --model or set models.classifier");
    };

    let videos = load_split(config, split)?;
    info!("Evaluating {} video(s) from the {split:?} split", videos.len());

    let transform: Arc<dyn ClipTransform> = Arc::new(AugmentFrames::normalize_only());
    let dataset = ClipDataset::new(
        videos,
        config.clip,
        config.preprocess.clone(),
        Arc::new(OnnxDetectorFactory::from_config(config)),
        Some(transform),
    )?;

    let loader_config = LoaderConfig::from_settings(&config.loader).shuffle(false);
    let mut loader = ClipLoader::new(&dataset, loader_config)?;
    let mut classifier = OnnxClassifier::new(model_path)?;

    let result = evaluate(&mut loader, &mut classifier)?;
    println!(
        "Accuracy on {split:?}: {:.2}% ({}/{})",
        result.accuracy * 100.0,
        result.correct,
        result.total
    );
    Ok(())
}
