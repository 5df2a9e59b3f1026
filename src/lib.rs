//! Facial expression clip preprocessing and batching.
//!
//! This library turns folders of per-video frame images into fixed-length,
//! face-centered tensor clips for a 3D-CNN expression classifier:
//! - ONNX Runtime for face detection, landmarks and classifier inference
//! - the `image` crate for decoding, cropping and resizing
//! - `ndarray` for every tensor handed to a model
//!
//! The pipeline consists of:
//! 1. Indexing `<root>/<label>/<video-id>_<frame-index>.<ext>` into labeled videos
//! 2. Normalizing each frame around the detected face
//! 3. Padding or truncating frames to a fixed clip length
//! 4. Optional augmentation and ImageNet normalization
//! 5. Collating clips into (N, 3, T, H, W) batches
//!
//! # Examples
//!
//! ## Building batches
//!
//! ```no_run
//! use expression_clips::{
//!     config::Config,
//!     dataset::ClipDataset,
//!     dataset_index::split_dataset,
//!     loader::{ClipLoader, LoaderConfig},
//!     normalizer::OnnxDetectorFactory,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let split = split_dataset("data/train", "data/test", 0.2, 42)?;
//!
//! let dataset = ClipDataset::new(
//!     split.train,
//!     config.clip,
//!     config.preprocess.clone(),
//!     Arc::new(OnnxDetectorFactory::from_config(&config)),
//!     config.train_transform(),
//! )?;
//!
//! let mut loader = ClipLoader::new(&dataset, LoaderConfig::default().batch_size(8).seed(42))?;
//! for batch in loader.iter_batches() {
//!     let batch = batch?;
//!     println!("inputs {:?}, labels {:?}", batch.inputs.shape(), batch.labels);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Normalizing a single frame
//!
//! ```no_run
//! use expression_clips::{face_detection::ScrfdDetector, normalizer::FrameNormalizer, config::PreprocessConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let detector = ScrfdDetector::new("assets/face_detector.onnx", 0.5, 0.4)?;
//! let mut normalizer = FrameNormalizer::new(Box::new(detector), None, PreprocessConfig::default(), (112, 112));
//!
//! let image = image::open("frame.png")?.to_rgb8();
//! let frame = normalizer.process(&image)?;
//! println!("face: {:?}, pixels: {:?}", frame.face, frame.pixels.shape());
//! # Ok(())
//! # }
//! ```

/// Random augmentation and ImageNet normalization of clips
pub mod augment;

/// Fixed-length clip assembly
pub mod clip;

/// Batch collation
pub mod collate;

/// Configuration management
pub mod config;

/// Constants used throughout the pipeline
pub mod constants;

/// Random-access labeled clip dataset
pub mod dataset;

/// Dataset indexing and train/validation/test splitting
pub mod dataset_index;

/// Error types and result handling
pub mod error;

/// Frame extraction from video files
#[cfg(feature = "opencv")]
pub mod extract;

/// Face detection module for finding faces in images
pub mod face_detection;

/// Facial expression label vocabulary
pub mod labels;

/// Batching, shuffling and parallel fetching
pub mod loader;

/// Facial landmark detection module for finding 68 key points
pub mod mark_detection;

/// Classifier boundary and accuracy evaluation
pub mod model;

/// Face-guided frame normalization
pub mod normalizer;

/// Diagnostic landmark overlays
pub mod overlay;

/// Utility functions for image processing and safe casting
pub mod utils;

pub use error::{Error, Result};
