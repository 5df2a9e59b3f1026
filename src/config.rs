//! Configuration management for the clip preprocessing pipeline

use crate::augment::{AugmentFrames, AugmentMode, ClipTransform};
use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_BRIGHTNESS_JITTER, DEFAULT_CLIP_LENGTH, DEFAULT_CONTRAST_JITTER,
    DEFAULT_DETECTION_CONTRAST, DEFAULT_HUE_JITTER, DEFAULT_RESIZE, DEFAULT_ROTATION_DEGREES,
    DEFAULT_SATURATION_JITTER, DEFAULT_SEED, DEFAULT_SHARPNESS, DEFAULT_VAL_RATIO, FACE_BOX_EXPANSION,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Dataset locations and split parameters
    pub data: DataConfig,

    /// Clip shape
    pub clip: ClipConfig,

    /// Face-guided frame preprocessing
    pub preprocess: PreprocessConfig,

    /// Augmentation of training clips
    pub augment: AugmentConfig,

    /// Batching and parallel fetching
    pub loader: LoaderSettings,

    /// Model file paths
    pub models: ModelConfig,
}

/// Dataset configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Root of the training split (`<label>/<video-id>_<frame-index>.<ext>`)
    pub train_dir: PathBuf,

    /// Root of the test split
    pub test_dir: PathBuf,

    /// Fraction of training videos held out for validation, in [0, 1)
    pub val_ratio: f64,

    /// Seed of the train/validation partition
    pub seed: u64,

    /// Drop videos whose label directory is not in the vocabulary
    pub drop_unlabeled: bool,
}

/// Clip shape configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipConfig {
    /// Frames per clip
    pub clip_length: usize,

    /// Width of a normalized frame
    pub width: u32,

    /// Height of a normalized frame
    pub height: u32,
}

/// Frame preprocessing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Contrast factor of the copy given to the face detector
    pub detection_contrast: f32,

    /// Sharpness factor applied to the face crop
    pub sharpness: f32,

    /// Fraction of the face box added on every margin
    pub face_expansion: f32,

    /// Confidence threshold for face detection (0.0-1.0)
    pub confidence_threshold: f32,

    /// IOU threshold for non-maximum suppression (0.0-1.0)
    pub nms_threshold: f32,

    /// Run the landmark model and keep a diagnostic overlay
    pub landmarks: bool,
}

/// Augmentation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    /// Apply augmentation to training clips
    pub enabled: bool,

    /// Sample parameters per frame or once per clip
    pub mode: AugmentMode,

    /// Maximum absolute rotation in degrees
    pub rotation_degrees: f32,

    /// Brightness factor range is `[1 - b, 1 + b]`
    pub brightness: f32,

    /// Contrast factor range is `[1 - c, 1 + c]`
    pub contrast: f32,

    /// Saturation factor range is `[1 - s, 1 + s]`
    pub saturation: f32,

    /// Hue shift range is `[-h, h]`, at most 0.5
    pub hue: f32,
}

/// Loader parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    /// Clips per batch
    pub batch_size: usize,

    /// Shuffle training indices every epoch
    pub shuffle: bool,

    /// Parallel fetch workers (0 = sequential)
    pub num_workers: usize,

    /// Drop the last incomplete batch
    pub drop_last: bool,
}

/// Model file paths configuration
///
/// A missing face detector means every frame takes the full-frame path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to face detection ONNX model
    pub face_detector: Option<PathBuf>,

    /// Path to facial landmarks ONNX model
    pub face_landmarks: Option<PathBuf>,

    /// Path to the ONNX export of the clip classifier
    pub classifier: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            train_dir: PathBuf::from("data/train"),
            test_dir: PathBuf::from("data/test"),
            val_ratio: DEFAULT_VAL_RATIO,
            seed: DEFAULT_SEED,
            drop_unlabeled: false,
        }
    }
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            clip_length: DEFAULT_CLIP_LENGTH,
            width: DEFAULT_RESIZE.0,
            height: DEFAULT_RESIZE.1,
        }
    }
}

impl ClipConfig {
    /// Target frame size as (width, height)
    #[must_use]
    pub fn target_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            detection_contrast: DEFAULT_DETECTION_CONTRAST,
            sharpness: DEFAULT_SHARPNESS,
            face_expansion: FACE_BOX_EXPANSION,
            confidence_threshold: 0.5,
            nms_threshold: 0.4,
            landmarks: false,
        }
    }
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: AugmentMode::default(),
            rotation_degrees: DEFAULT_ROTATION_DEGREES,
            brightness: DEFAULT_BRIGHTNESS_JITTER,
            contrast: DEFAULT_CONTRAST_JITTER,
            saturation: DEFAULT_SATURATION_JITTER,
            hue: DEFAULT_HUE_JITTER,
        }
    }
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            shuffle: true,
            num_workers: 0,
            drop_last: false,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid configuration.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Transform for training clips, `None` when augmentation is disabled
    #[must_use]
    pub fn train_transform(&self) -> Option<Arc<dyn ClipTransform>> {
        if !self.augment.enabled {
            return None;
        }
        let transform: Arc<dyn ClipTransform> = Arc::new(AugmentFrames::from_config(&self.augment));
        Some(transform)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns the first constraint the configuration violates.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.data.val_ratio) {
            return Err(Error::ConfigError(
                "Validation ratio must be in [0.0, 1.0)".to_string(),
            ));
        }

        // Clip shape
        if self.clip.clip_length == 0 {
            return Err(Error::ConfigError("Clip length must be greater than 0".to_string()));
        }
        if self.clip.width == 0 || self.clip.height == 0 {
            return Err(Error::ConfigError("Frame size must be greater than 0".to_string()));
        }

        // Preprocessing
        if !(0.0..=1.0).contains(&self.preprocess.confidence_threshold) {
            return Err(Error::ConfigError(
                "Confidence threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.preprocess.nms_threshold) {
            return Err(Error::ConfigError(
                "NMS threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.preprocess.face_expansion < 0.0 {
            return Err(Error::ConfigError("Face expansion must not be negative".to_string()));
        }
        if self.preprocess.detection_contrast < 0.0 || self.preprocess.sharpness < 0.0 {
            return Err(Error::ConfigError(
                "Enhancement factors must not be negative".to_string(),
            ));
        }

        // Augmentation
        if !(0.0..=180.0).contains(&self.augment.rotation_degrees) {
            return Err(Error::ConfigError(
                "Rotation must be between 0 and 180 degrees".to_string(),
            ));
        }
        for (name, value) in [
            ("Brightness", self.augment.brightness),
            ("Contrast", self.augment.contrast),
            ("Saturation", self.augment.saturation),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::ConfigError(format!(
                    "{name} jitter must be between 0.0 and 1.0"
                )));
            }
        }
        if !(0.0..=0.5).contains(&self.augment.hue) {
            return Err(Error::ConfigError("Hue jitter must be between 0.0 and 0.5".to_string()));
        }

        if self.loader.batch_size == 0 {
            return Err(Error::ConfigError("Batch size must be greater than 0".to_string()));
        }

        // Validate model paths exist
        for (name, path) in [
            ("Face detector", &self.models.face_detector),
            ("Face landmarks", &self.models.face_landmarks),
            ("Classifier", &self.models.classifier),
        ] {
            if let Some(path) = path {
                if !path.exists() {
                    return Err(Error::ConfigError(format!(
                        "{name} model not found: {}",
                        path.display()
                    )));
                }
            }
        }
        if self.preprocess.landmarks && self.models.face_landmarks.is_none() {
            return Err(Error::ConfigError(
                "Landmark overlay requested but no landmark model configured".to_string(),
            ));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Expression Clip Pipeline Configuration

# Dataset layout: <dir>/<label>/<video-id>_<frame-index>.<ext>
data:
  train_dir: "data/train"
  test_dir: "data/test"
  val_ratio: 0.2
  seed: 42
  drop_unlabeled: false

# Clip shape
clip:
  clip_length: 10
  width: 112
  height: 112

# Face-guided preprocessing
preprocess:
  detection_contrast: 2.0
  sharpness: 4.0
  face_expansion: 0.1
  confidence_threshold: 0.5
  nms_threshold: 0.4
  landmarks: false

# Training augmentation
augment:
  enabled: true
  mode: per_frame
  rotation_degrees: 2.0
  brightness: 0.2
  contrast: 0.2
  saturation: 0.2
  hue: 0.1

# Batching
loader:
  batch_size: 64
  shuffle: true
  num_workers: 0
  drop_last: false

# Model paths (omit face_detector to always use the full frame)
models:
  face_detector: "assets/face_detector.onnx"
  face_landmarks: "assets/face_landmarks.onnx"
  classifier: "assets/classifier.onnx"
"#;
