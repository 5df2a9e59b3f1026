//! Constants used throughout the pipeline

/// Number of facial expression classes
pub const NUM_CLASSES: usize = 7;

/// Label assigned to videos whose directory is not in the vocabulary
pub const UNLABELED: i64 = -1;

/// Number of facial landmarks produced by the landmark model
pub const NUM_FACIAL_LANDMARKS: usize = 68;

/// Number of color channels in every frame
pub const CHANNELS: usize = 3;

/// Frame file extensions the clip assembler reads (compared case-insensitively)
pub const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Default number of frames per clip
pub const DEFAULT_CLIP_LENGTH: usize = 10;

/// Default spatial resolution (width, height) of a normalized frame
pub const DEFAULT_RESIZE: (u32, u32) = (112, 112);

/// Default fraction of the training videos held out for validation
pub const DEFAULT_VAL_RATIO: f64 = 0.2;

/// Default seed for the train/validation partition
pub const DEFAULT_SEED: u64 = 42;

/// Default batch size
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Fraction of the face box width/height added on every margin
pub const FACE_BOX_EXPANSION: f32 = 0.1;

/// Contrast factor applied to the detector's copy of a frame
pub const DEFAULT_DETECTION_CONTRAST: f32 = 2.0;

/// Sharpness factor applied to the face crop
pub const DEFAULT_SHARPNESS: f32 = 4.0;

/// Image normalization constants for face detection
pub const IMAGE_NORMALIZATION_OFFSET: f32 = 127.5;
pub const IMAGE_NORMALIZATION_SCALE: f32 = 128.0;

/// Per-channel ImageNet statistics (RGB)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Default augmentation ranges
pub const DEFAULT_ROTATION_DEGREES: f32 = 2.0;
pub const DEFAULT_BRIGHTNESS_JITTER: f32 = 0.2;
pub const DEFAULT_CONTRAST_JITTER: f32 = 0.2;
pub const DEFAULT_SATURATION_JITTER: f32 = 0.2;
pub const DEFAULT_HUE_JITTER: f32 = 0.1;

/// Radius in pixels of a drawn landmark point
pub const LANDMARK_RADIUS: i32 = 1;

/// Color of drawn landmark points
pub const LANDMARK_COLOR: [u8; 3] = [0, 255, 0];
