//! Face-guided frame normalization.
//!
//! A frame goes through: contrast-boosted detection probe, face crop resized
//! back to the frame's own size, sharpening, optional landmark diagnostics and
//! finally a resize to the clip resolution scaled into [0, 1].

use crate::config::{Config, PreprocessConfig};
use crate::constants::DEFAULT_RESIZE;
use crate::face_detection::{locate_face, FaceBox, FaceDetector, NullDetector, ScrfdDetector};
use crate::mark_detection::{Landmark, LandmarkDetector, OnnxLandmarkDetector};
use crate::overlay::draw_landmarks;
use crate::utils::enhance;
use crate::utils::image_conversion::rgb_to_unit_array;
use crate::{Error, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use log::{debug, warn};
use ndarray::Array3;
use std::path::PathBuf;

/// Builds private detector instances for one worker.
///
/// Detectors carry mutable inference state, so every thread that normalizes
/// frames asks the factory for its own set instead of sharing one.
pub trait DetectorFactory: Send + Sync {
    /// Create a face detector
    ///
    /// # Errors
    ///
    /// Returns an error if the detector cannot be initialized.
    fn face_detector(&self) -> Result<Box<dyn FaceDetector>>;

    /// Create a landmark detector, if one is configured
    ///
    /// # Errors
    ///
    /// Returns an error if the detector cannot be initialized.
    fn landmark_detector(&self) -> Result<Option<Box<dyn LandmarkDetector>>> {
        Ok(None)
    }
}

/// Factory for the ONNX Runtime detectors
#[derive(Debug, Clone, Default)]
pub struct OnnxDetectorFactory {
    pub face_model: Option<PathBuf>,
    pub landmark_model: Option<PathBuf>,
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
}

impl OnnxDetectorFactory {
    /// Factory for the models named in `config`
    ///
    /// The landmark model is only loaded when landmark diagnostics are enabled.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            face_model: config.models.face_detector.clone(),
            landmark_model: config
                .models
                .face_landmarks
                .clone()
                .filter(|_| config.preprocess.landmarks),
            confidence_threshold: config.preprocess.confidence_threshold,
            nms_threshold: config.preprocess.nms_threshold,
        }
    }
}

impl DetectorFactory for OnnxDetectorFactory {
    fn face_detector(&self) -> Result<Box<dyn FaceDetector>> {
        match &self.face_model {
            Some(path) => Ok(Box::new(ScrfdDetector::new(
                path,
                self.confidence_threshold,
                self.nms_threshold,
            )?)),
            None => {
                debug!("No face detector model configured; using full frames");
                Ok(Box::new(NullDetector))
            }
        }
    }

    fn landmark_detector(&self) -> Result<Option<Box<dyn LandmarkDetector>>> {
        self.landmark_model
            .as_ref()
            .map(|path| OnnxLandmarkDetector::new(path).map(|d| Box::new(d) as Box<dyn LandmarkDetector>))
            .transpose()
    }
}

/// Output of [`FrameNormalizer::process`]
#[derive(Debug, Clone)]
pub struct NormalizedFrame {
    /// (height, width, 3) in [0, 1]
    pub pixels: Array3<f32>,
    /// Crop region used, `None` when the full frame was kept
    pub face: Option<FaceBox>,
    /// Landmarks in pixels of the framed image
    pub landmarks: Vec<Landmark>,
    /// Framed image with landmarks drawn, when landmark detection ran
    pub overlay: Option<RgbImage>,
}

/// Turns raw RGB frames into fixed-size, face-centered float frames
pub struct FrameNormalizer {
    face_detector: Box<dyn FaceDetector>,
    landmark_detector: Option<Box<dyn LandmarkDetector>>,
    settings: PreprocessConfig,
    target: (u32, u32),
}

impl FrameNormalizer {
    /// Create a normalizer that owns the given detectors
    #[must_use]
    pub fn new(
        face_detector: Box<dyn FaceDetector>,
        landmark_detector: Option<Box<dyn LandmarkDetector>>,
        settings: PreprocessConfig,
        target: (u32, u32),
    ) -> Self {
        Self {
            face_detector,
            landmark_detector,
            settings,
            target,
        }
    }

    /// Create a normalizer with fresh detectors from `factory`
    ///
    /// # Errors
    ///
    /// Returns an error if a detector cannot be initialized.
    pub fn from_factory(factory: &dyn DetectorFactory, settings: PreprocessConfig, target: (u32, u32)) -> Result<Self> {
        Ok(Self::new(
            factory.face_detector()?,
            factory.landmark_detector()?,
            settings,
            target,
        ))
    }

    /// Target size as (width, height)
    #[must_use]
    pub fn target(&self) -> (u32, u32) {
        self.target
    }

    /// Normalize a frame to (height, width, 3) in [0, 1]
    ///
    /// # Errors
    ///
    /// Returns an error if the image is empty or face detection fails.
    pub fn normalize(&mut self, image: &RgbImage) -> Result<Array3<f32>> {
        Ok(self.process(image)?.pixels)
    }

    /// Normalize a frame and keep the diagnostics produced on the way
    ///
    /// # Errors
    ///
    /// Returns an error if the image is empty or face detection fails.
    pub fn process(&mut self, image: &RgbImage) -> Result<NormalizedFrame> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::InvalidInput("Cannot normalize an empty frame".to_string()));
        }

        // The detector sees a contrast-boosted copy; pixels come from the original
        let probe = enhance::contrast(image, self.settings.detection_contrast);
        let detections = self.face_detector.detect(&probe)?;
        let face = locate_face(&detections, width, height, self.settings.face_expansion);

        let framed = match face {
            Some(b) => {
                let crop = imageops::crop_imm(image, b.x, b.y, b.width, b.height).to_image();
                let restored = imageops::resize(&crop, width, height, FilterType::Triangle);
                enhance::sharpness(&restored, self.settings.sharpness)
            }
            None => {
                warn!("No face detected in {width}x{height} frame; using the full frame");
                image.clone()
            }
        };

        let (landmarks, overlay) = match self.landmark_detector.as_mut() {
            Some(detector) => match detector.detect(&framed) {
                Ok(landmarks) => {
                    let overlay = draw_landmarks(&framed, &landmarks);
                    (landmarks, Some(overlay))
                }
                Err(e) => {
                    warn!("Landmark detection failed: {e}");
                    (Vec::new(), None)
                }
            },
            None => (Vec::new(), None),
        };

        let (target_width, target_height) = self.target;
        let resized = imageops::resize(&framed, target_width, target_height, FilterType::Triangle);

        Ok(NormalizedFrame {
            pixels: rgb_to_unit_array(&resized),
            face,
            landmarks,
            overlay,
        })
    }
}

impl Default for FrameNormalizer {
    fn default() -> Self {
        Self::new(Box::new(NullDetector), None, PreprocessConfig::default(), DEFAULT_RESIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face_detection::{Detection, RelativeBox};
    use image::Rgb;

    struct FixedDetector(Vec<Detection>);

    impl FaceDetector for FixedDetector {
        fn detect(&mut self, _image: &RgbImage) -> Result<Vec<Detection>> {
            Ok(self.0.clone())
        }
    }

    struct FailingLandmarks;

    impl LandmarkDetector for FailingLandmarks {
        fn detect(&mut self, _image: &RgbImage) -> Result<Vec<Landmark>> {
            Err(Error::ModelError("no model".to_string()))
        }
    }

    struct CenterLandmark;

    impl LandmarkDetector for CenterLandmark {
        #[allow(clippy::cast_precision_loss)]
        fn detect(&mut self, image: &RgbImage) -> Result<Vec<Landmark>> {
            Ok(vec![Landmark {
                x: image.width() as f32 / 2.0,
                y: image.height() as f32 / 2.0,
            }])
        }
    }

    fn quadrants(size: u32) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| match (x < size / 2, y < size / 2) {
            (true, true) => Rgb([255, 0, 0]),
            (false, true) => Rgb([0, 255, 0]),
            (true, false) => Rgb([0, 0, 255]),
            (false, false) => Rgb([255, 255, 255]),
        })
    }

    fn top_left_face() -> Detection {
        Detection {
            bbox: RelativeBox {
                xmin: 0.0,
                ymin: 0.0,
                width: 0.4,
                height: 0.4,
            },
            score: 0.99,
        }
    }

    #[test]
    fn test_no_face_keeps_full_frame() {
        let mut normalizer = FrameNormalizer::new(Box::new(NullDetector), None, PreprocessConfig::default(), (16, 16));
        let frame = normalizer.process(&quadrants(32)).unwrap();
        assert!(frame.face.is_none());
        assert_eq!(frame.pixels.shape(), &[16, 16, 3]);
        // Full frame: bottom-right stays white
        assert!((frame.pixels[[15, 15, 0]] - 1.0).abs() < 1e-6);
        assert!(frame.pixels.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_face_crop_zooms_in() {
        let mut normalizer = FrameNormalizer::new(
            Box::new(FixedDetector(vec![top_left_face()])),
            None,
            PreprocessConfig::default(),
            (16, 16),
        );
        let frame = normalizer.process(&quadrants(100)).unwrap();
        let face = frame.face.unwrap();
        // 40px box grown by 4px per margin, clamped at the origin
        assert_eq!((face.x, face.y, face.width, face.height), (0, 0, 44, 44));
        // Crop lies entirely in the red quadrant
        let center = [frame.pixels[[8, 8, 0]], frame.pixels[[8, 8, 1]], frame.pixels[[8, 8, 2]]];
        assert!(center[0] > 0.9 && center[1] < 0.1 && center[2] < 0.1);
    }

    #[test]
    fn test_output_is_deterministic() {
        let mut normalizer = FrameNormalizer::new(
            Box::new(FixedDetector(vec![top_left_face()])),
            None,
            PreprocessConfig::default(),
            (12, 10),
        );
        let image = quadrants(40);
        let a = normalizer.normalize(&image).unwrap();
        let b = normalizer.normalize(&image).unwrap();
        assert_eq!(a.shape(), &[10, 12, 3]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_landmark_failure_is_ignored() {
        let mut normalizer = FrameNormalizer::new(
            Box::new(NullDetector),
            Some(Box::new(FailingLandmarks)),
            PreprocessConfig::default(),
            (8, 8),
        );
        let frame = normalizer.process(&quadrants(16)).unwrap();
        assert!(frame.landmarks.is_empty());
        assert!(frame.overlay.is_none());
    }

    #[test]
    fn test_landmarks_do_not_touch_pixels() {
        let image = quadrants(16);
        let mut plain = FrameNormalizer::new(Box::new(NullDetector), None, PreprocessConfig::default(), (16, 16));
        let mut marked = FrameNormalizer::new(
            Box::new(NullDetector),
            Some(Box::new(CenterLandmark)),
            PreprocessConfig::default(),
            (16, 16),
        );
        let expected = plain.normalize(&image).unwrap();
        let frame = marked.process(&image).unwrap();
        assert_eq!(frame.landmarks.len(), 1);
        assert!(frame.overlay.is_some());
        assert_eq!(frame.pixels, expected);
    }

    #[test]
    fn test_empty_frame_is_rejected() {
        let mut normalizer = FrameNormalizer::default();
        assert!(normalizer.normalize(&RgbImage::new(0, 0)).is_err());
    }
}
