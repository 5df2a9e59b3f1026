//! Random augmentation and ImageNet normalization of clips.
//!
//! Each frame is converted to 8-bit RGB, rotated by a small random angle,
//! color-jittered (brightness, contrast, saturation and hue in random order),
//! converted to a channel-first tensor and normalized with ImageNet statistics.

use crate::clip::Clip;
use crate::config::AugmentConfig;
use crate::constants::{IMAGENET_MEAN, IMAGENET_STD};
use crate::utils::enhance;
use crate::utils::image_conversion::{frames_to_array4, rgb_to_chw_tensor, unit_array_to_rgb};
use crate::Result;
use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use ndarray::{Array3, Array4, ArrayView3, Axis};
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};

/// Maps a clip (T, H, W, 3) to a model-ready tensor (T, 3, H, W)
pub trait ClipTransform: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if a frame cannot be converted.
    fn apply(&self, clip: &Clip) -> Result<Array4<f32>>;
}

/// How often augmentation parameters are drawn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AugmentMode {
    /// Every frame draws its own parameters
    #[default]
    PerFrame,
    /// One parameter set is shared by all frames of a clip
    PerClip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColorOp {
    Brightness,
    Contrast,
    Saturation,
    Hue,
}

/// One draw of the random augmentation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct FrameParams {
    pub angle_degrees: f32,
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub hue: f32,
    order: [ColorOp; 4],
}

impl FrameParams {
    /// Parameters that leave a frame unchanged
    #[must_use]
    pub fn identity() -> Self {
        Self {
            angle_degrees: 0.0,
            brightness: 1.0,
            contrast: 1.0,
            saturation: 1.0,
            hue: 0.0,
            order: [ColorOp::Brightness, ColorOp::Contrast, ColorOp::Saturation, ColorOp::Hue],
        }
    }
}

/// Rotation, color jitter and ImageNet normalization for every frame
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentFrames {
    pub rotation_degrees: f32,
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub hue: f32,
    pub mode: AugmentMode,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for AugmentFrames {
    fn default() -> Self {
        Self::from_config(&AugmentConfig::default())
    }
}

impl AugmentFrames {
    #[must_use]
    pub fn from_config(config: &AugmentConfig) -> Self {
        Self {
            rotation_degrees: config.rotation_degrees,
            brightness: config.brightness,
            contrast: config.contrast,
            saturation: config.saturation,
            hue: config.hue,
            mode: config.mode,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }

    /// Normalization only: no rotation and no jitter
    #[must_use]
    pub fn normalize_only() -> Self {
        Self {
            rotation_degrees: 0.0,
            brightness: 0.0,
            contrast: 0.0,
            saturation: 0.0,
            hue: 0.0,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: AugmentMode) -> Self {
        self.mode = mode;
        self
    }

    /// Draw one parameter set
    pub fn sample<R: Rng>(&self, rng: &mut R) -> FrameParams {
        let factor = |rng: &mut R, jitter: f32| {
            if jitter > 0.0 {
                rng.gen_range((1.0 - jitter).max(0.0)..=1.0 + jitter)
            } else {
                1.0
            }
        };
        let symmetric = |rng: &mut R, bound: f32| {
            if bound > 0.0 {
                rng.gen_range(-bound..=bound)
            } else {
                0.0
            }
        };

        let angle_degrees = symmetric(rng, self.rotation_degrees);
        let brightness = factor(rng, self.brightness);
        let contrast = factor(rng, self.contrast);
        let saturation = factor(rng, self.saturation);
        let hue = symmetric(rng, self.hue);
        let mut order = FrameParams::identity().order;
        order.shuffle(rng);

        FrameParams {
            angle_degrees,
            brightness,
            contrast,
            saturation,
            hue,
            order,
        }
    }

    /// Augment one (H, W, 3) frame into a normalized (3, H, W) tensor
    ///
    /// # Errors
    ///
    /// Returns an error if the frame does not have 3 channels.
    pub fn augment_frame(&self, frame: ArrayView3<'_, f32>, params: &FrameParams) -> Result<Array3<f32>> {
        let mut image = unit_array_to_rgb(frame)?;
        if params.angle_degrees != 0.0 {
            image = rotate_nearest(&image, params.angle_degrees);
        }
        for op in params.order {
            image = match op {
                ColorOp::Brightness if params.brightness != 1.0 => enhance::brightness(&image, params.brightness),
                ColorOp::Contrast if params.contrast != 1.0 => enhance::contrast(&image, params.contrast),
                ColorOp::Saturation if params.saturation != 1.0 => enhance::saturation(&image, params.saturation),
                ColorOp::Hue if params.hue != 0.0 => enhance::hue(&image, params.hue),
                _ => continue,
            };
        }

        let mut tensor = rgb_to_chw_tensor(&image);
        for (ch, mut plane) in tensor.axis_iter_mut(Axis(0)).enumerate() {
            let (mean, std) = (self.mean[ch], self.std[ch]);
            plane.mapv_inplace(|v| (v - mean) / std);
        }
        Ok(tensor)
    }

    /// Augment a clip with an explicit random source
    ///
    /// # Errors
    ///
    /// Returns an error if a frame cannot be converted.
    pub fn apply_with_rng<R: Rng>(&self, clip: &Clip, rng: &mut R) -> Result<Array4<f32>> {
        let shared = match self.mode {
            AugmentMode::PerClip => Some(self.sample(rng)),
            AugmentMode::PerFrame => None,
        };

        let frames = (0..clip.len())
            .map(|i| {
                let params = match &shared {
                    Some(params) => params.clone(),
                    None => self.sample(rng),
                };
                self.augment_frame(clip.frame(i), &params)
            })
            .collect::<Result<Vec<_>>>()?;
        frames_to_array4(&frames)
    }
}

impl ClipTransform for AugmentFrames {
    fn apply(&self, clip: &Clip) -> Result<Array4<f32>> {
        self.apply_with_rng(clip, &mut thread_rng())
    }
}

/// Rotate counter-clockwise about the image center, nearest neighbour,
/// uncovered pixels black
#[must_use]
pub fn rotate_nearest(image: &RgbImage, degrees: f32) -> RgbImage {
    // imageproc rotates clockwise for positive angles
    rotate_about_center(image, -degrees.to_radians(), Interpolation::Nearest, Rgb([0, 0, 0]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn gradient_clip(frames: usize) -> Clip {
        Clip::new(Array4::from_shape_fn((frames, 6, 8, 3), |(t, h, w, c)| {
            ((t + h * 3 + w * 2 + c * 5) % 17) as f32 / 16.0
        }))
        .unwrap()
    }

    #[test]
    fn test_output_is_channel_first() {
        let out = AugmentFrames::default().apply(&gradient_clip(4)).unwrap();
        assert_eq!(out.shape(), &[4, 3, 6, 8]);
    }

    #[test]
    fn test_normalize_only_applies_imagenet_stats() {
        let clip = Clip::new(Array4::from_elem((2, 4, 4, 3), 0.5)).unwrap();
        let out = AugmentFrames::normalize_only()
            .apply_with_rng(&clip, &mut StdRng::seed_from_u64(1))
            .unwrap();
        // 0.5 -> 128 in 8 bits
        let v = 128.0 / 255.0;
        for ch in 0..3 {
            let expected = (v - IMAGENET_MEAN[ch]) / IMAGENET_STD[ch];
            assert!((out[[1, ch, 2, 3]] - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn test_same_seed_same_output() {
        let transform = AugmentFrames::default();
        let clip = gradient_clip(3);
        let a = transform.apply_with_rng(&clip, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = transform.apply_with_rng(&clip, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_per_clip_mode_shares_parameters() {
        let clip = Clip::new(Array4::from_shape_fn((5, 6, 6, 3), |(_, h, w, c)| {
            ((h * 6 + w + c) % 11) as f32 / 10.0
        }))
        .unwrap();
        let transform = AugmentFrames::default().with_mode(AugmentMode::PerClip);
        let out = transform.apply_with_rng(&clip, &mut StdRng::seed_from_u64(3)).unwrap();
        for t in 1..5 {
            assert_eq!(out.index_axis(Axis(0), t), out.index_axis(Axis(0), 0));
        }
    }

    #[test]
    fn test_sampled_parameters_stay_in_range() {
        let transform = AugmentFrames::default();
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..200 {
            let p = transform.sample(&mut rng);
            assert!(p.angle_degrees.abs() <= 2.0);
            for factor in [p.brightness, p.contrast, p.saturation] {
                assert!((0.8..=1.2).contains(&factor));
            }
            assert!(p.hue.abs() <= 0.1);
        }
    }

    #[test]
    fn test_rotate_zero_is_identity() {
        let image = RgbImage::from_fn(7, 5, |x, y| Rgb([(x * 30) as u8, (y * 40) as u8, 9]));
        assert_eq!(rotate_nearest(&image, 0.0), image);
    }

    #[test]
    fn test_rotate_fills_corners_black() {
        let image = RgbImage::from_pixel(9, 9, Rgb([255, 255, 255]));
        let rotated = rotate_nearest(&image, 45.0);
        assert_eq!(rotated.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(rotated.get_pixel(4, 4).0, [255, 255, 255]);
    }

    #[test]
    fn test_rotate_is_counter_clockwise() {
        // White top half moves to the left half
        let image = RgbImage::from_fn(21, 21, |_, y| if y < 10 { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) });
        let rotated = rotate_nearest(&image, 90.0);
        assert_eq!(rotated.get_pixel(3, 10).0, [255, 255, 255]);
        assert_eq!(rotated.get_pixel(17, 10).0, [0, 0, 0]);
    }

    #[test]
    fn test_per_frame_mode_samples_each_frame() {
        let clip = Clip::new(Array4::from_shape_fn((5, 6, 6, 3), |(_, h, w, c)| {
            ((h * 6 + w + c) % 11) as f32 / 10.0
        }))
        .unwrap();
        let transform = AugmentFrames::default();
        assert_eq!(transform.mode, AugmentMode::PerFrame);

        let out = transform.apply_with_rng(&clip, &mut StdRng::seed_from_u64(3)).unwrap();
        let first = out.index_axis(Axis(0), 0);
        assert!((1..5).any(|t| out.index_axis(Axis(0), t) != first));
    }

    #[test]
    fn test_augment_mode_serde() {
        let mode: AugmentMode = serde_yaml::from_str("per_clip").unwrap();
        assert_eq!(mode, AugmentMode::PerClip);
        assert_eq!(AugmentMode::default(), AugmentMode::PerFrame);
    }
}
