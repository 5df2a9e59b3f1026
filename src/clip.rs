//! Fixed-length clip assembly from ordered frame files.

use crate::normalizer::FrameNormalizer;
use crate::utils::has_frame_extension;
use crate::utils::image_conversion::frames_to_array4;
use crate::{Error, Result};
use image::RgbImage;
use log::{debug, warn};
use ndarray::{Array3, Array4, ArrayView3, Axis};
use std::path::{Path, PathBuf};

/// A fixed-length stack of normalized frames, shape (T, H, W, 3) in [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    frames: Array4<f32>,
}

impl Clip {
    /// Wrap a (T, H, W, 3) array
    ///
    /// # Errors
    ///
    /// Returns an error if the array has no frames or not 3 channels.
    pub fn new(frames: Array4<f32>) -> Result<Self> {
        let (t, _, _, c) = frames.dim();
        if t == 0 {
            return Err(Error::EmptyClip { frames: 0 });
        }
        if c != crate::constants::CHANNELS {
            return Err(Error::ShapeMismatch(format!(
                "Clip frames must have 3 channels, got {c}"
            )));
        }
        Ok(Self { frames })
    }

    /// Number of frames
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len_of(Axis(0))
    }

    /// Always false for a constructed clip
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// View of frame `index`, shape (H, W, 3)
    #[must_use]
    pub fn frame(&self, index: usize) -> ArrayView3<'_, f32> {
        self.frames.index_axis(Axis(0), index)
    }

    /// The underlying (T, H, W, 3) array
    #[must_use]
    pub fn frames(&self) -> &Array4<f32> {
        &self.frames
    }

    #[must_use]
    pub fn into_array(self) -> Array4<f32> {
        self.frames
    }
}

/// Bring a frame sequence to exactly `clip_length` frames
///
/// Shorter sequences repeat their last frame, longer ones keep the first
/// `clip_length` frames. Order is preserved.
///
/// # Errors
///
/// Returns [`Error::EmptyClip`] when `frames` is empty and
/// [`Error::ShapeMismatch`] when frames differ in shape.
pub fn pad_or_truncate(mut frames: Vec<Array3<f32>>, clip_length: usize) -> Result<Clip> {
    if clip_length == 0 {
        return Err(Error::InvalidInput("Clip length must be greater than 0".to_string()));
    }
    let last = frames.last().cloned().ok_or(Error::EmptyClip { frames: 0 })?;

    frames.truncate(clip_length);
    frames.resize(clip_length, last);

    Clip::new(frames_to_array4(&frames)?)
}

/// Read a frame file as RGB
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] for extensions outside the accepted
/// set and [`Error::Image`] when the file is missing or cannot be decoded.
pub fn load_frame(path: &Path) -> Result<RgbImage> {
    if !has_frame_extension(path) {
        return Err(Error::UnsupportedFormat(path.display().to_string()));
    }
    Ok(image::open(path)?.to_rgb8())
}

/// Builds clips from frame files with a private [`FrameNormalizer`]
pub struct ClipAssembler {
    normalizer: FrameNormalizer,
    clip_length: usize,
}

impl ClipAssembler {
    #[must_use]
    pub fn new(normalizer: FrameNormalizer, clip_length: usize) -> Self {
        Self {
            normalizer,
            clip_length,
        }
    }

    /// Frames per clip
    #[must_use]
    pub fn clip_length(&self) -> usize {
        self.clip_length
    }

    /// Normalize every readable frame of `paths` and pad/truncate the result
    ///
    /// Missing, unsupported or undecodable files are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyClip`] if no frame could be read, or any
    /// non-recoverable normalization error.
    pub fn assemble(&mut self, paths: &[PathBuf]) -> Result<Clip> {
        let mut frames = Vec::with_capacity(paths.len().min(self.clip_length));
        for path in paths {
            let image = match load_frame(path) {
                Ok(image) => image,
                Err(e) if e.is_item_recoverable() => {
                    warn!("Skipping frame {}: {e}", path.display());
                    continue;
                }
                Err(e) => return Err(e),
            };
            frames.push(self.normalizer.normalize(&image)?);
        }

        if frames.is_empty() {
            return Err(Error::EmptyClip { frames: paths.len() });
        }
        debug!(
            "Assembled clip from {} of {} frame(s), length {}",
            frames.len(),
            paths.len(),
            self.clip_length
        );
        pad_or_truncate(frames, self.clip_length)
    }

    /// Build a clip from a single frame file, repeated to full length
    ///
    /// # Errors
    ///
    /// Same as [`ClipAssembler::assemble`].
    pub fn assemble_file(&mut self, path: &Path) -> Result<Clip> {
        self.assemble(&[path.to_path_buf()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(value: f32) -> Array3<f32> {
        Array3::from_elem((2, 2, 3), value)
    }

    #[test]
    fn test_pad_repeats_last_frame() {
        let clip = pad_or_truncate(vec![frame(0.1), frame(0.2), frame(0.3)], 5).unwrap();
        assert_eq!(clip.len(), 5);
        assert_eq!(clip.frame(0)[[0, 0, 0]], 0.1);
        assert_eq!(clip.frame(2)[[0, 0, 0]], 0.3);
        assert_eq!(clip.frame(3)[[0, 0, 0]], 0.3);
        assert_eq!(clip.frame(4)[[0, 0, 0]], 0.3);
    }

    #[test]
    fn test_truncate_keeps_first_frames() {
        let frames: Vec<_> = (0..8).map(|i| frame(i as f32 / 10.0)).collect();
        let clip = pad_or_truncate(frames, 4).unwrap();
        assert_eq!(clip.frames().shape(), &[4, 2, 2, 3]);
        for i in 0..4 {
            assert_eq!(clip.frame(i)[[1, 1, 2]], i as f32 / 10.0);
        }
    }

    #[test]
    fn test_exact_length_is_unchanged() {
        let frames: Vec<_> = (0..3).map(|i| frame(i as f32)).collect();
        let clip = pad_or_truncate(frames.clone(), 3).unwrap();
        for (i, f) in frames.iter().enumerate() {
            assert_eq!(clip.frame(i), f.view());
        }
    }

    #[test]
    fn test_empty_is_error() {
        assert!(matches!(pad_or_truncate(Vec::new(), 10), Err(Error::EmptyClip { .. })));
        assert!(pad_or_truncate(vec![frame(0.0)], 0).is_err());
    }

    #[test]
    fn test_load_frame_rejects_extension() {
        assert!(matches!(
            load_frame(Path::new("clip/vid_000.gif")),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_assemble_all_missing_is_empty_clip() {
        let mut assembler = ClipAssembler::new(FrameNormalizer::default(), 10);
        let paths = vec![PathBuf::from("/nonexistent/a_000.png"), PathBuf::from("/nonexistent/a_001.txt")];
        match assembler.assemble(&paths) {
            Err(Error::EmptyClip { frames }) => assert_eq!(frames, 2),
            other => panic!("expected EmptyClip, got {other:?}"),
        }
    }
}
