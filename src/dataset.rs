//! Random-access dataset of labeled clips.
//!
//! Clips are recomputed on every access; nothing is cached. Detector state
//! lives in [`ClipWorker`]s, one per thread.

use crate::augment::ClipTransform;
use crate::clip::ClipAssembler;
use crate::config::{ClipConfig, PreprocessConfig};
use crate::dataset_index::{LabeledVideos, VideoGroup};
use crate::normalizer::{DetectorFactory, FrameNormalizer};
use crate::{Error, Result};
use ndarray::Array4;
use std::sync::Arc;

/// A clip ready for the classifier and its label
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledClip {
    /// Shape (C, T, H, W)
    pub clip: Array4<f32>,
    pub label: i64,
}

/// Labeled video groups plus everything needed to turn one into a clip
pub struct ClipDataset {
    videos: LabeledVideos,
    clip: ClipConfig,
    preprocess: PreprocessConfig,
    factory: Arc<dyn DetectorFactory>,
    transform: Option<Arc<dyn ClipTransform>>,
}

impl ClipDataset {
    /// # Errors
    ///
    /// Returns an error if the group and label vectors differ in length.
    pub fn new(
        videos: LabeledVideos,
        clip: ClipConfig,
        preprocess: PreprocessConfig,
        factory: Arc<dyn DetectorFactory>,
        transform: Option<Arc<dyn ClipTransform>>,
    ) -> Result<Self> {
        if videos.groups.len() != videos.labels.len() {
            return Err(Error::InvalidInput(format!(
                "{} video groups but {} labels",
                videos.groups.len(),
                videos.labels.len()
            )));
        }
        Ok(Self {
            videos,
            clip,
            preprocess,
            factory,
            transform,
        })
    }

    /// Number of clips
    #[must_use]
    pub fn len(&self) -> usize {
        self.videos.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    /// Video group at `index`
    #[must_use]
    pub fn group(&self, index: usize) -> Option<&VideoGroup> {
        self.videos.groups.get(index)
    }

    /// Label at `index`
    #[must_use]
    pub fn label(&self, index: usize) -> Option<i64> {
        self.videos.labels.get(index).copied()
    }

    /// Create a worker with its own detector instances
    ///
    /// # Errors
    ///
    /// Returns an error if a detector cannot be initialized.
    pub fn worker(&self) -> Result<ClipWorker<'_>> {
        let normalizer =
            FrameNormalizer::from_factory(self.factory.as_ref(), self.preprocess.clone(), self.clip.target_size())?;
        Ok(ClipWorker {
            dataset: self,
            assembler: ClipAssembler::new(normalizer, self.clip.clip_length),
        })
    }

    /// Fetch one example with a short-lived worker
    ///
    /// # Errors
    ///
    /// Same as [`ClipWorker::get`].
    pub fn get(&self, index: usize) -> Result<LabeledClip> {
        self.worker()?.get(index)
    }
}

/// Per-thread fetcher bound to a [`ClipDataset`]
pub struct ClipWorker<'a> {
    dataset: &'a ClipDataset,
    assembler: ClipAssembler,
}

impl ClipWorker<'_> {
    /// Build the (C, T, H, W) clip and label for `index`
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an out-of-range index,
    /// [`Error::EmptyClip`] when no frame is readable, or any transform error.
    pub fn get(&mut self, index: usize) -> Result<LabeledClip> {
        let (group, label) = match (self.dataset.group(index), self.dataset.label(index)) {
            (Some(group), Some(label)) => (group, label),
            _ => {
                return Err(Error::InvalidInput(format!(
                    "Index {index} out of range for dataset of {} clip(s)",
                    self.dataset.len()
                )))
            }
        };

        let clip = self.assembler.assemble(&group.frames).map_err(|e| {
            log::debug!("Video '{}' failed: {e}", group.video_id);
            e
        })?;

        // (T, H, W, C) without a transform, (T, C, H, W) with one
        let clip = match &self.dataset.transform {
            Some(transform) => transform.apply(&clip)?.permuted_axes([1, 0, 2, 3]),
            None => clip.into_array().permuted_axes([3, 0, 1, 2]),
        };

        Ok(LabeledClip {
            clip: clip.as_standard_layout().to_owned(),
            label,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face_detection::{FaceDetector, NullDetector};
    use std::path::PathBuf;

    struct NullFactory;

    impl DetectorFactory for NullFactory {
        fn face_detector(&self) -> Result<Box<dyn FaceDetector>> {
            Ok(Box::new(NullDetector))
        }
    }

    fn dataset(groups: usize) -> ClipDataset {
        let videos = LabeledVideos {
            groups: (0..groups)
                .map(|i| VideoGroup {
                    video_id: format!("v{i}"),
                    frames: vec![PathBuf::from(format!("/nonexistent/v{i}_000.png"))],
                })
                .collect(),
            labels: vec![1; groups],
        };
        ClipDataset::new(
            videos,
            ClipConfig::default(),
            PreprocessConfig::default(),
            Arc::new(NullFactory),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_len() {
        assert_eq!(dataset(3).len(), 3);
        assert!(dataset(0).is_empty());
    }

    #[test]
    fn test_out_of_range_index() {
        assert!(matches!(dataset(2).get(2), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_unreadable_video_is_empty_clip() {
        let err = dataset(1).get(0).unwrap_err();
        assert!(matches!(err, Error::EmptyClip { frames: 1 }));
        assert!(err.is_item_recoverable());
    }

    #[test]
    fn test_mismatched_labels_rejected() {
        let videos = LabeledVideos {
            groups: Vec::new(),
            labels: vec![0],
        };
        let result = ClipDataset::new(
            videos,
            ClipConfig::default(),
            PreprocessConfig::default(),
            Arc::new(NullFactory),
            None,
        );
        assert!(result.is_err());
    }
}
