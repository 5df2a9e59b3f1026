//! Dataset indexing: label folders of frame files become labeled video groups.
//!
//! Expected layout:
//!
//! ```text
//! root/
//!   Happy/
//!     vid1_000.png
//!     vid1_001.png
//!     vid2_000.png
//!   Sad/
//!     ...
//! ```
//!
//! Each frame name is `<video-id>_<frame-index>.<ext>`; frames sharing a
//! video id form one [`VideoGroup`].

use crate::labels::label_for_dir;
use crate::constants::UNLABELED;
use crate::{Error, Result};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Ordered frame files reconstructed as one source video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoGroup {
    /// Frame name with its trailing `_<frame-index>` token removed
    pub video_id: String,
    /// Frame paths in sorted filename (temporal) order
    pub frames: Vec<PathBuf>,
}

/// Video groups with a parallel label vector
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabeledVideos {
    pub groups: Vec<VideoGroup>,
    pub labels: Vec<i64>,
}

impl LabeledVideos {
    /// Number of videos
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether there are no videos
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Drop every video labeled with the unknown-label sentinel
    #[must_use]
    pub fn without_unlabeled(self) -> Self {
        let (groups, labels) = self
            .groups
            .into_iter()
            .zip(self.labels)
            .filter(|(_, label)| *label != UNLABELED)
            .unzip();
        Self { groups, labels }
    }

    fn select(&self, indices: &[usize]) -> Self {
        Self {
            groups: indices.iter().map(|&i| self.groups[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

/// Train, validation and test videos
#[derive(Debug, Clone, Default)]
pub struct DatasetSplit {
    pub train: LabeledVideos,
    pub val: LabeledVideos,
    pub test: LabeledVideos,
}

/// Recover the video id from a frame file name
///
/// `vid_a_012.png` → `vid_a`. A name without `_` keeps its whole stem.
#[must_use]
pub fn video_id_of(file_name: &str) -> &str {
    let file_name = file_name.trim();
    match file_name.rsplit_once('_') {
        Some((id, _)) => id,
        None => Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name),
    }
}

/// Scan one split root and group its frames into labeled videos
///
/// # Errors
///
/// Returns an error if:
/// - `root` does not exist or is not a directory
/// - a directory cannot be read
pub fn index_directory<P: AsRef<Path>>(root: P) -> Result<LabeledVideos> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(Error::ConfigError(format!(
            "Data directory does not exist: {}",
            root.display()
        )));
    }

    let mut label_dirs: Vec<(String, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            label_dirs.push((name.to_string(), path));
        }
    }
    label_dirs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut videos = LabeledVideos::default();
    for (label_name, dir) in &label_dirs {
        let label = label_for_dir(label_name);
        if label == UNLABELED {
            warn!(
                "Label directory '{}' is not in the expression vocabulary; its videos are labeled {}",
                label_name, UNLABELED
            );
        }

        let groups = group_frames(dir)?;
        debug!("{}: {} video(s)", dir.display(), groups.len());
        for group in groups {
            videos.groups.push(group);
            videos.labels.push(label);
        }
    }

    info!(
        "Indexed {} video(s) across {} label folder(s) in {}",
        videos.len(),
        label_dirs.len(),
        root.display()
    );
    Ok(videos)
}

/// Group the files of one label directory by video id, in sorted name order
fn group_frames(dir: &Path) -> Result<Vec<VideoGroup>> {
    let mut files: Vec<(String, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            files.push((name.to_string(), path));
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut groups: Vec<VideoGroup> = Vec::new();
    let mut slot_of: HashMap<String, usize> = HashMap::new();
    for (name, path) in files {
        let video_id = video_id_of(&name).to_string();
        let slot = *slot_of.entry(video_id.clone()).or_insert_with(|| {
            groups.push(VideoGroup {
                video_id,
                frames: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].frames.push(path);
    }
    Ok(groups)
}

/// Deterministically partition videos into (train, validation)
///
/// Validation receives `ceil(len * val_ratio)` videos drawn by a seeded
/// shuffle; the same seed always yields the same partition.
///
/// # Errors
///
/// Returns an error if `val_ratio` is outside `[0, 1)`.
#[allow(clippy::cast_possible_truncation)] // ceil of a value in [0, len)
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_precision_loss)]
pub fn train_val_split(videos: &LabeledVideos, val_ratio: f64, seed: u64) -> Result<(LabeledVideos, LabeledVideos)> {
    if !(0.0..1.0).contains(&val_ratio) {
        return Err(Error::ConfigError(format!(
            "Validation ratio must be in [0, 1), got {val_ratio}"
        )));
    }

    let n = videos.len();
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_val = ((n as f64 * val_ratio).ceil() as usize).min(n);
    let (val_idx, train_idx) = indices.split_at(n_val);
    Ok((videos.select(train_idx), videos.select(val_idx)))
}

/// Index the train and test roots and carve validation out of training
///
/// # Errors
///
/// Returns an error if either root is missing or `val_ratio` is invalid.
pub fn split_dataset<P: AsRef<Path>, Q: AsRef<Path>>(
    train_dir: P,
    test_dir: Q,
    val_ratio: f64,
    seed: u64,
) -> Result<DatasetSplit> {
    let all_train = index_directory(train_dir)?;
    let test = index_directory(test_dir)?;
    let (train, val) = train_val_split(&all_train, val_ratio, seed)?;

    info!(
        "Split: {} train, {} validation, {} test video(s)",
        train.len(),
        val.len(),
        test.len()
    );
    Ok(DatasetSplit { train, val, test })
}
