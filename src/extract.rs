//! Frame extraction from video files with `OpenCV`.
//!
//! Output frames follow the dataset naming scheme so an extracted folder can
//! be dropped straight into a label directory.

use crate::{Error, Result};
use log::{debug, info};
use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use opencv::prelude::*;
use opencv::videoio::{VideoCapture, CAP_ANY, CAP_PROP_FPS};
use std::path::{Path, PathBuf};

/// Keep every `step`-th frame so roughly `target_fps` frames survive per second
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Ratio of frame rates
#[allow(clippy::cast_sign_loss)]
pub fn frame_step(video_fps: f64, target_fps: f64) -> usize {
    if !video_fps.is_finite() || !target_fps.is_finite() || video_fps <= 0.0 || target_fps <= 0.0 {
        return 1;
    }
    ((video_fps / target_fps).floor() as usize).max(1)
}

/// Path of frame `index` of `video_id` inside `output_dir`
#[must_use]
pub fn frame_path(output_dir: &Path, video_id: &str, index: usize) -> PathBuf {
    output_dir.join(format!("{video_id}_{index:06}.png"))
}

/// Decode `video` and save every `frame_step`-th frame as PNG
///
/// Returns the number of frames written.
///
/// # Errors
///
/// Returns an error if the video cannot be opened, the output directory
/// cannot be created or a frame cannot be written.
pub fn video_to_frames<P: AsRef<Path>, Q: AsRef<Path>>(video: P, output_dir: Q, fps: f64) -> Result<usize> {
    let video = video.as_ref();
    let output_dir = output_dir.as_ref();

    let video_str = video
        .to_str()
        .ok_or_else(|| Error::InvalidInput(format!("Non UTF-8 video path: {}", video.display())))?;
    let mut capture = VideoCapture::from_file(video_str, CAP_ANY)?;
    if !capture.is_opened()? {
        return Err(Error::InvalidInput(format!("Cannot open video: {}", video.display())));
    }

    let video_id = video
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::InvalidInput(format!("Video path has no file name: {}", video.display())))?;
    std::fs::create_dir_all(output_dir)?;

    let step = frame_step(capture.get(CAP_PROP_FPS)?, fps);
    debug!("Extracting every {step} frame(s) of {}", video.display());

    let mut frame = Mat::default();
    let mut read = 0usize;
    let mut written = 0usize;
    while capture.read(&mut frame)? {
        if frame.empty() {
            break;
        }
        if read % step == 0 {
            let path = frame_path(output_dir, video_id, written);
            let path_str = path
                .to_str()
                .ok_or_else(|| Error::InvalidInput(format!("Non UTF-8 frame path: {}", path.display())))?;
            if !imgcodecs::imwrite(path_str, &frame, &Vector::new())? {
                return Err(Error::InvalidInput(format!("Failed to write frame: {}", path.display())));
            }
            written += 1;
        }
        read += 1;
    }

    info!(
        "Extracted {written} of {read} frame(s) from {} into {}",
        video.display(),
        output_dir.display()
    );
    Ok(written)
}
