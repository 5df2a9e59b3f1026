//! Utility functions for image processing, pixel enhancement and safe numeric casts.

pub mod enhance;
pub mod image_conversion;
pub mod safe_cast;

use crate::constants::FRAME_EXTENSIONS;
use std::path::Path;

/// Whether a path carries one of the frame extensions the pipeline reads.
///
/// The comparison is case-insensitive, so `FRAME_001.PNG` is accepted.
#[must_use]
pub fn has_frame_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}
