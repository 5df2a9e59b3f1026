//! Image conversion utilities for `image` buffers and ndarray interoperability.

use crate::constants::CHANNELS;
use crate::utils::safe_cast::{f32_to_u8_round, usize_to_u32};
use crate::{Error, Result};
use image::RgbImage;
use ndarray::{Array3, Array4, ArrayView3, Axis};

/// Convert an RGB image to an `Array3<f32>` scaled to [0, 1]
///
/// # Returns
/// * `Array3<f32>` with shape (height, width, channels)
#[must_use]
pub fn rgb_to_unit_array(image: &RgbImage) -> Array3<f32> {
    let (width, height) = image.dimensions();
    Array3::from_shape_fn((height as usize, width as usize, CHANNELS), |(row, col, ch)| {
        f32::from(image.get_pixel(col as u32, row as u32)[ch]) / 255.0
    })
}

/// Convert an RGB image to a channel-first `Array3<f32>` scaled to [0, 1]
///
/// # Returns
/// * `Array3<f32>` with shape (channels, height, width)
#[must_use]
pub fn rgb_to_chw_tensor(image: &RgbImage) -> Array3<f32> {
    let (width, height) = image.dimensions();
    Array3::from_shape_fn((CHANNELS, height as usize, width as usize), |(ch, row, col)| {
        f32::from(image.get_pixel(col as u32, row as u32)[ch]) / 255.0
    })
}

/// Convert a channel-last float frame to an 8-bit RGB image
///
/// Frames whose maximum is at most 1.0 are treated as [0, 1] data and scaled
/// by 255; anything else is taken as already being in 8-bit range. Values are
/// rounded and saturate at the u8 bounds, so 8-bit frames survive the round trip.
///
/// # Errors
/// * Returns error if the frame does not have exactly 3 channels
pub fn unit_array_to_rgb(frame: ArrayView3<'_, f32>) -> Result<RgbImage> {
    let (height, width, channels) = frame.dim();
    if channels != CHANNELS {
        return Err(Error::InvalidInput(format!(
            "Expected {CHANNELS} channels, got {channels}"
        )));
    }

    let max = frame.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let scale = if max <= 1.0 { 255.0 } else { 1.0 };

    let width = usize_to_u32(width)?;
    let height = usize_to_u32(height)?;
    Ok(RgbImage::from_fn(width, height, |col, row| {
        let (r, c) = (row as usize, col as usize);
        image::Rgb([
            f32_to_u8_round(frame[[r, c, 0]] * scale),
            f32_to_u8_round(frame[[r, c, 1]] * scale),
            f32_to_u8_round(frame[[r, c, 2]] * scale),
        ])
    }))
}

/// Stack equally shaped frames into an `Array4<f32>` along a new leading axis
///
/// # Errors
/// * Returns error if `frames` is empty
/// * Returns error if frames have different dimensions
pub fn frames_to_array4(frames: &[Array3<f32>]) -> Result<Array4<f32>> {
    let first = frames
        .first()
        .ok_or_else(|| Error::InvalidInput("Empty frame vector".to_string()))?;

    // Validate all frames have same dimensions
    for (i, frame) in frames.iter().enumerate() {
        if frame.dim() != first.dim() {
            return Err(Error::ShapeMismatch(format!(
                "Frame at index {i} has shape {:?}, expected {:?}",
                frame.shape(),
                first.shape()
            )));
        }
    }

    let views: Vec<ArrayView3<'_, f32>> = frames.iter().map(Array3::view).collect();
    ndarray::stack(Axis(0), &views)
        .map_err(|e| Error::ShapeMismatch(format!("Failed to stack frames: {e}")))
}
