//! Diagnostic drawing on copies of frames.
//!
//! Nothing here is ever fed to the classifier.

use crate::constants::{LANDMARK_COLOR, LANDMARK_RADIUS};
use crate::mark_detection::Landmark;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;

/// Draw each landmark as a filled dot on a copy of `image`
///
/// Points outside the image are clipped; points far outside are skipped.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Range checked before the cast
#[allow(clippy::cast_precision_loss)]
pub fn draw_landmarks(image: &RgbImage, landmarks: &[Landmark]) -> RgbImage {
    let mut canvas = image.clone();
    let margin = LANDMARK_RADIUS as f32;
    let (width, height) = (canvas.width() as f32, canvas.height() as f32);
    for mark in landmarks {
        if !(-margin..width + margin).contains(&mark.x) || !(-margin..height + margin).contains(&mark.y) {
            continue;
        }
        let center = (mark.x.trunc() as i32, mark.y.trunc() as i32);
        draw_filled_circle_mut(&mut canvas, center, LANDMARK_RADIUS, Rgb(LANDMARK_COLOR));
    }
    canvas
}
