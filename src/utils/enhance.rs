//! Photometric enhancement of 8-bit RGB images.
//!
//! Every enhancer follows the same recipe: build a *degenerate* image and
//! blend it with the input, `out = degenerate + factor * (input - degenerate)`.
//! A factor of 1.0 returns the input unchanged, 0.0 returns the degenerate
//! image, and values above 1.0 extrapolate away from it.

use image::{Rgb, RgbImage};

/// Smoothing kernel used as the degenerate image for sharpening (sums to 13)
const SMOOTH_KERNEL: [[u32; 3]; 3] = [[1, 1, 1], [1, 5, 1], [1, 1, 1]];
const SMOOTH_KERNEL_SUM: u32 = 13;

/// ITU-R 601-2 luma of a pixel, rounded, in fixed-point
#[must_use]
pub fn luma(pixel: &Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0;
    let value = (u32::from(r) * 19_595 + u32::from(g) * 38_470 + u32::from(b) * 7_471 + 0x8000) >> 16;
    // Weights sum to 65536, so the shifted value never exceeds 255
    u8::try_from(value).unwrap_or(u8::MAX)
}

#[allow(clippy::cast_possible_truncation)] // Clamped into u8 range before the cast
#[allow(clippy::cast_sign_loss)]
fn blend_channel(degenerate: u8, value: u8, factor: f32) -> u8 {
    let degenerate = f32::from(degenerate);
    (degenerate + factor * (f32::from(value) - degenerate)).clamp(0.0, 255.0) as u8
}

fn blend(degenerate: &RgbImage, image: &RgbImage, factor: f32) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let d = degenerate.get_pixel(x, y).0;
        let p = image.get_pixel(x, y).0;
        Rgb([
            blend_channel(d[0], p[0], factor),
            blend_channel(d[1], p[1], factor),
            blend_channel(d[2], p[2], factor),
        ])
    })
}

/// Scale brightness: blend with a black image
#[must_use]
pub fn brightness(image: &RgbImage, factor: f32) -> RgbImage {
    let black = RgbImage::new(image.width(), image.height());
    blend(&black, image, factor)
}

/// Scale contrast: blend with a flat gray image at the mean luma
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Mean of u8 values fits in u8
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_precision_loss)]
pub fn contrast(image: &RgbImage, factor: f32) -> RgbImage {
    let count = u64::from(image.width()) * u64::from(image.height());
    if count == 0 {
        return image.clone();
    }
    let total: u64 = image.pixels().map(|p| u64::from(luma(p))).sum();
    let mean = (total as f64 / count as f64 + 0.5) as u8;
    let gray = RgbImage::from_pixel(image.width(), image.height(), Rgb([mean, mean, mean]));
    blend(&gray, image, factor)
}

/// Scale saturation: blend with the grayscale version of the image
#[must_use]
pub fn saturation(image: &RgbImage, factor: f32) -> RgbImage {
    let gray = RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let l = luma(image.get_pixel(x, y));
        Rgb([l, l, l])
    });
    blend(&gray, image, factor)
}

/// Scale sharpness: blend with a smoothed copy of the image
///
/// Border pixels of the smoothed copy are taken from the input, so the
/// outermost ring is left untouched by the enhancement.
#[must_use]
pub fn sharpness(image: &RgbImage, factor: f32) -> RgbImage {
    let (width, height) = image.dimensions();
    if width < 3 || height < 3 {
        return image.clone();
    }

    let mut smoothed = image.clone();
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut acc = [0u32; 3];
            for (ky, row) in SMOOTH_KERNEL.iter().enumerate() {
                for (kx, &weight) in row.iter().enumerate() {
                    let p = image.get_pixel(x + kx as u32 - 1, y + ky as u32 - 1).0;
                    for ch in 0..3 {
                        acc[ch] += weight * u32::from(p[ch]);
                    }
                }
            }
            let px = acc.map(|v| {
                u8::try_from((v + SMOOTH_KERNEL_SUM / 2) / SMOOTH_KERNEL_SUM).unwrap_or(u8::MAX)
            });
            smoothed.put_pixel(x, y, Rgb(px));
        }
    }

    blend(&smoothed, image, factor)
}

/// Rotate every pixel's hue by `shift` turns (`shift` in [-0.5, 0.5])
#[must_use]
pub fn hue(image: &RgbImage, shift: f32) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let (h, s, v) = rgb_to_hsv(image.get_pixel(x, y));
        hsv_to_rgb((h + shift).rem_euclid(1.0), s, v)
    })
}

fn rgb_to_hsv(pixel: &Rgb<u8>) -> (f32, f32, f32) {
    let [r, g, b] = pixel.0.map(|c| f32::from(c) / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta <= f32::EPSILON {
        0.0
    } else if (max - r).abs() <= f32::EPSILON {
        ((g - b) / delta).rem_euclid(6.0) / 6.0
    } else if (max - g).abs() <= f32::EPSILON {
        ((b - r) / delta + 2.0) / 6.0
    } else {
        ((r - g) / delta + 4.0) / 6.0
    };
    let s = if max <= f32::EPSILON { 0.0 } else { delta / max };
    (h, s, max)
}

#[allow(clippy::cast_possible_truncation)] // Sector index is in 0..6
#[allow(clippy::cast_sign_loss)]
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match (sector as i32).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    let to_u8 = |c: f32| crate::utils::safe_cast::f32_to_u8_round(c * 255.0);
    Rgb([to_u8(r), to_u8(g), to_u8(b)])
}
