//! Pixel operations.
//!
//! These functions combine the dimension math in
//! [`calculations`](super::calculations) with `image::imageops` primitives.
//! They are pure: RGB buffer in, RGB buffer out.

use super::calculations::{cap_longer_side, center_square, fit_within};
use super::params::{CropMode, Sharpening, VariantSpec};
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};

/// 3x3 edge kernel: eight times the center minus the eight neighbours.
const EDGE_KERNEL: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0];

/// Downscale so the longer side is at most `max_side`. Returns the input
/// untouched (no copy) when it already fits.
pub fn cap_size(img: RgbImage, max_side: u32) -> RgbImage {
    let (w, h) = cap_longer_side(img.dimensions(), max_side);
    if (w, h) == img.dimensions() {
        return img;
    }
    imageops::resize(&img, w, h, FilterType::Lanczos3)
}

/// Center-crop to a square, then resize to exactly `size` x `size`.
pub fn square_thumbnail(img: &RgbImage, size: u32) -> RgbImage {
    let (x, y, side) = center_square(img.dimensions());
    let cropped = imageops::crop_imm(img, x, y, side, side).to_image();
    imageops::resize(&cropped, size, size, FilterType::Lanczos3)
}

/// Shrink to fit within `max_w` x `max_h`, preserving aspect. Never enlarges.
pub fn fit(img: &RgbImage, max_w: u32, max_h: u32) -> RgbImage {
    let (w, h) = fit_within(img.dimensions(), (max_w, max_h));
    if (w, h) == img.dimensions() {
        return img.clone();
    }
    imageops::resize(img, w, h, FilterType::Lanczos3)
}

/// Produce the sized, sharpened pixels for one variant.
pub fn render_variant(img: &RgbImage, spec: &VariantSpec) -> RgbImage {
    let sized = match spec.crop {
        CropMode::Square => square_thumbnail(img, spec.max_width),
        CropMode::Fit => fit(img, spec.max_width, spec.max_height),
    };
    unsharp_mask(&sized, spec.sharpening())
}

/// Unsharp mask with a percent strength and a per-channel threshold.
///
/// For every channel value, `diff = original - blurred`; values with
/// `|diff| >= threshold` become `original + diff * percent / 100`, clamped.
pub fn unsharp_mask(img: &RgbImage, sharpening: Sharpening) -> RgbImage {
    let blurred = imageops::blur(img, sharpening.radius);
    let amount = sharpening.percent as f32 / 100.0;
    let threshold = sharpening.threshold as i16;

    let mut out = img.clone();
    for (dst, (&orig, &soft)) in out
        .iter_mut()
        .zip(img.as_raw().iter().zip(blurred.as_raw().iter()))
    {
        let diff = orig as i16 - soft as i16;
        if diff.abs() >= threshold {
            let value = orig as f32 + diff as f32 * amount;
            *dst = value.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Sharpness score: variance of the edge response over a grayscale copy.
///
/// A flat or smoothly shaded image scores near zero; fine texture and hard
/// edges score high. The response is clamped to `0..=255` per pixel (negative
/// responses count as no edge) and the variance is taken over a 256-bin
/// histogram of interior pixels.
pub fn sharpness_score(img: &RgbImage) -> f64 {
    let gray: GrayImage = imageops::grayscale(img);
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 {
        return 0.0;
    }
    let edges: GrayImage = imageops::filter3x3(&gray, &EDGE_KERNEL);

    let mut histogram = [0u64; 256];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            histogram[edges.get_pixel(x, y).0[0] as usize] += 1;
        }
    }
    histogram_variance(&histogram)
}

fn histogram_variance(histogram: &[u64; 256]) -> f64 {
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    let mean = histogram
        .iter()
        .enumerate()
        .map(|(value, &count)| value as f64 * count as f64)
        .sum::<f64>()
        / total;
    histogram
        .iter()
        .enumerate()
        .map(|(value, &count)| (value as f64 - mean).powi(2) * count as f64)
        .sum::<f64>()
        / total
}
