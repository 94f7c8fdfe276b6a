//! Shared test utilities.
//!
//! Synthetic images only: every test builds its inputs in memory with the
//! `image` crate encoders, so there are no binary fixtures to keep in sync.
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let bytes = encode_jpeg(&checkerboard(3000, 2000, 12));
//! let (tmp, storage) = fs_storage_with("uploads/abc.jpg", &bytes);
//! ```

use crate::storage::{FileSystemStorage, Storage};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use tempfile::TempDir;

// =========================================================================
// Pixel builders
// =========================================================================

/// High-frequency black/white checkerboard with a colour tint. Scores well
/// above the blur threshold.
pub fn checkerboard(width: u32, height: u32, cell: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        if ((x / cell) + (y / cell)) % 2 == 0 {
            Rgb([240, 235, 230])
        } else {
            Rgb([15, 20, 25])
        }
    })
}

/// Smooth two-axis gradient. Scores near zero on the blur metric.
pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let r = (x as f32 * 255.0 / width.max(2) as f32) as u8;
        let g = (y as f32 * 255.0 / height.max(2) as f32) as u8;
        Rgb([r, g, 128])
    })
}

// =========================================================================
// Encoders
// =========================================================================

pub fn encode_jpeg(img: &RgbImage) -> Vec<u8> {
    encode(img, ImageFormat::Jpeg)
}

pub fn encode_png(img: &RgbImage) -> Vec<u8> {
    encode(img, ImageFormat::Png)
}

fn encode(img: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img.clone())
        .write_to(&mut Cursor::new(&mut bytes), format)
        .unwrap();
    bytes
}

// =========================================================================
// Storage fixtures
// =========================================================================

/// Temp directory backed storage containing one file at `key`.
pub fn fs_storage_with(key: &str, bytes: &[u8]) -> (TempDir, FileSystemStorage) {
    let tmp = TempDir::new().unwrap();
    let storage = FileSystemStorage::new(tmp.path());
    storage.save(key, bytes).unwrap();
    (tmp, storage)
}
