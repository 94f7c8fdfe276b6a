//! Image processing, pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode + orient** | `image::ImageReader` + EXIF orientation |
//! | **Downscale / fit** | Lanczos3 resize |
//! | **Square thumbnail** | center crop + resize |
//! | **Sharpen** | Gaussian blur based unsharp mask |
//! | **Sharpness score** | 3x3 edge filter + histogram variance |
//! | **Encode** | JPEG encoder, AVIF via rav1e |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Variant table, quality and sharpening presets
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: Pixel transforms built on `image::imageops`

pub mod backend;
pub mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Decoded, ImageBackend};
pub use params::{
    CropMode, EncodeParams, OutputFormat, Quality, Sharpening, VARIANTS, VariantLabel, VariantSpec,
};
pub use rust_backend::{RustBackend, is_supported_extension, supported_input_extensions};
