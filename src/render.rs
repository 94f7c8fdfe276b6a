//! Variant renderer.
//!
//! Produces every output file for one accepted source, entirely in memory:
//!
//! ```text
//! SourceImage (≤1600px, RGB)
//!   ├── {stem}.jpg                normalized original, JPEG q85
//!   ├── thumb   160x160 crop  ──▶ {stem}__thumb.jpg   + {stem}__thumb.avif
//!   ├── medium  fit 600x900   ──▶ {stem}__medium.jpg  + {stem}__medium.avif
//!   ├── large   fit 1200x1600 ──▶ {stem}__large.jpg   + {stem}__large.avif
//!   └── xlarge  fit 1600x2000 ──▶ {stem}__xlarge.jpg  + {stem}__xlarge.avif
//! ```
//!
//! Nothing is written here. The caller persists a [`RenderedSet`] only once
//! every raster encode has succeeded, so a partial variant set never becomes
//! visible. Variants render sequentially.

use crate::config::EncodingConfig;
use crate::imaging::operations::render_variant;
use crate::imaging::{
    BackendError, EncodeParams, ImageBackend, OutputFormat, Quality, VARIANTS, VariantLabel,
};
use crate::intake::SourceImage;
use crate::naming::{normalized_name, variant_name};
use image::RgbImage;
use tracing::{debug, warn};

/// One encoded output, named but not yet stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFile {
    /// File name (no directory), e.g. `abc__thumb.jpg`.
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct RenderedVariant {
    pub label: VariantLabel,
    pub width: u32,
    pub height: u32,
    pub jpeg: EncodedFile,
    /// `None` when the secondary encode failed or is disabled.
    pub avif: Option<EncodedFile>,
}

#[derive(Debug, Clone)]
pub struct RenderedSet {
    pub normalized: EncodedFile,
    /// In variant-table order.
    pub variants: Vec<RenderedVariant>,
}

impl RenderedSet {
    /// All files in write order: normalized original first.
    pub fn files(&self) -> impl Iterator<Item = &EncodedFile> {
        std::iter::once(&self.normalized).chain(
            self.variants
                .iter()
                .flat_map(|v| std::iter::once(&v.jpeg).chain(v.avif.as_ref())),
        )
    }
}

/// Encode the normalized original and all four variants of `source`.
///
/// A raster encode failure fails the whole render. A secondary encode
/// failure only clears that variant's secondary slot.
pub fn render<B: ImageBackend + ?Sized>(
    backend: &B,
    source: &SourceImage,
    stem: &str,
    encoding: &EncodingConfig,
) -> Result<RenderedSet, BackendError> {
    let normalized = EncodedFile {
        name: normalized_name(stem),
        bytes: encode(
            backend,
            &source.pixels,
            OutputFormat::Jpeg,
            encoding.normalized_quality,
            encoding,
        )?,
    };

    let mut variants = Vec::with_capacity(VARIANTS.len());
    for spec in &VARIANTS {
        let pixels = render_variant(&source.pixels, spec);
        let (width, height) = pixels.dimensions();
        debug!(label = %spec.label, width, height, "rendered variant");

        let jpeg = EncodedFile {
            name: variant_name(stem, spec.label, OutputFormat::Jpeg),
            bytes: encode(
                backend,
                &pixels,
                OutputFormat::Jpeg,
                encoding.raster_quality,
                encoding,
            )?,
        };

        let avif = if encoding.secondary_enabled {
            match encode(
                backend,
                &pixels,
                OutputFormat::Avif,
                encoding.secondary_quality,
                encoding,
            ) {
                Ok(bytes) => Some(EncodedFile {
                    name: variant_name(stem, spec.label, OutputFormat::Avif),
                    bytes,
                }),
                Err(e) => {
                    warn!(label = %spec.label, error = %e, "secondary encode failed");
                    None
                }
            }
        } else {
            None
        };

        variants.push(RenderedVariant {
            label: spec.label,
            width,
            height,
            jpeg,
            avif,
        });
    }

    Ok(RenderedSet {
        normalized,
        variants,
    })
}

fn encode<B: ImageBackend + ?Sized>(
    backend: &B,
    pixels: &RgbImage,
    format: OutputFormat,
    quality: u32,
    encoding: &EncodingConfig,
) -> Result<Vec<u8>, BackendError> {
    backend.encode(
        pixels,
        &EncodeParams {
            format,
            quality: Quality::new(quality),
            speed: encoding.secondary_speed,
        },
    )
}
