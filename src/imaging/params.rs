//! Parameter types for image operations.
//!
//! These structs describe *what* to produce, not *how*. The renderer reads the
//! variant table and sharpening presets from here and hands [`EncodeParams`]
//! to the [`backend`](super::backend), which does the codec work.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100). Clamped on construction.
//! - [`Sharpening`]: Unsharp-mask parameters (radius, percent, threshold).
//! - [`OutputFormat`]: JPEG (primary raster) or AVIF (secondary).
//! - [`VariantSpec`]: One row of the fixed variant table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(82)
    }
}

/// Unsharp-mask parameters.
///
/// - `radius`: Gaussian sigma of the blur the mask is built from
/// - `percent`: strength of the correction (100 = add the full difference back)
/// - `threshold`: minimum per-channel difference before a pixel is touched
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sharpening {
    pub radius: f32,
    pub percent: u32,
    pub threshold: u8,
}

impl Sharpening {
    /// Stronger pass for the small square thumbnail, where downscaling loses
    /// the most detail.
    pub fn thumbnail() -> Self {
        Self {
            radius: 1.2,
            percent: 130,
            threshold: 3,
        }
    }

    /// Mild pass applied to every aspect-preserving variant.
    pub fn standard() -> Self {
        Self {
            radius: 1.2,
            percent: 110,
            threshold: 3,
        }
    }
}

/// Encoded output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// Primary lossy raster format; always written.
    Jpeg,
    /// Secondary modern format; best-effort.
    Avif,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Avif => "avif",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Parameters for a single encode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeParams {
    pub format: OutputFormat,
    pub quality: Quality,
    /// AVIF encoder speed (1 = slowest/best, 10 = fastest). Ignored for JPEG.
    pub speed: u8,
}

/// Variant label. Serialized lowercase; the derived order is the table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantLabel {
    Thumb,
    Medium,
    Large,
    Xlarge,
}

impl VariantLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Thumb => "thumb",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::Xlarge => "xlarge",
        }
    }
}

impl fmt::Display for VariantLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a variant is fitted into its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropMode {
    /// Center square crop, then resize to exactly `max_width` x `max_width`.
    Square,
    /// Shrink to fit within the bounds, preserving aspect; never enlarges.
    Fit,
}

/// One row of the variant table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantSpec {
    pub label: VariantLabel,
    pub max_width: u32,
    pub max_height: u32,
    pub crop: CropMode,
}

impl VariantSpec {
    pub fn sharpening(&self) -> Sharpening {
        match self.crop {
            CropMode::Square => Sharpening::thumbnail(),
            CropMode::Fit => Sharpening::standard(),
        }
    }
}

/// The fixed variant set. Changing any row requires bumping
/// [`PIPELINE_VERSION`](crate::metadata::PIPELINE_VERSION).
pub const VARIANTS: [VariantSpec; 4] = [
    VariantSpec {
        label: VariantLabel::Thumb,
        max_width: 160,
        max_height: 160,
        crop: CropMode::Square,
    },
    VariantSpec {
        label: VariantLabel::Medium,
        max_width: 600,
        max_height: 900,
        crop: CropMode::Fit,
    },
    VariantSpec {
        label: VariantLabel::Large,
        max_width: 1200,
        max_height: 1600,
        crop: CropMode::Fit,
    },
    VariantSpec {
        label: VariantLabel::Xlarge,
        max_width: 1600,
        max_height: 2000,
        crop: CropMode::Fit,
    },
];
