//! Pure Rust codec backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | EXIF orientation | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e) |

use super::backend::{BackendError, Decoded, ImageBackend};
use super::params::{EncodeParams, OutputFormat};
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::metadata::Orientation;
use image::{
    DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageFormat, ImageReader,
    RgbImage,
};
use std::io::Cursor;
use std::sync::LazyLock;
use tracing::debug;

/// Extensions whose decoders are compiled in.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of source file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Whether a file extension (any case) names a decodable source image.
pub fn is_supported_extension(ext: &str) -> bool {
    supported_input_extensions()
        .iter()
        .any(|e| e.eq_ignore_ascii_case(ext))
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBackend for RustBackend {
    fn decode(&self, bytes: &[u8]) -> Result<Decoded, BackendError> {
        let mut decoder = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .into_decoder()
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        // Orientation is best-effort: a malformed EXIF block must not make an
        // otherwise decodable image unreadable.
        let orientation = match decoder.orientation() {
            Ok(o) => Some(o),
            Err(e) => {
                debug!(error = %e, "ignoring unreadable EXIF orientation");
                None
            }
        };

        let mut img =
            DynamicImage::from_decoder(decoder).map_err(|e| BackendError::Decode(e.to_string()))?;

        let orientation_applied = match orientation {
            Some(o) if o != Orientation::NoTransforms => {
                img.apply_orientation(o);
                true
            }
            _ => false,
        };

        Ok(Decoded {
            pixels: img.into_rgb8(),
            orientation_applied,
        })
    }

    fn encode(&self, pixels: &RgbImage, params: &EncodeParams) -> Result<Vec<u8>, BackendError> {
        let mut buf = Vec::new();
        let quality = params.quality.value() as u8;
        let (width, height) = pixels.dimensions();
        match params.format {
            OutputFormat::Jpeg => JpegEncoder::new_with_quality(&mut buf, quality).write_image(
                pixels.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            ),
            OutputFormat::Avif => {
                let speed = params.speed.clamp(1, 10);
                AvifEncoder::new_with_speed_quality(&mut buf, speed, quality).write_image(
                    pixels.as_raw(),
                    width,
                    height,
                    ExtendedColorType::Rgb8,
                )
            }
        }
        .map_err(|e| BackendError::Encode(format!("{} encode failed: {}", params.format, e)))?;
        Ok(buf)
    }
}
