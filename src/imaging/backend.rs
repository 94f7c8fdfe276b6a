//! Image codec backend trait and shared types.
//!
//! The [`ImageBackend`] trait covers the two codec operations the pipeline
//! needs: decode raw bytes into an oriented RGB buffer, and encode an RGB
//! buffer into one of the [`OutputFormat`]s. Pixel transforms (resize, crop,
//! sharpen, scoring) are pure functions in [`operations`](super::operations)
//! and do not go through the backend.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust, statically
//! linked.

use super::params::EncodeParams;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Result of a decode: pixels normalized to 8-bit RGB.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub pixels: RgbImage,
    /// Whether the embedded EXIF orientation was read and applied.
    /// `false` when the file had no orientation tag or reading it failed.
    pub orientation_applied: bool,
}

/// Trait for image codec backends.
pub trait ImageBackend: Sync {
    /// Decode raw bytes, apply EXIF orientation best-effort, and convert to RGB.
    fn decode(&self, bytes: &[u8]) -> Result<Decoded, BackendError>;

    /// Encode RGB pixels into an in-memory file.
    fn encode(&self, pixels: &RgbImage, params: &EncodeParams) -> Result<Vec<u8>, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::RustBackend;
    use crate::imaging::params::{OutputFormat, Quality};
    use std::sync::Mutex;

    /// Backend that decodes for real but records encode calls and can be told
    /// to fail a particular output format.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    #[derive(Default)]
    pub struct MockBackend {
        pub fail_format: Option<OutputFormat>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Decode { bytes: usize },
        Encode {
            format: OutputFormat,
            width: u32,
            height: u32,
            quality: u32,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing(format: OutputFormat) -> Self {
            Self {
                fail_format: Some(format),
                operations: Mutex::new(Vec::new()),
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn encodes(&self, format: OutputFormat) -> Vec<RecordedOp> {
            self.get_operations()
                .into_iter()
                .filter(|op| matches!(op, RecordedOp::Encode { format: f, .. } if *f == format))
                .collect()
        }
    }

    impl ImageBackend for MockBackend {
        fn decode(&self, bytes: &[u8]) -> Result<Decoded, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Decode { bytes: bytes.len() });
            RustBackend::new().decode(bytes)
        }

        fn encode(&self, pixels: &RgbImage, params: &EncodeParams) -> Result<Vec<u8>, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Encode {
                format: params.format,
                width: pixels.width(),
                height: pixels.height(),
                quality: params.quality.value(),
            });
            if self.fail_format == Some(params.format) {
                return Err(BackendError::Encode(format!(
                    "mock refuses to encode {}",
                    params.format
                )));
            }
            Ok(format!("{}:{}x{}", params.format, pixels.width(), pixels.height()).into_bytes())
        }
    }

    #[test]
    fn mock_records_encode() {
        let backend = MockBackend::new();
        let pixels = RgbImage::new(40, 30);
        let out = backend
            .encode(
                &pixels,
                &EncodeParams {
                    format: OutputFormat::Jpeg,
                    quality: Quality::new(82),
                    speed: 6,
                },
            )
            .unwrap();
        assert_eq!(out, b"jpg:40x30");

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(
            &ops[0],
            RecordedOp::Encode {
                format: OutputFormat::Jpeg,
                width: 40,
                height: 30,
                quality: 82,
            }
        ));
    }

    #[test]
    fn mock_fails_requested_format_only() {
        let backend = MockBackend::failing(OutputFormat::Avif);
        let pixels = RgbImage::new(8, 8);
        let params = |format| EncodeParams {
            format,
            quality: Quality::new(80),
            speed: 10,
        };
        assert!(backend.encode(&pixels, &params(OutputFormat::Avif)).is_err());
        assert!(backend.encode(&pixels, &params(OutputFormat::Jpeg)).is_ok());
        assert_eq!(backend.encodes(OutputFormat::Avif).len(), 1);
    }
}
