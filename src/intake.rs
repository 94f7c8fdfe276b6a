//! Intake and validation.
//!
//! Turns raw asset bytes into a [`SourceImage`] ready for rendering, or into
//! a terminal outcome. The order of checks is fixed:
//!
//! 1. Locate and size-check the asset (`file-missing`, `file-too-large`)
//! 2. Decode (`unreadable`), apply EXIF orientation best-effort, force RGB
//! 3. Hash the raw bytes
//! 4. Reject below the minimum dimensions (`too_small`)
//! 5. Flag `low_res` when the shorter side is small
//! 6. Reject beyond the aspect ratio limit (`extreme_aspect`)
//! 7. Downscale so the longer side fits the normalized ceiling
//! 8. Score sharpness and flag `blurry`
//!
//! Steps 1 and 3 live in [`RawAsset::read`] so callers can consult the
//! idempotence gate before paying for a decode.

use crate::config::{LimitsConfig, QualityConfig};
use crate::fingerprint::hash_bytes;
use crate::imaging::ImageBackend;
use crate::imaging::calculations::aspect_ratio;
use crate::imaging::operations::{cap_size, sharpness_score};
use crate::metadata::{
    ErrorKind, ErrorRecord, ImageMetadata, OriginalInfo, QualityFlag, RejectReason,
};
use crate::storage::{AssetSource, StorageError};
use image::RgbImage;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("file missing: {0}")]
    FileMissing(String),
    #[error("file too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: u64, limit: u64 },
    #[error("unreadable: {0}")]
    Unreadable(String),
    /// Storage failed for a reason other than absence. Not part of the
    /// error-record taxonomy; escalates to the caller.
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl IntakeError {
    /// Taxonomy kind for the error record, or `None` for unexpected failures.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::FileMissing(_) => Some(ErrorKind::FileMissing),
            Self::FileTooLarge { .. } => Some(ErrorKind::FileTooLarge),
            Self::Unreadable(_) => Some(ErrorKind::Unreadable),
            Self::Storage(_) => None,
        }
    }

    /// Error record for taxonomy errors; storage faults are handed back.
    pub fn into_record(self) -> Result<ErrorRecord, StorageError> {
        let (error, detail) = match self {
            Self::Storage(e) => return Err(e),
            Self::FileMissing(_) => (ErrorKind::FileMissing, None),
            Self::FileTooLarge { .. } => (ErrorKind::FileTooLarge, None),
            Self::Unreadable(msg) => (ErrorKind::Unreadable, Some(msg)),
        };
        Ok(ErrorRecord { error, detail })
    }
}

impl From<StorageError> for IntakeError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(key) => Self::FileMissing(key),
            other => Self::Storage(other),
        }
    }
}

/// Raw bytes of one asset plus their content hash.
#[derive(Debug, Clone)]
pub struct RawAsset {
    pub bytes: Vec<u8>,
    pub sha256: String,
}

impl RawAsset {
    /// Read the full asset, refusing anything above `max_bytes`.
    ///
    /// The size is checked before reading when the backend can report it,
    /// and again on the bytes actually read.
    pub fn read(source: &AssetSource<'_>, max_bytes: u64) -> Result<Self, IntakeError> {
        if let Some(size) = source.size_hint()?
            && size > max_bytes
        {
            return Err(IntakeError::FileTooLarge {
                size,
                limit: max_bytes,
            });
        }
        let bytes = source.read()?;
        Self::from_bytes(bytes, max_bytes)
    }

    /// Wrap bytes already in memory (upload buffers, tests).
    pub fn from_bytes(bytes: Vec<u8>, max_bytes: u64) -> Result<Self, IntakeError> {
        let size = bytes.len() as u64;
        if size > max_bytes {
            return Err(IntakeError::FileTooLarge {
                size,
                limit: max_bytes,
            });
        }
        let sha256 = hash_bytes(&bytes);
        Ok(Self { bytes, sha256 })
    }
}

/// Decoded, oriented, RGB, size-capped source. Never persisted itself.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub pixels: RgbImage,
    pub orientation_corrected: bool,
}

impl SourceImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// An accepted source with the facts recorded about it.
#[derive(Debug, Clone)]
pub struct Validated {
    pub source: SourceImage,
    /// Dimensions after downscaling, raw-byte hash, sharpness.
    pub original: OriginalInfo,
    /// Non-fatal flags (`low_res`, `blurry`).
    pub flags: BTreeSet<QualityFlag>,
}

#[derive(Debug, Clone)]
pub enum Validation {
    Accepted(Validated),
    /// Terminal: only `original`, `flags` and `reason` are populated.
    Rejected(ImageMetadata),
}

/// Decode and validate one asset.
pub fn validate<B: ImageBackend + ?Sized>(
    raw: &RawAsset,
    backend: &B,
    limits: &LimitsConfig,
    quality: &QualityConfig,
) -> Result<Validation, IntakeError> {
    let decoded = backend
        .decode(&raw.bytes)
        .map_err(|e| IntakeError::Unreadable(e.to_string()))?;
    let (w, h) = decoded.pixels.dimensions();
    let mut flags = BTreeSet::new();
    let mut original = OriginalInfo {
        width: w,
        height: h,
        sha256: raw.sha256.clone(),
        sharpness_score: None,
    };

    if w < limits.min_width || h < limits.min_height {
        debug!(width = w, height = h, "rejected: too small");
        return Ok(Validation::Rejected(ImageMetadata::rejected(
            original,
            flags,
            RejectReason::TooSmall,
        )));
    }
    if w.min(h) < limits.warn_min_side {
        flags.insert(QualityFlag::LowRes);
    }
    if aspect_ratio(w, h) > limits.max_aspect_ratio {
        debug!(width = w, height = h, "rejected: extreme aspect");
        return Ok(Validation::Rejected(ImageMetadata::rejected(
            original,
            flags,
            RejectReason::ExtremeAspect,
        )));
    }

    let pixels = cap_size(decoded.pixels, limits.max_original_side);
    (original.width, original.height) = pixels.dimensions();

    let score = round2(sharpness_score(&pixels));
    original.sharpness_score = Some(score);
    if score < quality.blur_threshold {
        flags.insert(QualityFlag::Blurry);
    }

    Ok(Validation::Accepted(Validated {
        source: SourceImage {
            pixels,
            orientation_corrected: decoded.orientation_applied,
        },
        original,
        flags,
    }))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::RustBackend;
    use crate::storage::{MemoryStorage, Storage};
    use crate::test_helpers::*;

    fn run(bytes: Vec<u8>) -> Result<Validation, IntakeError> {
        let limits = LimitsConfig::default();
        let raw = RawAsset::from_bytes(bytes, limits.max_file_bytes)?;
        validate(&raw, &RustBackend::new(), &limits, &QualityConfig::default())
    }

    fn accepted(bytes: Vec<u8>) -> Validated {
        match run(bytes).unwrap() {
            Validation::Accepted(v) => v,
            Validation::Rejected(meta) => panic!("unexpected rejection: {:?}", meta.reason),
        }
    }

    fn rejected(bytes: Vec<u8>) -> ImageMetadata {
        match run(bytes).unwrap() {
            Validation::Rejected(meta) => meta,
            Validation::Accepted(_) => panic!("expected rejection"),
        }
    }

    // =========================================================================
    // RawAsset
    // =========================================================================

    #[test]
    fn read_missing_key_is_file_missing() {
        let storage = MemoryStorage::new();
        let source = AssetSource::resolve(&storage, "gone.jpg");
        let err = RawAsset::read(&source, 100).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::FileMissing));
    }

    #[test]
    fn read_oversize_is_file_too_large() {
        let (_tmp, storage) = fs_storage_with("big.jpg", &[0u8; 101]);
        let source = AssetSource::resolve(&storage, "big.jpg");
        assert!(source.is_local());
        let err = RawAsset::read(&source, 100).unwrap_err();
        assert!(matches!(err, IntakeError::FileTooLarge { size: 101, limit: 100 }));
        assert_eq!(err.into_record().unwrap().error, ErrorKind::FileTooLarge);
    }

    #[test]
    fn read_at_limit_is_accepted() {
        let storage = MemoryStorage::new();
        storage.save("ok.bin", &[7u8; 100]).unwrap();
        let source = AssetSource::resolve(&storage, "ok.bin");
        let raw = RawAsset::read(&source, 100).unwrap();
        assert_eq!(raw.bytes.len(), 100);
        assert_eq!(raw.sha256, hash_bytes(&[7u8; 100]));
    }

    // =========================================================================
    // validate
    // =========================================================================

    #[test]
    fn garbage_bytes_are_unreadable() {
        let err = run(b"definitely not an image".to_vec()).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Unreadable));
        assert!(err.into_record().unwrap().detail.is_some());
    }

    #[test]
    fn too_small_is_rejected_with_original_dims() {
        let meta = rejected(encode_png(&checkerboard(200, 200, 8)));
        assert_eq!(meta.reason, Some(RejectReason::TooSmall));
        assert!(meta.is_rejected());
        assert!(meta.variants.is_empty());
        assert_eq!((meta.original.width, meta.original.height), (200, 200));
        assert_eq!(meta.original.sharpness_score, None);
    }

    #[test]
    fn one_short_side_is_enough_to_reject() {
        let meta = rejected(encode_png(&checkerboard(600, 239, 8)));
        assert_eq!(meta.reason, Some(RejectReason::TooSmall));
    }

    #[test]
    fn extreme_aspect_is_rejected() {
        let meta = rejected(encode_jpeg(&checkerboard(1500, 300, 8)));
        assert_eq!(meta.reason, Some(RejectReason::ExtremeAspect));
        assert!(meta.has_flag(QualityFlag::LowRes));
    }

    #[test]
    fn minimum_size_is_checked_before_aspect() {
        // 5:1 but only 200 tall
        let meta = rejected(encode_jpeg(&checkerboard(1000, 200, 8)));
        assert_eq!(meta.reason, Some(RejectReason::TooSmall));
    }

    #[test]
    fn aspect_exactly_at_limit_is_accepted() {
        let v = accepted(encode_png(&checkerboard(900, 300, 6)));
        assert!(v.flags.contains(&QualityFlag::LowRes));
    }

    #[test]
    fn low_res_flag_is_non_fatal() {
        let v = accepted(encode_png(&checkerboard(480, 640, 6)));
        assert_eq!(v.flags, BTreeSet::from([QualityFlag::LowRes]));
        assert_eq!((v.original.width, v.original.height), (480, 640));
    }

    #[test]
    fn large_source_is_downscaled() {
        let v = accepted(encode_jpeg(&checkerboard(3000, 2000, 12)));
        assert_eq!((v.source.width(), v.source.height()), (1600, 1067));
        assert_eq!((v.original.width, v.original.height), (1600, 1067));
        assert!(v.flags.is_empty());
    }

    #[test]
    fn smooth_image_is_flagged_blurry() {
        let v = accepted(encode_png(&gradient(800, 600)));
        assert!(v.flags.contains(&QualityFlag::Blurry));
        assert!(v.original.sharpness_score.unwrap() < 60.0);
    }

    #[test]
    fn blur_threshold_is_configurable() {
        let limits = LimitsConfig::default();
        let raw = RawAsset::from_bytes(encode_png(&gradient(800, 600)), limits.max_file_bytes)
            .unwrap();
        let lenient = QualityConfig {
            blur_threshold: 0.0,
        };
        match validate(&raw, &RustBackend::new(), &limits, &lenient).unwrap() {
            Validation::Accepted(v) => assert!(!v.flags.contains(&QualityFlag::Blurry)),
            Validation::Rejected(_) => panic!("expected acceptance"),
        }
    }

    #[test]
    fn sharpness_is_rounded_to_two_decimals() {
        let v = accepted(encode_png(&checkerboard(600, 600, 3)));
        let score = v.original.sharpness_score.unwrap();
        assert_eq!(score, round2(score));
    }

    #[test]
    fn hash_is_of_raw_bytes() {
        let bytes = encode_png(&checkerboard(300, 300, 5));
        let expected = hash_bytes(&bytes);
        let v = accepted(bytes);
        assert_eq!(v.original.sha256, expected);
    }
}
