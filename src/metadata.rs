//! The persisted result of a pipeline run.
//!
//! A [`ProcessOutcome`] is what callers store on the owning entity (profile
//! photo, gallery image, blog post). It serializes as plain JSON and is either
//! a full [`ImageMetadata`] record or a short [`ErrorRecord`]:
//!
//! ```json
//! {
//!   "pipeline_version": 2,
//!   "original": { "width": 1600, "height": 1067, "sha256": "…", "sharpness_score": 1234.56 },
//!   "normalized": "abc.jpg",
//!   "normalized_sha256": "…",
//!   "variants": {
//!     "thumb":  { "jpeg": "abc__thumb.jpg",  "avif": "abc__thumb.avif",  "width": 160,  "height": 160 },
//!     "medium": { "jpeg": "abc__medium.jpg", "avif": null,               "width": 600,  "height": 400 }
//!   },
//!   "flags": ["low_res"],
//!   "render_settings": "5be1c0d2a9f4e377",
//!   "processed_at": "2025-08-14T09:30:00Z"
//! }
//! ```
//!
//! ```json
//! { "error": "file-too-large" }
//! ```

use crate::imaging::{VARIANTS, VariantLabel};
use crate::naming::AssetKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Bumped whenever the variant set or encoding parameters change. A stored
/// record with a different version is stale regardless of its hash.
///
/// History: 1 = thumb/medium/large, 2 = adds xlarge.
pub const PIPELINE_VERSION: u32 = 2;

/// Non-fatal quality flags, plus `rejected` for terminal validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    LowRes,
    Blurry,
    Rejected,
}

impl QualityFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LowRes => "low_res",
            Self::Blurry => "blurry",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for QualityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a decodable image was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    TooSmall,
    ExtremeAspect,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TooSmall => "too_small",
            Self::ExtremeAspect => "extreme_aspect",
        })
    }
}

/// Facts about the (possibly downscaled) normalized source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginalInfo {
    pub width: u32,
    pub height: u32,
    /// SHA-256 of the raw source bytes, before any decoding or resizing.
    pub sha256: String,
    /// Edge-variance sharpness, rounded to two decimals. Absent on rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharpness_score: Option<f64>,
}

/// Files written for one variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantFiles {
    pub jpeg: String,
    /// `None` when the secondary encode failed or is disabled.
    pub avif: Option<String>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub pipeline_version: u32,
    pub original: OriginalInfo,
    /// File name of the re-encoded original. Absent on rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized: Option<String>,
    /// SHA-256 of the normalized encoding as written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_sha256: Option<String>,
    #[serde(default)]
    pub variants: BTreeMap<VariantLabel, VariantFiles>,
    #[serde(default)]
    pub flags: BTreeSet<QualityFlag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    /// Fingerprint of the render settings the record was produced under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_settings: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl ImageMetadata {
    /// A terminal rejection: only `original`, `flags` and `reason` populated.
    pub fn rejected(
        original: OriginalInfo,
        mut flags: BTreeSet<QualityFlag>,
        reason: RejectReason,
    ) -> Self {
        flags.insert(QualityFlag::Rejected);
        Self {
            pipeline_version: PIPELINE_VERSION,
            original,
            normalized: None,
            normalized_sha256: None,
            variants: BTreeMap::new(),
            flags,
            reason: Some(reason),
            render_settings: None,
            processed_at: None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.flags.contains(&QualityFlag::Rejected)
    }

    pub fn has_flag(&self, flag: QualityFlag) -> bool {
        self.flags.contains(&flag)
    }
}

/// Intake failure kinds, serialized with their taxonomy names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "file-missing")]
    FileMissing,
    #[serde(rename = "file-too-large")]
    FileTooLarge,
    #[serde(rename = "unreadable")]
    Unreadable,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FileMissing => "file-missing",
            Self::FileTooLarge => "file-too-large",
            Self::Unreadable => "unreadable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error-shaped result: `{ "error": "<kind>" }`, with an optional detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorRecord {
    pub error: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// What the pipeline hands back to its caller for storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProcessOutcome {
    Processed(ImageMetadata),
    Error(ErrorRecord),
}

impl ProcessOutcome {
    pub fn metadata(&self) -> Option<&ImageMetadata> {
        match self {
            Self::Processed(meta) => Some(meta),
            Self::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<ErrorKind> {
        match self {
            Self::Processed(_) => None,
            Self::Error(record) => Some(record.error),
        }
    }

    /// Processed, not rejected, with the full variant set.
    pub fn is_usable(&self) -> bool {
        self.metadata()
            .is_some_and(|m| !m.is_rejected() && m.variants.len() == VARIANTS.len())
    }

    /// Key the owning entity should point at once this outcome is stored:
    /// the normalized sibling when one was written, otherwise `source_key`.
    pub fn asset_key(&self, source_key: &str) -> String {
        match self.metadata().and_then(|m| m.normalized.as_deref()) {
            Some(name) => AssetKey::parse(source_key).sibling(name),
            None => source_key.to_string(),
        }
    }
}
