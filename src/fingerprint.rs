//! Content fingerprint and idempotence gate.
//!
//! Rendering and encoding dominate the cost of a pipeline run, so callers can
//! ask the gate whether stored metadata is still valid before paying for it.
//!
//! ## Rule
//!
//! Stored metadata is reused if and only if:
//! 1. its `pipeline_version` equals [`PIPELINE_VERSION`],
//! 2. its `render_settings` equals [`settings_fingerprint`] of the running
//!    config, and
//! 3. the SHA-256 of the current source bytes matches the stored hash.
//!
//! The hash is content-based rather than mtime-based, so re-uploads of the
//! same bytes and storage copies don't trigger work. Any mismatch, including
//! an absent record or an error-shaped one, means reprocess. `force` bypasses
//! the gate unconditionally.
//!
//! Normalization can write `{stem}.jpg` over the source itself. The record's
//! `normalized_sha256` is the hash of that written file, so a source that is
//! now the normalized output also counts as unchanged.
//!
//! The settings fingerprint covers the encoding section and
//! `limits.max_original_side`, everything that shapes the written bytes
//! without being part of the pipeline version. Records written before the
//! fingerprint existed carry none and are treated as stale.

use crate::config::PipelineConfig;
use crate::metadata::{ImageMetadata, PIPELINE_VERSION, ProcessOutcome};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 of `bytes`, as a lowercase hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Short hash of the config values that change rendered output.
pub fn settings_fingerprint(config: &PipelineConfig) -> String {
    let e = &config.encoding;
    let canonical = format!(
        "raster={};normalized={};secondary={}@{};secondary_enabled={};max_original_side={}",
        e.raster_quality,
        e.normalized_quality,
        e.secondary_quality,
        e.secondary_speed,
        e.secondary_enabled,
        config.limits.max_original_side,
    );
    let mut hash = hash_bytes(canonical.as_bytes());
    hash.truncate(16);
    hash
}

/// Why the gate sent an asset back through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReprocessReason {
    Forced,
    NoPriorMetadata,
    VersionChanged { stored: u32 },
    SettingsChanged,
    ContentChanged,
}

impl fmt::Display for ReprocessReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forced => write!(f, "forced"),
            Self::NoPriorMetadata => write!(f, "no prior metadata"),
            Self::VersionChanged { stored } => {
                write!(f, "pipeline version {} -> {}", stored, PIPELINE_VERSION)
            }
            Self::SettingsChanged => write!(f, "render settings changed"),
            Self::ContentChanged => write!(f, "content changed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Reuse,
    Reprocess(ReprocessReason),
}

impl GateDecision {
    pub fn is_reuse(self) -> bool {
        matches!(self, Self::Reuse)
    }
}

/// Decide whether `existing` can stand for a source whose raw bytes hash to
/// `fresh_sha256`, rendered under the settings fingerprint `settings`.
pub fn check(
    existing: Option<&ProcessOutcome>,
    fresh_sha256: &str,
    settings: &str,
    force: bool,
) -> GateDecision {
    if force {
        return GateDecision::Reprocess(ReprocessReason::Forced);
    }
    let Some(meta) = existing.and_then(ProcessOutcome::metadata) else {
        return GateDecision::Reprocess(ReprocessReason::NoPriorMetadata);
    };
    if meta.pipeline_version != PIPELINE_VERSION {
        return GateDecision::Reprocess(ReprocessReason::VersionChanged {
            stored: meta.pipeline_version,
        });
    }
    if !matches_settings(meta, settings) {
        return GateDecision::Reprocess(ReprocessReason::SettingsChanged);
    }
    if matches_content(meta, fresh_sha256) {
        GateDecision::Reuse
    } else {
        GateDecision::Reprocess(ReprocessReason::ContentChanged)
    }
}

/// Whether the stored record describes content hashing to `sha256`.
fn matches_content(meta: &ImageMetadata, sha256: &str) -> bool {
    if sha256.is_empty() {
        return false;
    }
    meta.original.sha256 == sha256 || meta.normalized_sha256.as_deref() == Some(sha256)
}

fn matches_settings(meta: &ImageMetadata, settings: &str) -> bool {
    meta.render_settings.as_deref() == Some(settings)
}

/// Whether stored metadata carries the current pipeline version and render
/// settings. The cheap check batch runs use when not comparing content.
pub fn is_current(existing: Option<&ProcessOutcome>, settings: &str) -> bool {
    existing
        .and_then(ProcessOutcome::metadata)
        .is_some_and(|m| m.pipeline_version == PIPELINE_VERSION && matches_settings(m, settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ErrorKind, ErrorRecord, OriginalInfo, RejectReason};
    use std::collections::BTreeSet;

    fn stored(version: u32, sha: &str, normalized_sha: Option<&str>) -> ProcessOutcome {
        let mut meta = ImageMetadata::rejected(
            OriginalInfo {
                width: 800,
                height: 600,
                sha256: sha.to_string(),
                sharpness_score: None,
            },
            BTreeSet::new(),
            RejectReason::TooSmall,
        );
        meta.pipeline_version = version;
        meta.normalized_sha256 = normalized_sha.map(str::to_string);
        meta.render_settings = Some(SETTINGS.to_string());
        ProcessOutcome::Processed(meta)
    }

    const SETTINGS: &str = "0123456789abcdef";

    // =========================================================================
    // hash_bytes
    // =========================================================================

    #[test]
    fn hash_known_vector() {
        assert_eq!(
            hash_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hash_changes_with_content() {
        assert_ne!(hash_bytes(b"version 1"), hash_bytes(b"version 2"));
        assert_eq!(hash_bytes(b"").len(), 64);
    }

    // =========================================================================
    // check
    // =========================================================================

    #[test]
    fn same_version_same_hash_is_reused() {
        let existing = stored(PIPELINE_VERSION, "aaa", None);
        assert_eq!(check(Some(&existing), "aaa", SETTINGS, false), GateDecision::Reuse);
    }

    #[test]
    fn force_bypasses_gate() {
        let existing = stored(PIPELINE_VERSION, "aaa", None);
        assert_eq!(
            check(Some(&existing), "aaa", SETTINGS, true),
            GateDecision::Reprocess(ReprocessReason::Forced)
        );
    }

    #[test]
    fn missing_metadata_reprocesses() {
        assert_eq!(
            check(None, "aaa", SETTINGS, false),
            GateDecision::Reprocess(ReprocessReason::NoPriorMetadata)
        );
    }

    #[test]
    fn error_record_reprocesses() {
        let existing = ProcessOutcome::Error(ErrorRecord {
            error: ErrorKind::Unreadable,
            detail: None,
        });
        assert_eq!(
            check(Some(&existing), "aaa", SETTINGS, false),
            GateDecision::Reprocess(ReprocessReason::NoPriorMetadata)
        );
    }

    #[test]
    fn older_version_reprocesses_despite_hash_match() {
        let existing = stored(PIPELINE_VERSION - 1, "aaa", None);
        assert_eq!(
            check(Some(&existing), "aaa", SETTINGS, false),
            GateDecision::Reprocess(ReprocessReason::VersionChanged {
                stored: PIPELINE_VERSION - 1
            })
        );
    }

    #[test]
    fn different_hash_reprocesses() {
        let existing = stored(PIPELINE_VERSION, "aaa", None);
        assert_eq!(
            check(Some(&existing), "bbb", SETTINGS, false),
            GateDecision::Reprocess(ReprocessReason::ContentChanged)
        );
    }

    #[test]
    fn empty_stored_hash_never_matches() {
        let existing = stored(PIPELINE_VERSION, "", None);
        assert!(!check(Some(&existing), "", SETTINGS, false).is_reuse());
    }

    #[test]
    fn normalized_hash_counts_as_unchanged() {
        let existing = stored(PIPELINE_VERSION, "raw", Some("norm"));
        assert!(check(Some(&existing), "norm", SETTINGS, false).is_reuse());
        assert!(check(Some(&existing), "raw", SETTINGS, false).is_reuse());
        assert!(!check(Some(&existing), "other", SETTINGS, false).is_reuse());
    }

    #[test]
    fn changed_settings_reprocess_despite_hash_match() {
        let existing = stored(PIPELINE_VERSION, "aaa", None);
        assert_eq!(
            check(Some(&existing), "aaa", "fedcba9876543210", false),
            GateDecision::Reprocess(ReprocessReason::SettingsChanged)
        );
    }

    #[test]
    fn record_without_settings_reprocesses() {
        let mut existing = stored(PIPELINE_VERSION, "aaa", None);
        if let ProcessOutcome::Processed(meta) = &mut existing {
            meta.render_settings = None;
        }
        assert_eq!(
            check(Some(&existing), "aaa", SETTINGS, false),
            GateDecision::Reprocess(ReprocessReason::SettingsChanged)
        );
    }

    #[test]
    fn is_current_checks_version_and_settings() {
        assert!(is_current(Some(&stored(PIPELINE_VERSION, "x", None)), SETTINGS));
        assert!(!is_current(Some(&stored(1, "x", None)), SETTINGS));
        assert!(!is_current(Some(&stored(PIPELINE_VERSION, "x", None)), "other"));
        assert!(!is_current(None, SETTINGS));
    }

    // =========================================================================
    // settings_fingerprint
    // =========================================================================

    #[test]
    fn settings_fingerprint_tracks_render_config() {
        let base = PipelineConfig::default();
        let fp = settings_fingerprint(&base);
        assert_eq!(fp.len(), 16);
        assert_eq!(fp, settings_fingerprint(&PipelineConfig::default()));

        let mut quality = PipelineConfig::default();
        quality.encoding.raster_quality = 30;
        assert_ne!(settings_fingerprint(&quality), fp);

        let mut side = PipelineConfig::default();
        side.limits.max_original_side = 2400;
        assert_ne!(settings_fingerprint(&side), fp);

        let mut avif = PipelineConfig::default();
        avif.encoding.secondary_enabled = false;
        assert_ne!(settings_fingerprint(&avif), fp);
    }

    #[test]
    fn settings_fingerprint_ignores_validation_thresholds() {
        let mut config = PipelineConfig::default();
        config.quality.blur_threshold += 50.0;
        config.processing.max_processes = Some(1);
        assert_eq!(
            settings_fingerprint(&config),
            settings_fingerprint(&PipelineConfig::default())
        );
    }

    #[test]
    fn reason_display() {
        assert_eq!(ReprocessReason::Forced.to_string(), "forced");
        assert_eq!(
            ReprocessReason::VersionChanged { stored: 1 }.to_string(),
            format!("pipeline version 1 -> {PIPELINE_VERSION}")
        );
    }
}
