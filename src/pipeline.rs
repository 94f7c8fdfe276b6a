//! End-to-end pipeline: intake → gate → render → persist → metadata.
//!
//! One invocation handles one asset, synchronously, and always returns a
//! structured [`ProcessOutcome`] for expected failures (missing file, too
//! large, unreadable, rejected). Only unexpected failures (storage I/O, a
//! raster encode) surface as [`PipelineError`], and nothing is written
//! before every output has been encoded.
//!
//! ```text
//! AssetSource::resolve ─▶ RawAsset::read ─▶ fingerprint::check ─▶ intake::validate
//!                              │                   │                    │
//!                         {error: ...}         Unchanged           Rejected meta
//!                                                                       │
//!                                         render::render ─▶ persist::persist ─▶ ImageMetadata
//! ```
//!
//! [`Pipeline::process_gated`] consults the gate on the raw-byte hash before
//! decoding, so an unchanged asset costs one read and one hash.

use crate::config::PipelineConfig;
use crate::fingerprint::{self, GateDecision, ReprocessReason, hash_bytes};
use crate::imaging::{BackendError, ImageBackend, RustBackend};
use crate::intake::{IntakeError, RawAsset, Validation, validate};
use crate::metadata::{ImageMetadata, PIPELINE_VERSION, ProcessOutcome, VariantFiles};
use crate::persist::persist;
use crate::render::render;
use crate::storage::{AssetSource, Storage, StorageError};
use chrono::Utc;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("image encoding failed: {0}")]
    Backend(#[from] BackendError),
}

/// Result of a gated run.
#[derive(Debug, Clone, PartialEq)]
pub enum GatedOutcome {
    /// Stored metadata is still valid; nothing was rendered or written.
    Unchanged,
    /// The asset went through the pipeline.
    Processed {
        outcome: ProcessOutcome,
        reason: ReprocessReason,
    },
}

pub struct Pipeline<B: ImageBackend = RustBackend> {
    backend: B,
    config: PipelineConfig,
    render_settings: String,
}

impl Pipeline<RustBackend> {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_backend(RustBackend::new(), config)
    }
}

impl<B: ImageBackend> Pipeline<B> {
    pub fn with_backend(backend: B, config: PipelineConfig) -> Self {
        let render_settings = fingerprint::settings_fingerprint(&config);
        Self {
            backend,
            config,
            render_settings,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Settings fingerprint stamped on every record this pipeline writes.
    pub fn render_settings(&self) -> &str {
        &self.render_settings
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Process `key` unconditionally.
    pub fn process(&self, storage: &dyn Storage, key: &str) -> Result<ProcessOutcome, PipelineError> {
        let source = AssetSource::resolve(storage, key);
        match RawAsset::read(&source, self.config.limits.max_file_bytes) {
            Ok(raw) => self.run(&source, &raw),
            Err(e) => intake_failure(key, e),
        }
    }

    /// Process `key` unless `existing` already describes the same content at
    /// the current pipeline version and render settings. `force` skips the
    /// comparison.
    pub fn process_gated(
        &self,
        storage: &dyn Storage,
        key: &str,
        existing: Option<&ProcessOutcome>,
        force: bool,
    ) -> Result<GatedOutcome, PipelineError> {
        let source = AssetSource::resolve(storage, key);
        debug!(asset = key, mode = source.describe(), "resolved asset source");

        let raw = match RawAsset::read(&source, self.config.limits.max_file_bytes) {
            Ok(raw) => raw,
            Err(e) => {
                let outcome = intake_failure(key, e)?;
                return Ok(GatedOutcome::Processed {
                    outcome,
                    reason: reason_for(existing, force),
                });
            }
        };

        let reason = match fingerprint::check(existing, &raw.sha256, &self.render_settings, force) {
            GateDecision::Reuse => {
                debug!(asset = key, "content, version and settings unchanged");
                return Ok(GatedOutcome::Unchanged);
            }
            GateDecision::Reprocess(reason) => reason,
        };
        debug!(asset = key, %reason, "processing");

        let outcome = self.run(&source, &raw)?;
        Ok(GatedOutcome::Processed { outcome, reason })
    }

    fn run(&self, source: &AssetSource<'_>, raw: &RawAsset) -> Result<ProcessOutcome, PipelineError> {
        let key = source.key();
        let validated = match validate(
            raw,
            &self.backend,
            &self.config.limits,
            &self.config.quality,
        ) {
            Ok(Validation::Accepted(v)) => v,
            Ok(Validation::Rejected(mut meta)) => {
                meta.render_settings = Some(self.render_settings.clone());
                info!(
                    asset = key,
                    reason = ?meta.reason,
                    "image rejected"
                );
                return Ok(ProcessOutcome::Processed(meta));
            }
            Err(e) => return intake_failure(key, e),
        };

        let stem = source.asset_key().stem;
        let set = render(&self.backend, &validated.source, &stem, &self.config.encoding)?;
        persist(source, &set)?;

        let variants: BTreeMap<_, _> = set
            .variants
            .iter()
            .map(|v| {
                (
                    v.label,
                    VariantFiles {
                        jpeg: v.jpeg.name.clone(),
                        avif: v.avif.as_ref().map(|f| f.name.clone()),
                        width: v.width,
                        height: v.height,
                    },
                )
            })
            .collect();

        let meta = ImageMetadata {
            pipeline_version: PIPELINE_VERSION,
            original: validated.original,
            normalized: Some(set.normalized.name.clone()),
            normalized_sha256: Some(hash_bytes(&set.normalized.bytes)),
            variants,
            flags: validated.flags,
            reason: None,
            render_settings: Some(self.render_settings.clone()),
            processed_at: Some(Utc::now()),
        };
        info!(
            asset = key,
            mode = source.describe(),
            width = meta.original.width,
            height = meta.original.height,
            flags = ?meta.flags,
            "image processed"
        );
        Ok(ProcessOutcome::Processed(meta))
    }
}

/// Expected intake failures become error records; storage faults escalate.
fn intake_failure(key: &str, e: IntakeError) -> Result<ProcessOutcome, PipelineError> {
    info!(asset = key, error = %e, "intake failed");
    Ok(ProcessOutcome::Error(e.into_record()?))
}

/// Reprocess reason when the gate never got a hash to compare.
fn reason_for(existing: Option<&ProcessOutcome>, force: bool) -> ReprocessReason {
    if force {
        ReprocessReason::Forced
    } else if existing.and_then(ProcessOutcome::metadata).is_none() {
        ReprocessReason::NoPriorMetadata
    } else {
        ReprocessReason::ContentChanged
    }
}
