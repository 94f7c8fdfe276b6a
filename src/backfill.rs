//! Batch backfill over a media root.
//!
//! Regenerates variants and metadata for every image entity under a
//! directory, the way a maintenance command would after a pipeline version
//! bump or a bulk import.
//!
//! ## Entities and the metadata store
//!
//! An entity is identified by its asset's directory plus stem
//! (`gallery/7/pic`), so it keeps its identity when normalization turns
//! `pic.png` into `pic.jpg`. The [`MetadataStore`] maps each entity id to its
//! current asset key and stored [`ProcessOutcome`]:
//!
//! ```json
//! {
//!   "gallery/7/pic": {
//!     "asset": "gallery/7/pic.jpg",
//!     "image_meta": { "pipeline_version": 2, "original": { ... }, ... }
//!   }
//! }
//! ```
//!
//! The store lives at `<root>/.photo-variants.json` unless told otherwise.
//! A missing or unparseable store loads as empty.
//!
//! ## Selection
//!
//! | Mode | Entity is processed when |
//! |---|---|
//! | `force` | always |
//! | `reprocess_if_changed` | the idempotence gate says so (hash, version or settings) |
//! | default | stored metadata is not at the current pipeline version and render settings |
//!
//! `limit` caps how many entities are handed to the pipeline. Outside `force`,
//! a run that reproduces the stored record exactly, such as the same error
//! record for a file that is still unreadable, counts as skipped.
//!
//! ## Parallelism
//!
//! Entities run in parallel on the global rayon pool; each entity runs the
//! pipeline sequentially. Results are applied to the store afterwards, one
//! entity at a time. A failed entity keeps its previous metadata and the
//! batch continues.

use crate::fingerprint;
use crate::imaging::{ImageBackend, is_supported_extension};
use crate::metadata::ProcessOutcome;
use crate::naming::AssetKey;
use crate::pipeline::{GatedOutcome, Pipeline};
use crate::storage::{FileSystemStorage, Storage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Default store file name within the media root.
pub const STORE_FILENAME: &str = ".photo-variants.json";

#[derive(Error, Debug)]
pub enum BackfillError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

// =============================================================================
// Metadata store
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreEntry {
    /// Current storage key of the entity's image.
    pub asset: String,
    #[serde(default)]
    pub image_meta: Option<ProcessOutcome>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataStore {
    pub entries: BTreeMap<String, StoreEntry>,
}

impl MetadataStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load from `path`. Returns an empty store if the file doesn't exist or
    /// can't be parsed.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        match serde_json::from_str(&content) {
            Ok(store) => store,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable metadata store");
                Self::empty()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), BackfillError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&StoreEntry> {
        self.entries.get(id)
    }

    /// Add entities for newly discovered assets.
    ///
    /// A known entity whose stored asset is no longer present but which has
    /// another discovered file under the same id (a replacement upload with a
    /// different extension) is pointed at that file. Returns the number of
    /// entities added.
    pub fn register(&mut self, keys: &[String]) -> usize {
        let present: BTreeSet<&str> = keys.iter().map(String::as_str).collect();
        let mut added = 0;
        for key in keys {
            let id = AssetKey::parse(key).id();
            match self.entries.get_mut(&id) {
                None => {
                    self.entries.insert(
                        id,
                        StoreEntry {
                            asset: key.clone(),
                            image_meta: None,
                        },
                    );
                    added += 1;
                }
                Some(entry) if !present.contains(entry.asset.as_str()) => {
                    debug!(entity = %id, from = %entry.asset, to = %key, "asset replaced");
                    entry.asset = key.clone();
                }
                Some(_) => {}
            }
        }
        added
    }
}

// =============================================================================
// Discovery
// =============================================================================

/// Find processable source images under `root`, as `/`-separated keys.
///
/// Skips hidden files and directories, unsupported extensions, and derived
/// `{stem}__{label}` outputs. Sorted for a stable processing order.
pub fn discover_assets(root: &Path) -> Result<Vec<String>, BackfillError> {
    let layout = FileSystemStorage::new(root);
    let mut keys = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(key) = layout.key_for(entry.path()) else {
            warn!(path = %entry.path().display(), "skipping non UTF-8 path");
            continue;
        };
        let parsed = AssetKey::parse(&key);
        if parsed.is_derived() || !is_supported_extension(&parsed.ext) {
            continue;
        }
        keys.push(key);
    }
    Ok(keys)
}

// =============================================================================
// Run
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillOptions {
    /// Reprocess every entity regardless of stored metadata.
    pub force: bool,
    /// Reprocess only entities whose content hash or pipeline version changed.
    pub reprocess_if_changed: bool,
    /// Maximum number of entities handed to the pipeline.
    pub limit: Option<usize>,
}

/// Progress events, sent as each entity finishes.
#[derive(Debug, Clone, PartialEq)]
pub enum BackfillEvent {
    Processed {
        id: String,
        asset: String,
        outcome: ProcessOutcome,
    },
    /// Not handed to the pipeline, or found unchanged by the gate.
    Skipped { id: String },
    Failed { id: String, error: String },
}

/// Summary of a backfill run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BackfillStats {
    pub processed: u32,
    pub skipped: u32,
    pub failed: u32,
}

impl BackfillStats {
    pub fn total(&self) -> u32 {
        self.processed + self.skipped + self.failed
    }
}

impl fmt::Display for BackfillStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failed > 0 {
            write!(
                f,
                "{} processed, {} skipped, {} failed ({} total)",
                self.processed,
                self.skipped,
                self.failed,
                self.total()
            )
        } else {
            write!(
                f,
                "{} processed, {} skipped ({} total)",
                self.processed,
                self.skipped,
                self.total()
            )
        }
    }
}

struct Job {
    id: String,
    key: String,
    existing: Option<ProcessOutcome>,
    force: bool,
}

enum JobResult {
    Done(ProcessOutcome),
    Unchanged,
    Failed(String),
}

/// Process the entities in `store` and record the results in it.
pub fn run<B: ImageBackend>(
    pipeline: &Pipeline<B>,
    storage: &dyn Storage,
    store: &mut MetadataStore,
    options: &BackfillOptions,
    progress: Option<Sender<BackfillEvent>>,
) -> BackfillStats {
    let mut stats = BackfillStats::default();
    let mut jobs = Vec::new();

    for (id, entry) in &store.entries {
        let within_limit = options.limit.is_none_or(|limit| jobs.len() < limit);
        let wanted = options.force
            || options.reprocess_if_changed
            || !fingerprint::is_current(entry.image_meta.as_ref(), pipeline.render_settings());
        if wanted && within_limit {
            jobs.push(Job {
                id: id.clone(),
                key: entry.asset.clone(),
                existing: entry.image_meta.clone(),
                force: options.force || !options.reprocess_if_changed,
            });
        } else {
            stats.skipped += 1;
            send(&progress, BackfillEvent::Skipped { id: id.clone() });
        }
    }
    info!(jobs = jobs.len(), skipped = stats.skipped, "backfill planned");

    let results: Vec<(Job, JobResult)> = jobs
        .into_par_iter()
        .map(|job| {
            let result = match pipeline.process_gated(
                storage,
                &job.key,
                job.existing.as_ref(),
                job.force,
            ) {
                Ok(GatedOutcome::Processed { outcome, .. })
                    if !options.force && job.existing.as_ref() == Some(&outcome) =>
                {
                    debug!(entity = %job.id, "stored record reproduced unchanged");
                    JobResult::Unchanged
                }
                Ok(GatedOutcome::Processed { outcome, .. }) => JobResult::Done(outcome),
                Ok(GatedOutcome::Unchanged) => JobResult::Unchanged,
                Err(e) => {
                    warn!(entity = %job.id, asset = %job.key, error = %e, "backfill failed");
                    JobResult::Failed(e.to_string())
                }
            };
            let event = match &result {
                JobResult::Done(outcome) => BackfillEvent::Processed {
                    id: job.id.clone(),
                    asset: job.key.clone(),
                    outcome: outcome.clone(),
                },
                JobResult::Unchanged => BackfillEvent::Skipped { id: job.id.clone() },
                JobResult::Failed(error) => BackfillEvent::Failed {
                    id: job.id.clone(),
                    error: error.clone(),
                },
            };
            send(&progress, event);
            (job, result)
        })
        .collect();

    for (job, result) in results {
        match result {
            JobResult::Done(outcome) => {
                if let Some(entry) = store.entries.get_mut(&job.id) {
                    entry.asset = outcome.asset_key(&job.key);
                    entry.image_meta = Some(outcome);
                }
                stats.processed += 1;
            }
            JobResult::Unchanged => stats.skipped += 1,
            JobResult::Failed(_) => stats.failed += 1,
        }
    }
    info!(%stats, "backfill finished");
    stats
}

fn send(progress: &Option<Sender<BackfillEvent>>, event: BackfillEvent) {
    if let Some(tx) = progress {
        // Printer may have gone away; progress is advisory
        tx.send(event).ok();
    }
}
