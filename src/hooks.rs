//! Post-save hook for entities that own an image.
//!
//! Runs the gated pipeline after an entity (profile, gallery image, blog
//! post) is saved, and tells the caller whether to write new metadata back.
//! Image processing must never fail the save itself: every error is logged
//! with the entity id and reported as [`HookOutcome::Failed`].
//!
//! The caller's own metadata write triggers another save; such saves are
//! flagged `only_metadata_changed` and skipped so the hook does not loop.
//!
//! On local storage normalization can replace the source (`photo.png`
//! becomes `photo.jpg`), so [`HookOutcome::Updated`] carries the key the
//! entity's image field must point at from now on.

use crate::imaging::ImageBackend;
use crate::metadata::ProcessOutcome;
use crate::pipeline::{GatedOutcome, Pipeline};
use crate::storage::Storage;
use tracing::{debug, warn};

/// What the owning entity's save looked like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveEvent {
    /// Identifier logged on failure.
    pub entity_id: String,
    /// Storage key of the entity's image, `None` when it has none.
    pub image_key: Option<String>,
    /// The save only touched the metadata field.
    pub only_metadata_changed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MetadataOnly,
    NoImage,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HookOutcome {
    Skipped(SkipReason),
    /// Stored metadata still matches; nothing to write.
    Unchanged,
    /// Persist `outcome` on the entity and point its image at `asset`.
    Updated {
        outcome: ProcessOutcome,
        asset: String,
    },
    /// Processing failed; already logged.
    Failed,
}

pub fn on_image_saved<B: ImageBackend>(
    pipeline: &Pipeline<B>,
    storage: &dyn Storage,
    event: &SaveEvent,
    existing: Option<&ProcessOutcome>,
) -> HookOutcome {
    if event.only_metadata_changed {
        return HookOutcome::Skipped(SkipReason::MetadataOnly);
    }
    let Some(key) = event.image_key.as_deref().filter(|k| !k.is_empty()) else {
        return HookOutcome::Skipped(SkipReason::NoImage);
    };

    match pipeline.process_gated(storage, key, existing, false) {
        Ok(GatedOutcome::Unchanged) => HookOutcome::Unchanged,
        Ok(GatedOutcome::Processed { outcome, .. }) if Some(&outcome) == existing => {
            HookOutcome::Unchanged
        }
        Ok(GatedOutcome::Processed { outcome, reason }) => {
            let asset = outcome.asset_key(key);
            debug!(entity = %event.entity_id, %reason, asset = %asset, "image metadata updated");
            HookOutcome::Updated { outcome, asset }
        }
        Err(e) => {
            warn!(entity = %event.entity_id, asset = key, error = %e, "failed to process image");
            HookOutcome::Failed
        }
    }
}
