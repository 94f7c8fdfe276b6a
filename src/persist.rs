//! Storage-agnostic persistence of a rendered set.
//!
//! Output files are siblings of the source asset: same directory, same key
//! prefix. How they get there depends on the [`AssetSource`]:
//!
//! - **Local path**: files are written straight into the source's directory,
//!   overwriting on collision. The pre-normalization original is removed
//!   afterwards when its name differs from `{stem}.jpg`.
//! - **Remote**: each blob goes through [`Storage::save`]. Because a generic
//!   save may refuse to overwrite, any existing blob at the target key is
//!   deleted first. The source blob is left in place.
//!
//! Either way the resulting names are identical, so the metadata shape does
//! not depend on which mode ran.

use crate::render::RenderedSet;
use crate::storage::{AssetSource, Storage, StorageError};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Where the rendered set ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persisted {
    /// Storage key of the normalized original, the entity's new asset.
    pub normalized_key: String,
    /// Number of files written.
    pub written: usize,
}

/// Write every file in `set` next to the source asset.
pub fn persist(source: &AssetSource<'_>, set: &RenderedSet) -> Result<Persisted, StorageError> {
    let asset = source.asset_key();
    let normalized_key = asset.sibling(&set.normalized.name);
    let written = match source {
        AssetSource::LocalPath { path, .. } => persist_local(path, set)?,
        AssetSource::Remote { storage, .. } => {
            let mut written = 0;
            for file in set.files() {
                save_replacing(*storage, &asset.sibling(&file.name), &file.bytes)?;
                written += 1;
            }
            written
        }
    };
    debug!(
        asset = source.key(),
        mode = source.describe(),
        written,
        "persisted outputs"
    );
    Ok(Persisted {
        normalized_key,
        written,
    })
}

fn persist_local(source_path: &Path, set: &RenderedSet) -> Result<usize, StorageError> {
    let dir = source_path.parent().unwrap_or(Path::new("."));
    let mut written = 0;
    for file in set.files() {
        fs::write(dir.join(&file.name), &file.bytes)?;
        written += 1;
    }

    let normalized_path = dir.join(&set.normalized.name);
    if source_path != normalized_path.as_path()
        && let Err(e) = fs::remove_file(source_path)
    {
        warn!(
            path = %source_path.display(),
            error = %e,
            "could not remove pre-normalization original"
        );
    }
    Ok(written)
}

/// Save `bytes` at exactly `key`, deleting any existing blob first.
///
/// Errors if the backend still stores the blob under a different key.
pub fn save_replacing(storage: &dyn Storage, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
    if storage.exists(key)? {
        storage.delete(key)?;
    }
    let stored = storage.save(key, bytes)?;
    if stored != key {
        return Err(StorageError::Backend(format!(
            "expected to store {key}, backend used {stored}"
        )));
    }
    Ok(())
}
