//! Byte storage behind the pipeline.
//!
//! The pipeline never assumes a filesystem. Everything goes through the
//! [`Storage`] trait (open, save, delete, exists), and a capability probe
//! ([`Storage::local_path`]) tells the caller whether a real path exists.
//! [`AssetSource::resolve`] makes that choice once, up front:
//!
//! | Backend | `local_path` | Overwrites on `save` |
//! |---|---|---|
//! | [`FileSystemStorage`] | yes | yes |
//! | [`MemoryStorage`] | no | no, picks an alternate key |
//!
//! Keys are `/`-separated relative names (`gallery/7/pic.png`).

use crate::naming::AssetKey;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Minimal object-store interface.
///
/// `save` returns the key actually written, which may differ from the one
/// requested when the backend refuses to overwrite.
pub trait Storage: Send + Sync {
    fn open(&self, key: &str) -> Result<Vec<u8>, StorageError>;
    fn save(&self, key: &str, bytes: &[u8]) -> Result<String, StorageError>;
    fn delete(&self, key: &str) -> Result<(), StorageError>;
    fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Byte length without reading the content, if the backend can tell.
    fn size(&self, key: &str) -> Result<Option<u64>, StorageError> {
        let _ = key;
        Ok(None)
    }

    /// Real filesystem path for `key`, when the backend has one.
    fn local_path(&self, key: &str) -> Option<PathBuf> {
        let _ = key;
        None
    }
}

// =============================================================================
// Filesystem
// =============================================================================

/// Storage rooted at a directory on local disk.
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    root: PathBuf,
}

impl FileSystemStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key under the root, refusing absolute keys and `..` segments.
    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let rel = Path::new(key);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if key.is_empty() || escapes {
            return Err(StorageError::Backend(format!("invalid key: {key:?}")));
        }
        Ok(self.root.join(rel))
    }

    /// Key for a path under the root, `/`-separated.
    pub fn key_for(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = rel
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(parts.join("/"))
    }
}

impl Storage for FileSystemStorage {
    fn open(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key)?;
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            _ => StorageError::Io(e),
        })
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        Ok(key.to_string())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.resolve(key)?.is_file())
    }

    fn size(&self, key: &str) -> Result<Option<u64>, StorageError> {
        let path = self.resolve(key)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn local_path(&self, key: &str) -> Option<PathBuf> {
        self.resolve(key).ok()
    }
}

// =============================================================================
// In-memory object store
// =============================================================================

/// Pathless object store.
///
/// Behaves like generic object-store adapters: `save` onto an occupied key
/// does not overwrite, it stores under `{stem}_{n}.{ext}` and returns that key.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        // A poisoned map is still structurally valid
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn alternate_key(key: &str, n: u32) -> String {
    let parsed = AssetKey::parse(key);
    let name = if parsed.ext.is_empty() {
        format!("{}_{n}", parsed.stem)
    } else {
        format!("{}_{n}.{}", parsed.stem, parsed.ext)
    };
    parsed.sibling(&name)
}

impl Storage for MemoryStorage {
    fn open(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.lock()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let mut objects = self.lock();
        let mut stored = key.to_string();
        let mut n = 1;
        while objects.contains_key(&stored) {
            stored = alternate_key(key, n);
            n += 1;
        }
        objects.insert(stored.clone(), bytes.to_vec());
        Ok(stored)
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.lock().remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.lock().contains_key(key))
    }

    fn size(&self, key: &str) -> Result<Option<u64>, StorageError> {
        self.lock()
            .get(key)
            .map(|b| Some(b.len() as u64))
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

// =============================================================================
// Asset source selection
// =============================================================================

/// Where one asset's bytes live, decided once per invocation.
#[derive(Clone)]
pub enum AssetSource<'a> {
    /// The asset has a real path; siblings are written next to it.
    LocalPath {
        storage: &'a dyn Storage,
        key: &'a str,
        path: PathBuf,
    },
    /// Only reachable through the storage interface.
    Remote { storage: &'a dyn Storage, key: &'a str },
}

impl<'a> AssetSource<'a> {
    /// Probe the backend for a usable local path.
    ///
    /// A path only counts if it points at an existing file. Anything else,
    /// including a missing file, goes through the storage interface so the
    /// missing-file case is reported the same way in both modes.
    pub fn resolve(storage: &'a dyn Storage, key: &'a str) -> Self {
        match storage.local_path(key) {
            Some(path) if path.is_file() => Self::LocalPath { storage, key, path },
            _ => Self::Remote { storage, key },
        }
    }

    pub fn storage(&self) -> &'a dyn Storage {
        match self {
            Self::LocalPath { storage, .. } | Self::Remote { storage, .. } => *storage,
        }
    }

    pub fn key(&self) -> &'a str {
        match self {
            Self::LocalPath { key, .. } | Self::Remote { key, .. } => *key,
        }
    }

    pub fn asset_key(&self) -> AssetKey {
        AssetKey::parse(self.key())
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::LocalPath { .. })
    }

    /// Short label for logs.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::LocalPath { .. } => "local",
            Self::Remote { .. } => "remote",
        }
    }

    /// Size before reading, when cheaply known.
    pub fn size_hint(&self) -> Result<Option<u64>, StorageError> {
        match self {
            Self::LocalPath { path, key, .. } => match fs::metadata(path) {
                Ok(meta) => Ok(Some(meta.len())),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    Err(StorageError::NotFound(key.to_string()))
                }
                Err(e) => Err(e.into()),
            },
            Self::Remote { storage, key } => storage.size(key),
        }
    }

    pub fn read(&self) -> Result<Vec<u8>, StorageError> {
        match self {
            Self::LocalPath { path, key, .. } => fs::read(path).map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
                _ => StorageError::Io(e),
            }),
            Self::Remote { storage, key } => storage.open(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // =========================================================================
    // FileSystemStorage
    // =========================================================================

    #[test]
    fn fs_save_creates_directories_and_overwrites() {
        let tmp = TempDir::new().unwrap();
        let storage = FileSystemStorage::new(tmp.path());
        assert_eq!(storage.save("a/b/c.jpg", b"one").unwrap(), "a/b/c.jpg");
        assert_eq!(storage.save("a/b/c.jpg", b"two").unwrap(), "a/b/c.jpg");
        assert_eq!(storage.open("a/b/c.jpg").unwrap(), b"two");
        assert!(tmp.path().join("a/b/c.jpg").is_file());
    }

    #[test]
    fn fs_open_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let storage = FileSystemStorage::new(tmp.path());
        assert!(matches!(
            storage.open("nope.jpg"),
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.size("nope.jpg"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn fs_delete_missing_is_ok() {
        let tmp = TempDir::new().unwrap();
        let storage = FileSystemStorage::new(tmp.path());
        storage.delete("ghost.png").unwrap();
    }

    #[test]
    fn fs_rejects_escaping_keys() {
        let tmp = TempDir::new().unwrap();
        let storage = FileSystemStorage::new(tmp.path());
        assert!(storage.save("../evil.jpg", b"x").is_err());
        assert!(storage.open("/etc/passwd").is_err());
        assert!(storage.local_path("../x").is_none());
    }

    #[test]
    fn fs_key_for_round_trips_path() {
        let tmp = TempDir::new().unwrap();
        let storage = FileSystemStorage::new(tmp.path());
        let path = storage.local_path("gallery/7/pic.png").unwrap();
        assert_eq!(storage.key_for(&path).unwrap(), "gallery/7/pic.png");
    }

    // =========================================================================
    // MemoryStorage
    // =========================================================================

    #[test]
    fn memory_save_does_not_overwrite() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.save("g/pic.jpg", b"one").unwrap(), "g/pic.jpg");
        assert_eq!(storage.save("g/pic.jpg", b"two").unwrap(), "g/pic_1.jpg");
        assert_eq!(storage.save("g/pic.jpg", b"three").unwrap(), "g/pic_2.jpg");
        assert_eq!(storage.open("g/pic.jpg").unwrap(), b"one");
    }

    #[test]
    fn memory_delete_then_save_reuses_key() {
        let storage = MemoryStorage::new();
        storage.save("pic.jpg", b"one").unwrap();
        storage.delete("pic.jpg").unwrap();
        assert_eq!(storage.save("pic.jpg", b"two").unwrap(), "pic.jpg");
        assert_eq!(storage.keys(), vec!["pic.jpg".to_string()]);
    }

    #[test]
    fn memory_has_no_local_path() {
        let storage = MemoryStorage::new();
        storage.save("pic.jpg", b"x").unwrap();
        assert!(storage.local_path("pic.jpg").is_none());
        assert_eq!(storage.size("pic.jpg").unwrap(), Some(1));
    }

    // =========================================================================
    // AssetSource
    // =========================================================================

    #[test]
    fn probe_picks_local_for_existing_file() {
        let tmp = TempDir::new().unwrap();
        let storage = FileSystemStorage::new(tmp.path());
        storage.save("pic.png", b"x").unwrap();
        let source = AssetSource::resolve(&storage, "pic.png");
        assert!(source.is_local());
        assert_eq!(source.read().unwrap(), b"x");
        assert_eq!(source.size_hint().unwrap(), Some(1));
    }

    #[test]
    fn probe_falls_back_to_remote_for_missing_file() {
        let tmp = TempDir::new().unwrap();
        let storage = FileSystemStorage::new(tmp.path());
        assert!(!AssetSource::resolve(&storage, "missing.png").is_local());
    }

    #[test]
    fn probe_pathless_backend_is_remote() {
        let storage = MemoryStorage::new();
        storage.save("g/pic.png", b"xyz").unwrap();
        let source = AssetSource::resolve(&storage, "g/pic.png");
        assert_eq!(source.describe(), "remote");
        assert_eq!(source.read().unwrap(), b"xyz");
        assert_eq!(source.asset_key().stem, "pic");
    }
}
