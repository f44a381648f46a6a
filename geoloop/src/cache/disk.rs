//! Flat on-disk store keyed by cache key.

use crate::cache::CacheError;
use crate::overlay::CacheKey;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Persistent store laid out as `<root>/<cache key>`.
///
/// Writes go to a temporary sibling file that is renamed into place, so
/// readers only ever observe complete files.
pub struct DiskStore {
    root: PathBuf,
    temp_counter: AtomicU64,
}

impl DiskStore {
    /// Open a store, creating the root directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        Ok(Self {
            root,
            temp_counter: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File location for a key.
    pub fn path(&self, key: &CacheKey) -> PathBuf {
        key.path_in(&self.root)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.path(key).is_file()
    }

    /// Read the stored bytes, `None` if the key has no file.
    pub fn read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        match fs::read(self.path(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Store bytes under a key, replacing any previous file atomically.
    pub fn write(&self, key: &CacheKey, data: &[u8]) -> Result<PathBuf, CacheError> {
        let path = self.path(key);
        self.write_path(&path, data)?;
        trace!(key = %key, bytes = data.len(), "Stored overlay on disk");
        Ok(path)
    }

    /// Atomically replace the file at `path` below the store root.
    pub(crate) fn write_path(&self, path: &Path, data: &[u8]) -> Result<(), CacheError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp = self.temp_path(path);
        let result = (|| {
            let mut file = fs::File::create(&temp)?;
            file.write_all(data)?;
            file.sync_all()?;
            fs::rename(&temp, path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }
        Ok(())
    }

    /// Delete the file for a key. Returns whether a file was removed.
    pub fn remove(&self, key: &CacheKey) -> Result<bool, CacheError> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn temp_path(&self, path: &Path) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(".{}.{}.{}.tmp", name, std::process::id(), n))
    }
}
