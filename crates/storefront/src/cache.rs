//! Local persistent cache.
//!
//! A string-keyed key/value store with synchronous get/set, standing in for
//! browser local storage. The cart engine stores its JSON-serialized
//! snapshot under [`CART_CACHE_KEY`].

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

/// Key under which the cart snapshot is cached.
pub const CART_CACHE_KEY: &str = "storedCart";

/// Errors from the local cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem read or write failed.
    #[error("cache I/O error for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },

    /// Key contains characters that cannot map to a file name.
    #[error("invalid cache key: {0}")]
    InvalidKey(String),
}

/// Synchronous string key/value storage.
pub trait LocalCache: Send + Sync {
    /// Read a value; `Ok(None)` if the key was never written.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;
}

/// In-process cache, lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Directory-backed cache: one `<key>.json` file per key.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// crash mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Open (and create if needed) a cache directory.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Io` if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| CacheError::Io {
            key: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, CacheError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl LocalCache for FileCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        let io_err = |source| CacheError::Io {
            key: key.to_string(),
            source,
        };
        fs::write(&tmp, value).map_err(io_err)?;
        fs::rename(&tmp, &path).map_err(io_err)
    }
}
