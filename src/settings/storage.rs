//! Key/blob persistence used by the settings transaction and the progress
//! store.
//!
//! Both only need `save` and `load`; a failed or corrupt load is handled by
//! the caller the same way as a missing key.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::config::validate_key;
use crate::core::errors::{Result, UiError};

/// What a load found under a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredBlob {
    /// Raw bytes stored under the key.
    Found(Vec<u8>),
    /// Nothing stored.
    Missing,
    /// Present but could not be read.
    Unreadable {
        /// I/O error text.
        details: String,
    },
}

/// Keyed blob persistence shared by the settings and progress stores.
pub trait Storage {
    /// Write `blob` under `key`, replacing any earlier value.
    fn save(&mut self, key: &str, blob: &[u8]) -> Result<()>;
    /// Read whatever is stored under `key`.
    fn load(&self, key: &str) -> StoredBlob;
    /// Human-readable location of `key`, for diagnostics.
    fn locate(&self, key: &str) -> String;
    /// Another handle onto the same backing store.
    fn share(&self) -> Box<dyn Storage>;
}

// ──────────────────── file storage ────────────────────

/// One `{key}.json` file per key under a directory, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    dir: PathBuf,
}

impl JsonFileStorage {
    /// Store files under `dir`, created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the blobs.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for `key` (`UIA-1001` for invalid keys).
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key("storage key", key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl Storage for JsonFileStorage {
    /// Serialize → temp file → fsync → rename over the target.
    fn save(&mut self, key: &str, blob: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(|source| UiError::io(&self.dir, source))?;
        let tmp_path = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path).map_err(|e| UiError::io(&tmp_path, e))?;
            file.write_all(blob).map_err(|e| UiError::io(&tmp_path, e))?;
            file.sync_all().map_err(|e| UiError::io(&tmp_path, e))?;
        }
        fs::rename(&tmp_path, &path).map_err(|source| UiError::io(&path, source))
    }

    fn load(&self, key: &str) -> StoredBlob {
        let path = match self.path_for(key) {
            Ok(path) => path,
            Err(e) => {
                return StoredBlob::Unreadable {
                    details: e.to_string(),
                };
            }
        };
        match fs::read(&path) {
            Ok(bytes) => StoredBlob::Found(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => StoredBlob::Missing,
            Err(e) => StoredBlob::Unreadable {
                details: format!("{}: {e}", path.display()),
            },
        }
    }

    fn locate(&self, key: &str) -> String {
        self.dir.join(format!("{key}.json")).display().to_string()
    }

    fn share(&self) -> Box<dyn Storage> {
        Box::new(self.clone())
    }
}

// ──────────────────── memory storage ────────────────────

#[derive(Debug, Default)]
struct MemoryInner {
    blobs: HashMap<String, Vec<u8>>,
    writes: u64,
    fail_saves: bool,
}

/// In-process storage. Clones share the same map, so a test can keep one
/// clone for inspection while the session owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStorage {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.lock().blobs.get(key).cloned()
    }

    /// Place raw bytes without counting a write, e.g. a corrupt blob.
    pub fn insert_raw(&self, key: &str, blob: impl Into<Vec<u8>>) {
        self.inner.lock().blobs.insert(key.to_string(), blob.into());
    }

    /// Number of successful `save` calls.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.inner.lock().writes
    }

    /// Make every later `save` fail, to exercise storage error paths.
    pub fn set_fail_saves(&self, fail: bool) {
        self.inner.lock().fail_saves = fail;
    }
}

impl Storage for MemoryStorage {
    fn save(&mut self, key: &str, blob: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_saves {
            return Err(UiError::Storage {
                key: key.to_string(),
                details: "memory storage is failing saves".to_string(),
            });
        }
        inner.blobs.insert(key.to_string(), blob.to_vec());
        inner.writes += 1;
        Ok(())
    }

    fn load(&self, key: &str) -> StoredBlob {
        self.inner
            .lock()
            .blobs
            .get(key)
            .map_or(StoredBlob::Missing, |blob| StoredBlob::Found(blob.clone()))
    }

    fn locate(&self, key: &str) -> String {
        format!("memory:{key}")
    }

    fn share(&self) -> Box<dyn Storage> {
        Box::new(self.clone())
    }
}
