//! Client-side key/value storage.
//!
//! Stands in for browser storage: [`FileClientStorage`] is durable across
//! runs (like `localStorage`), [`MemoryClientStorage`] lives as long as the
//! process (like `sessionStorage`). Values are JSON strings.

use crate::models::{VoteCounts, VotedItems};
use crate::storage::acquire_lock;
use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Key holding the JSON array of voted item ids.
pub const VOTED_ITEMS_KEY: &str = "manifesto_voted_items";

/// Key holding the JSON object of counts (local variant only).
pub const LOCAL_COUNTS_KEY: &str = "manifesto_votes";

/// Key holding the visitor id cookie for the HTTP gateway.
pub const VISITOR_ID_KEY: &str = "visitor_id";

/// String key/value storage owned by one client.
pub trait ClientStorage: Send + Sync {
    /// Returns the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

impl<T: ClientStorage + ?Sized> ClientStorage for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}

/// Process-lifetime storage.
#[derive(Debug, Default)]
pub struct MemoryClientStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryClientStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClientStorage for MemoryClientStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(acquire_lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        acquire_lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Durable storage in a single JSON file.
///
/// The whole file is rewritten on every `set` (via a sibling temp file and a
/// rename). Writers in one process are serialised; separate processes sharing
/// a file are not coordinated.
#[derive(Debug)]
pub struct FileClientStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileClientStorage {
    /// Opens storage at `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(Error::OperationFailed {
                    operation: "read_client_storage".to_string(),
                    cause: format!("{}: {e}", self.path.display()),
                });
            },
        };
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).map_err(|e| Error::OperationFailed {
            operation: "parse_client_storage".to_string(),
            cause: format!("{}: {e}", self.path.display()),
        })
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let write_failed = |e: std::io::Error| Error::OperationFailed {
            operation: "write_client_storage".to_string(),
            cause: format!("{}: {e}", self.path.display()),
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_failed)?;
        }
        let json = serde_json::to_string_pretty(entries).map_err(|e| Error::OperationFailed {
            operation: "serialize_client_storage".to_string(),
            cause: e.to_string(),
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(write_failed)?;
        std::fs::rename(&tmp, &self.path).map_err(write_failed)
    }
}

impl ClientStorage for FileClientStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = acquire_lock(&self.lock);
        Ok(self.read_entries()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = acquire_lock(&self.lock);
        let mut entries = self.read_entries()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_entries(&entries)
    }
}

/// Reads and decodes a JSON value; absent keys yield `None`.
///
/// # Errors
///
/// Returns an error if the storage fails or the value is not valid JSON for `T`.
pub fn load_json<T: DeserializeOwned>(storage: &impl ClientStorage, key: &str) -> Result<Option<T>> {
    let Some(raw) = storage.get(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| Error::OperationFailed {
            operation: "decode_client_value".to_string(),
            cause: format!("{key}: {e}"),
        })
}

/// Encodes and stores a JSON value.
///
/// # Errors
///
/// Returns an error if encoding or the storage write fails.
pub fn save_json<T: Serialize>(storage: &impl ClientStorage, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value).map_err(|e| Error::OperationFailed {
        operation: "encode_client_value".to_string(),
        cause: format!("{key}: {e}"),
    })?;
    storage.set(key, &raw)
}

/// Loads the voted set, treating unreadable or corrupt data as empty.
pub fn load_voted_items(storage: &impl ClientStorage) -> VotedItems {
    match load_json(storage, VOTED_ITEMS_KEY) {
        Ok(items) => items.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load voted items; starting empty");
            VotedItems::new()
        },
    }
}

/// Loads locally kept counts (local variant), treating unreadable or corrupt
/// data as empty.
pub fn load_local_counts(storage: &impl ClientStorage) -> VoteCounts {
    match load_json(storage, LOCAL_COUNTS_KEY) {
        Ok(counts) => counts.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load local counts; starting empty");
            VoteCounts::new()
        },
    }
}
