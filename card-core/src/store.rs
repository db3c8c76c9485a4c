//! Template persistence.
//!
//! [`TemplateStore`] is the async boundary the editor session talks to. Two
//! implementations ship with the crate: an in-memory store for tests and
//! ephemeral sessions, and a file-backed store that keeps one JSON document
//! per template.

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::template::{TemplateId, TemplateRecord};

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The internal lock was poisoned by a panicking thread.
    #[error("Lock poisoned")]
    LockPoisoned,
    /// A record with this id already exists.
    #[error("Template already exists: {0}")]
    AlreadyExists(TemplateId),
    /// The requested record does not exist.
    #[error("Template not found: {0}")]
    NotFound(TemplateId),
    /// An I/O error occurred during persistence.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Keyed, asynchronous collection of template records.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Fetch a record by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] or [`StoreError::Serialization`] if the
    /// record cannot be read.
    async fn get(&self, id: TemplateId) -> Result<Option<TemplateRecord>, StoreError>;

    /// All records, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the collection cannot be read.
    async fn get_all(&self) -> Result<Vec<TemplateRecord>, StoreError>;

    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if the id is taken.
    async fn add(&self, record: TemplateRecord) -> Result<(), StoreError>;

    /// Insert or replace a record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the record cannot be written.
    async fn put(&self, record: TemplateRecord) -> Result<(), StoreError>;

    /// Delete a record. Returns whether one was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the record cannot be removed.
    async fn delete(&self, id: TemplateId) -> Result<bool, StoreError>;

    /// Number of stored records that [`TemplateStore::get_all`] returns.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the collection cannot be read.
    async fn count(&self) -> Result<usize, StoreError>;
}

/// In-memory template store.
#[derive(Debug, Default)]
pub struct MemoryTemplateStore {
    records: RwLock<BTreeMap<TemplateId, TemplateRecord>>,
}

impl MemoryTemplateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn get(&self, id: TemplateId) -> Result<Option<TemplateRecord>, StoreError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(&id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<TemplateRecord>, StoreError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.values().cloned().collect())
    }

    async fn add(&self, record: TemplateRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if records.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id));
        }
        records.insert(record.id, record);
        Ok(())
    }

    async fn put(&self, record: TemplateRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.insert(record.id, record);
        Ok(())
    }

    async fn delete(&self, id: TemplateId) -> Result<bool, StoreError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        Ok(records.remove(&id).is_some())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.len())
    }
}

/// File-backed template store: `<dir>/<id>.json` per record.
#[derive(Debug)]
pub struct FileTemplateStore {
    data_dir: PathBuf,
    // Serializes writers so count-then-add sequences see a stable directory.
    write_lock: RwLock<()>,
}

impl FileTemplateStore {
    /// Open a store rooted at `data_dir`, creating the directory on first use.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        tracing::info!("Template store opened at {}", data_dir.display());
        Ok(Self {
            data_dir,
            write_lock: RwLock::new(()),
        })
    }

    /// Directory holding the record files.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn record_path(&self, id: TemplateId) -> PathBuf {
        self.data_dir.join(format!("{id}.json"))
    }

    fn read_record(path: &Path) -> Result<TemplateRecord, StoreError> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn encode(record: &TemplateRecord) -> Result<String, StoreError> {
        serde_json::to_string_pretty(record).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn record_paths(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            let is_record = path.extension().is_some_and(|ext| ext == "json")
                && path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|stem| stem.parse::<u64>().is_ok());
            if is_record {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    /// Every record that parses, ordered by id. Unreadable files are skipped
    /// and so never count toward the template cap.
    fn readable_records(&self) -> Result<Vec<TemplateRecord>, StoreError> {
        let mut records = Vec::new();
        for path in self.record_paths()? {
            match Self::read_record(&path) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping unreadable template {}: {e}", path.display()),
            }
        }
        records.sort_by_key(|r| r.id);
        Ok(records)
    }
}

#[async_trait]
impl TemplateStore for FileTemplateStore {
    async fn get(&self, id: TemplateId) -> Result<Option<TemplateRecord>, StoreError> {
        let _guard = self.write_lock.read().unwrap_or_else(PoisonError::into_inner);
        let path = self.record_path(id);
        if !path.exists() {
            return Ok(None);
        }
        Self::read_record(&path).map(Some)
    }

    async fn get_all(&self) -> Result<Vec<TemplateRecord>, StoreError> {
        let _guard = self.write_lock.read().unwrap_or_else(PoisonError::into_inner);
        self.readable_records()
    }

    async fn add(&self, record: TemplateRecord) -> Result<(), StoreError> {
        let json = Self::encode(&record)?;
        let _guard = self.write_lock.write().unwrap_or_else(PoisonError::into_inner);
        let path = self.record_path(record.id);
        let mut file = match std::fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists(record.id));
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(json.as_bytes())?;
        tracing::debug!("Added template {} at {}", record.id, path.display());
        Ok(())
    }

    async fn put(&self, record: TemplateRecord) -> Result<(), StoreError> {
        let json = Self::encode(&record)?;
        let _guard = self.write_lock.write().unwrap_or_else(PoisonError::into_inner);
        let path = self.record_path(record.id);
        std::fs::write(&path, json)?;
        tracing::debug!("Stored template {} at {}", record.id, path.display());
        Ok(())
    }

    async fn delete(&self, id: TemplateId) -> Result<bool, StoreError> {
        let _guard = self.write_lock.write().unwrap_or_else(PoisonError::into_inner);
        match std::fs::remove_file(self.record_path(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let _guard = self.write_lock.read().unwrap_or_else(PoisonError::into_inner);
        Ok(self.readable_records()?.len())
    }
}

/// Get the current Unix timestamp in milliseconds.
pub(crate) fn current_timestamp_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| {
        #[allow(clippy::cast_possible_truncation)]
        {
            d.as_millis() as u64
        }
    })
}
