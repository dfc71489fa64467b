//! Durable key-value storage backing the proctoring session.
//!
//! Keys and values are flat strings. Each `set`/`remove` is a single atomic operation and
//! concurrent writers resolve last-write-wins.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("storage quota exceeded writing {key}")]
    QuotaExceeded { key: String },
    #[error("storage io failed: {0}")]
    Io(#[from] io::Error),
    #[error("storage snapshot is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("storage lock poisoned")]
    Poisoned,
}

pub(crate) trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-process map. An optional byte quota mimics browser storage limits.
#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn with_quota(quota_bytes: usize) -> Self {
        Self { entries: Mutex::new(BTreeMap::new()), quota_bytes: Some(quota_bytes) }
    }

    fn entries(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>, StoreError> {
        self.entries.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries()?;
        if let Some(quota) = self.quota_bytes {
            let used: usize = entries
                .iter()
                .filter(|(existing, _)| existing.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > quota {
                return Err(StoreError::QuotaExceeded { key: key.to_string() });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// Profile store persisted as one JSON object on disk. Writes go to a temporary file
/// that is renamed over the snapshot, so a crash never leaves a half-written profile.
#[derive(Debug)]
pub(crate) struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    pub(crate) fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        let path = dir.join("session.json");

        let entries = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };

        Ok(Self { path, entries: Mutex::new(entries) })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn mutate(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        let mut next = entries.clone();
        apply(&mut next);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.mutate(|entries| {
            entries.remove(key);
        })
    }
}

/// Wraps durable storage and never fails. Every value is mirrored in memory; after the
/// first storage error the durable side is abandoned for the rest of the process and
/// reads and writes are served from the mirror.
pub(crate) struct FallbackStore {
    durable: Option<Arc<dyn KeyValueStore>>,
    mirror: MemoryStore,
    degraded: AtomicBool,
}

impl FallbackStore {
    pub(crate) fn new(durable: Arc<dyn KeyValueStore>) -> Self {
        Self { durable: Some(durable), mirror: MemoryStore::new(), degraded: AtomicBool::new(false) }
    }

    /// Starts degraded, for when durable storage could not even be opened.
    pub(crate) fn memory_only() -> Self {
        Self { durable: None, mirror: MemoryStore::new(), degraded: AtomicBool::new(true) }
    }

    pub(crate) fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    fn durable(&self) -> Option<&Arc<dyn KeyValueStore>> {
        if self.is_degraded() {
            None
        } else {
            self.durable.as_ref()
        }
    }

    fn degrade(&self, err: &StoreError) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                error = %err,
                "Durable storage unavailable; keeping proctoring state in memory"
            );
        }
    }

    pub(crate) fn get(&self, key: &str) -> Option<String> {
        if let Some(durable) = self.durable() {
            match durable.get(key) {
                Ok(value) => {
                    let _ = match &value {
                        Some(value) => self.mirror.set(key, value),
                        None => self.mirror.remove(key),
                    };
                    return value;
                }
                Err(err) => self.degrade(&err),
            }
        }
        self.mirror.get(key).ok().flatten()
    }

    pub(crate) fn set(&self, key: &str, value: &str) {
        let _ = self.mirror.set(key, value);
        if let Some(durable) = self.durable() {
            if let Err(err) = durable.set(key, value) {
                self.degrade(&err);
            }
        }
    }

    pub(crate) fn remove(&self, key: &str) {
        let _ = self.mirror.remove(key);
        if let Some(durable) = self.durable() {
            if let Err(err) = durable.remove(key) {
                self.degrade(&err);
            }
        }
    }
}
