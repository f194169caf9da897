//! Durable storage for the translation cache.
//!
//! The cache is persisted as a flat JSON object mapping `"text||language"`
//! to the translated text. Every save rewrites the whole mapping.

use crate::cache::KEY_SEPARATOR;
use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// A record store that can load the full mapping and overwrite it atomically.
///
/// Records are keyed by [`CacheKey::record_key`](crate::cache::CacheKey::record_key).
pub trait CacheStorage: Send + Sync {
    /// Load every stored record. A store that does not exist yet loads as empty.
    fn load(&self) -> Result<HashMap<String, String>>;

    /// Replace the stored mapping with `records`
    fn save(&self, records: &HashMap<String, String>) -> Result<()>;
}

impl<S: CacheStorage + ?Sized> CacheStorage for std::sync::Arc<S> {
    fn load(&self) -> Result<HashMap<String, String>> {
        (**self).load()
    }

    fn save(&self, records: &HashMap<String, String>) -> Result<()> {
        (**self).save(records)
    }
}

/// Drop records whose key has no separator; no lookup can ever reach them
fn without_malformed_keys(records: HashMap<String, String>) -> HashMap<String, String> {
    records
        .into_iter()
        .filter(|(record_key, _)| {
            let well_formed = record_key.contains(KEY_SEPARATOR);
            if !well_formed {
                warn!("Skipping cache record with malformed key: {:?}", record_key);
            }
            well_formed
        })
        .collect()
}

/// Cache persisted to a JSON file on disk
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file the new contents are written to before being renamed into place
    fn temp_path(&self) -> PathBuf {
        let mut file_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "translation_cache.json".into());
        file_name.push(".tmp");
        self.path.with_file_name(file_name)
    }
}

impl CacheStorage for JsonFileStorage {
    fn load(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            debug!("No cache file at {}, starting empty", self.path.display());
            return Ok(HashMap::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .context(format!("Failed to read cache file {}", self.path.display()))?;

        let records: HashMap<String, String> = serde_json::from_str(&content)
            .context(format!("Failed to parse cache file {}", self.path.display()))?;

        Ok(without_malformed_keys(records))
    }

    fn save(&self, records: &HashMap<String, String>) -> Result<()> {
        // Sorted so the file diffs cleanly between writes
        let sorted: BTreeMap<&String, &String> = records.iter().collect();
        let json = serde_json::to_string_pretty(&sorted)
            .context("Failed to serialize translation cache")?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context(format!(
                    "Failed to create cache directory {}",
                    parent.display()
                ))?;
            }
        }

        let temp_path = self.temp_path();
        std::fs::write(&temp_path, json)
            .context(format!("Failed to write cache file {}", temp_path.display()))?;
        std::fs::rename(&temp_path, &self.path).context(format!(
            "Failed to move cache file into place at {}",
            self.path.display()
        ))?;

        debug!("Saved {} cache records to {}", records.len(), self.path.display());
        Ok(())
    }
}

/// In-process storage, for running the cache without touching disk
#[derive(Debug, Default)]
pub struct MemoryStorage {
    snapshot: Mutex<HashMap<String, String>>,
    fail_saves: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing set of records
    pub fn with_records(records: HashMap<String, String>) -> Self {
        Self {
            snapshot: Mutex::new(records),
            fail_saves: AtomicBool::new(false),
        }
    }

    /// Make subsequent saves fail (or succeed again)
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Copy of the last successfully saved mapping
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CacheStorage for MemoryStorage {
    fn load(&self) -> Result<HashMap<String, String>> {
        Ok(self.snapshot())
    }

    fn save(&self, records: &HashMap<String, String>) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            anyhow::bail!("Memory storage is configured to reject saves");
        }
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = records.clone();
        Ok(())
    }
}
