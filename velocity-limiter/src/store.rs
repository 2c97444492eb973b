//! Persistent run-start history

use parking_lot::{Mutex, RwLock};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{HistoryError, HistoryResult};

/// Ordered list of run-start timestamps in epoch milliseconds
pub trait HistoryStore: Send + Sync {
    /// All stored timestamps, oldest first
    fn read(&self) -> HistoryResult<Vec<i64>>;

    /// Record a run start
    fn append(&self, timestamp: i64) -> HistoryResult<()>;

    /// Drop entries at or before `cutoff` and return what remains
    fn prune(&self, cutoff: i64) -> HistoryResult<Vec<i64>>;

    /// Append only if the stored history still equals `expected`.
    ///
    /// Returns `false` without writing when the history changed.
    fn compare_and_append(&self, expected: &[i64], timestamp: i64) -> HistoryResult<bool>;

    /// Forget every entry
    fn clear(&self) -> HistoryResult<()>;
}

/// History kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    entries: RwLock<Vec<i64>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<i64>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn read(&self) -> HistoryResult<Vec<i64>> {
        Ok(self.entries.read().clone())
    }

    fn append(&self, timestamp: i64) -> HistoryResult<()> {
        self.entries.write().push(timestamp);
        Ok(())
    }

    fn prune(&self, cutoff: i64) -> HistoryResult<Vec<i64>> {
        let mut entries = self.entries.write();
        entries.retain(|t| *t > cutoff);
        Ok(entries.clone())
    }

    fn compare_and_append(&self, expected: &[i64], timestamp: i64) -> HistoryResult<bool> {
        let mut entries = self.entries.write();
        if entries.as_slice() != expected {
            return Ok(false);
        }
        entries.push(timestamp);
        Ok(true)
    }

    fn clear(&self) -> HistoryResult<()> {
        self.entries.write().clear();
        Ok(())
    }
}

/// History stored as a JSON array of numbers in a single file.
///
/// A missing or unreadable file is treated as empty history. Writes go to a
/// sibling temp file first and are renamed into place. Concurrent writers in
/// other processes are not coordinated.
#[derive(Debug)]
pub struct JsonFileHistoryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `<data dir>/velocity/history.json`
    pub fn default_path() -> HistoryResult<PathBuf> {
        dirs::data_local_dir()
            .map(|dir| dir.join("velocity").join("history.json"))
            .ok_or(HistoryError::NoStorageLocation)
    }

    /// Store at the configured path, or the default location
    pub fn from_config_path(path: Option<&str>) -> HistoryResult<Self> {
        match path {
            Some(path) => Ok(Self::new(path)),
            None => Ok(Self::new(Self::default_path()?)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> HistoryResult<Vec<i64>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let parsed = match String::from_utf8(bytes) {
            Ok(content) if content.trim().is_empty() => return Ok(Vec::new()),
            Ok(content) => parse_timestamps(&content),
            Err(_) => None,
        };

        match parsed {
            Some(entries) => Ok(entries),
            None => {
                warn!(
                    "Ignoring corrupt run history at {}",
                    self.path.display()
                );
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, entries: &[i64]) -> HistoryResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!("Saved {} history entries to {}", entries.len(), self.path.display());
        Ok(())
    }
}

/// Parse a JSON array of numbers; anything else is corrupt
fn parse_timestamps(content: &str) -> Option<Vec<i64>> {
    let value: serde_json::Value = serde_json::from_str(content).ok()?;
    value
        .as_array()?
        .iter()
        .map(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .collect()
}

impl HistoryStore for JsonFileHistoryStore {
    fn read(&self) -> HistoryResult<Vec<i64>> {
        let _guard = self.lock.lock();
        self.load()
    }

    fn append(&self, timestamp: i64) -> HistoryResult<()> {
        let _guard = self.lock.lock();
        let mut entries = self.load()?;
        entries.push(timestamp);
        self.save(&entries)
    }

    fn prune(&self, cutoff: i64) -> HistoryResult<Vec<i64>> {
        let _guard = self.lock.lock();
        let entries = self.load()?;
        let kept: Vec<i64> = entries.iter().copied().filter(|t| *t > cutoff).collect();
        if kept.len() != entries.len() {
            self.save(&kept)?;
        }
        Ok(kept)
    }

    fn compare_and_append(&self, expected: &[i64], timestamp: i64) -> HistoryResult<bool> {
        let _guard = self.lock.lock();
        let mut entries = self.load()?;
        if entries.as_slice() != expected {
            return Ok(false);
        }
        entries.push(timestamp);
        self.save(&entries)?;
        Ok(true)
    }

    fn clear(&self) -> HistoryResult<()> {
        let _guard = self.lock.lock();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
