/*!
 * Local text sources: where entries live between sync sessions.
 */

use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

use crate::culture::cultures_match;
use crate::errors::StoreError;
use crate::model::LocalizationEntry;

/// Read and write the local entry snapshot
#[async_trait]
pub trait TextSource: Send + Sync + Debug {
    async fn read_local_entries(&self) -> Result<Vec<LocalizationEntry>, StoreError>;

    async fn write_local_entries(&self, entries: &[LocalizationEntry]) -> Result<(), StoreError>;
}

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    entries: Vec<LocalizationEntry>,
}

/// Entries stored as one JSON file, replaced atomically on write
#[derive(Debug, Clone)]
pub struct JsonTextSource {
    path: PathBuf,
}

impl JsonTextSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TextSource for JsonTextSource {
    async fn read_local_entries(&self) -> Result<Vec<LocalizationEntry>, StoreError> {
        if !self.path.exists() {
            debug!("Local store {} does not exist yet, starting empty", self.path.display());
            return Ok(Vec::new());
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(StoreError::Format(format!(
                "unsupported snapshot version {} in {}",
                snapshot.version,
                self.path.display()
            )));
        }
        Ok(snapshot.entries)
    }

    async fn write_local_entries(&self, entries: &[LocalizationEntry]) -> Result<(), StoreError> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            entries: entries.to_vec(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            std::fs::create_dir_all(&dir)?;
            let mut file = NamedTempFile::new_in(&dir)?;
            file.write_all(json.as_bytes())?;
            file.flush()?;
            file.persist(&path).map_err(|e| StoreError::Io(e.error.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Io(format!("write task failed: {}", e)))??;

        debug!("Wrote {} entries to {}", entries.len(), self.path.display());
        Ok(())
    }
}

/// Entries kept in memory, shared between clones
#[derive(Debug, Clone, Default)]
pub struct MemoryTextSource {
    entries: Arc<Mutex<Vec<LocalizationEntry>>>,
    writes: Arc<Mutex<usize>>,
}

impl MemoryTextSource {
    pub fn new(entries: Vec<LocalizationEntry>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(entries)),
            writes: Arc::new(Mutex::new(0)),
        }
    }

    pub fn entries(&self) -> Vec<LocalizationEntry> {
        self.entries.lock().clone()
    }

    /// Find an entry by key and culture
    pub fn entry(&self, key: &str, culture: &str) -> Option<LocalizationEntry> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.key == key && cultures_match(&e.culture, culture))
            .cloned()
    }

    /// Replace the text of an entry, as a local edit would
    pub fn edit(&self, key: &str, culture: &str, text: &str) -> bool {
        let mut entries = self.entries.lock();
        match entries.iter_mut().find(|e| e.key == key && cultures_match(&e.culture, culture)) {
            Some(entry) => {
                entry.text = text.to_string();
                true
            }
            None => false,
        }
    }

    /// Number of completed writes
    pub fn write_count(&self) -> usize {
        *self.writes.lock()
    }
}

#[async_trait]
impl TextSource for MemoryTextSource {
    async fn read_local_entries(&self) -> Result<Vec<LocalizationEntry>, StoreError> {
        Ok(self.entries())
    }

    async fn write_local_entries(&self, entries: &[LocalizationEntry]) -> Result<(), StoreError> {
        *self.entries.lock() = entries.to_vec();
        *self.writes.lock() += 1;
        Ok(())
    }
}
