/*!
 * Local form of the grid: one localization entry per (key, culture).
 */

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use crate::culture::normalize_culture;
use crate::errors::StoreError;
use crate::model::record::GridCell;

/// SHA-256 of a text, hex encoded
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Identity of an entry within a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId {
    pub key: String,
    pub culture: String,
}

impl EntryId {
    pub fn new(key: impl Into<String>, culture: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            culture: culture.into(),
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.key, self.culture)
    }
}

/// Whether an entry holds the native text or a translation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryRole {
    Source,
    #[default]
    Target,
}

/// Translation workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    #[default]
    New,
    Translated,
    Approved,
    Outdated,
}

impl EntryStatus {
    /// Derive a status from a cell's text and grid dependency status
    pub fn from_grid(text: &str, dependency_status: Option<&str>) -> Self {
        match dependency_status {
            Some(s) if s.eq_ignore_ascii_case("outOfDate") => Self::Outdated,
            Some(s) if s.eq_ignore_ascii_case("upToDate") && !text.is_empty() => Self::Approved,
            _ if text.is_empty() => Self::New,
            _ => Self::Translated,
        }
    }
}

/// Optional attributes carried alongside the text
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntryMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Raw dependency status of the culture cell
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency_status: Option<String>,

    /// Record path when it is not used as the namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Cells the mapper did not recognise, kept verbatim
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_columns: Vec<GridCell>,

    /// Culture cell the text was read from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_cell: Option<GridCell>,

    /// Namespace and metadata cells as read, written back while their parsed
    /// values are unchanged
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata_cells: Vec<GridCell>,

    /// Column order of the record the entry was read from
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub column_order: Vec<String>,
}

/// A single translatable string for one culture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizationEntry {
    pub key: String,
    pub culture: String,
    pub text: String,

    #[serde(default)]
    pub role: EntryRole,

    #[serde(default)]
    pub status: EntryStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default)]
    pub metadata: EntryMetadata,

    /// Hash of the text at the last successful sync
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_hash: Option<String>,
}

impl LocalizationEntry {
    pub fn new(key: impl Into<String>, culture: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            culture: culture.into(),
            text: text.into(),
            role: EntryRole::Target,
            status: EntryStatus::New,
            namespace: None,
            metadata: EntryMetadata::default(),
            synced_hash: None,
        }
    }

    pub fn source(key: impl Into<String>, culture: impl Into<String>, text: impl Into<String>) -> Self {
        let mut entry = Self::new(key, culture, text);
        entry.role = EntryRole::Source;
        entry
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_status(mut self, status: EntryStatus) -> Self {
        self.status = status;
        self
    }

    /// Mark the current text as the sync baseline
    pub fn synced(mut self) -> Self {
        self.mark_synced();
        self
    }

    pub fn id(&self) -> EntryId {
        EntryId::new(self.key.clone(), self.culture.clone())
    }

    pub fn content_hash(&self) -> String {
        content_hash(&self.text)
    }

    /// Whether the text changed since the last sync
    ///
    /// Without a baseline only non-empty text counts as a local change.
    pub fn is_dirty(&self) -> bool {
        match &self.synced_hash {
            Some(hash) => *hash != self.content_hash(),
            None => !self.text.is_empty(),
        }
    }

    pub fn mark_synced(&mut self) {
        self.synced_hash = Some(self.content_hash());
    }
}

/// Rewrite the culture in canonical form; cultures that cannot be normalized
/// are kept as written and fail later when mapped to a column
fn canonical(mut entry: LocalizationEntry) -> LocalizationEntry {
    if let Some(culture) = normalize_culture(&entry.culture) {
        entry.culture = culture;
    }
    entry
}

/// Snapshot of local entries keyed by (key, canonical culture)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryStore {
    entries: BTreeMap<EntryId, LocalizationEntry>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store, rejecting (key, culture) pairs that collide once
    /// cultures are normalized
    pub fn from_entries(entries: Vec<LocalizationEntry>) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for entry in entries {
            let entry = canonical(entry);
            let id = entry.id();
            if store.entries.contains_key(&id) {
                return Err(StoreError::DuplicateEntry {
                    key: id.key,
                    culture: id.culture,
                });
            }
            store.entries.insert(id, entry);
        }
        Ok(store)
    }

    pub fn get(&self, id: &EntryId) -> Option<&LocalizationEntry> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &EntryId) -> Option<&mut LocalizationEntry> {
        self.entries.get_mut(id)
    }

    /// Insert or replace an entry
    pub fn upsert(&mut self, entry: LocalizationEntry) {
        let entry = canonical(entry);
        self.entries.insert(entry.id(), entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = &LocalizationEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<LocalizationEntry> {
        self.entries.values().cloned().collect()
    }
}
