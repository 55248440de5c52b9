/*!
 * Change detection between local entries and remote entries.
 *
 * Each side is compared against the entry's `synced_hash`, the hash of the
 * text at the last successful sync.
 */

use crate::app_config::ConflictPolicy;
use crate::model::{content_hash, EntryStore, LocalizationEntry};

/// How a remote entry relates to its local counterpart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// No local entry exists
    Create,
    /// Only the remote side changed
    Update,
    /// Both sides hold the same text
    Unchanged,
    /// Only the local side changed
    LocalAhead,
    /// Both sides changed to different texts
    Conflict,
}

/// What pull does with a conflicting entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Overwrite local with remote
    TakeRemote,
    /// Keep local text, adopt the remote baseline
    KeepLocal,
    /// Leave both sides alone and report the conflict
    Report,
}

impl Resolution {
    pub fn for_policy(policy: ConflictPolicy) -> Self {
        match policy {
            ConflictPolicy::RemoteWins => Self::TakeRemote,
            ConflictPolicy::LocalWins => Self::KeepLocal,
            ConflictPolicy::Skip => Self::Report,
        }
    }
}

/// Classify one remote entry against the local snapshot
pub fn classify(local: Option<&LocalizationEntry>, remote: &LocalizationEntry) -> ChangeKind {
    let Some(local) = local else {
        return ChangeKind::Create;
    };
    if local.text == remote.text {
        return ChangeKind::Unchanged;
    }

    let local_changed = local.is_dirty();
    let remote_changed = match &local.synced_hash {
        Some(baseline) => *baseline != content_hash(&remote.text),
        None => true,
    };

    match (local_changed, remote_changed) {
        (true, true) => ChangeKind::Conflict,
        (true, false) => ChangeKind::LocalAhead,
        _ => ChangeKind::Update,
    }
}

/// One classified remote entry
#[derive(Debug, Clone, PartialEq)]
pub struct EntryChange {
    pub kind: ChangeKind,
    pub remote: LocalizationEntry,
}

/// Classify every remote entry against the store
pub fn diff_entries(store: &EntryStore, remote: Vec<LocalizationEntry>) -> Vec<EntryChange> {
    remote
        .into_iter()
        .map(|entry| EntryChange {
            kind: classify(store.get(&entry.id()), &entry),
            remote: entry,
        })
        .collect()
}

/// Local entries that changed since their last sync
pub fn pending_local_changes<'a>(
    store: &'a EntryStore,
    include: impl Fn(&LocalizationEntry) -> bool + 'a,
) -> impl Iterator<Item = &'a LocalizationEntry> + 'a {
    store.iter().filter(move |e| include(*e) && e.is_dirty())
}
