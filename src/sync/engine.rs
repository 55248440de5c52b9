/*!
 * Pull, push and status sessions.
 *
 * The engine owns one session at a time: it fetches pages and submits
 * batches strictly one after another, and it is the only writer of the
 * local store while a session is applying changes.
 */

use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::app_config::SyncSettings;
use crate::errors::{MappingError, ReasonCode, SyncError, WireError};
use crate::mapper::RecordMapper;
use crate::model::{
    content_hash, EntryId, EntryRole, EntryStore, GridRecord, LocalizationEntry, Operation, SyncReport,
};
use crate::sync::batch::{plan_batches, BatchItem, SyncBatch};
use crate::sync::diff::{diff_entries, pending_local_changes, ChangeKind, Resolution};
use crate::sync::{CancellationToken, SyncSession, SyncState};
use crate::text_source::TextSource;
use crate::wire::{Ack, Cursor, GridClient};

/// Progress callback: (done, total)
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

pub struct SyncEngine {
    client: Arc<dyn GridClient>,
    source: Arc<dyn TextSource>,
    settings: SyncSettings,
    mapper: RecordMapper,
    cancel: CancellationToken,
    progress: Option<ProgressFn>,
}

impl SyncEngine {
    pub fn new(client: Arc<dyn GridClient>, source: Arc<dyn TextSource>, settings: SyncSettings) -> Self {
        let mapper = RecordMapper::new(settings.layout().clone(), settings.converter().clone());
        Self {
            client,
            source,
            settings,
            mapper,
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Bring remote changes into the local store
    pub async fn pull(&self) -> SyncReport {
        let mut session = SyncSession::new(Operation::Pull);
        let mut report = SyncReport::new(Operation::Pull, session.id());
        let result = self.run_pull(&mut session, &mut report).await;
        self.conclude(session, report, result)
    }

    /// Send local changes to the grid
    pub async fn push(&self) -> SyncReport {
        let mut session = SyncSession::new(Operation::Push);
        let mut report = SyncReport::new(Operation::Push, session.id());
        let result = self.run_push(&mut session, &mut report).await;
        self.conclude(session, report, result)
    }

    /// Compute what pull and push would do, without writing anything
    pub async fn status(&self) -> SyncReport {
        let mut session = SyncSession::new(Operation::Status);
        let mut report = SyncReport::new(Operation::Status, session.id());
        let result = self.run_status(&mut session, &mut report).await;
        self.conclude(session, report, result)
    }

    fn conclude(&self, mut session: SyncSession, mut report: SyncReport, result: Result<(), SyncError>) -> SyncReport {
        report.started_at = session.started_at();
        if let Err(error) = result {
            session.fail(&error);
            report.set_fatal(&error);
        }
        report.finish();
        info!(
            "{} finished: created {}, updated {}, unchanged {}, skipped {}, conflicts {}, failed {}",
            report.operation,
            report.created,
            report.updated,
            report.unchanged,
            report.skipped,
            report.conflicts,
            report.failed
        );
        report
    }

    fn ensure_not_cancelled(&self) -> Result<(), SyncError> {
        if self.cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }

    fn report_progress(&self, done: usize, total: usize) {
        if let Some(progress) = &self.progress {
            progress(done, total);
        }
    }

    async fn run_pull(&self, session: &mut SyncSession, report: &mut SyncReport) -> Result<(), SyncError> {
        self.ensure_not_cancelled()?;
        session.transition(SyncState::Fetching)?;
        let records = self.fetch_all(report).await?;

        session.transition(SyncState::Diffing)?;
        if report.cancelled {
            info!("Pull cancelled after fetching {} records, local store untouched", records.len());
            return finish_session(session);
        }
        let mut store = self.load_store().await?;
        let remote = self.map_records(&records, report);
        let changes = diff_entries(&store, remote);

        session.transition(SyncState::Applying)?;
        let resolution = Resolution::for_policy(self.settings.conflict_policy());
        let mut store_changed = false;

        for change in changes {
            let remote = change.remote;
            let id = remote.id();
            match change.kind {
                ChangeKind::Create => {
                    store.upsert(remote.synced());
                    report.created += 1;
                    store_changed = true;
                }
                ChangeKind::Update => {
                    store.upsert(remote.synced());
                    report.updated += 1;
                    store_changed = true;
                }
                ChangeKind::Unchanged => {
                    report.unchanged += 1;
                    let refreshed = remote.synced();
                    if store.get(&id) != Some(&refreshed) {
                        store.upsert(refreshed);
                        store_changed = true;
                    }
                }
                ChangeKind::LocalAhead => {
                    debug!("{} changed locally, keeping local text", id);
                    report.skipped += 1;
                }
                ChangeKind::Conflict => {
                    report.conflicts += 1;
                    match resolution {
                        Resolution::TakeRemote => {
                            debug!("{} changed on both sides, taking remote text", id);
                            store.upsert(remote.synced());
                            report.updated += 1;
                            store_changed = true;
                        }
                        Resolution::KeepLocal => {
                            debug!("{} changed on both sides, keeping local text", id);
                            if let Some(local) = store.get_mut(&id) {
                                local.synced_hash = Some(content_hash(&remote.text));
                                store_changed = true;
                            }
                            report.skipped += 1;
                        }
                        Resolution::Report => {
                            warn!("{} changed on both sides, skipped", id);
                            report.record_failure(
                                &id,
                                ReasonCode::Conflict,
                                "local and remote texts both changed since the last sync",
                            );
                        }
                    }
                }
            }
        }

        if store_changed {
            self.source.write_local_entries(&store.to_vec()).await?;
        }

        session.transition(SyncState::Reporting)?;
        finish_session(session)
    }

    async fn run_push(&self, session: &mut SyncSession, report: &mut SyncReport) -> Result<(), SyncError> {
        self.ensure_not_cancelled()?;
        session.transition(SyncState::Diffing)?;
        let mut store = self.load_store().await?;
        let items = self.build_push_items(&store, report);
        let batches = plan_batches(items, self.settings.batch_size());
        report.batches_total = batches.len();
        info!(
            "Pushing {} records in {} batches to view {}",
            batches.iter().map(SyncBatch::len).sum::<usize>(),
            batches.len(),
            self.settings.view_id()
        );

        session.transition(SyncState::Applying)?;
        for batch in &batches {
            if self.cancel.is_cancelled() {
                info!("Push cancelled after {} of {} batches", report.batches_applied, batches.len());
                report.cancelled = true;
                break;
            }

            match self
                .client
                .upsert_records(self.settings.project_id(), self.settings.view_id(), &batch.records())
                .await
            {
                Ok(acks) => {
                    self.apply_acks(batch, &acks, &mut store, report);
                    report.batches_applied += 1;
                    self.source.write_local_entries(&store.to_vec()).await?;
                }
                Err(error) if aborts_session(&error) => return Err(error.into()),
                Err(error) => {
                    warn!("Batch {} of {} failed: {}", batch.number, batches.len(), error);
                    for id in batch.entry_ids() {
                        report.record_failure(id, error.reason_code(), error.to_string());
                    }
                }
            }
            self.report_progress(batch.number, batches.len());
        }

        session.transition(SyncState::Reporting)?;
        finish_session(session)
    }

    async fn run_status(&self, session: &mut SyncSession, report: &mut SyncReport) -> Result<(), SyncError> {
        self.ensure_not_cancelled()?;
        session.transition(SyncState::Fetching)?;
        let records = self.fetch_all(report).await?;

        session.transition(SyncState::Diffing)?;
        if !report.cancelled {
            let store = self.load_store().await?;
            let remote = self.map_records(&records, report);
            for change in diff_entries(&store, remote) {
                match change.kind {
                    ChangeKind::Create => report.created += 1,
                    ChangeKind::Update => report.updated += 1,
                    ChangeKind::Unchanged => report.unchanged += 1,
                    ChangeKind::LocalAhead => report.skipped += 1,
                    ChangeKind::Conflict => report.conflicts += 1,
                }
            }
            let pending = pending_local_changes(&store, |e| self.pushes(e)).count();
            report.pending_push = Some(pending);
        }

        session.transition(SyncState::Reporting)?;
        finish_session(session)
    }

    /// Fetch every page of every import view, stopping early when cancelled
    /// between pages; a record id seen in an earlier view wins
    async fn fetch_all(&self, report: &mut SyncReport) -> Result<Vec<GridRecord>, SyncError> {
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        let mut pages = 0;

        'views: for view_id in self.settings.import_view_ids() {
            let mut cursor: Option<Cursor> = None;
            loop {
                if pages > 0 && self.cancel.is_cancelled() {
                    report.cancelled = true;
                    break 'views;
                }

                let page = self
                    .client
                    .fetch_records(self.settings.project_id(), view_id, cursor.as_ref())
                    .await?;
                pages += 1;

                for record in page.records {
                    if seen.insert(record.id.clone()) {
                        records.push(record);
                    } else {
                        warn!("Duplicate record '{}' in view {} ignored", record.id, view_id);
                    }
                }

                let has_more = page.next_cursor.is_some();
                self.report_progress(pages, pages + usize::from(has_more));
                match page.next_cursor {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
        }

        debug!(
            "Fetched {} records in {} pages from {} views",
            records.len(),
            pages,
            self.settings.import_view_ids().len()
        );
        Ok(records)
    }

    async fn load_store(&self) -> Result<EntryStore, SyncError> {
        let entries = self.source.read_local_entries().await?;
        Ok(EntryStore::from_entries(entries)?)
    }

    /// Map records to entries, recording mapping failures and applying the culture filter
    fn map_records(&self, records: &[GridRecord], report: &mut SyncReport) -> Vec<LocalizationEntry> {
        let mut entries = Vec::new();
        let mut keys: HashSet<String> = HashSet::new();
        for record in records {
            let mapped = self.mapper.to_entries(record).and_then(|mapped| {
                if mapped.first().is_some_and(|e| keys.contains(&e.key)) {
                    return Err(MappingError::DuplicateKey {
                        record_id: record.id.clone(),
                        key: mapped[0].key.clone(),
                    });
                }
                Ok(mapped)
            });
            match mapped {
                Ok(mapped) => {
                    if let Some(entry) = mapped.first() {
                        keys.insert(entry.key.clone());
                    }
                    entries.extend(
                        mapped
                            .into_iter()
                            .filter(|e| self.settings.includes_culture(&e.culture)),
                    )
                }
                Err(error) => {
                    warn!("Skipping record '{}': {}", record.id, error);
                    let id = EntryId::new(record.id.clone(), error.culture().unwrap_or("*"));
                    report.record_failure(&id, error.reason_code(), error.to_string());
                }
            }
        }
        entries
    }

    /// Whether a changed entry takes part in push
    fn pushes(&self, entry: &LocalizationEntry) -> bool {
        self.settings.includes_culture(&entry.culture)
            && (self.settings.include_targets() || entry.role == EntryRole::Source)
    }

    /// Group changed local entries by key and turn each group into a record
    fn build_push_items(&self, store: &EntryStore, report: &mut SyncReport) -> Vec<BatchItem> {
        let mut groups: BTreeMap<&str, Vec<LocalizationEntry>> = BTreeMap::new();
        for entry in pending_local_changes(store, |e| self.pushes(e)) {
            groups.entry(entry.key.as_str()).or_default().push(entry.clone());
        }

        let mut items = Vec::with_capacity(groups.len());
        for (_, group) in groups {
            let mut valid = Vec::with_capacity(group.len());
            for entry in group {
                match self.mapper.column_for(&entry) {
                    Ok(_) => valid.push(entry),
                    Err(error) => {
                        warn!("Cannot push {}: {}", entry.id(), error);
                        report.record_failure(&entry.id(), error.reason_code(), error.to_string());
                    }
                }
            }
            if valid.is_empty() {
                continue;
            }

            match self.mapper.to_record(&valid) {
                Ok(record) => items.push(BatchItem {
                    record,
                    entries: valid.iter().map(LocalizationEntry::id).collect(),
                }),
                Err(error) => {
                    for entry in &valid {
                        report.record_failure(&entry.id(), error.reason_code(), error.to_string());
                    }
                }
            }
        }
        items
    }

    /// Advance baselines of acknowledged entries and record rejections
    fn apply_acks(&self, batch: &SyncBatch, acks: &[Ack], store: &mut EntryStore, report: &mut SyncReport) {
        let by_id: HashMap<&str, &Ack> = acks.iter().map(|a| (a.record_id.as_str(), a)).collect();

        for item in &batch.items {
            match by_id.get(item.record.id.as_str()) {
                Some(ack) if ack.accepted => {
                    for id in &item.entries {
                        if let Some(entry) = store.get_mut(id) {
                            if entry.synced_hash.is_none() {
                                report.created += 1;
                            } else {
                                report.updated += 1;
                            }
                            entry.mark_synced();
                        }
                    }
                }
                other => {
                    let message = other
                        .and_then(|ack| ack.message.clone())
                        .unwrap_or_else(|| "no acknowledgement returned".to_string());
                    for id in &item.entries {
                        report.record_failure(id, ReasonCode::Rejected, message.clone());
                    }
                }
            }
        }
    }
}

fn finish_session(session: &mut SyncSession) -> Result<(), SyncError> {
    if session.state() != SyncState::Reporting {
        session.transition(SyncState::Reporting)?;
    }
    session.transition(SyncState::Idle)
}

/// Failures that end the session; batches already applied stay applied
fn aborts_session(error: &WireError) -> bool {
    matches!(
        error,
        WireError::Auth(_) | WireError::InvalidRequest(_) | WireError::Transport(_)
    )
}
