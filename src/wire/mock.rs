/*!
 * In-memory grid for testing.
 *
 * The mock keeps records in insertion order, pages them like the service
 * does, and can simulate different failure behaviors:
 * - `MockGridClient::working()` - Always succeeds
 * - `MockGridClient::failing_auth()` - Every call is refused
 * - `MockGridClient::intermittent(n)` - Every nth call fails with a transport error
 *
 * Records seeded with `with_view` are served only for that view; every other
 * view reads and writes the default records.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::WireError;
use crate::model::{GridCell, GridRecord};
use crate::wire::{validate_identifiers, Ack, Cursor, GridClient, Page};

/// Behavior mode for the mock grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Every call fails with an authentication error
    FailingAuth,
    /// Every Nth call (fetch or upsert) fails with a transport error
    Intermittent { fail_every: usize },
    /// Every call is throttled
    RateLimited { retry_after_secs: u64 },
    /// The Nth upsert call (1-based) fails with a transport error
    FailUpsertCall { call: usize },
}

/// Mock grid client with shared state and call counters
#[derive(Debug, Clone)]
pub struct MockGridClient {
    behavior: MockBehavior,
    page_size: usize,
    records: Arc<Mutex<Vec<GridRecord>>>,
    views: Arc<Mutex<HashMap<String, Vec<GridRecord>>>>,
    fetched_views: Arc<Mutex<Vec<String>>>,
    rejected_ids: Arc<Mutex<HashSet<String>>>,
    submitted: Arc<Mutex<Vec<Vec<GridRecord>>>>,
    request_count: Arc<AtomicUsize>,
    fetch_count: Arc<AtomicUsize>,
    upsert_count: Arc<AtomicUsize>,
}

impl MockGridClient {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            page_size: 100,
            records: Arc::new(Mutex::new(Vec::new())),
            views: Arc::new(Mutex::new(HashMap::new())),
            fetched_views: Arc::new(Mutex::new(Vec::new())),
            rejected_ids: Arc::new(Mutex::new(HashSet::new())),
            submitted: Arc::new(Mutex::new(Vec::new())),
            request_count: Arc::new(AtomicUsize::new(0)),
            fetch_count: Arc::new(AtomicUsize::new(0)),
            upsert_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a working mock grid
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn failing_auth() -> Self {
        Self::new(MockBehavior::FailingAuth)
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Seed the grid with records
    pub fn with_records(self, records: Vec<GridRecord>) -> Self {
        *self.records.lock() = records;
        self
    }

    /// Seed the records of one view
    pub fn with_view(self, view_id: &str, records: Vec<GridRecord>) -> Self {
        self.views.lock().insert(view_id.to_string(), records);
        self
    }

    /// Upserts of these ids are answered without an acknowledgement
    pub fn rejecting(self, ids: &[&str]) -> Self {
        self.rejected_ids.lock().extend(ids.iter().map(|s| s.to_string()));
        self
    }

    /// Replace the record with the same id, as an edit made on the service
    pub fn put_record(&self, record: GridRecord) {
        let mut records = self.records.lock();
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    /// Set one cell of an existing record, as an edit made on the service
    pub fn set_cell(&self, id: &str, column_id: &str, text: &str) {
        let mut records = self.records.lock();
        if let Some(record) = records.iter_mut().find(|r| r.id == id) {
            match record.cells.iter_mut().find(|c| c.column_id == column_id) {
                Some(cell) => cell.value = serde_json::Value::String(text.to_string()),
                None => record.cells.push(GridCell::text(column_id, text)),
            }
        }
    }

    /// Upsert semantics: submitted cells replace or extend the stored ones
    fn merge_record(&self, record: &GridRecord) {
        let mut records = self.records.lock();
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => {
                if record.path.is_some() {
                    existing.path = record.path.clone();
                }
                for cell in &record.cells {
                    match existing.cells.iter_mut().find(|c| c.column_id == cell.column_id) {
                        Some(current) => *current = cell.clone(),
                        None => existing.cells.push(cell.clone()),
                    }
                }
            }
            None => records.push(record.clone()),
        }
    }

    pub fn records(&self) -> Vec<GridRecord> {
        self.records.lock().clone()
    }

    pub fn record(&self, id: &str) -> Option<GridRecord> {
        self.records.lock().iter().find(|r| r.id == id).cloned()
    }

    /// View of every fetch call, in order
    pub fn fetched_views(&self) -> Vec<String> {
        self.fetched_views.lock().clone()
    }

    /// Batches received by `upsert_records`, in order
    pub fn submitted_batches(&self) -> Vec<Vec<GridRecord>> {
        self.submitted.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub fn upsert_count(&self) -> usize {
        self.upsert_count.load(Ordering::SeqCst)
    }

    fn check_behavior(&self, upsert_call: Option<usize>) -> Result<(), WireError> {
        let request = self.request_count.fetch_add(1, Ordering::SeqCst) + 1;
        match self.behavior {
            MockBehavior::Working => Ok(()),
            MockBehavior::FailingAuth => Err(WireError::Auth("401 Unauthorized: invalid api key".to_string())),
            MockBehavior::Intermittent { fail_every } if fail_every > 0 && request % fail_every == 0 => {
                Err(WireError::Transport(format!("simulated failure on request {}", request)))
            }
            MockBehavior::Intermittent { .. } => Ok(()),
            MockBehavior::RateLimited { retry_after_secs } => Err(WireError::RateLimited {
                message: "too many requests".to_string(),
                retry_after_secs: Some(retry_after_secs),
            }),
            MockBehavior::FailUpsertCall { call } if upsert_call == Some(call) => {
                Err(WireError::Transport(format!("simulated failure on upsert {}", call)))
            }
            MockBehavior::FailUpsertCall { .. } => Ok(()),
        }
    }
}

#[async_trait]
impl GridClient for MockGridClient {
    async fn fetch_records(
        &self,
        project_id: &str,
        view_id: &str,
        cursor: Option<&Cursor>,
    ) -> Result<Page, WireError> {
        validate_identifiers(project_id, view_id)?;
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.check_behavior(None)?;

        self.fetched_views.lock().push(view_id.to_string());

        let offset = cursor.map(|c| c.offset()).transpose()?.unwrap_or(0);
        let views = self.views.lock();
        let default = self.records.lock();
        let records = views.get(view_id).unwrap_or(&*default);
        let end = (offset + self.page_size).min(records.len());
        let page = records.get(offset..end).map(|s| s.to_vec()).unwrap_or_default();
        let next_cursor = (end < records.len()).then(|| Cursor::from_offset(end));

        Ok(Page {
            records: page,
            next_cursor,
        })
    }

    async fn upsert_records(
        &self,
        project_id: &str,
        view_id: &str,
        records: &[GridRecord],
    ) -> Result<Vec<Ack>, WireError> {
        validate_identifiers(project_id, view_id)?;
        let call = self.upsert_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.check_behavior(Some(call))?;
        self.submitted.lock().push(records.to_vec());

        let rejected = self.rejected_ids.lock().clone();
        let mut acks = Vec::with_capacity(records.len());
        for record in records {
            if rejected.contains(&record.id) {
                acks.push(Ack::rejected(record.id.clone(), "record rejected by mock grid"));
            } else {
                self.merge_record(record);
                acks.push(Ack::accepted(record.id.clone()));
            }
        }
        Ok(acks)
    }

    async fn test_connection(&self, project_id: &str, view_id: &str) -> Result<(), WireError> {
        validate_identifiers(project_id, view_id)?;
        self.check_behavior(None)
    }
}
