/*!
 * Bounded batches of records for push.
 *
 * Every record remembers which local entries it was built from, so that
 * acknowledgements and failures can be attributed per entry.
 */

use crate::model::{EntryId, GridRecord};

/// A record and the entries merged into it
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub record: GridRecord,
    pub entries: Vec<EntryId>,
}

/// Ordered group of at most `batch_size` records
#[derive(Debug, Clone, PartialEq)]
pub struct SyncBatch {
    /// Position in the session, starting at 1
    pub number: usize,
    pub items: Vec<BatchItem>,
}

impl SyncBatch {
    pub fn records(&self) -> Vec<GridRecord> {
        self.items.iter().map(|item| item.record.clone()).collect()
    }

    pub fn entry_ids(&self) -> impl Iterator<Item = &EntryId> {
        self.items.iter().flat_map(|item| item.entries.iter())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Split items into consecutive batches, preserving order
pub fn plan_batches(items: Vec<BatchItem>, batch_size: usize) -> Vec<SyncBatch> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(items.len().div_ceil(batch_size));
    let mut current = Vec::with_capacity(batch_size.min(items.len()));

    for item in items {
        current.push(item);
        if current.len() == batch_size {
            batches.push(SyncBatch {
                number: batches.len() + 1,
                items: std::mem::take(&mut current),
            });
        }
    }
    if !current.is_empty() {
        batches.push(SyncBatch {
            number: batches.len() + 1,
            items: current,
        });
    }

    batches
}
