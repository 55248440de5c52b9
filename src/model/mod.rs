/*!
 * Data model shared by the mapper, the wire client and the sync engine.
 */

pub mod entry;
pub mod record;
pub mod report;

pub use entry::{content_hash, EntryId, EntryMetadata, EntryRole, EntryStatus, EntryStore, LocalizationEntry};
pub use record::{GridCell, GridRecord};
pub use report::{EntryFailure, FatalError, Operation, Outcome, SyncReport};
