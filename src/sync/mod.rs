/*!
 * Sync engine: sessions, diffing, conflict policy, batching and cancellation.
 */

pub mod batch;
pub mod cancel;
pub mod diff;
pub mod engine;
pub mod session;

pub use batch::{plan_batches, BatchItem, SyncBatch};
pub use cancel::CancellationToken;
pub use diff::{classify, ChangeKind, Resolution};
pub use engine::{ProgressFn, SyncEngine};
pub use session::{SyncSession, SyncState};
