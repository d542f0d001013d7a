//! Offline queue port — a durable FIFO for readings that could not be
//! persisted.
//!
//! Entries are appended when the persistence collaborator is unreachable
//! and removed only after a confirmed write, giving at-least-once
//! delivery. Entries survive process restart; on startup they are
//! reloaded and flushed before any live reading is appended behind them,
//! preserving chronological order.

use std::future::Future;

use keel_domain::error::KeelError;
use keel_domain::reading::Reading;
use keel_domain::time::Timestamp;

/// Monotonic queue position assigned by the durable store.
pub type QueueEntryId = i64;

/// A queued reading with its enqueue time.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub id: QueueEntryId,
    pub enqueued_at: Timestamp,
    pub reading: Reading,
}

/// Durable FIFO buffer for unsynced readings.
pub trait OfflineQueue {
    /// Append a reading to the tail of the queue.
    fn append(
        &self,
        reading: &Reading,
    ) -> impl Future<Output = Result<QueueEntryId, KeelError>> + Send;

    /// All surviving entries in enqueue order (head first).
    fn load(&self) -> impl Future<Output = Result<Vec<QueueEntry>, KeelError>> + Send;

    /// Remove one entry after its reading was confirmed persisted.
    fn remove(&self, id: QueueEntryId) -> impl Future<Output = Result<(), KeelError>> + Send;
}
