//! Offline-first reading persistence.
//!
//! Readings are written through to the repository when it is reachable
//! and parked in the durable offline queue when it is not. The queue is
//! strictly FIFO: while anything is queued, new readings go to the tail
//! rather than jumping ahead, so the repository always receives readings
//! in chronological order. Flushing is at-least-once; the repository's
//! idempotent insert absorbs replays.

use keel_domain::error::KeelError;
use keel_domain::reading::Reading;

use crate::ports::{OfflineQueue, ReadingRepository};

/// Attempts per reading before it is parked in the queue.
const STORE_ATTEMPTS: u8 = 2;

/// Where a reading ended up after [`SyncManager::store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// Written through to the repository.
    Persisted,
    /// Parked in the offline queue.
    Queued,
}

/// Write-through reading store with a durable offline fallback.
pub struct SyncManager<R, Q> {
    readings: R,
    queue: Q,
    queued: usize,
}

impl<R: ReadingRepository, Q: OfflineQueue> SyncManager<R, Q> {
    pub fn new(readings: R, queue: Q) -> Self {
        Self {
            readings,
            queue,
            queued: 0,
        }
    }

    /// Number of readings currently parked in the queue.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queued
    }

    /// Count entries surviving from a previous session.
    ///
    /// Call once at startup before the first [`store`](Self::store) so
    /// new readings line up behind them.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the queue cannot be read.
    pub async fn reload(&mut self) -> Result<(), KeelError> {
        let entries = self.queue.load().await?;
        self.queued = entries.len();
        if self.queued > 0 {
            tracing::info!(count = self.queued, "offline queue survived restart");
        }
        Ok(())
    }

    /// Persist a reading, falling back to the offline queue.
    ///
    /// While the queue is non-empty the reading is appended directly so
    /// it cannot overtake older queued readings.
    ///
    /// # Errors
    ///
    /// Returns an error only when both the repository and the queue
    /// reject the reading; the reading is then lost to durable storage
    /// and the caller decides whether to surface that.
    #[tracing::instrument(skip(self, reading), fields(recorded_at = %reading.recorded_at))]
    pub async fn store(&mut self, reading: &Reading) -> Result<StoreOutcome, KeelError> {
        if self.queued == 0 {
            let mut last_err = None;
            for attempt in 1..=STORE_ATTEMPTS {
                match self.readings.insert(reading).await {
                    Ok(()) => return Ok(StoreOutcome::Persisted),
                    Err(err) => {
                        tracing::debug!(%err, attempt, "reading insert failed");
                        last_err = Some(err);
                    }
                }
            }
            if let Some(err) = last_err {
                tracing::warn!(%err, "storage unreachable, parking reading in offline queue");
            }
        }

        self.queue.append(reading).await?;
        self.queued += 1;
        Ok(StoreOutcome::Queued)
    }

    /// Drain the queue head-first into the repository.
    ///
    /// Stops at the first entry that fails to persist so order is never
    /// broken; the remainder stays queued for the next flush. Returns
    /// the number of entries delivered.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the queue itself cannot be read.
    #[tracing::instrument(skip(self))]
    pub async fn flush(&mut self) -> Result<usize, KeelError> {
        let entries = self.queue.load().await?;
        let mut delivered = 0;
        for entry in entries {
            if let Err(err) = self.readings.insert(&entry.reading).await {
                tracing::debug!(%err, entry = entry.id, "flush stopped, storage still unreachable");
                break;
            }
            // Removal failure leaves the entry for a replay; the insert
            // above is idempotent so the replay is harmless.
            if let Err(err) = self.queue.remove(entry.id).await {
                tracing::warn!(%err, entry = entry.id, "failed to remove flushed queue entry");
                break;
            }
            delivered += 1;
        }
        self.queued = self.queued.saturating_sub(delivered);
        if delivered > 0 {
            tracing::info!(delivered, remaining = self.queued, "offline queue flushed");
        }
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{QueueEntry, QueueEntryId};
    use keel_domain::time::now;
    use std::future::Future;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct InMemoryReadingRepo {
        rows: Mutex<Vec<Reading>>,
        fail: AtomicBool,
    }

    impl InMemoryReadingRepo {
        fn set_failing(&self, failing: bool) {
            self.fail.store(failing, Ordering::SeqCst);
        }

        fn stored(&self) -> Vec<Reading> {
            self.rows.lock().unwrap().clone()
        }
    }

    impl ReadingRepository for &InMemoryReadingRepo {
        fn insert(&self, reading: &Reading) -> impl Future<Output = Result<(), KeelError>> + Send {
            let result = if self.fail.load(Ordering::SeqCst) {
                Err(KeelError::Storage("unreachable".into()))
            } else {
                let mut rows = self.rows.lock().unwrap();
                if !rows.iter().any(|r| r.recorded_at == reading.recorded_at) {
                    rows.push(reading.clone());
                }
                Ok(())
            };
            async { result }
        }

        fn recent(
            &self,
            limit: usize,
        ) -> impl Future<Output = Result<Vec<Reading>, KeelError>> + Send {
            let mut rows = self.rows.lock().unwrap().clone();
            rows.reverse();
            rows.truncate(limit);
            async { Ok(rows) }
        }
    }

    #[derive(Default)]
    struct InMemoryQueue {
        entries: Mutex<Vec<QueueEntry>>,
        next_id: Mutex<QueueEntryId>,
    }

    impl OfflineQueue for &InMemoryQueue {
        fn append(
            &self,
            reading: &Reading,
        ) -> impl Future<Output = Result<QueueEntryId, KeelError>> + Send {
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            let id = *next_id;
            self.entries.lock().unwrap().push(QueueEntry {
                id,
                enqueued_at: now(),
                reading: reading.clone(),
            });
            async move { Ok(id) }
        }

        fn load(&self) -> impl Future<Output = Result<Vec<QueueEntry>, KeelError>> + Send {
            let entries = self.entries.lock().unwrap().clone();
            async { Ok(entries) }
        }

        fn remove(&self, id: QueueEntryId) -> impl Future<Output = Result<(), KeelError>> + Send {
            self.entries.lock().unwrap().retain(|e| e.id != id);
            async { Ok(()) }
        }
    }

    fn reading(heart_rate: u16, offset_secs: i64) -> Reading {
        Reading::derive(heart_rate, now() + chrono::Duration::seconds(offset_secs))
    }

    #[tokio::test]
    async fn should_write_through_when_storage_is_reachable() {
        let repo = InMemoryReadingRepo::default();
        let queue = InMemoryQueue::default();
        let mut sync = SyncManager::new(&repo, &queue);

        let outcome = sync.store(&reading(72, 0)).await.unwrap();
        assert_eq!(outcome, StoreOutcome::Persisted);
        assert_eq!(repo.stored().len(), 1);
        assert_eq!(sync.queue_len(), 0);
    }

    #[tokio::test]
    async fn should_queue_when_storage_is_unreachable() {
        let repo = InMemoryReadingRepo::default();
        let queue = InMemoryQueue::default();
        let mut sync = SyncManager::new(&repo, &queue);

        repo.set_failing(true);
        let outcome = sync.store(&reading(72, 0)).await.unwrap();
        assert_eq!(outcome, StoreOutcome::Queued);
        assert_eq!(sync.queue_len(), 1);
        assert!(repo.stored().is_empty());
    }

    #[tokio::test]
    async fn should_keep_queueing_behind_existing_entries() {
        let repo = InMemoryReadingRepo::default();
        let queue = InMemoryQueue::default();
        let mut sync = SyncManager::new(&repo, &queue);

        repo.set_failing(true);
        sync.store(&reading(70, 0)).await.unwrap();

        // Storage recovers, but a live reading must not overtake the
        // queued one.
        repo.set_failing(false);
        let outcome = sync.store(&reading(75, 1)).await.unwrap();
        assert_eq!(outcome, StoreOutcome::Queued);
        assert_eq!(sync.queue_len(), 2);
        assert!(repo.stored().is_empty());
    }

    #[tokio::test]
    async fn should_flush_in_enqueue_order() {
        let repo = InMemoryReadingRepo::default();
        let queue = InMemoryQueue::default();
        let mut sync = SyncManager::new(&repo, &queue);

        repo.set_failing(true);
        sync.store(&reading(70, 0)).await.unwrap();
        sync.store(&reading(75, 1)).await.unwrap();
        sync.store(&reading(80, 2)).await.unwrap();

        repo.set_failing(false);
        let delivered = sync.flush().await.unwrap();
        assert_eq!(delivered, 3);
        assert_eq!(sync.queue_len(), 0);

        let rates: Vec<u16> = repo.stored().iter().map(|r| r.heart_rate).collect();
        assert_eq!(rates, vec![70, 75, 80]);
    }

    #[tokio::test]
    async fn should_stop_flush_at_first_failure() {
        let repo = InMemoryReadingRepo::default();
        let queue = InMemoryQueue::default();
        let mut sync = SyncManager::new(&repo, &queue);

        repo.set_failing(true);
        sync.store(&reading(70, 0)).await.unwrap();
        sync.store(&reading(75, 1)).await.unwrap();

        // Still down: nothing is delivered, nothing is dropped.
        let delivered = sync.flush().await.unwrap();
        assert_eq!(delivered, 0);
        assert_eq!(sync.queue_len(), 2);
    }

    #[tokio::test]
    async fn should_reload_surviving_entries_on_startup() {
        let repo = InMemoryReadingRepo::default();
        let queue = InMemoryQueue::default();

        {
            let mut first = SyncManager::new(&repo, &queue);
            repo.set_failing(true);
            first.store(&reading(70, 0)).await.unwrap();
            first.store(&reading(75, 1)).await.unwrap();
        }

        // A fresh session sees the surviving entries and flushes them.
        let mut second = SyncManager::new(&repo, &queue);
        second.reload().await.unwrap();
        assert_eq!(second.queue_len(), 2);

        repo.set_failing(false);
        assert_eq!(second.flush().await.unwrap(), 2);
        assert_eq!(repo.stored().len(), 2);
    }

    #[tokio::test]
    async fn should_tolerate_replayed_flush_entries() {
        let repo = InMemoryReadingRepo::default();
        let queue = InMemoryQueue::default();
        let mut sync = SyncManager::new(&repo, &queue);

        let sample = reading(72, 0);
        repo.set_failing(true);
        sync.store(&sample).await.unwrap();
        repo.set_failing(false);
        sync.flush().await.unwrap();

        // A replay of the same reading is absorbed by the idempotent
        // insert.
        repo.set_failing(true);
        sync.store(&sample).await.unwrap();
        repo.set_failing(false);
        sync.flush().await.unwrap();
        assert_eq!(repo.stored().len(), 1);
    }
}
