//! `SQLite` implementation of [`OfflineQueue`].
//!
//! Readings are stored as their JSON form with an autoincrement id, so
//! enqueue order survives restarts and `load` returns entries exactly in
//! the order they were appended.

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use keel_app::ports::{OfflineQueue, QueueEntry, QueueEntryId};
use keel_domain::error::KeelError;
use keel_domain::reading::Reading;

use crate::error::StorageError;

struct Wrapper(QueueEntry);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: i64 = row.try_get("id")?;
        let enqueued_at: String = row.try_get("enqueued_at")?;
        let reading: String = row.try_get("reading")?;

        let enqueued_at = chrono::DateTime::parse_from_rfc3339(&enqueued_at)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?
            .to_utc();
        let reading: Reading =
            serde_json::from_str(&reading).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(QueueEntry {
            id,
            enqueued_at,
            reading,
        }))
    }
}

const INSERT: &str = "INSERT INTO offline_queue (enqueued_at, reading) VALUES (?, ?)";
const SELECT_ALL: &str = "SELECT * FROM offline_queue ORDER BY id";
const DELETE_BY_ID: &str = "DELETE FROM offline_queue WHERE id = ?";

/// `SQLite`-backed durable offline queue.
pub struct SqliteOfflineQueue {
    pool: SqlitePool,
}

impl SqliteOfflineQueue {
    /// Create a new queue using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl OfflineQueue for SqliteOfflineQueue {
    async fn append(&self, reading: &Reading) -> Result<QueueEntryId, KeelError> {
        let json = serde_json::to_string(reading).map_err(StorageError::from)?;

        let result = sqlx::query(INSERT)
            .bind(keel_domain::time::now().to_rfc3339())
            .bind(&json)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(result.last_insert_rowid())
    }

    async fn load(&self) -> Result<Vec<QueueEntry>, KeelError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn remove(&self, id: QueueEntryId) -> Result<(), KeelError> {
        sqlx::query(DELETE_BY_ID)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use keel_domain::time::now;

    async fn setup() -> SqliteOfflineQueue {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteOfflineQueue::new(db.pool().clone())
    }

    fn reading(heart_rate: u16, offset_secs: i64) -> Reading {
        Reading::derive(heart_rate, now() + chrono::Duration::seconds(offset_secs))
    }

    #[tokio::test]
    async fn should_append_and_load_in_enqueue_order() {
        let queue = setup().await;
        queue.append(&reading(70, 0)).await.unwrap();
        queue.append(&reading(75, 1)).await.unwrap();
        queue.append(&reading(80, 2)).await.unwrap();

        let entries = queue.load().await.unwrap();
        let rates: Vec<u16> = entries.iter().map(|e| e.reading.heart_rate).collect();
        assert_eq!(rates, vec![70, 75, 80]);
    }

    #[tokio::test]
    async fn should_assign_strictly_increasing_ids() {
        let queue = setup().await;
        let first = queue.append(&reading(70, 0)).await.unwrap();
        let second = queue.append(&reading(75, 1)).await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn should_remove_entry_by_id() {
        let queue = setup().await;
        let head = queue.append(&reading(70, 0)).await.unwrap();
        queue.append(&reading(75, 1)).await.unwrap();

        queue.remove(head).await.unwrap();

        let entries = queue.load().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].reading.heart_rate, 75);
    }

    #[tokio::test]
    async fn should_preserve_reading_through_roundtrip() {
        let queue = setup().await;
        let sample = reading(92, 0);
        queue.append(&sample).await.unwrap();

        let entries = queue.load().await.unwrap();
        assert_eq!(entries[0].reading, sample);
    }

    #[tokio::test]
    async fn should_load_empty_queue() {
        let queue = setup().await;
        assert!(queue.load().await.unwrap().is_empty());
    }
}
