//! `SQLite` implementation of [`SnapshotRepository`].
//!
//! Snapshots are stored as their JSON form, one row per domain; the
//! serde tag inside the payload matches the `domain` column.

use sqlx::{Row, SqlitePool};

use keel_app::ports::SnapshotRepository;
use keel_domain::error::KeelError;
use keel_domain::snapshot::{Domain, DomainSnapshot};
use keel_domain::time::now;

use crate::error::StorageError;

const UPSERT: &str = r"
    INSERT INTO snapshots (domain, data, updated_at)
    VALUES (?, ?, ?)
    ON CONFLICT (domain) DO UPDATE
    SET data = excluded.data, updated_at = excluded.updated_at
";

const SELECT_BY_DOMAIN: &str = "SELECT data FROM snapshots WHERE domain = ?";

/// `SQLite`-backed snapshot repository.
pub struct SqliteSnapshotRepository {
    pool: SqlitePool,
}

impl SqliteSnapshotRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl SnapshotRepository for SqliteSnapshotRepository {
    async fn save(&self, snapshot: &DomainSnapshot) -> Result<(), KeelError> {
        let data = serde_json::to_string(snapshot).map_err(StorageError::from)?;

        sqlx::query(UPSERT)
            .bind(snapshot.domain().as_str())
            .bind(&data)
            .bind(now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }

    async fn current(&self, domain: Domain) -> Result<Option<DomainSnapshot>, KeelError> {
        let row = sqlx::query(SELECT_BY_DOMAIN)
            .bind(domain.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let data: String = row.try_get("data").map_err(StorageError::from)?;
        let snapshot = serde_json::from_str(&data).map_err(StorageError::from)?;
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use keel_domain::snapshot::{Routine, Sensory, Sleep};

    async fn setup() -> SqliteSnapshotRepository {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteSnapshotRepository::new(db.pool().clone())
    }

    fn sleep(quality: u8) -> DomainSnapshot {
        DomainSnapshot::Sleep(Sleep {
            quality,
            duration_hours: 7.5,
            awakenings: 1,
        })
    }

    #[tokio::test]
    async fn should_save_and_load_current_snapshot() {
        let repo = setup().await;
        let snapshot = sleep(7);

        repo.save(&snapshot).await.unwrap();

        let current = repo.current(Domain::Sleep).await.unwrap();
        assert_eq!(current, Some(snapshot));
    }

    #[tokio::test]
    async fn should_return_none_when_domain_never_submitted() {
        let repo = setup().await;
        assert!(repo.current(Domain::Sensory).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_replace_snapshot_wholesale() {
        let repo = setup().await;
        repo.save(&sleep(3)).await.unwrap();
        repo.save(&sleep(8)).await.unwrap();

        let current = repo.current(Domain::Sleep).await.unwrap().unwrap();
        assert_eq!(current, sleep(8));
    }

    #[tokio::test]
    async fn should_keep_domains_independent() {
        let repo = setup().await;
        repo.save(&sleep(7)).await.unwrap();
        repo.save(&DomainSnapshot::Sensory(Sensory {
            noise: 80,
            light: 40,
            crowding: 20,
            temperature: 50,
        }))
        .await
        .unwrap();
        repo.save(&DomainSnapshot::Routine(Routine {
            deviation_score: 45,
            unexpected_change: true,
        }))
        .await
        .unwrap();

        assert_eq!(repo.current(Domain::Sleep).await.unwrap(), Some(sleep(7)));
        assert!(repo.current(Domain::Sensory).await.unwrap().is_some());
        assert!(repo.current(Domain::Routine).await.unwrap().is_some());
        assert!(repo.current(Domain::Behavioral).await.unwrap().is_none());
    }
}
