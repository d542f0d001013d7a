//! `SQLite` implementation of [`ReadingRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use keel_app::ports::ReadingRepository;
use keel_domain::error::KeelError;
use keel_domain::reading::Reading;

use crate::error::StorageError;

struct Wrapper(Reading);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let recorded_at: String = row.try_get("recorded_at")?;
        let heart_rate: i64 = row.try_get("heart_rate")?;
        let hrv_ms: f64 = row.try_get("hrv_ms")?;
        let stress: i64 = row.try_get("stress")?;

        let recorded_at = chrono::DateTime::parse_from_rfc3339(&recorded_at)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?
            .to_utc();
        let heart_rate =
            u16::try_from(heart_rate).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let stress = u8::try_from(stress).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(Reading {
            heart_rate,
            hrv_ms,
            stress,
            recorded_at,
        }))
    }
}

// The natural key makes the insert idempotent: replaying a reading during
// an offline-queue flush is a no-op.
const INSERT: &str = r"
    INSERT INTO readings (recorded_at, heart_rate, hrv_ms, stress)
    VALUES (?, ?, ?, ?)
    ON CONFLICT (recorded_at) DO NOTHING
";

const SELECT_RECENT: &str = "SELECT * FROM readings ORDER BY recorded_at DESC LIMIT ?";

/// `SQLite`-backed reading repository.
pub struct SqliteReadingRepository {
    pool: SqlitePool,
}

impl SqliteReadingRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ReadingRepository for SqliteReadingRepository {
    async fn insert(&self, reading: &Reading) -> Result<(), KeelError> {
        sqlx::query(INSERT)
            .bind(reading.recorded_at.to_rfc3339())
            .bind(i64::from(reading.heart_rate))
            .bind(reading.hrv_ms)
            .bind(i64::from(reading.stress))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Reading>, KeelError> {
        let limit = i32::try_from(limit).unwrap_or(i32::MAX);
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_RECENT)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use keel_domain::time::now;

    async fn setup() -> SqliteReadingRepository {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteReadingRepository::new(db.pool().clone())
    }

    fn reading(heart_rate: u16, offset_secs: i64) -> Reading {
        Reading::derive(heart_rate, now() + chrono::Duration::seconds(offset_secs))
    }

    #[tokio::test]
    async fn should_insert_and_retrieve_reading() {
        let repo = setup().await;
        let sample = reading(72, 0);

        repo.insert(&sample).await.unwrap();

        let recent = repo.recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0], sample);
    }

    #[tokio::test]
    async fn should_ignore_duplicate_recording_timestamp() {
        let repo = setup().await;
        let sample = reading(72, 0);

        repo.insert(&sample).await.unwrap();
        repo.insert(&sample).await.unwrap();

        let recent = repo.recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
    }

    #[tokio::test]
    async fn should_return_recent_readings_newest_first() {
        let repo = setup().await;
        repo.insert(&reading(70, 0)).await.unwrap();
        repo.insert(&reading(75, 1)).await.unwrap();
        repo.insert(&reading(80, 2)).await.unwrap();

        let recent = repo.recent(10).await.unwrap();
        let rates: Vec<u16> = recent.iter().map(|r| r.heart_rate).collect();
        assert_eq!(rates, vec![80, 75, 70]);
    }

    #[tokio::test]
    async fn should_respect_limit_on_recent() {
        let repo = setup().await;
        for offset in 0..5 {
            repo.insert(&reading(70, offset)).await.unwrap();
        }

        let recent = repo.recent(3).await.unwrap();
        assert_eq!(recent.len(), 3);
    }

    #[tokio::test]
    async fn should_return_empty_when_no_readings() {
        let repo = setup().await;
        assert!(repo.recent(10).await.unwrap().is_empty());
    }
}
