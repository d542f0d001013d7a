//! `SQLite` implementation of [`WarningEventRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use keel_app::ports::WarningEventRepository;
use keel_domain::error::KeelError;
use keel_domain::id::{StrategyId, WarningEventId};
use keel_domain::warning::WarningEvent;

use crate::error::StorageError;

struct Wrapper(WarningEvent);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<WarningEvent> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let opened_at: String = row.try_get("opened_at")?;
        let intensity: i64 = row.try_get("intensity")?;
        let triggers: String = row.try_get("triggers")?;
        let applied_strategy: Option<uuid::Uuid> = row.try_get("applied_strategy")?;
        let closed_at: Option<String> = row.try_get("closed_at")?;
        let resolution_notes: Option<String> = row.try_get("resolution_notes")?;

        let opened_at = chrono::DateTime::parse_from_rfc3339(&opened_at)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?
            .to_utc();
        let intensity =
            u8::try_from(intensity).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let triggers: Vec<String> =
            serde_json::from_str(&triggers).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let closed_at = closed_at
            .map(|s| chrono::DateTime::parse_from_rfc3339(&s).map(|dt| dt.to_utc()))
            .transpose()
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(WarningEvent {
            id: WarningEventId::from_uuid(id),
            opened_at,
            intensity,
            triggers,
            applied_strategy: applied_strategy.map(StrategyId::from_uuid),
            closed_at,
            resolution_notes,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO warning_events
        (id, opened_at, intensity, triggers, applied_strategy, closed_at, resolution_notes)
    VALUES (?, ?, ?, ?, ?, ?, ?)
";

const CLOSE: &str = r"
    UPDATE warning_events
    SET applied_strategy = ?, closed_at = ?, resolution_notes = ?
    WHERE id = ?
";

const SELECT_OPEN: &str = "SELECT * FROM warning_events WHERE closed_at IS NULL LIMIT 1";
const SELECT_BY_ID: &str = "SELECT * FROM warning_events WHERE id = ?";

/// `SQLite`-backed warning event repository.
pub struct SqliteWarningEventRepository {
    pool: SqlitePool,
}

impl SqliteWarningEventRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl WarningEventRepository for SqliteWarningEventRepository {
    async fn create(&self, event: &WarningEvent) -> Result<(), KeelError> {
        let triggers = serde_json::to_string(&event.triggers).map_err(StorageError::from)?;

        sqlx::query(INSERT)
            .bind(event.id.as_uuid())
            .bind(event.opened_at.to_rfc3339())
            .bind(i64::from(event.intensity))
            .bind(&triggers)
            .bind(event.applied_strategy.map(StrategyId::as_uuid))
            .bind(event.closed_at.map(|dt| dt.to_rfc3339()))
            .bind(&event.resolution_notes)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }

    async fn close(&self, event: &WarningEvent) -> Result<(), KeelError> {
        sqlx::query(CLOSE)
            .bind(event.applied_strategy.map(StrategyId::as_uuid))
            .bind(event.closed_at.map(|dt| dt.to_rfc3339()))
            .bind(&event.resolution_notes)
            .bind(event.id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }

    async fn find_open(&self) -> Result<Option<WarningEvent>, KeelError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_OPEN)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(Wrapper::maybe(row))
    }

    async fn get_by_id(&self, id: WarningEventId) -> Result<Option<WarningEvent>, KeelError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(Wrapper::maybe(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use keel_domain::time::now;

    async fn setup() -> SqliteWarningEventRepository {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteWarningEventRepository::new(db.pool().clone())
    }

    fn open_event() -> WarningEvent {
        WarningEvent::open(60, vec!["Heart rate trending upward".to_string()], now())
    }

    #[tokio::test]
    async fn should_create_and_retrieve_event_by_id() {
        let repo = setup().await;
        let event = open_event();

        repo.create(&event).await.unwrap();

        let fetched = repo.get_by_id(event.id).await.unwrap().unwrap();
        assert_eq!(fetched, event);
    }

    #[tokio::test]
    async fn should_return_none_when_event_not_found() {
        let repo = setup().await;
        let result = repo.get_by_id(WarningEventId::new()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn should_find_the_open_event() {
        let repo = setup().await;
        let event = open_event();
        repo.create(&event).await.unwrap();

        let open = repo.find_open().await.unwrap().unwrap();
        assert_eq!(open.id, event.id);
        assert!(open.is_open());
    }

    #[tokio::test]
    async fn should_not_find_closed_events_as_open() {
        let repo = setup().await;
        let mut event = open_event();
        repo.create(&event).await.unwrap();

        event.close_automatic(now());
        repo.close(&event).await.unwrap();

        assert!(repo.find_open().await.unwrap().is_none());
        let fetched = repo.get_by_id(event.id).await.unwrap().unwrap();
        assert!(!fetched.is_open());
        assert_eq!(
            fetched.resolution_notes.as_deref(),
            Some("resolved automatically")
        );
    }

    #[tokio::test]
    async fn should_persist_strategy_resolution() {
        let repo = setup().await;
        let mut event = open_event();
        repo.create(&event).await.unwrap();

        let strategy = StrategyId::new();
        event.close_with_strategy(strategy, now());
        repo.close(&event).await.unwrap();

        let fetched = repo.get_by_id(event.id).await.unwrap().unwrap();
        assert_eq!(fetched.applied_strategy, Some(strategy));
        assert_eq!(
            fetched.resolution_notes.as_deref(),
            Some("resolved with strategy")
        );
    }

    #[tokio::test]
    async fn should_preserve_triggers_through_roundtrip() {
        let repo = setup().await;
        let event = WarningEvent::open(
            40,
            vec![
                "Heart rate trending upward".to_string(),
                "Heart rate variability declining".to_string(),
            ],
            now(),
        );
        repo.create(&event).await.unwrap();

        let fetched = repo.get_by_id(event.id).await.unwrap().unwrap();
        assert_eq!(fetched.triggers, event.triggers);
    }
}
