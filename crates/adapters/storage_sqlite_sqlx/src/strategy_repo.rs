//! `SQLite` implementation of [`StrategyRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use keel_app::ports::StrategyRepository;
use keel_domain::error::KeelError;
use keel_domain::id::StrategyId;
use keel_domain::strategy::CopingStrategy;

use crate::error::StorageError;

struct Wrapper(CopingStrategy);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<CopingStrategy> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let name: String = row.try_get("name")?;
        let category: String = row.try_get("category")?;
        let effectiveness: i64 = row.try_get("effectiveness")?;

        let effectiveness =
            u8::try_from(effectiveness).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(CopingStrategy {
            id: StrategyId::from_uuid(id),
            name,
            category,
            effectiveness,
        }))
    }
}

const UPSERT: &str = r"
    INSERT INTO strategies (id, name, category, effectiveness)
    VALUES (?, ?, ?, ?)
    ON CONFLICT (id) DO UPDATE
    SET name = excluded.name, category = excluded.category,
        effectiveness = excluded.effectiveness
";

const SELECT_BY_ID: &str = "SELECT * FROM strategies WHERE id = ?";
const SELECT_ALL: &str = "SELECT * FROM strategies ORDER BY name";
const UPDATE_EFFECTIVENESS: &str = "UPDATE strategies SET effectiveness = ? WHERE id = ?";

/// `SQLite`-backed coping strategy repository.
pub struct SqliteStrategyRepository {
    pool: SqlitePool,
}

impl SqliteStrategyRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl StrategyRepository for SqliteStrategyRepository {
    async fn save(&self, strategy: &CopingStrategy) -> Result<(), KeelError> {
        sqlx::query(UPSERT)
            .bind(strategy.id.as_uuid())
            .bind(&strategy.name)
            .bind(&strategy.category)
            .bind(i64::from(strategy.effectiveness))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }

    async fn get_by_id(&self, id: StrategyId) -> Result<Option<CopingStrategy>, KeelError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(Wrapper::maybe(row))
    }

    async fn list(&self) -> Result<Vec<CopingStrategy>, KeelError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn update_effectiveness(&self, id: StrategyId, effectiveness: u8) -> Result<(), KeelError> {
        sqlx::query(UPDATE_EFFECTIVENESS)
            .bind(i64::from(effectiveness))
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }
}
