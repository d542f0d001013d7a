//! # keel-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the repository and offline-queue port traits defined in
//!   `keel-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `keel-app` (for port traits) and `keel-domain` (for domain
//! types). The `app` and `domain` crates must never reference this adapter.

pub mod error;
pub mod offline_queue;
pub mod pool;
pub mod reading_repo;
pub mod snapshot_repo;
pub mod strategy_repo;
pub mod warning_event_repo;

pub use error::StorageError;
pub use offline_queue::SqliteOfflineQueue;
pub use pool::{Config, Database};
pub use reading_repo::SqliteReadingRepository;
pub use snapshot_repo::SqliteSnapshotRepository;
pub use strategy_repo::SqliteStrategyRepository;
pub use warning_event_repo::SqliteWarningEventRepository;
