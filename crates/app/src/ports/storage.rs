//! Storage ports — the persistence collaborator's repository traits.
//!
//! The engine consumes these as narrow insert/update/query contracts; the
//! storage engine behind them is opaque.

use std::future::Future;

use keel_domain::error::KeelError;
use keel_domain::id::{StrategyId, WarningEventId};
use keel_domain::reading::Reading;
use keel_domain::snapshot::{Domain, DomainSnapshot};
use keel_domain::strategy::CopingStrategy;
use keel_domain::warning::WarningEvent;

/// Repository for biometric [`Reading`]s.
pub trait ReadingRepository {
    /// Persist a reading.
    ///
    /// Must be idempotent on the natural key `recorded_at`: re-inserting
    /// the same reading (e.g. during an offline-queue flush retry) is a
    /// no-op, not an error.
    fn insert(&self, reading: &Reading) -> impl Future<Output = Result<(), KeelError>> + Send;

    /// The most recent readings, newest first.
    fn recent(&self, limit: usize)
    -> impl Future<Output = Result<Vec<Reading>, KeelError>> + Send;
}

/// Repository for the per-domain self-report tables.
pub trait SnapshotRepository {
    /// Replace the current snapshot for the given domain wholesale.
    fn save(
        &self,
        snapshot: &DomainSnapshot,
    ) -> impl Future<Output = Result<(), KeelError>> + Send;

    /// The current snapshot for a domain, if any was ever submitted.
    fn current(
        &self,
        domain: Domain,
    ) -> impl Future<Output = Result<Option<DomainSnapshot>, KeelError>> + Send;
}

/// Repository for [`WarningEvent`]s.
pub trait WarningEventRepository {
    /// Persist a newly opened event.
    fn create(
        &self,
        event: &WarningEvent,
    ) -> impl Future<Output = Result<(), KeelError>> + Send;

    /// Stamp closure fields (closed_at, applied strategy, notes) onto a
    /// previously created event.
    fn close(&self, event: &WarningEvent) -> impl Future<Output = Result<(), KeelError>> + Send;

    /// The open event, if one exists. At most one may ever be open.
    fn find_open(&self) -> impl Future<Output = Result<Option<WarningEvent>, KeelError>> + Send;

    /// Look up an event by id.
    fn get_by_id(
        &self,
        id: WarningEventId,
    ) -> impl Future<Output = Result<Option<WarningEvent>, KeelError>> + Send;
}

/// Repository for [`CopingStrategy`]s.
pub trait StrategyRepository {
    /// Create or replace a strategy (used for seeding the library).
    fn save(
        &self,
        strategy: &CopingStrategy,
    ) -> impl Future<Output = Result<(), KeelError>> + Send;

    /// Look up a strategy by id.
    fn get_by_id(
        &self,
        id: StrategyId,
    ) -> impl Future<Output = Result<Option<CopingStrategy>, KeelError>> + Send;

    /// All strategies, ordered by name.
    fn list(&self) -> impl Future<Output = Result<Vec<CopingStrategy>, KeelError>> + Send;

    /// Persist a reinforced effectiveness rating.
    fn update_effectiveness(
        &self,
        id: StrategyId,
        effectiveness: u8,
    ) -> impl Future<Output = Result<(), KeelError>> + Send;
}
