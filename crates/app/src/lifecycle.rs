//! Warning-event lifecycle — open, resolve, close.
//!
//! Invariant: at most one open [`WarningEvent`] per user session at any
//! time. Persistence failures are logged and retried on the next relevant
//! transition; they never block the in-memory state machine, so the
//! user-visible warning level stays correct even while event logging is
//! degraded.

use keel_domain::error::{KeelError, NotFoundError};
use keel_domain::id::{StrategyId, WarningEventId};
use keel_domain::time::now;
use keel_domain::warning::WarningEvent;

use crate::level::{OPEN_SCORE, RECOVER_SCORE};
use crate::ports::{StrategyRepository, WarningEventRepository};

/// What the lifecycle manager did in reaction to an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleChange {
    /// A new episode record was opened.
    Opened(WarningEventId),
    /// The open episode closed because the score recovered.
    ClosedAutomatically(WarningEventId),
    /// The open episode closed because the user applied a strategy.
    ClosedWithStrategy(WarningEventId, StrategyId),
}

/// A closed event whose persistence is still outstanding.
#[derive(Debug)]
struct PendingClose {
    event: WarningEvent,
    created: bool,
}

/// Manages the one-open-event invariant and its persistence.
pub struct EventLifecycle<W, S> {
    events: W,
    strategies: S,
    open: Option<WarningEvent>,
    open_persisted: bool,
    pending: Vec<PendingClose>,
}

impl<W: WarningEventRepository, S: StrategyRepository> EventLifecycle<W, S> {
    /// Create a lifecycle manager backed by the given repositories.
    pub fn new(events: W, strategies: S) -> Self {
        Self {
            events,
            strategies,
            open: None,
            open_persisted: false,
            pending: Vec::new(),
        }
    }

    /// Adopt an event left open by a previous session, if any.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the open-event query fails; the
    /// manager then simply starts without an adopted event.
    pub async fn recover(&mut self) -> Result<(), KeelError> {
        if let Some(event) = self.events.find_open().await? {
            tracing::info!(event_id = %event.id, "adopted open warning event from previous session");
            self.open = Some(event);
            self.open_persisted = true;
        }
        Ok(())
    }

    /// The currently open event, if any.
    #[must_use]
    pub fn open_event(&self) -> Option<&WarningEvent> {
        self.open.as_ref()
    }

    /// React to a recomputed regulation score.
    ///
    /// Opens an event when the score crosses below the threshold with none
    /// open; closes the open event when the score recovers. Repeated drops
    /// while an event is open are no-ops.
    pub async fn on_assessment(
        &mut self,
        score: u8,
        patterns: &[String],
    ) -> Option<LifecycleChange> {
        self.retry_pending().await;

        if score < OPEN_SCORE && self.open.is_none() {
            let event = WarningEvent::open(score, patterns.to_vec(), now());
            let id = event.id;
            self.open_persisted = match self.events.create(&event).await {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!(%err, event_id = %id, "failed to persist warning event, will retry");
                    false
                }
            };
            tracing::info!(event_id = %id, intensity = event.intensity, "warning event opened");
            self.open = Some(event);
            return Some(LifecycleChange::Opened(id));
        }

        if score >= RECOVER_SCORE {
            if let Some(mut event) = self.open.take() {
                event.close_automatic(now());
                let id = event.id;
                self.persist_close(event).await;
                tracing::info!(event_id = %id, "warning event closed automatically");
                return Some(LifecycleChange::ClosedAutomatically(id));
            }
        }

        None
    }

    /// Apply a coping strategy to the open event: stamp it, close the
    /// event explicitly, and reinforce the strategy's effectiveness.
    ///
    /// Returns `Ok(None)` when no event is open.
    ///
    /// # Errors
    ///
    /// Returns [`KeelError::NotFound`] when the strategy does not exist.
    #[tracing::instrument(skip(self, id), fields(strategy_id = %id))]
    pub async fn apply_strategy(
        &mut self,
        id: StrategyId,
    ) -> Result<Option<LifecycleChange>, KeelError> {
        let mut strategy = self.strategies.get_by_id(id).await?.ok_or(NotFoundError {
            entity: "Strategy",
            id: id.to_string(),
        })?;

        let Some(mut event) = self.open.take() else {
            tracing::debug!(strategy_id = %id, "strategy applied with no open event");
            return Ok(None);
        };

        event.close_with_strategy(id, now());
        let event_id = event.id;
        self.persist_close(event).await;

        strategy.reinforce();
        if let Err(err) = self
            .strategies
            .update_effectiveness(id, strategy.effectiveness)
            .await
        {
            tracing::warn!(%err, strategy_id = %id, "failed to persist strategy reinforcement");
        }

        tracing::info!(event_id = %event_id, strategy_id = %id, "warning event resolved with strategy");
        Ok(Some(LifecycleChange::ClosedWithStrategy(event_id, id)))
    }

    /// Persist a closure, queueing it for retry on failure.
    async fn persist_close(&mut self, event: WarningEvent) {
        let created = self.open_persisted;
        self.open_persisted = false;

        let mut pending = PendingClose { event, created };
        if Self::try_persist(&self.events, &mut pending).await {
            return;
        }
        tracing::warn!(event_id = %pending.event.id, "failed to persist event closure, will retry");
        self.pending.push(pending);
    }

    /// Retry outstanding writes; called on every relevant transition.
    async fn retry_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let mut remaining = Vec::new();
        for mut pending in self.pending.drain(..) {
            if !Self::try_persist(&self.events, &mut pending).await {
                remaining.push(pending);
            }
        }
        self.pending = remaining;
    }

    /// Attempt create-then-close for one pending event.
    async fn try_persist(events: &W, pending: &mut PendingClose) -> bool {
        if !pending.created {
            if events.create(&pending.event).await.is_err() {
                return false;
            }
            pending.created = true;
        }
        events.close(&pending.event).await.is_ok()
    }
}
