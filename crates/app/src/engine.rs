//! Regulation engine — the single writer over all session state.
//!
//! Inputs from every source (device transports, self-report submissions,
//! user actions, connectivity changes) are funneled through one mpsc
//! channel into a single task that owns the scoring window, the warning
//! level state machine, the event lifecycle, and the sync manager. The
//! derived [`RegulationView`] is projected through a tokio watch channel
//! so any number of observers can read the latest state without locking.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use keel_domain::device::{ConnectionState, DeviceDescriptor, DeviceEvent};
use keel_domain::error::KeelError;
use keel_domain::factor::RegulationFactor;
use keel_domain::id::StrategyId;
use keel_domain::reading::Reading;
use keel_domain::snapshot::{Domain, DomainSnapshot};
use keel_domain::warning::WarningLevel;

use crate::level::LevelTracker;
use crate::lifecycle::EventLifecycle;
use crate::ports::{
    OfflineQueue, ReadingRepository, SnapshotRepository, StrategyRepository,
    WarningEventRepository,
};
use crate::scoring::{ScoringState, WINDOW_LEN};
use crate::sync::SyncManager;

/// Input channel capacity. Producers briefly backpressure when full.
const INPUT_CAPACITY: usize = 64;

/// One message into the engine task.
#[derive(Debug)]
pub enum EngineInput {
    /// A biometric reading from any source.
    Reading(Reading),
    /// A self-report submission for one domain.
    Snapshot(DomainSnapshot),
    /// A device transport event.
    Device(DeviceEvent),
    /// The persistence collaborator became reachable again.
    StorageRestored,
    /// The user acknowledged the current warning.
    Acknowledge,
    /// The user applied a coping strategy to the open event.
    ApplyStrategy(StrategyId),
}

/// The engine's externally visible state, recomputed on every input.
#[derive(Debug, Clone, PartialEq)]
pub struct RegulationView {
    pub factors: Vec<RegulationFactor>,
    /// Regulation score, 0–100, higher is better.
    pub score: u8,
    /// Rumbling risk, 0–100.
    pub risk: u8,
    pub level: WarningLevel,
    /// Coarse estimate for the current level, `None` at `Normal`.
    pub time_to_threshold: Option<&'static str>,
    pub patterns: Vec<String>,
    pub connection: ConnectionState,
    /// The connected (or last connected) device.
    pub device: Option<DeviceDescriptor>,
    pub offline_queue_len: usize,
    pub acknowledged: bool,
}

impl Default for RegulationView {
    fn default() -> Self {
        Self {
            factors: Vec::new(),
            score: 100,
            risk: 0,
            level: WarningLevel::Normal,
            time_to_threshold: None,
            patterns: Vec::new(),
            connection: ConnectionState::Disconnected,
            device: None,
            offline_queue_len: 0,
            acknowledged: false,
        }
    }
}

/// Cloneable handle for feeding the engine and observing its view.
///
/// Domain validation happens here, at the boundary, so the engine task
/// only ever sees well-formed values.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    input: mpsc::Sender<EngineInput>,
    view: watch::Receiver<RegulationView>,
}

impl EngineHandle {
    /// Submit a reading after validating it.
    ///
    /// # Errors
    ///
    /// Returns a validation error for out-of-range fields, or a transport
    /// error when the engine has shut down.
    pub async fn submit_reading(&self, reading: Reading) -> Result<(), KeelError> {
        reading.validate()?;
        self.send(EngineInput::Reading(reading)).await
    }

    /// Submit a self-report snapshot after validating it.
    ///
    /// # Errors
    ///
    /// Returns a validation error for out-of-range fields, or a transport
    /// error when the engine has shut down.
    pub async fn submit_snapshot(&self, snapshot: DomainSnapshot) -> Result<(), KeelError> {
        snapshot.validate()?;
        self.send(EngineInput::Snapshot(snapshot)).await
    }

    /// Forward a device transport event.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the engine has shut down.
    pub async fn device_event(&self, event: DeviceEvent) -> Result<(), KeelError> {
        self.send(EngineInput::Device(event)).await
    }

    /// Signal that storage is reachable again, triggering a queue flush.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the engine has shut down.
    pub async fn storage_restored(&self) -> Result<(), KeelError> {
        self.send(EngineInput::StorageRestored).await
    }

    /// Acknowledge the current warning.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the engine has shut down.
    pub async fn acknowledge(&self) -> Result<(), KeelError> {
        self.send(EngineInput::Acknowledge).await
    }

    /// Apply a coping strategy to the open event, if any.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the engine has shut down.
    pub async fn apply_strategy(&self, id: StrategyId) -> Result<(), KeelError> {
        self.send(EngineInput::ApplyStrategy(id)).await
    }

    /// The latest view.
    #[must_use]
    pub fn view(&self) -> RegulationView {
        self.view.borrow().clone()
    }

    /// A watch receiver notified on every engine update.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<RegulationView> {
        self.view.clone()
    }

    async fn send(&self, input: EngineInput) -> Result<(), KeelError> {
        self.input
            .send(input)
            .await
            .map_err(|_| KeelError::Transport("regulation engine stopped".into()))
    }
}

/// The engine task's owned state.
pub struct RegulationEngine<R, Q, N, W, S> {
    scoring: ScoringState,
    tracker: LevelTracker,
    lifecycle: EventLifecycle<W, S>,
    sync: SyncManager<R, Q>,
    snapshots: N,
    connection: ConnectionState,
    device: Option<DeviceDescriptor>,
    view: watch::Sender<RegulationView>,
}

impl<R, Q, N, W, S> RegulationEngine<R, Q, N, W, S>
where
    R: ReadingRepository + Send + Sync + 'static,
    Q: OfflineQueue + Send + Sync + 'static,
    N: SnapshotRepository + Send + Sync + 'static,
    W: WarningEventRepository + Send + Sync + 'static,
    S: StrategyRepository + Send + Sync + 'static,
{
    /// Hydrate session state from storage and spawn the engine task.
    ///
    /// Restores the reading window from the most recent persisted
    /// readings, the current snapshot per domain, any event left open by
    /// a previous session, and the surviving offline queue.
    ///
    /// # Errors
    ///
    /// Returns a storage error when hydration fails; the engine does not
    /// start half-hydrated.
    pub async fn start(
        readings: R,
        queue: Q,
        snapshots: N,
        events: W,
        strategies: S,
    ) -> Result<(EngineHandle, JoinHandle<()>), KeelError> {
        let mut scoring = ScoringState::new();
        let mut recent = readings.recent(WINDOW_LEN).await?;
        recent.reverse();
        let restored_readings = recent.len();
        for reading in recent {
            scoring.push_reading(reading);
        }

        for domain in [
            Domain::Sleep,
            Domain::Sensory,
            Domain::Routine,
            Domain::Behavioral,
        ] {
            if let Some(snapshot) = snapshots.current(domain).await? {
                scoring.apply_snapshot(snapshot);
            }
        }

        let mut lifecycle = EventLifecycle::new(events, strategies);
        lifecycle.recover().await?;

        let mut sync = SyncManager::new(readings, queue);
        sync.reload().await?;

        tracing::info!(
            readings = restored_readings,
            queued = sync.queue_len(),
            open_event = lifecycle.open_event().is_some(),
            "regulation engine hydrated"
        );

        let mut engine = Self {
            scoring,
            tracker: LevelTracker::new(),
            lifecycle,
            sync,
            snapshots,
            connection: ConnectionState::Disconnected,
            device: None,
            view: watch::channel(RegulationView::default()).0,
        };
        // Seed the view from hydrated state before accepting input.
        engine.reassess().await;

        let (input_tx, input_rx) = mpsc::channel(INPUT_CAPACITY);
        let handle = EngineHandle {
            input: input_tx,
            view: engine.view.subscribe(),
        };
        let task = tokio::spawn(engine.run(input_rx));
        Ok((handle, task))
    }

    async fn run(mut self, mut input: mpsc::Receiver<EngineInput>) {
        while let Some(message) = input.recv().await {
            self.handle(message).await;
        }
        tracing::debug!("regulation engine input channel closed");
    }

    async fn handle(&mut self, input: EngineInput) {
        match input {
            EngineInput::Reading(reading) => self.on_reading(reading).await,
            EngineInput::Snapshot(snapshot) => self.on_snapshot(snapshot).await,
            EngineInput::Device(event) => self.on_device(event).await,
            EngineInput::StorageRestored => self.on_storage_restored().await,
            EngineInput::Acknowledge => {
                self.tracker.acknowledge();
                self.publish();
            }
            EngineInput::ApplyStrategy(id) => self.on_apply_strategy(id).await,
        }
    }

    async fn on_reading(&mut self, reading: Reading) {
        self.scoring.push_reading(reading.clone());
        if let Err(err) = self.sync.store(&reading).await {
            tracing::error!(%err, "reading lost: storage and offline queue both failed");
        }
        self.reassess().await;
    }

    async fn on_snapshot(&mut self, snapshot: DomainSnapshot) {
        self.scoring.apply_snapshot(snapshot.clone());
        if let Err(err) = self.snapshots.save(&snapshot).await {
            tracing::warn!(%err, domain = snapshot.domain().as_str(), "failed to persist snapshot");
        }
        self.reassess().await;
    }

    async fn on_device(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Connected(descriptor) => {
                tracing::info!(device = %descriptor.id, "device connected");
                self.connection = ConnectionState::Connected;
                self.device = Some(descriptor);
                self.publish();
            }
            DeviceEvent::Disconnected => {
                tracing::info!("device disconnected");
                self.connection = ConnectionState::Disconnected;
                self.publish();
            }
            DeviceEvent::Reading(reading) => self.on_reading(reading).await,
        }
    }

    async fn on_storage_restored(&mut self) {
        match self.sync.flush().await {
            Ok(0) => {}
            Ok(delivered) => tracing::info!(delivered, "flushed offline queue"),
            Err(err) => tracing::warn!(%err, "offline queue flush failed"),
        }
        self.publish();
    }

    async fn on_apply_strategy(&mut self, id: StrategyId) {
        match self.lifecycle.apply_strategy(id).await {
            Ok(Some(_)) => {}
            Ok(None) => tracing::debug!(strategy_id = %id, "no open event to resolve"),
            Err(err) => tracing::warn!(%err, strategy_id = %id, "failed to apply strategy"),
        }
        self.publish();
    }

    /// Recompute scores, drive the lifecycle and level machine, publish.
    async fn reassess(&mut self) {
        let assessment = self.scoring.assess();
        self.lifecycle
            .on_assessment(assessment.score, &assessment.patterns)
            .await;
        if let Some(change) = self.tracker.update(assessment.risk, assessment.score) {
            tracing::info!(
                from = change.previous.as_str(),
                to = change.current.as_str(),
                score = assessment.score,
                risk = assessment.risk,
                "warning level changed"
            );
        }

        let level = self.tracker.level();
        self.view.send_replace(RegulationView {
            factors: assessment.factors,
            score: assessment.score,
            risk: assessment.risk,
            level,
            time_to_threshold: level.time_to_threshold(),
            patterns: assessment.patterns,
            connection: self.connection,
            device: self.device.clone(),
            offline_queue_len: self.sync.queue_len(),
            acknowledged: self.tracker.is_acknowledged(),
        });
    }

    /// Publish the current view without recomputing scores.
    fn publish(&mut self) {
        let current = self.view.borrow().clone();
        let level = self.tracker.level();
        self.view.send_replace(RegulationView {
            level,
            time_to_threshold: level.time_to_threshold(),
            connection: self.connection,
            device: self.device.clone(),
            offline_queue_len: self.sync.queue_len(),
            acknowledged: self.tracker.is_acknowledged(),
            ..current
        });
    }
}
