//! # keel-adapter-virtual
//!
//! Virtual wearable adapter — a synthetic heart-rate monitor that streams
//! plausible readings on a fixed cadence, for demos and development
//! without hardware.
//!
//! The generator draws a heart rate uniformly from a configurable band
//! and derives the remaining biometrics the same way a real monitor's
//! companion profile would, so downstream scoring sees realistic shapes.
//!
//! ## Dependency rule
//!
//! Depends on `keel-app` (port traits) and `keel-domain` only.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use keel_app::ports::DeviceTransport;
use keel_domain::device::{ConnectionState, DeviceDescriptor, DeviceEvent};
use keel_domain::error::KeelError;
use keel_domain::reading::Reading;
use keel_domain::time::now;

/// The single synthetic device this transport exposes.
const DEVICE_ID: &str = "virtual-hrm-0";
const DEVICE_NAME: &str = "Virtual HRM";

/// Errors originating from the virtual transport.
#[derive(Debug, thiserror::Error)]
pub enum VirtualError {
    /// Connect was asked for a device id the scan never returned.
    #[error("unknown virtual device: {0}")]
    UnknownDevice(String),
}

impl From<VirtualError> for KeelError {
    fn from(err: VirtualError) -> Self {
        Self::Transport(Box::new(err))
    }
}

/// Configuration for the synthetic generator.
#[derive(Debug, Clone)]
pub struct Config {
    /// Time between emitted readings.
    pub interval: Duration,
    /// Inclusive lower bound of the generated heart-rate band, in bpm.
    pub bpm_min: u16,
    /// Inclusive upper bound of the generated heart-rate band, in bpm.
    pub bpm_max: u16,
    /// Fixed RNG seed for reproducible streams; `None` for entropy.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            bpm_min: 62,
            bpm_max: 95,
            seed: None,
        }
    }
}

struct Session {
    emitter: JoinHandle<()>,
    events: mpsc::Sender<DeviceEvent>,
}

/// Synthetic heart-rate monitor transport.
pub struct VirtualHrm {
    config: Config,
    state: ConnectionState,
    session: Option<Session>,
}

impl VirtualHrm {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected,
            session: None,
        }
    }

    fn descriptor() -> DeviceDescriptor {
        DeviceDescriptor {
            id: DEVICE_ID.to_string(),
            name: Some(DEVICE_NAME.to_string()),
            rssi: Some(-40),
        }
    }

    async fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            session.emitter.abort();
            // Receiver may already be gone during shutdown.
            let _ = session.events.send(DeviceEvent::Disconnected).await;
        }
        self.state = ConnectionState::Disconnected;
    }
}

impl Default for VirtualHrm {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl DeviceTransport for VirtualHrm {
    fn name(&self) -> &'static str {
        "virtual"
    }

    async fn initialize(&mut self) -> Result<(), KeelError> {
        // Nothing to acquire: the generator is always available.
        Ok(())
    }

    async fn scan(&mut self, _timeout: Duration) -> Result<Vec<DeviceDescriptor>, KeelError> {
        // The synthetic device is always in range; no need to wait out
        // the timeout.
        Ok(vec![Self::descriptor()])
    }

    async fn connect(
        &mut self,
        device_id: &str,
        events: mpsc::Sender<DeviceEvent>,
    ) -> Result<(), KeelError> {
        if device_id != DEVICE_ID {
            return Err(VirtualError::UnknownDevice(device_id.to_string()).into());
        }

        self.teardown().await;
        self.state = ConnectionState::Connecting;

        if let Err(err) = events.send(DeviceEvent::Connected(Self::descriptor())).await {
            self.state = ConnectionState::Disconnected;
            return Err(KeelError::Transport(Box::new(err)));
        }

        let config = self.config.clone();
        let emitter_events = events.clone();
        let emitter = tokio::spawn(async move {
            let mut rng = match config.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let mut ticker = tokio::time::interval(config.interval);
            // The first tick fires immediately; skip it so readings start
            // one interval after connect.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let bpm = rng.gen_range(config.bpm_min..=config.bpm_max);
                let reading = Reading::derive(bpm, now());
                if emitter_events
                    .send(DeviceEvent::Reading(reading))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        self.session = Some(Session { emitter, events });
        self.state = ConnectionState::Connected;
        tracing::debug!(device = DEVICE_ID, "virtual device connected");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), KeelError> {
        self.teardown().await;
        tracing::debug!(device = DEVICE_ID, "virtual device disconnected");
        Ok(())
    }

    fn connection_state(&self) -> ConnectionState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> Config {
        Config {
            interval: Duration::from_millis(10),
            seed: Some(42),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn should_report_virtual_as_name() {
        let transport = VirtualHrm::default();
        assert_eq!(transport.name(), "virtual");
        assert_eq!(transport.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn should_discover_single_device_on_scan() {
        let mut transport = VirtualHrm::default();
        transport.initialize().await.unwrap();
        let found = transport.scan(Duration::from_secs(1)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, DEVICE_ID);
        assert_eq!(found[0].name.as_deref(), Some(DEVICE_NAME));
    }

    #[tokio::test]
    async fn should_reject_unknown_device_id() {
        let mut transport = VirtualHrm::default();
        let (tx, _rx) = mpsc::channel(8);
        let result = transport.connect("polar-h10", tx).await;
        assert!(matches!(result, Err(KeelError::Transport(_))));
        assert_eq!(transport.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn should_return_to_disconnected_when_receiver_is_gone() {
        let mut transport = VirtualHrm::default();
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let result = transport.connect(DEVICE_ID, tx).await;
        assert!(matches!(result, Err(KeelError::Transport(_))));
        assert_eq!(transport.connection_state(), ConnectionState::Disconnected);
        assert!(transport.session.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn should_emit_connected_then_readings_in_band() {
        let mut transport = VirtualHrm::new(fast_config());
        let (tx, mut rx) = mpsc::channel(8);
        transport.connect(DEVICE_ID, tx).await.unwrap();
        assert!(transport.is_connected());

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, DeviceEvent::Connected(ref d) if d.id == DEVICE_ID));

        for _ in 0..5 {
            match rx.recv().await.unwrap() {
                DeviceEvent::Reading(reading) => {
                    assert!((62..=95).contains(&reading.heart_rate));
                    assert!(reading.validate().is_ok());
                }
                other => panic!("expected reading, got {other:?}"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn should_stop_emitting_after_disconnect() {
        let mut transport = VirtualHrm::new(fast_config());
        let (tx, mut rx) = mpsc::channel(64);
        transport.connect(DEVICE_ID, tx).await.unwrap();

        rx.recv().await.unwrap();
        rx.recv().await.unwrap();

        transport.disconnect().await.unwrap();
        assert_eq!(transport.connection_state(), ConnectionState::Disconnected);

        // Drain whatever was in flight; the stream must end with the
        // disconnect marker and then close.
        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        assert_eq!(last, Some(DeviceEvent::Disconnected));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn should_be_idempotent_on_repeated_disconnect() {
        let mut transport = VirtualHrm::new(fast_config());
        transport.disconnect().await.unwrap();
        transport.disconnect().await.unwrap();
        assert_eq!(transport.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn should_teardown_previous_session_on_reconnect() {
        let mut transport = VirtualHrm::new(fast_config());
        let (tx1, mut rx1) = mpsc::channel(64);
        transport.connect(DEVICE_ID, tx1).await.unwrap();
        rx1.recv().await.unwrap();

        let (tx2, mut rx2) = mpsc::channel(64);
        transport.connect(DEVICE_ID, tx2).await.unwrap();
        assert!(transport.is_connected());

        // The old stream is closed out with a disconnect marker.
        let mut last = None;
        while let Ok(event) = rx1.try_recv() {
            last = Some(event);
        }
        assert_eq!(last, Some(DeviceEvent::Disconnected));

        // The new stream starts fresh.
        let first = rx2.recv().await.unwrap();
        assert!(matches!(first, DeviceEvent::Connected(_)));
        assert!(matches!(
            rx2.recv().await.unwrap(),
            DeviceEvent::Reading(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn should_produce_reproducible_stream_with_fixed_seed() {
        async fn first_rates(seed: u64) -> Vec<u16> {
            let mut transport = VirtualHrm::new(Config {
                interval: Duration::from_millis(10),
                seed: Some(seed),
                ..Config::default()
            });
            let (tx, mut rx) = mpsc::channel(64);
            transport.connect(DEVICE_ID, tx).await.unwrap();
            rx.recv().await.unwrap();

            let mut rates = Vec::new();
            while rates.len() < 3 {
                if let DeviceEvent::Reading(reading) = rx.recv().await.unwrap() {
                    rates.push(reading.heart_rate);
                }
            }
            transport.disconnect().await.unwrap();
            rates
        }

        assert_eq!(first_rates(7).await, first_rates(7).await);
    }
}
