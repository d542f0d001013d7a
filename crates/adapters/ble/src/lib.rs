//! # keel-adapter-ble
//!
//! BLE wearable adapter — connects to standard Heart Rate Profile
//! monitors (Polar, Garmin, and most chest straps) and streams their
//! measurements into the engine.
//!
//! ## How it works
//!
//! Monitors advertise the Heart Rate service (`0x180D`). The transport
//! scans for those advertisers, establishes a GATT connection to the
//! selected one, subscribes to the Heart Rate Measurement characteristic
//! (`0x2A37`), and turns each notification into a biometric reading.
//!
//! ## Dependency rule
//!
//! Same as other adapters: depends on `keel-app` and `keel-domain`.

mod config;
mod error;
pub mod parser;
mod scanner;

pub use config::BleConfig;
pub use error::{BleError, MeasurementParseError};

use std::time::Duration;

use btleplug::api::Peripheral as _;
use btleplug::platform::{Adapter, Peripheral};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt as _;

use keel_app::ports::DeviceTransport;
use keel_domain::device::{ConnectionState, DeviceDescriptor, DeviceEvent};
use keel_domain::error::KeelError;
use keel_domain::reading::{MAX_HEART_RATE, Reading};
use keel_domain::time::now;

struct Session {
    peripheral: Peripheral,
    notify: JoinHandle<()>,
    events: mpsc::Sender<DeviceEvent>,
}

/// BLE heart-rate monitor transport.
pub struct BleHrm {
    config: BleConfig,
    state: ConnectionState,
    central: Option<Adapter>,
    session: Option<Session>,
}

impl BleHrm {
    /// Create a new transport with the given configuration.
    ///
    /// The radio is not touched until [`DeviceTransport::initialize`].
    #[must_use]
    pub fn new(config: BleConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected,
            central: None,
            session: None,
        }
    }

    fn central(&self) -> Result<Adapter, BleError> {
        self.central.clone().ok_or(BleError::NotAvailable)
    }

    async fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            session.notify.abort();
            if let Err(err) = session.peripheral.disconnect().await {
                tracing::debug!(%err, "peripheral disconnect failed");
            }
            // Receiver may already be gone during shutdown.
            let _ = session.events.send(DeviceEvent::Disconnected).await;
        }
        self.state = ConnectionState::Disconnected;
    }

    async fn establish(
        &mut self,
        central: &Adapter,
        device_id: &str,
        events: mpsc::Sender<DeviceEvent>,
    ) -> Result<(), BleError> {
        let peripheral = scanner::find_peripheral(central, device_id).await?;

        let timeout = Duration::from_secs(u64::from(self.config.connect_timeout_secs));
        tokio::time::timeout(timeout, peripheral.connect())
            .await
            .map_err(|_| BleError::ConnectTimeout(device_id.to_string()))??;

        // The link is up from here on; undo it if session setup fails.
        match self.subscribe_measurements(&peripheral, device_id, events).await {
            Ok(()) => Ok(()),
            Err(err) => {
                if let Err(disconnect_err) = peripheral.disconnect().await {
                    tracing::debug!(err = %disconnect_err, "peripheral disconnect failed");
                }
                Err(err)
            }
        }
    }

    async fn subscribe_measurements(
        &mut self,
        peripheral: &Peripheral,
        device_id: &str,
        events: mpsc::Sender<DeviceEvent>,
    ) -> Result<(), BleError> {
        peripheral.discover_services().await?;
        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == parser::HEART_RATE_MEASUREMENT)
            .ok_or_else(|| BleError::NoHeartRateMeasurement(device_id.to_string()))?;
        peripheral.subscribe(&characteristic).await?;
        let mut notifications = peripheral.notifications().await?;

        let props = peripheral
            .properties()
            .await?
            .ok_or_else(|| BleError::DeviceNotFound(device_id.to_string()))?;
        let descriptor = DeviceDescriptor {
            id: props.address.to_string(),
            name: props.local_name,
            rssi: props.rssi,
        };
        let _ = events.send(DeviceEvent::Connected(descriptor)).await;

        let notify_events = events.clone();
        let notify = tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid != parser::HEART_RATE_MEASUREMENT {
                    continue;
                }
                match parser::parse_heart_rate_measurement(&notification.value) {
                    Ok(bpm) if bpm > MAX_HEART_RATE => {
                        tracing::warn!(bpm, "ignoring implausible heart rate");
                    }
                    Ok(bpm) => {
                        let reading = Reading::derive(bpm, now());
                        if notify_events
                            .send(DeviceEvent::Reading(reading))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(%err, "dropping malformed heart rate notification");
                    }
                }
            }
            // Stream ended: link lost or unsubscribed.
            let _ = notify_events.send(DeviceEvent::Disconnected).await;
        });

        self.session = Some(Session {
            peripheral: peripheral.clone(),
            notify,
            events,
        });
        self.state = ConnectionState::Connected;
        tracing::info!(device = device_id, "heart rate monitor connected");
        Ok(())
    }
}

impl Default for BleHrm {
    fn default() -> Self {
        Self::new(BleConfig::default())
    }
}

impl DeviceTransport for BleHrm {
    fn name(&self) -> &'static str {
        "ble"
    }

    async fn initialize(&mut self) -> Result<(), KeelError> {
        if self.central.is_none() {
            self.central = Some(scanner::default_adapter().await?);
        }
        Ok(())
    }

    async fn scan(&mut self, timeout: Duration) -> Result<Vec<DeviceDescriptor>, KeelError> {
        let central = self.central()?;

        if self.state == ConnectionState::Disconnected {
            self.state = ConnectionState::Scanning;
        }
        let result = scanner::run_scan(&central, timeout, &self.config.device_filter).await;
        if self.state == ConnectionState::Scanning {
            self.state = ConnectionState::Disconnected;
        }

        Ok(result?)
    }

    async fn connect(
        &mut self,
        device_id: &str,
        events: mpsc::Sender<DeviceEvent>,
    ) -> Result<(), KeelError> {
        let central = self.central()?;

        self.teardown().await;
        self.state = ConnectionState::Connecting;

        if let Err(err) = self.establish(&central, device_id, events).await {
            // Recoverable: back to Disconnected, caller may retry.
            self.state = ConnectionState::Disconnected;
            return Err(err.into());
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), KeelError> {
        self.teardown().await;
        tracing::info!("heart rate monitor disconnected");
        Ok(())
    }

    fn connection_state(&self) -> ConnectionState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_create_transport_without_touching_the_radio() {
        let transport = BleHrm::new(BleConfig::default());
        assert_eq!(transport.name(), "ble");
        assert_eq!(transport.connection_state(), ConnectionState::Disconnected);
        assert!(transport.central.is_none());
        assert!(transport.session.is_none());
    }

    #[tokio::test]
    async fn should_fail_scan_before_initialize() {
        let mut transport = BleHrm::default();
        let result = transport.scan(Duration::from_secs(1)).await;
        assert!(matches!(result, Err(KeelError::Transport(_))));
        assert_eq!(transport.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn should_fail_connect_before_initialize() {
        let mut transport = BleHrm::default();
        let (tx, _rx) = mpsc::channel(8);
        let result = transport.connect("A4:C1:38:5B:0E:DF", tx).await;
        assert!(matches!(result, Err(KeelError::Transport(_))));
        assert_eq!(transport.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn should_be_idempotent_on_disconnect_without_session() {
        let mut transport = BleHrm::default();
        transport.disconnect().await.unwrap();
        transport.disconnect().await.unwrap();
        assert_eq!(transport.connection_state(), ConnectionState::Disconnected);
    }
}
