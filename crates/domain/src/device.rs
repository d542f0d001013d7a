//! Device types — connection state, descriptors, and the device event stream.
//!
//! A device transport owns exactly one [`ConnectionState`] and may only
//! emit [`DeviceEvent::Reading`] while [`ConnectionState::Connected`].

use serde::{Deserialize, Serialize};

use crate::reading::Reading;

/// Connection lifecycle of a device transport.
///
/// Transitions: `Disconnected → Scanning → Connecting → Connected`, then
/// back to `Disconnected` on disconnect or failure. Failures are always
/// recoverable — the transport returns to `Disconnected` and surfaces a
/// retryable error, never a fatal one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No device session.
    #[default]
    Disconnected,
    /// A scan is in progress (bounded by a hard timeout).
    Scanning,
    /// A connect attempt is in flight.
    Connecting,
    /// A device is connected and may emit readings.
    Connected,
}

/// A device found during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Transport-specific identifier (MAC address, peripheral id, …).
    pub id: String,
    /// Advertised name, when the device exposes one.
    pub name: Option<String>,
    /// Signal strength at discovery time, when available.
    pub rssi: Option<i16>,
}

/// An event emitted by a device transport.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// A device session was established.
    Connected(DeviceDescriptor),
    /// The session ended, either on request or unexpectedly.
    Disconnected,
    /// A biometric sample arrived. Only emitted while connected.
    Reading(Reading),
}
