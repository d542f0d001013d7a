//! Device port — wearable connectivity as a capability set.
//!
//! A transport bridges one wearable source (a real heart-rate monitor, a
//! synthetic generator, …) into the engine. Implementations live in
//! adapter crates; the binary crate selects one by configuration.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;

use keel_domain::device::{ConnectionState, DeviceDescriptor, DeviceEvent};
use keel_domain::error::KeelError;

/// A pluggable wearable transport.
///
/// ## Contract
///
/// - Readings are emitted through the channel handed to
///   [`connect`](Self::connect) and only while
///   [`ConnectionState::Connected`].
/// - Only one device may be connected at a time: a `connect` while
///   Connected must tear down the previous session (including any
///   in-flight subscription) before establishing the new one, so no
///   duplicate reading callbacks can occur.
/// - [`scan`](Self::scan) is bounded by the given timeout; finding no
///   device is not an error, an empty list is returned.
/// - All failures are recoverable [`KeelError::Transport`] errors and
///   return the transport to `Disconnected` — never fatal.
pub trait DeviceTransport: Send {
    /// Short name identifying this transport (e.g. `"virtual"`, `"ble"`).
    fn name(&self) -> &'static str;

    /// Acquire the underlying radio/source. Fast, non-blocking.
    ///
    /// Covers the platform's permission handshake where one exists; an
    /// unavailable radio surfaces as a recoverable transport error.
    fn initialize(&mut self) -> impl Future<Output = Result<(), KeelError>> + Send;

    /// Scan for devices, returning whatever was found within `timeout`.
    fn scan(
        &mut self,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<DeviceDescriptor>, KeelError>> + Send;

    /// Connect to the device with the given transport-specific id and
    /// start streaming [`DeviceEvent`]s into `events`.
    fn connect(
        &mut self,
        device_id: &str,
        events: mpsc::Sender<DeviceEvent>,
    ) -> impl Future<Output = Result<(), KeelError>> + Send;

    /// Tear down the current session, if any. Idempotent.
    fn disconnect(&mut self) -> impl Future<Output = Result<(), KeelError>> + Send;

    /// Current connection state. Owned exclusively by the transport.
    fn connection_state(&self) -> ConnectionState;

    /// Whether a device session is currently established.
    fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }
}
