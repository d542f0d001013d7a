//! BLE transport configuration.

use serde::Deserialize;

/// Configuration for the BLE heart-rate transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// Timeout for a single connect attempt, in seconds.
    pub connect_timeout_secs: u16,
    /// Optional MAC address allowlist (e.g. `["A4:C1:38:AA:BB:CC"]`).
    ///
    /// When empty, every advertising heart-rate monitor is accepted.
    pub device_filter: Vec<String>,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            device_filter: Vec::new(),
        }
    }
}
