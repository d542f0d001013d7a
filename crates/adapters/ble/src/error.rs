//! BLE adapter error types.

use keel_domain::error::KeelError;

/// Errors specific to the BLE adapter.
#[derive(Debug, thiserror::Error)]
pub enum BleError {
    /// No BLE adapter found on the host.
    #[error("no BLE adapter available")]
    NotAvailable,

    /// BLE scan, connect, or adapter operation failed.
    #[error("BLE operation failed")]
    Ble(#[from] btleplug::Error),

    /// The requested device was not seen during a scan.
    #[error("heart rate monitor {0} not found")]
    DeviceNotFound(String),

    /// The connected device does not expose the Heart Rate service.
    #[error("device {0} has no heart rate measurement characteristic")]
    NoHeartRateMeasurement(String),

    /// The connect attempt exceeded the configured timeout.
    #[error("connect to {0} timed out")]
    ConnectTimeout(String),

    /// Failed to parse a Heart Rate Measurement notification.
    #[error("failed to parse heart rate measurement")]
    MeasurementParse(#[source] MeasurementParseError),
}

/// Details about why a measurement payload could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum MeasurementParseError {
    /// The notification carried no bytes at all.
    #[error("empty measurement payload")]
    Empty,

    /// The payload is shorter than its flags byte promises.
    #[error("measurement payload must be at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum byte count for the flagged format.
        expected: usize,
        /// Actual byte count received.
        actual: usize,
    },
}

impl From<BleError> for KeelError {
    fn from(err: BleError) -> Self {
        Self::Transport(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_not_available_error() {
        let err = BleError::NotAvailable;
        assert_eq!(err.to_string(), "no BLE adapter available");
    }

    #[test]
    fn should_display_device_not_found_with_id() {
        let err = BleError::DeviceNotFound("A4:C1:38:5B:0E:DF".to_string());
        assert_eq!(err.to_string(), "heart rate monitor A4:C1:38:5B:0E:DF not found");
    }

    #[test]
    fn should_display_too_short_parse_error() {
        let err = MeasurementParseError::TooShort {
            expected: 3,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "measurement payload must be at least 3 bytes, got 2"
        );
    }

    #[test]
    fn should_convert_to_transport_error() {
        let err: KeelError = BleError::NotAvailable.into();
        assert!(matches!(err, KeelError::Transport(_)));
    }
}
