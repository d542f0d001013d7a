//! BLE scanning for heart-rate monitors.
//!
//! Scans are bounded by a hard deadline: the event stream is polled with
//! a shrinking timeout and the scan always stops when the deadline
//! passes, whatever the radio is doing.

use std::time::Duration;

use btleplug::api::{Central as _, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio_stream::StreamExt as _;

use keel_domain::device::DeviceDescriptor;

use crate::error::BleError;
use crate::parser::HEART_RATE_SERVICE;

/// The host's first BLE adapter.
pub(crate) async fn default_adapter() -> Result<Adapter, BleError> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    adapters.into_iter().next().ok_or(BleError::NotAvailable)
}

/// Check whether the given MAC address passes the device filter.
pub(crate) fn passes_filter(filter: &[String], address: &str) -> bool {
    if filter.is_empty() {
        return true;
    }
    filter.iter().any(|f| f.eq_ignore_ascii_case(address))
}

/// Run a single scan for Heart Rate Profile advertisers.
///
/// Finding nothing is not an error — the result is simply empty.
///
/// # Errors
///
/// Returns [`BleError`] when the BLE adapter is unavailable or the scan
/// cannot be started.
pub(crate) async fn run_scan(
    central: &Adapter,
    timeout: Duration,
    filter: &[String],
) -> Result<Vec<DeviceDescriptor>, BleError> {
    let mut events = central.events().await?;

    central
        .start_scan(ScanFilter {
            services: vec![HEART_RATE_SERVICE],
        })
        .await?;

    let deadline = tokio::time::Instant::now() + timeout;
    let mut found: Vec<DeviceDescriptor> = Vec::new();

    while tokio::time::Instant::now() < deadline {
        let remaining = deadline - tokio::time::Instant::now();
        match tokio::time::timeout(remaining, events.next()).await {
            Ok(Some(CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id))) => {
                let Ok(peripheral) = central.peripheral(&id).await else {
                    continue;
                };
                let Ok(Some(props)) = peripheral.properties().await else {
                    continue;
                };

                let address = props.address.to_string();
                if !passes_filter(filter, &address) {
                    tracing::debug!(%address, "filtered out by device_filter");
                    continue;
                }
                if found.iter().any(|d| d.id == address) {
                    continue;
                }

                tracing::debug!(%address, name = ?props.local_name, "heart rate monitor discovered");
                found.push(DeviceDescriptor {
                    id: address,
                    name: props.local_name,
                    rssi: props.rssi,
                });
            }
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => break,
        }
    }

    central.stop_scan().await?;

    Ok(found)
}

/// Locate a previously scanned peripheral by its MAC address.
pub(crate) async fn find_peripheral(
    central: &Adapter,
    device_id: &str,
) -> Result<Peripheral, BleError> {
    for peripheral in central.peripherals().await? {
        if let Ok(Some(props)) = peripheral.properties().await {
            if props.address.to_string().eq_ignore_ascii_case(device_id) {
                return Ok(peripheral);
            }
        }
    }
    Err(BleError::DeviceNotFound(device_id.to_string()))
}
