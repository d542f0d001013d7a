//! # keeld — keel daemon
//!
//! Composition root that wires all adapters together and runs the
//! regulation engine.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct repository implementations (adapters)
//! - Start the regulation engine, injecting repositories via port traits
//! - Drive the configured wearable transport and forward its events
//! - Retry offline-queue flushes on a fixed cadence
//! - Handle graceful shutdown (SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::time::Duration;

use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use keel_adapter_ble::BleHrm;
use keel_adapter_storage_sqlite_sqlx::{
    SqliteOfflineQueue, SqliteReadingRepository, SqliteSnapshotRepository,
    SqliteStrategyRepository, SqliteWarningEventRepository,
};
use keel_adapter_virtual::VirtualHrm;
use keel_app::engine::{EngineHandle, RegulationEngine};
use keel_app::ports::DeviceTransport;
use keel_domain::device::DeviceEvent;
use keel_domain::error::KeelError;

use crate::config::{Config, TransportKind};

/// Capacity of the transport-to-engine event channel.
const DEVICE_EVENT_CAPACITY: usize = 64;

/// How often the offline queue is given a chance to drain.
const FLUSH_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Database
    let db = keel_adapter_storage_sqlite_sqlx::Config {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await?;
    let pool = db.pool().clone();

    // Repositories
    let readings = SqliteReadingRepository::new(pool.clone());
    let snapshots = SqliteSnapshotRepository::new(pool.clone());
    let events = SqliteWarningEventRepository::new(pool.clone());
    let strategies = SqliteStrategyRepository::new(pool.clone());
    let queue = SqliteOfflineQueue::new(pool);

    // Engine
    let (handle, engine_task) =
        RegulationEngine::start(readings, queue, snapshots, events, strategies).await?;

    // Transport events flow into the engine through this channel.
    let (device_tx, device_rx) = mpsc::channel(DEVICE_EVENT_CAPACITY);
    let forwarder = tokio::spawn(forward_device_events(device_rx, handle.clone()));

    let scan_timeout = config.scan_timeout();
    let driver = match config.device.transport {
        TransportKind::Virtual => {
            let transport = VirtualHrm::new(config.device.virtual_hrm.to_transport());
            tokio::spawn(drive_transport(transport, scan_timeout, device_tx))
        }
        TransportKind::Ble => {
            let transport = BleHrm::new(config.device.ble.clone());
            tokio::spawn(drive_transport(transport, scan_timeout, device_tx))
        }
    };

    let flusher = tokio::spawn(flush_periodically(handle.clone()));

    tracing::info!("keeld running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    driver.abort();
    flusher.abort();
    forwarder.abort();
    engine_task.abort();

    Ok(())
}

/// Forward wearable events into the engine until either side closes.
async fn forward_device_events(
    mut device_rx: mpsc::Receiver<DeviceEvent>,
    handle: EngineHandle,
) {
    while let Some(event) = device_rx.recv().await {
        if handle.device_event(event).await.is_err() {
            break;
        }
    }
}

/// Initialize the transport, scan, and connect to the first wearable found.
///
/// The transport owns the streaming session, so this future stays alive
/// for the lifetime of the connection.
async fn drive_transport<T>(
    mut transport: T,
    scan_timeout: Duration,
    events: mpsc::Sender<DeviceEvent>,
) where
    T: DeviceTransport + 'static,
{
    if let Err(err) = connect_first(&mut transport, scan_timeout, events).await {
        tracing::error!(transport = transport.name(), %err, "wearable startup failed");
        return;
    }
    // Dropping the transport would tear the session down.
    std::future::pending::<()>().await;
}

async fn connect_first<T: DeviceTransport>(
    transport: &mut T,
    scan_timeout: Duration,
    events: mpsc::Sender<DeviceEvent>,
) -> Result<(), KeelError> {
    transport.initialize().await?;

    let devices = transport.scan(scan_timeout).await?;
    let Some(device) = devices.first() else {
        tracing::warn!(transport = transport.name(), "no wearable found during scan");
        return Ok(());
    };

    tracing::info!(
        transport = transport.name(),
        device = %device.id,
        name = ?device.name,
        "connecting to wearable"
    );
    transport.connect(&device.id, events).await
}

/// Periodically nudge the engine to retry draining the offline queue.
async fn flush_periodically(handle: EngineHandle) {
    let mut ticker = tokio::time::interval(FLUSH_INTERVAL);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if handle.storage_restored().await.is_err() {
            break;
        }
    }
}
