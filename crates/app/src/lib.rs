//! # keel-app
//!
//! Application layer — the regulation engine and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `DeviceTransport` — wearable connectivity (real or synthetic)
//!   - `ReadingRepository`, `SnapshotRepository` — biometric persistence
//!   - `WarningEventRepository`, `StrategyRepository` — episode persistence
//!   - `OfflineQueue` — durable FIFO buffer for unreachable storage
//! - Compute the regulation score, rumbling risk, factors, and patterns
//! - Drive the hysteretic warning-level state machine
//! - Manage the warning-event lifecycle (open, strategy, close)
//! - Run the single-writer engine actor that serialises every input
//!
//! ## Dependency rule
//! Depends on `keel-domain` only (plus `tokio::sync` for channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the
//! reverse.

pub mod engine;
pub mod level;
pub mod lifecycle;
pub mod ports;
pub mod scoring;
pub mod sync;
