//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside
//! world. They are defined here (in `app`) so that both the engine and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod device;
pub mod offline;
pub mod storage;

pub use device::DeviceTransport;
pub use offline::{OfflineQueue, QueueEntry, QueueEntryId};
pub use storage::{
    ReadingRepository, SnapshotRepository, StrategyRepository, WarningEventRepository,
};
