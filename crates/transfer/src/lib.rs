//! OTA firmware transfer into a raw storage slot.
//!
//! [`TransferController`] owns the single [`TransferSession`] and drives the
//! slot lifecycle: probe, erase if dirty, write chunks in arrival order,
//! finish. Storage is reached through the [`SlotStorage`] trait so the
//! controller runs unchanged against flash, a host file, or a test double.

mod controller;
mod file;
mod memory;
mod progress;
mod session;
mod storage;

pub use controller::{ChunkOutcome, TransferController};
pub use file::FileSlot;
pub use memory::{FaultPlan, MemorySlot};
pub use progress::throughput_kbps;
pub use session::TransferSession;
pub use storage::{SlotGeometry, SlotId, SlotStorage, StorageError};

pub use otaflash_protocol::{ProgressReport, TransferPhase, TransferSummary};

/// Block size used when scanning a slot for non-erased bytes.
pub const SCAN_BLOCK_SIZE: usize = 256;

/// Value of every byte in an erased NOR flash slot.
pub const ERASED_BYTE: u8 = 0xFF;

/// Errors produced by the transfer controller.
#[derive(Debug, thiserror::Error)]
pub enum OtaError {
    #[error("storage fault: {0}")]
    StorageFault(#[from] StorageError),

    #[error("chunk of {len} bytes at offset {offset} overflows slot capacity {capacity}")]
    SlotOverflow {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    #[error("{operation} not allowed in phase {phase}")]
    InvalidState {
        operation: &'static str,
        phase: TransferPhase,
    },
}
