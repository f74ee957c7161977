use serde::{Deserialize, Serialize};

/// Identifier of a bootloader storage slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(pub u32);

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slot {}", self.0)
    }
}

/// Location and size of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotGeometry {
    /// Absolute address of the slot in the device's storage map.
    pub base_address: u32,
    /// Length of the slot in bytes.
    pub capacity: usize,
}

/// Errors reported by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("access of {len} bytes at offset {offset} outside slot of {capacity} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    #[error("unknown {0}")]
    UnknownSlot(SlotId),

    #[error("backend fault: {0}")]
    Fault(String),
}

/// Raw access to bootloader storage slots.
///
/// Every call blocks until the hardware operation has finished.
pub trait SlotStorage {
    /// Returns the geometry of `slot`.
    fn geometry(&self, slot: SlotId) -> Result<SlotGeometry, StorageError>;

    /// Fills `buf` with the bytes at `offset`.
    fn read(&mut self, slot: SlotId, offset: usize, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Programs `data` at `offset`.
    fn write(&mut self, slot: SlotId, offset: usize, data: &[u8]) -> Result<(), StorageError>;

    /// Resets the whole slot to the erased state.
    fn erase(&mut self, slot: SlotId) -> Result<(), StorageError>;
}

/// Rejects accesses that do not fit in `[0, capacity)`.
pub(crate) fn check_bounds(offset: usize, len: usize, capacity: usize) -> Result<(), StorageError> {
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(StorageError::OutOfBounds {
            offset,
            len,
            capacity,
        }),
    }
}
