use crate::storage::{SlotGeometry, SlotId, SlotStorage, StorageError, check_bounds};
use crate::ERASED_BYTE;

/// Faults a [`MemorySlot`] injects into otherwise successful calls.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// `geometry` fails.
    pub geometry: bool,
    /// Any read covering this offset fails.
    pub read_at: Option<usize>,
    /// The write with this zero-based call index, and every later one, fails.
    pub write_from_call: Option<usize>,
    /// `erase` fails.
    pub erase: bool,
}

/// In-memory model of a single NOR flash slot.
///
/// Erased bytes read as `0xFF` and programming can only clear bits, so
/// writing over non-erased data without an erase corrupts it the way real
/// flash does. Every call is counted for inspection.
#[derive(Debug, Clone)]
pub struct MemorySlot {
    id: SlotId,
    base_address: u32,
    data: Vec<u8>,
    faults: FaultPlan,
    read_calls: usize,
    write_calls: usize,
    erase_calls: usize,
    /// Successful writes in call order.
    writes: Vec<(usize, Vec<u8>)>,
}

impl MemorySlot {
    /// Creates an erased slot of `capacity` bytes.
    pub fn new(id: SlotId, capacity: usize) -> Self {
        Self::with_contents(id, vec![ERASED_BYTE; capacity])
    }

    /// Creates a slot holding `data`; its capacity is `data.len()`.
    pub fn with_contents(id: SlotId, data: Vec<u8>) -> Self {
        Self {
            id,
            base_address: 0,
            data,
            faults: FaultPlan::default(),
            read_calls: 0,
            write_calls: 0,
            erase_calls: 0,
            writes: Vec::new(),
        }
    }

    /// Sets the address reported by `geometry`.
    pub fn with_base_address(mut self, base_address: u32) -> Self {
        self.base_address = base_address;
        self
    }

    /// Overwrites one byte directly, bypassing flash semantics and counters.
    pub fn poke(&mut self, offset: usize, value: u8) {
        self.data[offset] = value;
    }

    pub fn faults_mut(&mut self) -> &mut FaultPlan {
        &mut self.faults
    }

    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls
    }

    /// Number of write attempts, including failed ones.
    pub fn write_calls(&self) -> usize {
        self.write_calls
    }

    /// Number of erase attempts, including failed ones.
    pub fn erase_calls(&self) -> usize {
        self.erase_calls
    }

    pub fn writes(&self) -> &[(usize, Vec<u8>)] {
        &self.writes
    }

    fn check_slot(&self, slot: SlotId) -> Result<(), StorageError> {
        if slot == self.id {
            Ok(())
        } else {
            Err(StorageError::UnknownSlot(slot))
        }
    }
}

impl SlotStorage for MemorySlot {
    fn geometry(&self, slot: SlotId) -> Result<SlotGeometry, StorageError> {
        self.check_slot(slot)?;
        if self.faults.geometry {
            return Err(StorageError::Fault("slot info unavailable".into()));
        }
        Ok(SlotGeometry {
            base_address: self.base_address,
            capacity: self.data.len(),
        })
    }

    fn read(&mut self, slot: SlotId, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        self.check_slot(slot)?;
        self.read_calls += 1;
        check_bounds(offset, buf.len(), self.data.len())?;
        if let Some(at) = self.faults.read_at {
            if (offset..offset + buf.len()).contains(&at) {
                return Err(StorageError::Fault(format!("read error at {at:#x}")));
            }
        }
        buf.copy_from_slice(&self.data[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, slot: SlotId, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        self.check_slot(slot)?;
        let call = self.write_calls;
        self.write_calls += 1;
        check_bounds(offset, data.len(), self.data.len())?;
        if self.faults.write_from_call.is_some_and(|from| call >= from) {
            return Err(StorageError::Fault(format!("program error at {offset:#x}")));
        }
        for (cell, byte) in self.data[offset..offset + data.len()].iter_mut().zip(data) {
            *cell &= *byte;
        }
        self.writes.push((offset, data.to_vec()));
        Ok(())
    }

    fn erase(&mut self, slot: SlotId) -> Result<(), StorageError> {
        self.check_slot(slot)?;
        self.erase_calls += 1;
        if self.faults.erase {
            return Err(StorageError::Fault("erase failed".into()));
        }
        self.data.fill(ERASED_BYTE);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLOT: SlotId = SlotId(0);

    #[test]
    fn new_slot_is_erased() {
        let slot = MemorySlot::new(SLOT, 64);
        assert!(slot.contents().iter().all(|b| *b == 0xFF));
        assert_eq!(slot.geometry(SLOT).unwrap().capacity, 64);
    }

    #[test]
    fn writes_only_clear_bits() {
        let mut slot = MemorySlot::new(SLOT, 4);
        slot.write(SLOT, 0, &[0x0F]).unwrap();
        slot.write(SLOT, 0, &[0xF0]).unwrap();
        assert_eq!(slot.contents()[0], 0x00);

        slot.erase(SLOT).unwrap();
        slot.write(SLOT, 0, &[0xF0]).unwrap();
        assert_eq!(slot.contents()[0], 0xF0);
    }

    #[test]
    fn counts_calls_and_logs_writes() {
        let mut slot = MemorySlot::new(SLOT, 8);
        let mut buf = [0u8; 4];
        slot.read(SLOT, 0, &mut buf).unwrap();
        slot.write(SLOT, 2, b"ab").unwrap();
        slot.erase(SLOT).unwrap();

        assert_eq!(slot.read_calls(), 1);
        assert_eq!(slot.write_calls(), 1);
        assert_eq!(slot.erase_calls(), 1);
        assert_eq!(slot.writes(), &[(2, b"ab".to_vec())]);
    }

    #[test]
    fn rejects_unknown_slot() {
        let mut slot = MemorySlot::new(SLOT, 8);
        assert!(matches!(
            slot.erase(SlotId(1)),
            Err(StorageError::UnknownSlot(SlotId(1)))
        ));
    }

    #[test]
    fn rejects_out_of_bounds_write() {
        let mut slot = MemorySlot::new(SLOT, 8);
        assert!(matches!(
            slot.write(SLOT, 6, b"abc"),
            Err(StorageError::OutOfBounds { .. })
        ));
        assert!(slot.writes().is_empty());
    }

    #[test]
    fn injected_faults() {
        let mut slot = MemorySlot::new(SLOT, 16);
        slot.faults_mut().read_at = Some(9);
        slot.faults_mut().write_from_call = Some(1);
        slot.faults_mut().erase = true;

        let mut buf = [0u8; 8];
        assert!(slot.read(SLOT, 0, &mut buf).is_ok());
        assert!(slot.read(SLOT, 8, &mut buf).is_err());
        assert!(slot.write(SLOT, 0, b"x").is_ok());
        assert!(slot.write(SLOT, 1, b"y").is_err());
        assert!(slot.erase(SLOT).is_err());
        assert_eq!(slot.erase_calls(), 1);
    }
}
