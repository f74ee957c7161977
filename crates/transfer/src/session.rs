use otaflash_protocol::{ProgressReport, TransferPhase};

use crate::progress::throughput_kbps;
use crate::storage::SlotId;

/// State of the single OTA transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSession {
    phase: TransferPhase,
    slot_id: SlotId,
    write_offset: usize,
    bytes_total: u64,
    elapsed_ticks: u32,
    slot_capacity: usize,
}

impl TransferSession {
    /// Creates an idle session targeting `slot_id`.
    pub fn new(slot_id: SlotId) -> Self {
        Self {
            phase: TransferPhase::Idle,
            slot_id,
            write_offset: 0,
            bytes_total: 0,
            elapsed_ticks: 0,
            slot_capacity: 0,
        }
    }

    pub fn phase(&self) -> TransferPhase {
        self.phase
    }

    pub fn slot_id(&self) -> SlotId {
        self.slot_id
    }

    /// Offset in the slot where the next chunk lands.
    pub fn write_offset(&self) -> usize {
        self.write_offset
    }

    /// Bytes accepted so far.
    pub fn bytes_total(&self) -> u64 {
        self.bytes_total
    }

    pub fn elapsed_ticks(&self) -> u32 {
        self.elapsed_ticks
    }

    /// Slot length captured when the session began (0 before that).
    pub fn slot_capacity(&self) -> usize {
        self.slot_capacity
    }

    /// Bytes that still fit in the slot.
    pub fn remaining(&self) -> usize {
        self.slot_capacity - self.write_offset
    }

    /// Position, elapsed time and estimated speed.
    pub fn progress(&self) -> ProgressReport {
        ProgressReport {
            position: self.write_offset as u64,
            elapsed_ticks: self.elapsed_ticks,
            throughput_kbps: throughput_kbps(self.bytes_total, self.elapsed_ticks),
        }
    }

    pub(crate) fn set_phase(&mut self, phase: TransferPhase) {
        self.phase = phase;
    }

    /// Clears progress for a fresh cycle over a slot of `capacity` bytes.
    pub(crate) fn restart(&mut self, capacity: usize) {
        self.write_offset = 0;
        self.bytes_total = 0;
        self.elapsed_ticks = 0;
        self.slot_capacity = capacity;
    }

    /// Back to a pristine idle session.
    pub(crate) fn reset(&mut self) {
        *self = Self::new(self.slot_id);
    }

    /// Aborts and drops accumulated progress.
    pub(crate) fn discard(&mut self) {
        self.phase = TransferPhase::Aborted;
        self.write_offset = 0;
        self.bytes_total = 0;
    }

    pub(crate) fn advance(&mut self, len: usize) {
        self.write_offset += len;
        self.bytes_total += len as u64;
    }

    pub(crate) fn tick(&mut self) {
        self.elapsed_ticks = self.elapsed_ticks.saturating_add(1);
    }
}
