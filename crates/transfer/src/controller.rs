//! The OTA transfer state machine.
//!
//! ```text
//! Idle --begin_session(clean)--> Receiving
//! Idle --begin_session(dirty)--> Erasing --erase ok--> Receiving
//! Receiving --accept_chunk--> Receiving
//! Receiving --mark_finished--> Completed
//! any --fault / overflow / abort_session--> Aborted
//! ```

use otaflash_protocol::{ProgressReport, TransferPhase, TransferSummary};
use tracing::{debug, error, info, trace, warn};

use crate::progress::throughput_kbps;
use crate::session::TransferSession;
use crate::storage::{SlotId, SlotStorage, StorageError};
use crate::{ERASED_BYTE, OtaError, SCAN_BLOCK_SIZE};

/// Result of a successfully stored chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    Accepted { new_offset: usize },
}

/// Drives one [`TransferSession`] against a [`SlotStorage`] backend.
///
/// All methods run to completion on the caller's thread; storage calls
/// block. The controller never reboots the device: the caller checks
/// [`should_install_on_disconnect`](Self::should_install_on_disconnect)
/// when the link drops.
pub struct TransferController<S> {
    storage: S,
    session: TransferSession,
}

impl<S: SlotStorage> TransferController<S> {
    /// Creates an idle controller writing into `slot`.
    pub fn new(storage: S, slot: SlotId) -> Self {
        Self {
            storage,
            session: TransferSession::new(slot),
        }
    }

    /// Starts a fresh transfer at offset 0.
    ///
    /// Reads the slot geometry, scans the slot for bytes that are not
    /// erased and erases the whole slot if any are found. Any progress
    /// from a previous session is discarded.
    pub fn begin_session(&mut self) -> Result<(), OtaError> {
        let slot = self.session.slot_id();
        if self.session.phase() == TransferPhase::Receiving {
            info!(
                discarded = self.session.bytes_total(),
                "transfer restarted, discarding received bytes"
            );
        }
        self.session.reset();

        let geometry = match self.storage.geometry(slot) {
            Ok(g) => g,
            Err(e) => {
                error!(%slot, error = %e, "unable to get storage slot info");
                return Err(self.fail(e));
            }
        };
        info!(
            %slot,
            base_address = %format!("{:#010x}", geometry.base_address),
            capacity = geometry.capacity,
            "slot info"
        );
        self.session.restart(geometry.capacity);

        match self.find_dirty_byte(geometry.capacity) {
            Ok(None) => {
                info!(%slot, "download area is empty");
            }
            Ok(Some(offset)) => {
                info!(%slot, offset, "download area is not empty, erasing");
                self.session.set_phase(TransferPhase::Erasing);
                if let Err(e) = self.storage.erase(slot) {
                    error!(%slot, error = %e, "slot erase failed");
                    return Err(self.fail(e));
                }
                debug!(%slot, "slot erased");
            }
            Err(e) => {
                error!(%slot, error = %e, "error reading slot");
                return Err(self.fail(e));
            }
        }

        self.session.set_phase(TransferPhase::Receiving);
        Ok(())
    }

    /// Writes one chunk at the current offset.
    ///
    /// A chunk that does not fit in the slot is rejected whole and the
    /// session is aborted with its offset untouched.
    pub fn accept_chunk(&mut self, payload: &[u8]) -> Result<ChunkOutcome, OtaError> {
        self.require(TransferPhase::Receiving, "accept_chunk")?;

        let slot = self.session.slot_id();
        let offset = self.session.write_offset();
        let capacity = self.session.slot_capacity();

        if payload.len() > self.session.remaining() {
            warn!(offset, len = payload.len(), capacity, "chunk overflows slot");
            self.session.set_phase(TransferPhase::Aborted);
            return Err(OtaError::SlotOverflow {
                offset,
                len: payload.len(),
                capacity,
            });
        }

        if payload.is_empty() {
            return Ok(ChunkOutcome::Accepted { new_offset: offset });
        }

        if let Err(e) = self.storage.write(slot, offset, payload) {
            error!(offset, len = payload.len(), error = %e, "slot write failed");
            return Err(self.fail(e));
        }
        self.session.advance(payload.len());
        trace!(offset, len = payload.len(), "chunk written");

        Ok(ChunkOutcome::Accepted {
            new_offset: self.session.write_offset(),
        })
    }

    /// Closes the transfer and reports its size and speed.
    ///
    /// Does not install the image.
    pub fn mark_finished(&mut self) -> Result<TransferSummary, OtaError> {
        self.require(TransferPhase::Receiving, "mark_finished")?;
        self.session.set_phase(TransferPhase::Completed);

        let summary = self.current_summary();
        info!(
            total_bytes = summary.total_bytes,
            ticks = summary.elapsed_ticks,
            kbps = summary.throughput_kbps,
            "transfer finished"
        );
        Ok(summary)
    }

    /// Advances the transfer clock by one tick.
    pub fn tick(&mut self) {
        self.session.tick();
    }

    /// True once a transfer has completed and not been aborted or restarted.
    pub fn should_install_on_disconnect(&self) -> bool {
        self.session.phase() == TransferPhase::Completed
    }

    /// Aborts the current transfer and drops its progress.
    pub fn abort_session(&mut self) {
        match self.session.phase() {
            TransferPhase::Idle | TransferPhase::Aborted => {}
            phase => {
                info!(%phase, position = self.session.write_offset(), "transfer aborted");
                self.session.discard();
            }
        }
    }

    /// Returns the session to idle, as after a fresh connection.
    pub fn reset(&mut self) {
        self.session.reset();
    }

    /// Summary of the completed transfer, using the current tick count.
    pub fn summary(&self) -> Option<TransferSummary> {
        (self.session.phase() == TransferPhase::Completed).then(|| self.current_summary())
    }

    pub fn progress(&self) -> ProgressReport {
        self.session.progress()
    }

    pub fn phase(&self) -> TransferPhase {
        self.session.phase()
    }

    pub fn session(&self) -> &TransferSession {
        &self.session
    }

    pub fn slot(&self) -> SlotId {
        self.session.slot_id()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    fn current_summary(&self) -> TransferSummary {
        let total_bytes = self.session.bytes_total();
        let elapsed_ticks = self.session.elapsed_ticks();
        TransferSummary {
            total_bytes,
            elapsed_ticks,
            throughput_kbps: throughput_kbps(total_bytes, elapsed_ticks),
        }
    }

    fn require(&self, phase: TransferPhase, operation: &'static str) -> Result<(), OtaError> {
        if self.session.phase() == phase {
            Ok(())
        } else {
            Err(OtaError::InvalidState {
                operation,
                phase: self.session.phase(),
            })
        }
    }

    fn fail(&mut self, e: StorageError) -> OtaError {
        self.session.set_phase(TransferPhase::Aborted);
        OtaError::StorageFault(e)
    }

    /// Offset of the first non-erased byte in `[0, capacity)`, if any.
    fn find_dirty_byte(&mut self, capacity: usize) -> Result<Option<usize>, StorageError> {
        let slot = self.session.slot_id();
        let mut buf = [0u8; SCAN_BLOCK_SIZE];
        let mut offset = 0;
        while offset < capacity {
            let block = &mut buf[..(capacity - offset).min(SCAN_BLOCK_SIZE)];
            self.storage.read(slot, offset, block)?;
            if let Some(i) = block.iter().position(|b| *b != ERASED_BYTE) {
                return Ok(Some(offset + i));
            }
            offset += block.len();
        }
        Ok(None)
    }
}
