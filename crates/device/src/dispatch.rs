//! Event dispatch from the link layer into the transfer controller.

use otaflash_protocol::events::decode_write_by_id;
use otaflash_protocol::{AttStatus, StatusReport, TransferPhase, TransferSummary, TransportEvent};
use otaflash_transfer::{OtaError, SlotStorage, TransferController};
use tracing::{debug, info, warn};

use crate::DeviceError;
use crate::bootloader::Bootloader;
use crate::config::{DeviceConfig, OtaMode};

/// What the glue should send back or do after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Nothing to send.
    None,
    /// Write response for a control or data write.
    Ack(AttStatus),
    /// Finish acknowledged; carries the transfer summary.
    Finished(TransferSummary),
    /// Acknowledge, then close the link.
    AckAndDisconnect(AttStatus),
    /// The bootloader was asked to install the received image.
    Installing,
    /// The bootloader was asked to reboot into DFU mode.
    EnteringDfu,
}

/// Maps a controller error to the status sent in the write response.
pub fn status_for(err: &OtaError) -> AttStatus {
    match err {
        OtaError::StorageFault(_) => AttStatus::UnlikelyError,
        OtaError::SlotOverflow { .. } => AttStatus::InvalidAttributeLength,
        OtaError::InvalidState { .. } => AttStatus::WriteNotPermitted,
    }
}

/// One OTA-capable device: a transfer controller plus bootloader access.
///
/// Events must be handed over one at a time from a single dispatch
/// context; each call runs to completion.
pub struct OtaDevice<S, B> {
    controller: TransferController<S>,
    bootloader: B,
    config: DeviceConfig,
    connection: Option<u8>,
    boot_to_dfu: bool,
}

impl<S: SlotStorage, B: Bootloader> OtaDevice<S, B> {
    pub fn new(storage: S, bootloader: B, config: DeviceConfig) -> Self {
        info!(
            bootloader = %bootloader.info(),
            slot = %config.slot,
            mode = ?config.mode,
            "OTA device ready"
        );
        Self {
            controller: TransferController::new(storage, config.slot),
            bootloader,
            config,
            connection: None,
            boot_to_dfu: false,
        }
    }

    /// Handles one transport event.
    pub fn handle(&mut self, event: TransportEvent) -> Result<Response, DeviceError> {
        debug!(event = event.kind(), "handling event");
        match event {
            TransportEvent::LinkOpened { connection } => {
                info!(connection, "connection opened");
                self.connection = Some(connection);
                Ok(Response::None)
            }
            TransportEvent::Tick => {
                self.on_tick();
                Ok(Response::None)
            }
            TransportEvent::Start | TransportEvent::Finish
                if self.config.mode == OtaMode::AppLoader =>
            {
                info!("OTA control written, rebooting into DFU mode on disconnect");
                self.boot_to_dfu = true;
                Ok(Response::AckAndDisconnect(AttStatus::Success))
            }
            TransportEvent::Start => Ok(Response::Ack(self.on_start())),
            TransportEvent::Chunk(data) => Ok(Response::Ack(self.on_chunk(&data))),
            TransportEvent::Finish => Ok(self.on_finish()),
            TransportEvent::LinkClosed { reason } => self.on_link_closed(reason),
        }
    }

    /// Decodes a raw characteristic write and handles it.
    ///
    /// Undecodable writes are answered with `RequestNotSupported`.
    pub fn handle_write(
        &mut self,
        characteristic: u16,
        value: &[u8],
    ) -> Result<Response, DeviceError> {
        match decode_write_by_id(characteristic, value) {
            Ok(event) => self.handle(event),
            Err(e) => {
                warn!(characteristic, error = %e, "rejecting write");
                Ok(Response::Ack(AttStatus::RequestNotSupported))
            }
        }
    }

    /// Current state for a status characteristic.
    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            phase: self.controller.phase(),
            progress: self.controller.progress(),
            summary: self.controller.summary(),
        }
    }

    pub fn controller(&self) -> &TransferController<S> {
        &self.controller
    }

    pub fn bootloader(&self) -> &B {
        &self.bootloader
    }

    pub fn connection(&self) -> Option<u8> {
        self.connection
    }

    pub fn into_parts(self) -> (S, B) {
        (self.controller.into_storage(), self.bootloader)
    }

    fn on_tick(&mut self) {
        self.controller.tick();
        let every = self.config.progress_log_every;
        if every == 0 || self.controller.phase() != TransferPhase::Receiving {
            return;
        }
        let p = self.controller.progress();
        if p.elapsed_ticks % every == 0 {
            info!(
                pos = p.position,
                time = p.elapsed_ticks,
                kbps = p.throughput_kbps,
                "transfer progress"
            );
        }
    }

    fn on_start(&mut self) -> AttStatus {
        match self.controller.begin_session() {
            Ok(()) => AttStatus::Success,
            Err(e) => {
                warn!(error = %e, "could not start transfer");
                status_for(&e)
            }
        }
    }

    fn on_chunk(&mut self, data: &[u8]) -> AttStatus {
        match self.controller.accept_chunk(data) {
            Ok(_) => AttStatus::Success,
            Err(e) => {
                warn!(error = %e, "chunk rejected");
                status_for(&e)
            }
        }
    }

    fn on_finish(&mut self) -> Response {
        match self.controller.mark_finished() {
            Ok(summary) => Response::Finished(summary),
            Err(e) => {
                warn!(error = %e, "finish rejected");
                Response::Ack(status_for(&e))
            }
        }
    }

    fn on_link_closed(&mut self, reason: u16) -> Result<Response, DeviceError> {
        info!(reason = %format!("{reason:#06x}"), "connection closed");
        self.connection = None;

        if self.boot_to_dfu {
            self.boot_to_dfu = false;
            self.controller.reset();
            self.bootloader.reboot_to_dfu()?;
            return Ok(Response::EnteringDfu);
        }

        let install = self.controller.should_install_on_disconnect();
        let slot = self.controller.slot();
        self.controller.reset();
        if !install {
            return Ok(Response::None);
        }

        info!(%slot, "installing received image");
        self.bootloader.select_image_for_boot(slot)?;
        self.bootloader.reboot_and_install()?;
        Ok(Response::Installing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootloader::{BootCall, RecordingBootloader};
    use otaflash_protocol::{Characteristic, ControlOpcode};
    use otaflash_transfer::{MemorySlot, SlotId};

    const SLOT: SlotId = SlotId(0);

    type Device = OtaDevice<MemorySlot, RecordingBootloader>;

    fn device(capacity: usize) -> Device {
        OtaDevice::new(
            MemorySlot::new(SLOT, capacity),
            RecordingBootloader::new(0x0100_0000),
            DeviceConfig::default(),
        )
    }

    fn ack(status: AttStatus) -> Response {
        Response::Ack(status)
    }

    #[test]
    fn full_transfer_then_install_on_disconnect() {
        let mut d = device(1024);
        d.handle(TransportEvent::LinkOpened { connection: 1 }).unwrap();
        assert_eq!(d.connection(), Some(1));
        assert_eq!(d.handle(TransportEvent::Start).unwrap(), ack(AttStatus::Success));

        for i in 0..4u8 {
            let r = d.handle(TransportEvent::Chunk(vec![i; 200])).unwrap();
            assert_eq!(r, ack(AttStatus::Success));
            d.handle(TransportEvent::Tick).unwrap();
        }
        d.handle(TransportEvent::Chunk(vec![9; 100])).unwrap();
        d.handle(TransportEvent::Tick).unwrap();

        let r = d.handle(TransportEvent::Finish).unwrap();
        assert_eq!(
            r,
            Response::Finished(TransferSummary {
                total_bytes: 900,
                elapsed_ticks: 5,
                throughput_kbps: 1,
            })
        );

        let r = d.handle(TransportEvent::LinkClosed { reason: 0x0213 }).unwrap();
        assert_eq!(r, Response::Installing);
        assert_eq!(
            d.bootloader().calls(),
            &[BootCall::SelectImage(SLOT), BootCall::RebootAndInstall]
        );
        assert_eq!(d.controller().phase(), TransferPhase::Idle);
        assert_eq!(d.connection(), None);
    }

    #[test]
    fn disconnect_without_finish_resets() {
        let mut d = device(256);
        d.handle(TransportEvent::Start).unwrap();
        d.handle(TransportEvent::Chunk(vec![1; 16])).unwrap();

        let r = d.handle(TransportEvent::LinkClosed { reason: 0x08 }).unwrap();
        assert_eq!(r, Response::None);
        assert!(d.bootloader().calls().is_empty());
        assert_eq!(d.controller().phase(), TransferPhase::Idle);
        assert_eq!(d.controller().session().write_offset(), 0);
    }

    #[test]
    fn overflow_rejects_and_aborts() {
        let mut d = device(512);
        d.handle(TransportEvent::Start).unwrap();
        d.handle(TransportEvent::Chunk(vec![0; 500])).unwrap();

        let r = d.handle(TransportEvent::Chunk(vec![0; 20])).unwrap();
        assert_eq!(r, ack(AttStatus::InvalidAttributeLength));
        assert_eq!(d.controller().phase(), TransferPhase::Aborted);
        assert_eq!(d.controller().session().bytes_total(), 500);
        assert_eq!(d.controller().session().write_offset(), 500);

        let r = d.handle(TransportEvent::Finish).unwrap();
        assert_eq!(r, ack(AttStatus::WriteNotPermitted));
        assert_eq!(d.controller().session().bytes_total(), 500);

        let r = d.handle(TransportEvent::LinkClosed { reason: 0 }).unwrap();
        assert_eq!(r, Response::None);
        assert!(d.bootloader().calls().is_empty());
        assert_eq!(d.controller().phase(), TransferPhase::Idle);
        assert_eq!(d.controller().session().bytes_total(), 0);
    }

    #[test]
    fn chunk_before_start_is_not_permitted() {
        let mut d = device(64);
        let r = d.handle(TransportEvent::Chunk(vec![1, 2, 3])).unwrap();
        assert_eq!(r, ack(AttStatus::WriteNotPermitted));
        assert_eq!(d.controller().phase(), TransferPhase::Idle);
    }

    #[test]
    fn storage_fault_maps_to_unlikely_error() {
        let mut storage = MemorySlot::new(SLOT, 256);
        storage.faults_mut().read_at = Some(0);
        let mut d = OtaDevice::new(
            storage,
            RecordingBootloader::new(0),
            DeviceConfig::default(),
        );
        let r = d.handle(TransportEvent::Start).unwrap();
        assert_eq!(r, ack(AttStatus::UnlikelyError));
        assert_eq!(d.controller().phase(), TransferPhase::Aborted);
    }

    #[test]
    fn raw_writes_are_decoded() {
        let mut d = device(64);
        let control = Characteristic::OtaControl.id();
        let data = Characteristic::OtaData.id();

        let r = d.handle_write(control, &[ControlOpcode::Start as u8]).unwrap();
        assert_eq!(r, ack(AttStatus::Success));
        let r = d.handle_write(data, b"image").unwrap();
        assert_eq!(r, ack(AttStatus::Success));
        let r = d.handle_write(control, &[0x42]).unwrap();
        assert_eq!(r, ack(AttStatus::RequestNotSupported));
        let r = d.handle_write(control, &[ControlOpcode::Finish as u8]).unwrap();
        assert!(matches!(r, Response::Finished(s) if s.total_bytes == 5));
        assert_eq!(&d.controller().storage().contents()[..5], b"image");
    }

    #[test]
    fn app_loader_mode_reboots_into_dfu() {
        let mut d = OtaDevice::new(
            MemorySlot::new(SLOT, 64),
            RecordingBootloader::new(0),
            DeviceConfig {
                mode: OtaMode::AppLoader,
                ..DeviceConfig::default()
            },
        );
        let r = d.handle(TransportEvent::Start).unwrap();
        assert_eq!(r, Response::AckAndDisconnect(AttStatus::Success));
        assert_eq!(d.controller().phase(), TransferPhase::Idle);

        let r = d.handle(TransportEvent::LinkClosed { reason: 0x16 }).unwrap();
        assert_eq!(r, Response::EnteringDfu);
        assert_eq!(d.bootloader().calls(), &[BootCall::RebootToDfu]);

        let r = d.handle(TransportEvent::LinkClosed { reason: 0x16 }).unwrap();
        assert_eq!(r, Response::None);
    }

    #[test]
    fn bootloader_failure_is_reported_after_reset() {
        let mut bl = RecordingBootloader::new(0);
        bl.reject_select = true;
        let mut d = OtaDevice::new(MemorySlot::new(SLOT, 64), bl, DeviceConfig::default());
        d.handle(TransportEvent::Start).unwrap();
        d.handle(TransportEvent::Finish).unwrap();

        let err = d.handle(TransportEvent::LinkClosed { reason: 0 }).unwrap_err();
        assert!(matches!(err, DeviceError::Boot(_)));
        assert_eq!(d.controller().phase(), TransferPhase::Idle);
        assert!(!d.bootloader().install_requested());
    }

    #[test]
    fn status_report_tracks_phase() {
        let mut d = device(64);
        d.handle(TransportEvent::Start).unwrap();
        d.handle(TransportEvent::Chunk(vec![0; 32])).unwrap();
        let report = d.status_report();
        assert_eq!(report.phase, TransferPhase::Receiving);
        assert_eq!(report.progress.position, 32);
        assert!(report.summary.is_none());

        d.handle(TransportEvent::Finish).unwrap();
        let report = d.status_report();
        assert_eq!(report.phase, TransferPhase::Completed);
        assert_eq!(report.summary.map(|s| s.total_bytes), Some(32));
    }

    #[test]
    fn into_parts_returns_storage() {
        let mut d = device(16);
        d.handle(TransportEvent::Start).unwrap();
        d.handle(TransportEvent::Chunk(b"abcd".to_vec())).unwrap();
        let (storage, _bl) = d.into_parts();
        assert_eq!(&storage.contents()[..4], b"abcd");
    }
}
