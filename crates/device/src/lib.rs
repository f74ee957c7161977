//! Device-side glue for OTA transfers.
//!
//! Maps transport events (characteristic writes, link lifecycle, timer
//! ticks) one-to-one onto [`TransferController`](otaflash_transfer::TransferController)
//! calls, turns outcomes into write responses, and asks the [`Bootloader`]
//! to install the staged image when the link drops after a completed
//! transfer.

mod bootloader;
mod config;
mod dispatch;

pub use bootloader::{BootCall, BootError, Bootloader, BootloaderInfo, RecordingBootloader};
pub use config::{DeviceConfig, OtaMode};
pub use dispatch::{OtaDevice, Response, status_for};

/// Errors produced while handling device events.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("bootloader error: {0}")]
    Boot(#[from] BootError),
}
