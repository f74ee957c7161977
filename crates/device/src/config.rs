use otaflash_transfer::SlotId;
use serde::{Deserialize, Serialize};

/// How writes to the OTA control characteristic are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OtaMode {
    /// The application receives the image itself into a storage slot.
    #[default]
    #[serde(rename = "in_place")]
    InPlace,
    /// Any control write reboots into the standalone DFU loader once the
    /// link closes.
    #[serde(rename = "app_loader")]
    AppLoader,
}

/// Device glue configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Storage slot receiving the image.
    #[serde(default)]
    pub slot: SlotId,

    #[serde(default)]
    pub mode: OtaMode,

    /// Log transfer progress every N ticks (0 disables).
    #[serde(default = "default_progress_log_every")]
    pub progress_log_every: u32,
}

fn default_progress_log_every() -> u32 {
    1
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            slot: SlotId::default(),
            mode: OtaMode::default(),
            progress_log_every: default_progress_log_every(),
        }
    }
}
