use serde::{Deserialize, Serialize};

/// Payload carried by a single data write when the link negotiates a
/// 247-byte ATT MTU (MTU minus the 3-byte write header).
pub const DEFAULT_CHUNK_PAYLOAD: usize = 244;

/// Characteristics of the OTA service that accept writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Characteristic {
    #[serde(rename = "ota_control")]
    OtaControl,
    #[serde(rename = "ota_data")]
    OtaData,
}

impl Characteristic {
    /// Stable 16-bit identifier used by the glue's attribute table.
    pub fn id(self) -> u16 {
        match self {
            Characteristic::OtaControl => 0x0001,
            Characteristic::OtaData => 0x0002,
        }
    }

    /// Looks up a characteristic by its identifier.
    pub fn from_id(id: u16) -> Option<Self> {
        match id {
            0x0001 => Some(Characteristic::OtaControl),
            0x0002 => Some(Characteristic::OtaData),
            _ => None,
        }
    }
}

/// Values written to the OTA control characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControlOpcode {
    /// Begin a new transfer into the download slot.
    Start = 0x00,
    /// The last data chunk has been written.
    Finish = 0x03,
}

impl ControlOpcode {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(ControlOpcode::Start),
            0x03 => Some(ControlOpcode::Finish),
            _ => None,
        }
    }
}

/// ATT error codes used to acknowledge or reject writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AttStatus {
    #[serde(rename = "success")]
    Success = 0x00,
    #[serde(rename = "write_not_permitted")]
    WriteNotPermitted = 0x03,
    #[serde(rename = "request_not_supported")]
    RequestNotSupported = 0x06,
    #[serde(rename = "invalid_attribute_length")]
    InvalidAttributeLength = 0x0D,
    #[serde(rename = "unlikely_error")]
    UnlikelyError = 0x0E,
}

impl AttStatus {
    /// Raw code as sent in the write response.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_success(self) -> bool {
        self == AttStatus::Success
    }
}
