//! Events delivered from the link layer into the transfer core.

use crate::constants::{Characteristic, ControlOpcode};

/// One inbound event, already stripped of link-layer framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A central connected.
    LinkOpened { connection: u8 },
    /// Control write: start a transfer.
    Start,
    /// Data write carrying one image chunk.
    Chunk(Vec<u8>),
    /// Control write: the image is complete.
    Finish,
    /// The connection was closed, with the link-layer reason code.
    LinkClosed { reason: u16 },
    /// Periodic timer fired.
    Tick,
}

impl TransportEvent {
    /// Short name for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportEvent::LinkOpened { .. } => "link_opened",
            TransportEvent::Start => "start",
            TransportEvent::Chunk(_) => "chunk",
            TransportEvent::Finish => "finish",
            TransportEvent::LinkClosed { .. } => "link_closed",
            TransportEvent::Tick => "tick",
        }
    }
}

/// Errors from decoding a characteristic write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("empty control write")]
    Empty,

    #[error("unknown control opcode: {0:#04x}")]
    UnknownOpcode(u8),

    #[error("write to unknown characteristic: {0:#06x}")]
    UnknownCharacteristic(u16),
}

/// Decodes a write to one of the OTA characteristics.
///
/// Only the first byte of a control write is significant. Data writes are
/// passed through verbatim, including empty ones.
pub fn decode_write(
    characteristic: Characteristic,
    value: &[u8],
) -> Result<TransportEvent, DecodeError> {
    match characteristic {
        Characteristic::OtaControl => {
            let first = *value.first().ok_or(DecodeError::Empty)?;
            match ControlOpcode::from_byte(first) {
                Some(ControlOpcode::Start) => Ok(TransportEvent::Start),
                Some(ControlOpcode::Finish) => Ok(TransportEvent::Finish),
                None => Err(DecodeError::UnknownOpcode(first)),
            }
        }
        Characteristic::OtaData => Ok(TransportEvent::Chunk(value.to_vec())),
    }
}

/// Like [`decode_write`], keyed by the raw characteristic identifier.
pub fn decode_write_by_id(id: u16, value: &[u8]) -> Result<TransportEvent, DecodeError> {
    let characteristic =
        Characteristic::from_id(id).ok_or(DecodeError::UnknownCharacteristic(id))?;
    decode_write(characteristic, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_control_start_and_finish() {
        assert_eq!(
            decode_write(Characteristic::OtaControl, &[0x00]).unwrap(),
            TransportEvent::Start
        );
        assert_eq!(
            decode_write(Characteristic::OtaControl, &[0x03, 0xAA]).unwrap(),
            TransportEvent::Finish
        );
    }

    #[test]
    fn decode_control_rejects_unknown_opcode() {
        assert_eq!(
            decode_write(Characteristic::OtaControl, &[0x7F]),
            Err(DecodeError::UnknownOpcode(0x7F))
        );
    }

    #[test]
    fn decode_control_rejects_empty() {
        assert_eq!(
            decode_write(Characteristic::OtaControl, &[]),
            Err(DecodeError::Empty)
        );
    }

    #[test]
    fn decode_data_passes_payload_through() {
        let ev = decode_write(Characteristic::OtaData, b"\x01\x02\x03").unwrap();
        assert_eq!(ev, TransportEvent::Chunk(vec![1, 2, 3]));
        assert_eq!(ev.kind(), "chunk");
    }

    #[test]
    fn decode_by_id() {
        let id = Characteristic::OtaData.id();
        assert!(matches!(
            decode_write_by_id(id, &[9]),
            Ok(TransportEvent::Chunk(_))
        ));
        assert_eq!(
            decode_write_by_id(0xBEEF, &[0]),
            Err(DecodeError::UnknownCharacteristic(0xBEEF))
        );
    }
}
