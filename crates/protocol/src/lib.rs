//! Transport-facing vocabulary for OTA firmware transfers.
//!
//! The link layer delivers raw characteristic writes and connection
//! lifecycle notifications; this crate turns them into typed
//! [`TransportEvent`]s and defines the status codes and reports that flow
//! back to the remote side.

pub mod constants;
pub mod events;
pub mod types;

// Re-export primary types for convenience.
pub use constants::{AttStatus, Characteristic, ControlOpcode};
pub use events::{DecodeError, TransportEvent, decode_write};
pub use types::{ProgressReport, StatusReport, TransferPhase, TransferSummary};
