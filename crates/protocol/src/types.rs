use serde::{Deserialize, Serialize};

/// Lifecycle phase of a transfer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferPhase {
    #[serde(rename = "idle")]
    Idle,
    #[serde(rename = "erasing")]
    Erasing,
    #[serde(rename = "receiving")]
    Receiving,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "aborted")]
    Aborted,
}

impl TransferPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferPhase::Idle => "idle",
            TransferPhase::Erasing => "erasing",
            TransferPhase::Receiving => "receiving",
            TransferPhase::Completed => "completed",
            TransferPhase::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final report of a completed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSummary {
    pub total_bytes: u64,
    pub elapsed_ticks: u32,
    pub throughput_kbps: u32,
}

/// Snapshot of an in-flight transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub position: u64,
    pub elapsed_ticks: u32,
    pub throughput_kbps: u32,
}

/// Value exposed on a status characteristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub phase: TransferPhase,
    pub progress: ProgressReport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<TransferSummary>,
}

impl StatusReport {
    /// Serializes the report for a characteristic read.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
