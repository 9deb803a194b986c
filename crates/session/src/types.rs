//! Workflow stages and the events the orchestrator emits.

use serde::Serialize;

use weavecast_cost::{BalanceCheck, CostEstimate};
use weavecast_protocol::{TransferProgress, UploadError, Winston};

/// Stage of the upload workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    /// No file selected yet, or a transfer was cancelled.
    ChoosingFile,
    /// A file is selected; waiting for (or holding) a signing key.
    LoadingKey,
    /// A transfer task is running.
    Transferring,
    /// The transfer finished and a content id exists.
    Completed,
}

/// Events emitted during a session, in the order they happen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SessionEvent {
    StageChanged { stage: Stage },
    Progress { progress: TransferProgress },
    Errored { error: UploadError },
    Completed { tx_id: String, confirmed: bool },
}

/// What loading a key established: the wallet identity and whether it
/// can afford the selected file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingReport {
    pub address: String,
    pub balance: Winston,
    pub estimate: CostEstimate,
    pub check: BalanceCheck,
}
