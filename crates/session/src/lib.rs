//! Upload workflow state machine.
//!
//! A session moves through four stages: choosing a file, loading a
//! signing key, transferring, and completed. The orchestrator enforces
//! legal transitions, runs at most one transfer at a time, and emits
//! typed events for a UI to consume. Cancelling a transfer returns to
//! the file-choosing stage with the selected file and loaded key
//! preserved.

mod orchestrator;
mod session;
mod types;

pub use orchestrator::Orchestrator;
pub use session::{SelectedFile, SessionSnapshot, UploadSession};
pub use types::{FundingReport, SessionEvent, Stage};
