//! Error taxonomy for the upload pipeline.
//!
//! Every surfaced error carries a plain-language message, an optional
//! actionable suggestion, and a `recoverable` flag. Raw transport
//! errors are mapped into this taxonomy at component boundaries.

use serde::Serialize;

/// Message used for user-initiated cancellation.
const CANCELLED_MESSAGE: &str = "Upload cancelled";

/// Broad classification of an upload pipeline error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Malformed file or key. Requires the user to change input.
    Validation,
    /// Transient connectivity, timeout, 5xx or rate-limit failure.
    Network,
    /// Insufficient funds for the estimated cost.
    Balance,
    /// Failure during chunk transfer or transaction submission.
    Upload,
}

/// A classified, user-presentable pipeline error.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize)]
#[error("{message}")]
#[serde(rename_all = "camelCase")]
pub struct UploadError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    pub recoverable: bool,
}

impl UploadError {
    /// A validation error. Never recoverable by retry.
    pub fn validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Validation,
            message: message.into(),
            suggestion: Some(suggestion.into()),
            recoverable: false,
        }
    }

    /// A transient network error. Eligible for automatic retry.
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Network,
            message: message.into(),
            suggestion: Some("Check your internet connection and try again".into()),
            recoverable: true,
        }
    }

    /// An insufficient-balance error. Recoverable only by adding funds,
    /// never auto-retried.
    pub fn balance(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Balance,
            message: message.into(),
            suggestion: Some(suggestion.into()),
            recoverable: false,
        }
    }

    /// An upload failure. Recoverability depends on the underlying cause.
    pub fn upload(message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            kind: ErrorKind::Upload,
            message: message.into(),
            suggestion: recoverable.then(|| "Try the upload again".into()),
            recoverable,
        }
    }

    /// A user-initiated cancellation. Not retried automatically; the
    /// user may restart manually.
    pub fn cancelled() -> Self {
        Self {
            kind: ErrorKind::Upload,
            message: CANCELLED_MESSAGE.into(),
            suggestion: None,
            recoverable: false,
        }
    }

    /// Returns `true` for user-initiated cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Upload && self.message == CANCELLED_MESSAGE
    }

    /// Returns `true` if automatic retry is worthwhile: network errors
    /// and recoverable upload errors. Validation, balance and
    /// cancellation never retry.
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            ErrorKind::Network => true,
            ErrorKind::Upload => self.recoverable,
            ErrorKind::Validation | ErrorKind::Balance => false,
        }
    }
}
