//! Network service boundary for the permanent-storage network.
//!
//! `Gateway` abstracts every network interaction the pipeline needs:
//! address derivation, balance and fee queries, transaction creation
//! and signing, chunked upload, and confirmation status. The pipeline
//! only ever talks to `dyn Gateway`, so tests and dry-runs run against
//! [`MemoryGateway`] while production wires in a real client.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;

use weavecast_protocol::{Jwk, UploadError, Winston};

mod chunk;
mod memory;

pub use chunk::{TransferChunk, plan_chunks};
pub use memory::MemoryGateway;

/// Boxed future returned by gateway operations.
pub type GatewayFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, GatewayError>> + Send + 'a>>;

/// Errors produced at the network boundary.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("gateway returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("transaction not found: {0}")]
    NotFound(String),
}

impl GatewayError {
    /// Transient failures worth retrying: connectivity, timeouts,
    /// server errors and rate limiting.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidKey(_) | Self::NotFound(_) => false,
        }
    }
}

impl From<GatewayError> for UploadError {
    fn from(err: GatewayError) -> Self {
        match &err {
            GatewayError::Network(_) | GatewayError::Timeout(_) => {
                UploadError::network(err.to_string())
            }
            GatewayError::Status { .. } => {
                let retryable = err.is_retryable();
                UploadError::upload(err.to_string(), retryable)
            }
            GatewayError::InvalidKey(_) => UploadError::validation(
                "The key file could not be used to derive a wallet address".to_string(),
                "Select a valid key file",
            ),
            GatewayError::NotFound(_) => UploadError::upload(err.to_string(), false),
        }
    }
}

/// A descriptive name/value tag attached to a storage transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// An unsigned storage transaction carrying the full payload.
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    /// Payload shared rather than copied; a draft for a large file is
    /// cheap to clone across retry attempts.
    pub data: Arc<Vec<u8>>,
    pub tags: Vec<Tag>,
    /// Network fee quoted at creation time.
    pub reward: Winston,
    /// Owner public modulus (base64url), taken from the signing key.
    pub owner: String,
}

/// A signed storage transaction, ready for chunked upload.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    /// The content identifier returned to the caller on success.
    pub id: String,
    pub data: Arc<Vec<u8>>,
    pub tags: Vec<Tag>,
    pub reward: Winston,
    /// SHA-256 of the payload, hex, verified by the network when the
    /// final chunk arrives.
    pub data_digest: String,
}

/// Stateful chunked uploader for one signed transaction.
///
/// Chunks are uploaded strictly in sequence; `upload_chunk` sends the
/// next pending chunk and returns the number of bytes it carried.
pub trait ChunkUploader: Send {
    fn is_complete(&self) -> bool;
    fn uploaded_chunks(&self) -> u32;
    fn total_chunks(&self) -> u32;
    fn chunk_size(&self) -> usize;
    fn upload_chunk(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<usize, GatewayError>> + Send + '_>>;
}

/// Abstract client for the permanent-storage network.
pub trait Gateway: Send + Sync {
    /// Derives the wallet address for a signing key. This is the
    /// authoritative key check: structurally valid but corrupt keys
    /// fail here.
    fn derive_address<'a>(&'a self, key: &'a Jwk) -> GatewayFuture<'a, String>;

    /// Returns the spendable balance of an address, in winston.
    fn balance<'a>(&'a self, address: &'a str) -> GatewayFuture<'a, Winston>;

    /// Returns the fee required to store `bytes` bytes, in winston.
    fn price(&self, bytes: u64) -> GatewayFuture<'_, Winston>;

    /// Creates an unsigned storage transaction for the payload.
    fn create_transaction<'a>(
        &'a self,
        data: Arc<Vec<u8>>,
        tags: Vec<Tag>,
        key: &'a Jwk,
    ) -> GatewayFuture<'a, TransactionDraft>;

    /// Signs a transaction with the given key.
    fn sign<'a>(
        &'a self,
        draft: TransactionDraft,
        key: &'a Jwk,
    ) -> GatewayFuture<'a, SignedTransaction>;

    /// Returns a chunked uploader for a signed transaction.
    fn uploader<'a>(
        &'a self,
        tx: &'a SignedTransaction,
    ) -> GatewayFuture<'a, Box<dyn ChunkUploader>>;

    /// Returns the HTTP-like status of a submitted transaction:
    /// 200 accepted, 202 pending, 404 not yet visible.
    fn status<'a>(&'a self, tx_id: &'a str) -> GatewayFuture<'a, u16>;
}
