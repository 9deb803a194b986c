//! In-memory gateway.
//!
//! A complete, deterministic implementation of [`Gateway`] used by unit
//! tests, the integration package, and local dry-runs. Supports funded
//! accounts, a linear fee schedule, per-operation fault injection, and
//! configurable confirmation latency.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use tracing::debug;

use weavecast_protocol::{Jwk, Winston};

use crate::{
    ChunkUploader, Gateway, GatewayError, GatewayFuture, SignedTransaction, Tag,
    TransactionDraft, TransferChunk, plan_chunks,
};

/// Default chunk size negotiated by the in-memory network: 256 KiB.
const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

struct TxRecord {
    digest: String,
    received: Vec<u8>,
    chunks_received: u32,
    total_chunks: u32,
    complete: bool,
    polls: u32,
}

struct MemoryInner {
    accounts: HashMap<String, Winston>,
    base_fee: Winston,
    winston_per_byte: u64,
    chunk_size: usize,
    confirm_after_polls: u32,
    txs: HashMap<String, TxRecord>,
    fail_next: HashMap<String, u32>,
}

impl MemoryInner {
    /// Consumes one injected failure for `op`, if any is queued.
    fn take_failure(&mut self, op: &str) -> bool {
        match self.fail_next.get_mut(op) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }

    fn quote(&self, bytes: u64) -> Winston {
        self.base_fee
            .saturating_add(Winston(bytes.saturating_mul(self.winston_per_byte)))
    }
}

/// In-memory [`Gateway`] implementation.
#[derive(Clone)]
pub struct MemoryGateway {
    inner: Arc<Mutex<MemoryInner>>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryInner {
                accounts: HashMap::new(),
                base_fee: Winston(1_000),
                winston_per_byte: 10,
                chunk_size: DEFAULT_CHUNK_SIZE,
                confirm_after_polls: 1,
                txs: HashMap::new(),
                fail_next: HashMap::new(),
            })),
        }
    }

    /// Overrides the negotiated chunk size.
    pub fn with_chunk_size(self, chunk_size: usize) -> Self {
        self.inner.lock().unwrap().chunk_size = chunk_size.max(1);
        self
    }

    /// Number of status polls before a completed transaction reports
    /// accepted. `u32::MAX` simulates a network that never confirms in
    /// time.
    pub fn with_confirm_after_polls(self, polls: u32) -> Self {
        self.inner.lock().unwrap().confirm_after_polls = polls;
        self
    }

    /// Overrides the fee schedule: `base_fee + bytes * winston_per_byte`.
    pub fn with_fee(self, base_fee: Winston, winston_per_byte: u64) -> Self {
        let mut inner = self.inner.lock().unwrap();
        inner.base_fee = base_fee;
        inner.winston_per_byte = winston_per_byte;
        drop(inner);
        self
    }

    /// Credits an account.
    pub fn fund(&self, address: &str, amount: Winston) {
        self.inner
            .lock()
            .unwrap()
            .accounts
            .insert(address.to_string(), amount);
    }

    /// Queues `count` injected failures for the named operation
    /// (`"balance"`, `"price"`, `"create_transaction"`, `"sign"`,
    /// `"upload_chunk"`, `"status"`).
    pub fn fail_next(&self, op: &str, count: u32) {
        self.inner
            .lock()
            .unwrap()
            .fail_next
            .insert(op.to_string(), count);
    }

    /// Returns `true` once every chunk of `tx_id` has arrived and the
    /// data digest verified.
    pub fn tx_complete(&self, tx_id: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .txs
            .get(tx_id)
            .is_some_and(|t| t.complete)
    }

    /// Bytes received so far for `tx_id`.
    pub fn uploaded_bytes(&self, tx_id: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .txs
            .get(tx_id)
            .map(|t| t.received.len())
            .unwrap_or(0)
    }

    /// Chunks received so far for `tx_id`.
    pub fn uploaded_chunk_count(&self, tx_id: &str) -> u32 {
        self.inner
            .lock()
            .unwrap()
            .txs
            .get(tx_id)
            .map(|t| t.chunks_received)
            .unwrap_or(0)
    }

    fn address_for(key: &Jwk) -> Result<String, GatewayError> {
        if let Some(problem) = key.structural_problem() {
            return Err(GatewayError::InvalidKey(problem));
        }
        let modulus = URL_SAFE_NO_PAD
            .decode(key.n.as_bytes())
            .map_err(|e| GatewayError::InvalidKey(format!("modulus is not base64url: {e}")))?;
        if modulus.is_empty() {
            return Err(GatewayError::InvalidKey("modulus is empty".into()));
        }
        Ok(URL_SAFE_NO_PAD.encode(Sha256::digest(&modulus)))
    }
}

impl Gateway for MemoryGateway {
    fn derive_address<'a>(&'a self, key: &'a Jwk) -> GatewayFuture<'a, String> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            if inner.lock().unwrap().take_failure("derive_address") {
                return Err(GatewayError::Network("injected derive_address failure".into()));
            }
            Self::address_for(key)
        })
    }

    fn balance<'a>(&'a self, address: &'a str) -> GatewayFuture<'a, Winston> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let mut inner = inner.lock().unwrap();
            if inner.take_failure("balance") {
                return Err(GatewayError::Network("injected balance failure".into()));
            }
            Ok(inner.accounts.get(address).copied().unwrap_or(Winston::ZERO))
        })
    }

    fn price(&self, bytes: u64) -> GatewayFuture<'_, Winston> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let mut inner = inner.lock().unwrap();
            if inner.take_failure("price") {
                return Err(GatewayError::Network("injected price failure".into()));
            }
            Ok(inner.quote(bytes))
        })
    }

    fn create_transaction<'a>(
        &'a self,
        data: Arc<Vec<u8>>,
        tags: Vec<Tag>,
        key: &'a Jwk,
    ) -> GatewayFuture<'a, TransactionDraft> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let mut guard = inner.lock().unwrap();
            if guard.take_failure("create_transaction") {
                return Err(GatewayError::Network(
                    "injected create_transaction failure".into(),
                ));
            }
            let reward = guard.quote(data.len() as u64);
            drop(guard);
            if let Some(problem) = key.structural_problem() {
                return Err(GatewayError::InvalidKey(problem));
            }
            Ok(TransactionDraft {
                data,
                tags,
                reward,
                owner: key.n.clone(),
            })
        })
    }

    fn sign<'a>(
        &'a self,
        draft: TransactionDraft,
        key: &'a Jwk,
    ) -> GatewayFuture<'a, SignedTransaction> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            if inner.lock().unwrap().take_failure("sign") {
                return Err(GatewayError::Network("injected sign failure".into()));
            }
            if key.d.is_empty() {
                return Err(GatewayError::InvalidKey(
                    "missing private exponent".into(),
                ));
            }
            let mut hasher = Sha256::new();
            hasher.update(draft.owner.as_bytes());
            hasher.update(draft.data.as_slice());
            let id = URL_SAFE_NO_PAD.encode(hasher.finalize());
            let data_digest = hex::encode(Sha256::digest(draft.data.as_slice()));
            debug!(tx = %id, bytes = draft.data.len(), "signed transaction");
            Ok(SignedTransaction {
                id,
                data: draft.data,
                tags: draft.tags,
                reward: draft.reward,
                data_digest,
            })
        })
    }

    fn uploader<'a>(
        &'a self,
        tx: &'a SignedTransaction,
    ) -> GatewayFuture<'a, Box<dyn ChunkUploader>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let mut guard = inner.lock().unwrap();
            let chunk_size = guard.chunk_size;
            let chunks: Vec<TransferChunk> =
                plan_chunks(tx.data.len() as u64, chunk_size as u64).collect();
            guard.txs.insert(
                tx.id.clone(),
                TxRecord {
                    digest: tx.data_digest.clone(),
                    received: Vec::new(),
                    chunks_received: 0,
                    total_chunks: chunks.len() as u32,
                    complete: tx.data.is_empty(),
                    polls: 0,
                },
            );
            drop(guard);
            Ok(Box::new(MemoryUploader {
                inner,
                tx_id: tx.id.clone(),
                data: Arc::clone(&tx.data),
                chunk_size,
                chunks,
                next: 0,
            }) as Box<dyn ChunkUploader>)
        })
    }

    fn status<'a>(&'a self, tx_id: &'a str) -> GatewayFuture<'a, u16> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let mut guard = inner.lock().unwrap();
            if guard.take_failure("status") {
                return Err(GatewayError::Network("injected status failure".into()));
            }
            let confirm_after = guard.confirm_after_polls;
            let Some(record) = guard.txs.get_mut(tx_id) else {
                return Ok(404);
            };
            if !record.complete {
                return Ok(404);
            }
            record.polls = record.polls.saturating_add(1);
            if record.polls >= confirm_after {
                Ok(200)
            } else {
                Ok(202)
            }
        })
    }
}

struct MemoryUploader {
    inner: Arc<Mutex<MemoryInner>>,
    tx_id: String,
    data: Arc<Vec<u8>>,
    chunk_size: usize,
    chunks: Vec<TransferChunk>,
    next: usize,
}

impl ChunkUploader for MemoryUploader {
    fn is_complete(&self) -> bool {
        self.next >= self.chunks.len()
    }

    fn uploaded_chunks(&self) -> u32 {
        self.next as u32
    }

    fn total_chunks(&self) -> u32 {
        self.chunks.len() as u32
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn upload_chunk(
        &mut self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<usize, GatewayError>> + Send + '_>>
    {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            if inner.take_failure("upload_chunk") {
                return Err(GatewayError::Network("injected upload_chunk failure".into()));
            }
            let Some(chunk) = self.chunks.get(self.next).copied() else {
                return Err(GatewayError::Status {
                    status: 400,
                    body: "no chunks pending".into(),
                });
            };

            let start = chunk.offset as usize;
            let end = start + chunk.len as usize;
            let record = self
                .inner_record(&mut inner)
                .ok_or_else(|| GatewayError::NotFound(self.tx_id.clone()))?;
            record.received.extend_from_slice(&self.data[start..end]);

            self.next += 1;
            record.chunks_received = self.next as u32;

            if self.next == self.chunks.len() {
                let digest = hex::encode(Sha256::digest(&record.received));
                if digest != record.digest {
                    return Err(GatewayError::Status {
                        status: 400,
                        body: "data digest mismatch".into(),
                    });
                }
                record.complete = true;
            }
            Ok(chunk.len as usize)
        })
    }
}

impl MemoryUploader {
    fn inner_record<'a>(&self, inner: &'a mut MemoryInner) -> Option<&'a mut TxRecord> {
        inner.txs.get_mut(&self.tx_id)
    }
}
