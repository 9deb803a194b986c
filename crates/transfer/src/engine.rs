//! The chunked upload engine.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use weavecast_gateway::{Gateway, SignedTransaction};
use weavecast_protocol::{Jwk, TransferProgress, UploadError};
use weavecast_retry::RetryManager;

use crate::speed::SpeedCalculator;
use crate::tags::content_tags;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Pause between confirmation polls.
    pub confirm_poll_interval: Duration,
    /// Polls before the confirmation window is considered elapsed.
    pub confirm_max_attempts: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            confirm_poll_interval: Duration::from_secs(2),
            confirm_max_attempts: 10,
        }
    }
}

/// A fully-read payload ready for upload.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub data: Arc<Vec<u8>>,
    pub file_name: String,
    pub mime_type: String,
}

/// The result of a finished transfer.
///
/// `confirmed` is false when every chunk was accepted but the network
/// had not confirmed the transaction within the polling window. The
/// upload is still treated as successful; confirmation merely lags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub tx_id: String,
    pub confirmed: bool,
    pub bytes_uploaded: u64,
}

/// Drives a payload through tagging, signing, sequential chunk upload
/// and confirmation polling.
pub struct TransferEngine {
    gateway: Arc<dyn Gateway>,
    retry: Arc<RetryManager>,
    config: TransferConfig,
}

impl TransferEngine {
    pub fn new(gateway: Arc<dyn Gateway>, retry: Arc<RetryManager>, config: TransferConfig) -> Self {
        Self {
            gateway,
            retry,
            config,
        }
    }

    /// Uploads a payload end to end.
    ///
    /// Progress snapshots are pushed through `on_progress`: 0–30 while
    /// the transaction is created and signed, 30–90 proportional to
    /// bytes on the wire, 90–100 during confirmation. Cancellation is
    /// observed between chunks and during every wait.
    pub async fn upload<F>(
        &self,
        request: TransferRequest,
        key: &Jwk,
        cancel: CancellationToken,
        on_progress: F,
    ) -> Result<TransferOutcome, UploadError>
    where
        F: Fn(TransferProgress) + Send + Sync,
    {
        let transfer_id = Uuid::new_v4();
        let total_bytes = request.data.len() as u64;
        info!(%transfer_id, file = %request.file_name, total_bytes, "starting transfer");

        if cancel.is_cancelled() {
            return Err(UploadError::cancelled());
        }
        on_progress(TransferProgress::preparing(0.0, total_bytes));

        let tags = content_tags(&request.file_name, &request.mime_type);

        let draft = {
            let op = format!("create:{transfer_id}");
            tokio::select! {
                _ = cancel.cancelled() => return Err(UploadError::cancelled()),
                res = self.retry.execute_default(&op, || {
                    let data = Arc::clone(&request.data);
                    let tags = tags.clone();
                    async move {
                        self.gateway
                            .create_transaction(data, tags, key)
                            .await
                            .map_err(UploadError::from)
                    }
                }) => res?,
            }
        };
        on_progress(TransferProgress::preparing(15.0, total_bytes));

        let tx = {
            let op = format!("sign:{transfer_id}");
            tokio::select! {
                _ = cancel.cancelled() => return Err(UploadError::cancelled()),
                res = self.retry.execute_default(&op, || {
                    let draft = draft.clone();
                    async move { self.gateway.sign(draft, key).await.map_err(UploadError::from) }
                }) => res?,
            }
        };
        debug!(%transfer_id, tx = %tx.id, "transaction signed");
        on_progress(TransferProgress::preparing(30.0, total_bytes));

        let uploader = {
            let op = format!("uploader:{}", tx.id);
            tokio::select! {
                _ = cancel.cancelled() => return Err(UploadError::cancelled()),
                res = self.retry.execute_default(&op, || async {
                    self.gateway.uploader(&tx).await.map_err(UploadError::from)
                }) => res?,
            }
        };
        debug!(
            %transfer_id,
            total_chunks = uploader.total_chunks(),
            chunk_size = uploader.chunk_size(),
            "uploading chunks"
        );

        let uploader = Arc::new(Mutex::new(uploader));
        let speed = SpeedCalculator::default();
        let mut bytes_uploaded: u64 = 0;
        let mut chunk_index: u32 = 0;
        let mut eta_secs: Option<f64> = None;
        let mut eta_sampled_at: Option<tokio::time::Instant> = None;

        loop {
            if uploader.lock().await.is_complete() {
                break;
            }
            if cancel.is_cancelled() {
                return Err(UploadError::cancelled());
            }

            let op = format!("chunk:{}:{}", tx.id, chunk_index);
            let sent = tokio::select! {
                _ = cancel.cancelled() => return Err(UploadError::cancelled()),
                res = self.retry.execute_default(&op, || {
                    let uploader = Arc::clone(&uploader);
                    async move {
                        let mut guard = uploader.lock().await;
                        guard.upload_chunk().await.map_err(UploadError::from)
                    }
                }) => res?,
            };

            bytes_uploaded += sent as u64;
            chunk_index += 1;
            speed.add_sample(sent as u64);

            let fraction = if total_bytes == 0 {
                1.0
            } else {
                bytes_uploaded as f64 / total_bytes as f64
            };
            // Recompute the ETA at most once per second to avoid
            // jitter; intermediate snapshots reuse the last value.
            let remaining = total_bytes.saturating_sub(bytes_uploaded);
            let now = tokio::time::Instant::now();
            if eta_sampled_at.is_none_or(|t| now.duration_since(t) >= Duration::from_secs(1)) {
                eta_secs = speed.eta(remaining).map(|d| d.as_secs_f64());
                eta_sampled_at = Some(now);
            }
            on_progress(TransferProgress {
                percent: (30.0 + fraction * 60.0).min(90.0),
                bytes_transferred: bytes_uploaded,
                total_bytes,
                bytes_per_second: speed.bytes_per_second(),
                eta_secs,
            });
        }

        on_progress(TransferProgress {
            percent: 90.0,
            bytes_transferred: total_bytes,
            total_bytes,
            bytes_per_second: 0.0,
            eta_secs: None,
        });

        let confirmed = self.confirm(&tx, &cancel, total_bytes, &on_progress).await?;
        on_progress(TransferProgress::completed(total_bytes));
        info!(%transfer_id, tx = %tx.id, confirmed, bytes_uploaded, "transfer finished");

        Ok(TransferOutcome {
            tx_id: tx.id.clone(),
            confirmed,
            bytes_uploaded,
        })
    }

    /// Polls the transaction status until the network accepts it or
    /// the window elapses.
    ///
    /// The network may not see a transaction immediately after its
    /// final chunk, so 404 counts as pending rather than failure. An
    /// elapsed window is a soft success: the chunks were accepted.
    async fn confirm<F>(
        &self,
        tx: &SignedTransaction,
        cancel: &CancellationToken,
        total_bytes: u64,
        on_progress: &F,
    ) -> Result<bool, UploadError>
    where
        F: Fn(TransferProgress) + Send + Sync,
    {
        for attempt in 0..self.config.confirm_max_attempts {
            if cancel.is_cancelled() {
                return Err(UploadError::cancelled());
            }

            match self.gateway.status(&tx.id).await {
                Ok(200) => {
                    debug!(tx = %tx.id, "transaction confirmed");
                    return Ok(true);
                }
                Ok(code @ (202 | 404 | 429)) => {
                    debug!(tx = %tx.id, code, "not yet confirmed");
                }
                Ok(code) if code >= 400 => {
                    return Err(UploadError::upload(
                        format!("the network rejected transaction {} with status {code}", tx.id),
                        false,
                    ));
                }
                Ok(code) => {
                    debug!(tx = %tx.id, code, "unexpected status, treating as pending");
                }
                Err(e) if e.is_retryable() => {
                    debug!(tx = %tx.id, error = %e, "status query failed, will poll again");
                }
                Err(e) => return Err(e.into()),
            }

            let percent = 90.0
                + (attempt + 1) as f64 / self.config.confirm_max_attempts as f64 * 9.0;
            on_progress(TransferProgress {
                percent: percent.min(99.0),
                bytes_transferred: total_bytes,
                total_bytes,
                bytes_per_second: 0.0,
                eta_secs: None,
            });

            tokio::select! {
                _ = cancel.cancelled() => return Err(UploadError::cancelled()),
                _ = tokio::time::sleep(self.config.confirm_poll_interval) => {}
            }
        }

        warn!(
            tx = %tx.id,
            attempts = self.config.confirm_max_attempts,
            "confirmation window elapsed, treating upload as accepted"
        );
        Ok(false)
    }
}
