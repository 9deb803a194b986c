//! Account snapshot and periodic balance refresh.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use weavecast_protocol::{Jwk, Winston};

use crate::service::KeyService;

/// Read-mostly snapshot of a signing key's on-network identity.
///
/// The balance is only ever replaced wholesale by a fresh query, never
/// incremented locally.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub address: String,
    pub balance: Winston,
    pub last_refreshed: DateTime<Utc>,
}

/// Periodically refreshes an account snapshot while a key is held.
///
/// Readers and the refresh task share one slot; a refresh replaces the
/// whole snapshot atomically (no partial-field updates). Dropping the
/// watcher or calling [`stop`](Self::stop) ends the background task.
pub struct AccountWatcher {
    slot: Arc<RwLock<Option<AccountInfo>>>,
    cancel: CancellationToken,
}

impl AccountWatcher {
    /// Performs one immediate refresh, then refreshes every `interval`
    /// until stopped. A failed refresh keeps the previous snapshot.
    pub fn start(service: KeyService, key: Jwk, interval: Duration) -> Self {
        let slot: Arc<RwLock<Option<AccountInfo>>> = Arc::new(RwLock::new(None));
        let cancel = CancellationToken::new();

        let task_slot = Arc::clone(&slot);
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                match service.account_info(&key).await {
                    Ok(info) => {
                        debug!(address = %info.address, balance = info.balance.0, "account refreshed");
                        if let Ok(mut guard) = task_slot.write() {
                            *guard = Some(info);
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "account refresh failed, keeping previous snapshot");
                    }
                }

                tokio::select! {
                    _ = task_cancel.cancelled() => return,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        });

        Self { slot, cancel }
    }

    /// Latest snapshot, if any refresh has succeeded.
    pub fn current(&self) -> Option<AccountInfo> {
        self.slot.read().ok().and_then(|guard| guard.clone())
    }

    /// Stops the refresh task.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for AccountWatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
