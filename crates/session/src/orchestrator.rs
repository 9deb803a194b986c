//! The upload orchestrator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use weavecast_cost::{BalanceCheck, CostEstimator, EstimatorConfig};
use weavecast_gateway::Gateway;
use weavecast_keys::{AccountInfo, AccountWatcher, KeyService, parse_key};
use weavecast_protocol::{Jwk, MediaSource, UploadError};
use weavecast_retry::RetryManager;
use weavecast_transfer::{TransferConfig, TransferEngine, TransferRequest};
use weavecast_validation::{Constraints, validate};

use crate::session::{SelectedFile, SessionSnapshot, UploadSession};
use crate::types::{FundingReport, SessionEvent, Stage};

/// Event buffer size. Progress events are droppable, so a saturated
/// buffer loses snapshots rather than blocking the transfer task.
const EVENT_BUFFER: usize = 256;

/// How often the background watcher refreshes the held key's balance.
const ACCOUNT_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Coordinates the whole upload workflow over one shared session.
///
/// At most one transfer runs at a time; starting a second while one is
/// active fails instead of queueing.
pub struct Orchestrator {
    gateway: Arc<dyn Gateway>,
    session: Arc<UploadSession>,
    keys: KeyService,
    estimator: CostEstimator,
    engine: Arc<TransferEngine>,
    constraints: Constraints,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: Option<mpsc::Receiver<SessionEvent>>,
    transfer_active: Arc<AtomicBool>,
    cancel: Mutex<CancellationToken>,
    watcher: Mutex<Option<AccountWatcher>>,
}

impl Orchestrator {
    /// Creates an orchestrator with default constraints and tuning.
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self::with_transfer_config(gateway, TransferConfig::default())
    }

    /// Creates an orchestrator with explicit transfer tuning.
    pub fn with_transfer_config(gateway: Arc<dyn Gateway>, transfer: TransferConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let retry = Arc::new(RetryManager::default());
        Self {
            session: Arc::new(UploadSession::new()),
            keys: KeyService::new(Arc::clone(&gateway)),
            estimator: CostEstimator::new(Arc::clone(&gateway), EstimatorConfig::default()),
            engine: Arc::new(TransferEngine::new(Arc::clone(&gateway), retry, transfer)),
            constraints: Constraints::default(),
            gateway,
            events_tx,
            events_rx: Some(events_rx),
            transfer_active: Arc::new(AtomicBool::new(false)),
            cancel: Mutex::new(CancellationToken::new()),
            watcher: Mutex::new(None),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.events_rx.take()
    }

    /// Current session view.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub fn stage(&self) -> Stage {
        self.session.stage()
    }

    /// Validates a file and, on success, selects it and moves to the
    /// key stage. Rejected files leave the session where it was.
    pub async fn select_file(&self, source: &dyn MediaSource) -> Result<(), UploadError> {
        if self.session.stage() == Stage::Transferring {
            return Err(self.record(UploadError::upload(
                "An upload is already in progress",
                false,
            )));
        }

        let valid = match validate(source, &self.constraints).await {
            Ok(valid) => valid,
            Err(err) => return Err(self.record(err)),
        };
        let data = match source.read_all().await {
            Ok(data) => data,
            Err(err) => {
                return Err(self.record(UploadError::validation(
                    format!("Could not read the file: {err}"),
                    "Check that the file still exists and is readable",
                )));
            }
        };

        let file = SelectedFile {
            name: source.file_name().to_string(),
            mime_type: valid.mime_type,
            size: data.len() as u64,
            data: Arc::new(data),
            duration_secs: valid.duration_secs,
            width: valid.width,
            height: valid.height,
        };
        info!(file = %file.name, size = file.size, "file selected");
        self.session.set_file(file);
        self.emit(SessionEvent::StageChanged {
            stage: Stage::LoadingKey,
        });
        Ok(())
    }

    /// Parses a raw key file, derives its address, and checks that the
    /// wallet can afford the selected file.
    ///
    /// A structurally valid key is stored even when the balance falls
    /// short, so the user can fund the wallet and retry without
    /// reloading the key. While a key is held, a background task keeps
    /// its account snapshot fresh; the task is discarded with the key
    /// on [`reset`](Self::reset).
    pub async fn load_key(&self, raw: &[u8]) -> Result<FundingReport, UploadError> {
        if self.session.stage() == Stage::Transferring {
            return Err(self.record(UploadError::upload(
                "An upload is already in progress",
                false,
            )));
        }
        let Some(file) = self.session.file() else {
            return Err(self.record(UploadError::validation(
                "No file selected",
                "Choose a video file before loading a key",
            )));
        };

        let key = match parse_key(raw) {
            Ok(key) => key,
            Err(err) => return Err(self.record(err)),
        };
        let address = match self.keys.derive_address(&key).await {
            Ok(address) => address,
            Err(err) => return Err(self.record(err)),
        };

        // The balance query and the fee estimate are independent
        // network calls; run them together.
        let (balance, estimate) = tokio::join!(
            self.keys.balance(&address),
            self.estimator.estimate(file.size)
        );
        let balance = match balance {
            Ok(balance) => balance,
            Err(err) => return Err(self.record(err)),
        };
        let check = BalanceCheck::evaluate(balance, estimate.amount);

        self.session.set_key(key.clone(), address.clone());
        self.watch_account(key);

        if !check.sufficient {
            let err = UploadError::balance(
                format!(
                    "Insufficient balance: this upload costs about {} but the wallet holds {}",
                    estimate.amount, check.balance
                ),
                check
                    .recommendation
                    .clone()
                    .unwrap_or_else(|| "Add funds to this wallet".into()),
            );
            return Err(self.record(err));
        }

        info!(
            %address,
            balance = check.balance.0,
            estimated = estimate.amount.0,
            "key loaded and funded"
        );
        Ok(FundingReport {
            address,
            balance: check.balance,
            estimate,
            check,
        })
    }

    /// Starts the transfer in a background task.
    ///
    /// Requires a selected file and a loaded key; refuses while another
    /// transfer is active. Completion, failure and cancellation all
    /// arrive as events.
    pub fn start_transfer(&self) -> Result<(), UploadError> {
        if self.session.stage() != Stage::LoadingKey {
            return Err(self.record(UploadError::upload(
                "Not ready to upload: select a file and load a key first",
                false,
            )));
        }
        let (Some(file), Some(key)) = (self.session.file(), self.session.key()) else {
            return Err(self.record(UploadError::validation(
                "No signing key loaded",
                "Load a wallet key before uploading",
            )));
        };
        if self.transfer_active.swap(true, Ordering::SeqCst) {
            return Err(self.record(UploadError::upload(
                "An upload is already in progress",
                false,
            )));
        }

        self.session.begin_transfer();
        self.emit(SessionEvent::StageChanged {
            stage: Stage::Transferring,
        });

        let token = CancellationToken::new();
        *self.cancel.lock().unwrap() = token.clone();

        let session = Arc::clone(&self.session);
        let engine = Arc::clone(&self.engine);
        let events = self.events_tx.clone();
        let active = Arc::clone(&self.transfer_active);
        let request = TransferRequest {
            data: Arc::clone(&file.data),
            file_name: file.name.clone(),
            mime_type: file.mime_type.clone(),
        };

        tokio::spawn(async move {
            let progress_session = Arc::clone(&session);
            let progress_events = events.clone();
            let result = engine
                .upload(request, &key, token, move |progress| {
                    progress_session.set_progress(progress.clone());
                    let _ = progress_events.try_send(SessionEvent::Progress { progress });
                })
                .await;

            match result {
                Ok(outcome) => {
                    session.complete(outcome.tx_id.clone(), outcome.confirmed);
                    let _ = events.try_send(SessionEvent::Completed {
                        tx_id: outcome.tx_id,
                        confirmed: outcome.confirmed,
                    });
                    let _ = events.try_send(SessionEvent::StageChanged {
                        stage: Stage::Completed,
                    });
                }
                Err(err) if err.is_cancelled() => {
                    info!("transfer cancelled by the user");
                    session.cancel_transfer();
                    let _ = events.try_send(SessionEvent::StageChanged {
                        stage: Stage::ChoosingFile,
                    });
                }
                Err(err) => {
                    warn!(error = %err, "transfer failed");
                    session.fail_transfer(err.clone());
                    let _ = events.try_send(SessionEvent::Errored { error: err });
                    let _ = events.try_send(SessionEvent::StageChanged {
                        stage: Stage::LoadingKey,
                    });
                }
            }
            active.store(false, Ordering::SeqCst);
        });

        Ok(())
    }

    /// Requests cancellation of the running transfer. A no-op when
    /// nothing is transferring.
    pub fn cancel(&self) {
        if self.session.stage() == Stage::Transferring {
            info!("cancelling transfer");
            self.cancel.lock().unwrap().cancel();
        }
    }

    /// Moves the session to an earlier stage whose inputs are already
    /// satisfied. Never valid while a transfer is running; the
    /// transferring and completed stages can only be reached through
    /// [`start_transfer`](Self::start_transfer).
    pub fn go_to(&self, stage: Stage) -> Result<(), UploadError> {
        let current = self.session.stage();
        if current == Stage::Transferring {
            return Err(self.record(UploadError::upload(
                "Cannot change steps while an upload is running",
                false,
            )));
        }
        if current == stage {
            return Ok(());
        }
        let allowed = match stage {
            Stage::ChoosingFile => true,
            Stage::LoadingKey => self.session.file().is_some(),
            Stage::Transferring | Stage::Completed => false,
        };
        if !allowed {
            return Err(self.record(UploadError::validation(
                "That step is not available yet",
                "Complete the earlier steps first",
            )));
        }
        self.session.set_stage(stage);
        self.emit(SessionEvent::StageChanged { stage });
        Ok(())
    }

    /// Clears the recorded error and starts the transfer again.
    pub fn retry_transfer(&self) -> Result<(), UploadError> {
        self.session.clear_error();
        self.start_transfer()
    }

    /// Clears the recorded error without changing stage.
    pub fn dismiss_error(&self) {
        self.session.clear_error();
    }

    /// Cancels any running transfer and returns the session to its
    /// initial state. Safe to call repeatedly.
    pub fn reset(&self) {
        self.cancel.lock().unwrap().cancel();
        // The key is cleared with the session; its watcher goes too.
        self.watcher.lock().unwrap().take();
        if self.session.reset() {
            self.emit(SessionEvent::StageChanged {
                stage: Stage::ChoosingFile,
            });
        }
    }

    /// Latest background account snapshot, once a key is held and at
    /// least one refresh has succeeded.
    pub fn account(&self) -> Option<AccountInfo> {
        self.watcher
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|w| w.current())
    }

    /// The gateway this orchestrator talks to.
    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    fn watch_account(&self, key: Jwk) {
        let watcher = AccountWatcher::start(self.keys.clone(), key, ACCOUNT_REFRESH_INTERVAL);
        // Replacing the watcher cancels the previous refresh task.
        *self.watcher.lock().unwrap() = Some(watcher);
    }

    fn record(&self, err: UploadError) -> UploadError {
        self.session.set_error(err.clone());
        self.emit(SessionEvent::Errored { error: err.clone() });
        err
    }

    fn emit(&self, event: SessionEvent) {
        if let Err(e) = self.events_tx.try_send(event) {
            warn!(error = %e, "dropping session event");
        }
    }
}
