//! Thread-safe session state.

use std::sync::{Arc, RwLock};

use serde::Serialize;

use weavecast_protocol::{Jwk, TransferProgress, UploadError};

use crate::types::Stage;

/// A validated file held in memory, ready to upload.
///
/// The payload is shared, so cloning the selection is cheap.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub data: Arc<Vec<u8>>,
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
}

/// Serializable view of the session for UI consumption.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub stage: Stage,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub key_loaded: bool,
    pub address: Option<String>,
    pub progress: Option<TransferProgress>,
    pub last_error: Option<UploadError>,
    pub tx_id: Option<String>,
    pub confirmed: Option<bool>,
}

/// Tracks one upload workflow (thread-safe).
///
/// Mutations go through named methods rather than exposing the inner
/// state; [`complete`](Self::complete) is the only path that records a
/// content id.
pub struct UploadSession {
    inner: RwLock<SessionInner>,
}

struct SessionInner {
    stage: Stage,
    file: Option<SelectedFile>,
    key: Option<Jwk>,
    address: Option<String>,
    progress: Option<TransferProgress>,
    last_error: Option<UploadError>,
    tx_id: Option<String>,
    confirmed: Option<bool>,
}

impl SessionInner {
    fn fresh() -> Self {
        Self {
            stage: Stage::ChoosingFile,
            file: None,
            key: None,
            address: None,
            progress: None,
            last_error: None,
            tx_id: None,
            confirmed: None,
        }
    }
}

impl Default for UploadSession {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadSession {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(SessionInner::fresh()),
        }
    }

    pub fn stage(&self) -> Stage {
        self.inner.read().unwrap().stage
    }

    pub fn file(&self) -> Option<SelectedFile> {
        self.inner.read().unwrap().file.clone()
    }

    pub fn key(&self) -> Option<Jwk> {
        self.inner.read().unwrap().key.clone()
    }

    pub fn address(&self) -> Option<String> {
        self.inner.read().unwrap().address.clone()
    }

    pub fn last_error(&self) -> Option<UploadError> {
        self.inner.read().unwrap().last_error.clone()
    }

    /// Records a newly selected file and moves to the key stage. Any
    /// previous transfer result or error belongs to the old file and
    /// is dropped; a loaded key is kept.
    pub fn set_file(&self, file: SelectedFile) {
        let mut s = self.inner.write().unwrap();
        s.file = Some(file);
        s.stage = Stage::LoadingKey;
        s.progress = None;
        s.last_error = None;
        s.tx_id = None;
        s.confirmed = None;
    }

    /// Records a structurally valid key and its derived address.
    pub fn set_key(&self, key: Jwk, address: String) {
        let mut s = self.inner.write().unwrap();
        s.key = Some(key);
        s.address = Some(address);
    }

    /// Records a stage change directly. The orchestrator enforces
    /// which transitions are legal. Leaving `Completed` drops the
    /// recorded result: a content id only ever exists on a completed
    /// session.
    pub fn set_stage(&self, stage: Stage) {
        let mut s = self.inner.write().unwrap();
        s.stage = stage;
        if stage != Stage::Completed {
            s.tx_id = None;
            s.confirmed = None;
            s.progress = None;
        }
    }

    pub fn set_progress(&self, progress: TransferProgress) {
        let mut s = self.inner.write().unwrap();
        s.progress = Some(progress);
    }

    /// Attaches an error to the current stage. Errors annotate a stage
    /// rather than being a stage of their own.
    pub fn set_error(&self, err: UploadError) {
        let mut s = self.inner.write().unwrap();
        s.last_error = Some(err);
    }

    /// Clears the current error. Returns `true` if one was present.
    pub fn clear_error(&self) -> bool {
        let mut s = self.inner.write().unwrap();
        s.last_error.take().is_some()
    }

    /// Enters the transferring stage with a clean slate.
    pub fn begin_transfer(&self) {
        let mut s = self.inner.write().unwrap();
        s.stage = Stage::Transferring;
        s.progress = None;
        s.last_error = None;
        s.tx_id = None;
        s.confirmed = None;
    }

    /// Records a finished transfer. The only path that sets a content
    /// id.
    pub fn complete(&self, tx_id: String, confirmed: bool) {
        let mut s = self.inner.write().unwrap();
        s.stage = Stage::Completed;
        s.tx_id = Some(tx_id);
        s.confirmed = Some(confirmed);
        s.last_error = None;
    }

    /// Records a failed transfer and returns to the key stage so the
    /// user can retry.
    pub fn fail_transfer(&self, err: UploadError) {
        let mut s = self.inner.write().unwrap();
        s.stage = Stage::LoadingKey;
        s.last_error = Some(err);
    }

    /// Records a user cancellation: back to choosing, with the
    /// selected file and loaded key preserved.
    pub fn cancel_transfer(&self) {
        let mut s = self.inner.write().unwrap();
        s.stage = Stage::ChoosingFile;
        s.progress = None;
        s.last_error = None;
        s.tx_id = None;
        s.confirmed = None;
    }

    /// Returns the session to its initial state. Idempotent: returns
    /// `true` only if anything actually changed.
    pub fn reset(&self) -> bool {
        let mut s = self.inner.write().unwrap();
        let pristine = s.stage == Stage::ChoosingFile
            && s.file.is_none()
            && s.key.is_none()
            && s.address.is_none()
            && s.progress.is_none()
            && s.last_error.is_none()
            && s.tx_id.is_none();
        if pristine {
            return false;
        }
        *s = SessionInner::fresh();
        true
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let s = self.inner.read().unwrap();
        SessionSnapshot {
            stage: s.stage,
            file_name: s.file.as_ref().map(|f| f.name.clone()),
            file_size: s.file.as_ref().map(|f| f.size),
            key_loaded: s.key.is_some(),
            address: s.address.clone(),
            progress: s.progress.clone(),
            last_error: s.last_error.clone(),
            tx_id: s.tx_id.clone(),
            confirmed: s.confirmed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file() -> SelectedFile {
        SelectedFile {
            name: "clip.mp4".into(),
            mime_type: "video/mp4".into(),
            size: 1000,
            data: Arc::new(vec![0u8; 1000]),
            duration_secs: 12.0,
            width: 1920,
            height: 1080,
        }
    }

    fn sample_key() -> Jwk {
        Jwk {
            kty: "RSA".into(),
            n: "bW9kdWx1cw".into(),
            e: "AQAB".into(),
            d: "d".into(),
            p: "p".into(),
            q: "q".into(),
            dp: "dp".into(),
            dq: "dq".into(),
            qi: "qi".into(),
        }
    }

    #[test]
    fn selecting_a_file_enters_the_key_stage() {
        let session = UploadSession::new();
        assert_eq!(session.stage(), Stage::ChoosingFile);
        session.set_file(sample_file());
        assert_eq!(session.stage(), Stage::LoadingKey);
    }

    #[test]
    fn reselecting_drops_the_previous_result_but_keeps_the_key() {
        let session = UploadSession::new();
        session.set_file(sample_file());
        session.set_key(sample_key(), "addr".into());
        session.begin_transfer();
        session.complete("tx-1".into(), true);

        session.set_file(sample_file());
        let snap = session.snapshot();
        assert_eq!(snap.tx_id, None);
        assert!(snap.key_loaded);
        assert_eq!(snap.stage, Stage::LoadingKey);
    }

    #[test]
    fn complete_records_the_content_id() {
        let session = UploadSession::new();
        session.set_file(sample_file());
        session.begin_transfer();
        session.complete("tx-9".into(), false);

        let snap = session.snapshot();
        assert_eq!(snap.stage, Stage::Completed);
        assert_eq!(snap.tx_id.as_deref(), Some("tx-9"));
        assert_eq!(snap.confirmed, Some(false));
    }

    #[test]
    fn leaving_completed_drops_the_result() {
        let session = UploadSession::new();
        session.set_file(sample_file());
        session.begin_transfer();
        session.complete("tx-1".into(), true);

        session.set_stage(Stage::ChoosingFile);
        let snap = session.snapshot();
        assert_eq!(snap.tx_id, None);
        assert_eq!(snap.confirmed, None);
        assert_eq!(snap.progress, None);
    }

    #[test]
    fn cancel_preserves_file_and_key() {
        let session = UploadSession::new();
        session.set_file(sample_file());
        session.set_key(sample_key(), "addr".into());
        session.begin_transfer();
        session.cancel_transfer();

        let snap = session.snapshot();
        assert_eq!(snap.stage, Stage::ChoosingFile);
        assert_eq!(snap.file_name.as_deref(), Some("clip.mp4"));
        assert!(snap.key_loaded);
        assert_eq!(snap.progress, None);
    }

    #[test]
    fn failed_transfer_returns_to_the_key_stage_with_the_error() {
        let session = UploadSession::new();
        session.set_file(sample_file());
        session.begin_transfer();
        session.fail_transfer(UploadError::network("connection reset"));

        let snap = session.snapshot();
        assert_eq!(snap.stage, Stage::LoadingKey);
        assert!(snap.last_error.is_some());
    }

    #[test]
    fn reset_is_idempotent() {
        let session = UploadSession::new();
        session.set_file(sample_file());
        session.set_key(sample_key(), "addr".into());

        assert!(session.reset());
        assert!(!session.reset());

        let snap = session.snapshot();
        assert_eq!(snap.stage, Stage::ChoosingFile);
        assert_eq!(snap.file_name, None);
        assert!(!snap.key_loaded);
    }
}
