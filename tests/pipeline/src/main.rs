fn main() {
    println!("Run `cargo test -p pipeline-tests` to execute end-to-end pipeline tests.");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use base64::Engine as _;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use tokio::sync::mpsc;

    use weavecast_cost::{CostEstimator, EstimatorConfig};
    use weavecast_gateway::{Gateway, MemoryGateway};
    use weavecast_protocol::{ErrorKind, MediaMetadata, Winston};
    use weavecast_session::{Orchestrator, SessionEvent, Stage};
    use weavecast_transfer::TransferConfig;
    use weavecast_validation::InMemorySource;

    fn key_json() -> String {
        let n = URL_SAFE_NO_PAD.encode(b"pipeline-test-modulus");
        format!(
            r#"{{"kty":"RSA","n":"{n}","e":"AQAB","d":"d","p":"p","q":"q","dp":"dp","dq":"dq","qi":"qi"}}"#
        )
    }

    fn video(name: &str, bytes: usize) -> InMemorySource {
        InMemorySource::new(name, "video/mp4", vec![9u8; bytes]).with_metadata(MediaMetadata {
            duration_secs: 42.0,
            width: 1280,
            height: 720,
        })
    }

    async fn funded_address(gateway: &MemoryGateway, amount: Winston) -> String {
        let key = weavecast_keys::parse_key(key_json().as_bytes()).unwrap();
        let address = gateway.derive_address(&key).await.unwrap();
        gateway.fund(&address, amount);
        address
    }

    async fn wait_for_stage(rx: &mut mpsc::Receiver<SessionEvent>, stage: Stage) {
        while let Some(event) = rx.recv().await {
            if event == (SessionEvent::StageChanged { stage }) {
                return;
            }
        }
        panic!("event channel closed before reaching {stage:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn upload_happy_path_end_to_end() {
        let gateway = Arc::new(MemoryGateway::new().with_chunk_size(256));
        funded_address(&gateway, Winston(100_000_000)).await;

        let mut orchestrator = Orchestrator::new(gateway.clone() as Arc<dyn Gateway>);
        let mut events = orchestrator.take_events().unwrap();

        orchestrator
            .select_file(&video("holiday.mp4", 2000))
            .await
            .unwrap();
        let report = orchestrator.load_key(key_json().as_bytes()).await.unwrap();
        assert!(report.check.sufficient);
        assert!(report.estimate.amount > Winston::ZERO);

        orchestrator.start_transfer().unwrap();
        wait_for_stage(&mut events, Stage::Completed).await;

        let snap = orchestrator.snapshot();
        let tx_id = snap.tx_id.expect("content id");
        assert!(gateway.tx_complete(&tx_id));
        assert_eq!(gateway.uploaded_bytes(&tx_id), 2000);
        assert_eq!(snap.confirmed, Some(true));
        assert!(snap.last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn progress_events_are_monotonic_and_span_all_bands() {
        let gateway = Arc::new(MemoryGateway::new().with_chunk_size(128));
        funded_address(&gateway, Winston(100_000_000)).await;

        let mut orchestrator = Orchestrator::new(gateway as Arc<dyn Gateway>);
        let mut events = orchestrator.take_events().unwrap();

        orchestrator.select_file(&video("clip.mp4", 1000)).await.unwrap();
        orchestrator.load_key(key_json().as_bytes()).await.unwrap();
        orchestrator.start_transfer().unwrap();

        let mut percents = Vec::new();
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::Progress { progress } => percents.push(progress.percent),
                SessionEvent::StageChanged {
                    stage: Stage::Completed,
                } => break,
                _ => {}
            }
        }

        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
        // Preparation, chunk-transfer and confirmation bands all appear.
        assert!(percents.iter().any(|p| *p < 30.0));
        assert!(percents.iter().any(|p| *p > 30.0 && *p <= 90.0));
        assert_eq!(*percents.last().unwrap(), 100.0);
    }

    #[tokio::test]
    async fn oversized_and_wrongly_typed_files_never_touch_the_network() {
        let gateway = Arc::new(MemoryGateway::new());
        let orchestrator = Orchestrator::new(gateway as Arc<dyn Gateway>);

        let oversized = InMemorySource::new("huge.mp4", "video/mp4", vec![1u8; 64])
            .with_declared_size(600 * 1024 * 1024);
        let err = orchestrator.select_file(&oversized).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("600.0 MiB"));

        let wrong_type = InMemorySource::new("notes.txt", "text/plain", vec![1u8; 64]);
        let err = orchestrator.select_file(&wrong_type).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("text/plain"));

        assert_eq!(orchestrator.stage(), Stage::ChoosingFile);
    }

    #[tokio::test]
    async fn garbage_key_file_is_rejected_with_a_hint() {
        let gateway = Arc::new(MemoryGateway::new());
        let orchestrator = Orchestrator::new(gateway as Arc<dyn Gateway>);
        orchestrator.select_file(&video("clip.mp4", 500)).await.unwrap();

        let err = orchestrator.load_key(b"{\"not\":\"a key\"}").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.suggestion.as_deref(), Some("Select a valid key file"));
    }

    #[tokio::test]
    async fn underfunded_wallet_reports_the_exact_shortfall() {
        let gateway = Arc::new(MemoryGateway::new().with_fee(Winston::ZERO, 2));
        let address = funded_address(&gateway, Winston(1)).await;

        let estimator = CostEstimator::new(
            gateway.clone() as Arc<dyn Gateway>,
            EstimatorConfig::default(),
        );
        // 2 winston per byte, 1 winston in the wallet.
        let check = estimator
            .check_sufficient_balance(&address, Winston(2))
            .await
            .unwrap();
        assert!(!check.sufficient);
        assert_eq!(check.shortfall, Some(Winston(1)));
        assert!(check.recommendation.is_some());

        // The same situation through the orchestrator becomes a
        // balance error with advice attached.
        let orchestrator = Orchestrator::new(gateway as Arc<dyn Gateway>);
        orchestrator.select_file(&video("clip.mp4", 1000)).await.unwrap();
        let err = orchestrator.load_key(key_json().as_bytes()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Balance);
        assert!(err.suggestion.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_upload_restarts_without_reloading_the_key() {
        let gateway = Arc::new(MemoryGateway::new().with_chunk_size(64));
        funded_address(&gateway, Winston(100_000_000)).await;

        let mut orchestrator = Orchestrator::new(gateway.clone() as Arc<dyn Gateway>);
        let mut events = orchestrator.take_events().unwrap();

        let source = video("clip.mp4", 10_000);
        orchestrator.select_file(&source).await.unwrap();
        orchestrator.load_key(key_json().as_bytes()).await.unwrap();

        orchestrator.start_transfer().unwrap();
        orchestrator.cancel();
        wait_for_stage(&mut events, Stage::ChoosingFile).await;

        let snap = orchestrator.snapshot();
        assert_eq!(snap.file_name.as_deref(), Some("clip.mp4"));
        assert!(snap.key_loaded);

        // Re-select and go again; the loaded key carries over.
        orchestrator.select_file(&source).await.unwrap();
        orchestrator.start_transfer().unwrap();
        wait_for_stage(&mut events, Stage::Completed).await;
        assert!(orchestrator.snapshot().tx_id.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn flaky_network_is_absorbed_by_retries() {
        let gateway = Arc::new(MemoryGateway::new().with_chunk_size(256));
        funded_address(&gateway, Winston(100_000_000)).await;
        gateway.fail_next("upload_chunk", 2);
        gateway.fail_next("create_transaction", 1);

        let mut orchestrator = Orchestrator::new(gateway.clone() as Arc<dyn Gateway>);
        let mut events = orchestrator.take_events().unwrap();

        orchestrator.select_file(&video("clip.mp4", 1500)).await.unwrap();
        orchestrator.load_key(key_json().as_bytes()).await.unwrap();
        orchestrator.start_transfer().unwrap();
        wait_for_stage(&mut events, Stage::Completed).await;

        let tx_id = orchestrator.snapshot().tx_id.unwrap();
        assert_eq!(gateway.uploaded_bytes(&tx_id), 1500);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_confirmation_still_completes_with_a_content_id() {
        let gateway = Arc::new(MemoryGateway::new().with_confirm_after_polls(u32::MAX));
        funded_address(&gateway, Winston(100_000_000)).await;

        let config = TransferConfig {
            confirm_poll_interval: std::time::Duration::from_millis(50),
            confirm_max_attempts: 3,
        };
        let mut orchestrator =
            Orchestrator::with_transfer_config(gateway.clone() as Arc<dyn Gateway>, config);
        let mut events = orchestrator.take_events().unwrap();

        orchestrator.select_file(&video("clip.mp4", 500)).await.unwrap();
        orchestrator.load_key(key_json().as_bytes()).await.unwrap();
        orchestrator.start_transfer().unwrap();
        wait_for_stage(&mut events, Stage::Completed).await;

        let snap = orchestrator.snapshot();
        assert!(snap.tx_id.is_some());
        assert_eq!(snap.confirmed, Some(false));
        assert!(gateway.tx_complete(&snap.tx_id.unwrap()));
    }

    #[tokio::test]
    async fn session_snapshot_serializes_camel_case() {
        let gateway = Arc::new(MemoryGateway::new());
        let orchestrator = Orchestrator::new(gateway as Arc<dyn Gateway>);
        orchestrator.select_file(&video("clip.mp4", 200)).await.unwrap();

        let json = serde_json::to_value(orchestrator.snapshot()).unwrap();
        assert_eq!(json["stage"], "loadingKey");
        assert_eq!(json["fileName"], "clip.mp4");
        assert_eq!(json["keyLoaded"], false);
    }
}
