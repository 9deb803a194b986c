//! Key parsing and gateway-backed key operations.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use weavecast_gateway::Gateway;
use weavecast_protocol::{Jwk, UploadError, Winston};

use crate::account::AccountInfo;

/// Parses and structurally validates a raw key file.
///
/// Structural validity is necessary but not sufficient: a corrupt key
/// with the right shape only fails at address derivation.
pub fn parse_key(raw: &[u8]) -> Result<Jwk, UploadError> {
    let key: Jwk = serde_json::from_slice(raw).map_err(|e| {
        debug!(error = %e, "key file did not parse as a JWK");
        UploadError::validation(
            "The key file is not a valid wallet key",
            "Select a valid key file",
        )
    })?;
    if let Some(problem) = key.structural_problem() {
        return Err(UploadError::validation(
            format!("The key file is not a valid wallet key: {problem}"),
            "Select a valid key file",
        ));
    }
    Ok(key)
}

/// Gateway-backed key operations.
#[derive(Clone)]
pub struct KeyService {
    gateway: Arc<dyn Gateway>,
}

impl KeyService {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    /// Derives the wallet address for a key. The authoritative check
    /// for key integrity.
    pub async fn derive_address(&self, key: &Jwk) -> Result<String, UploadError> {
        let address = self.gateway.derive_address(key).await?;
        debug!(address = %address, "derived wallet address");
        Ok(address)
    }

    /// Fresh spendable balance for an address, straight from the
    /// network.
    pub async fn balance(&self, address: &str) -> Result<Winston, UploadError> {
        Ok(self.gateway.balance(address).await?)
    }

    /// Derives the address and queries its balance, producing a
    /// complete account snapshot.
    pub async fn account_info(&self, key: &Jwk) -> Result<AccountInfo, UploadError> {
        let address = self.derive_address(key).await?;
        let balance = self.balance(&address).await?;
        Ok(AccountInfo {
            address,
            balance,
            last_refreshed: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use weavecast_gateway::MemoryGateway;

    fn sample_key_json() -> String {
        let n = URL_SAFE_NO_PAD.encode(b"test-modulus-bytes");
        format!(
            r#"{{"kty":"RSA","n":"{n}","e":"AQAB","d":"d","p":"p","q":"q","dp":"dp","dq":"dq","qi":"qi"}}"#
        )
    }

    #[test]
    fn parse_key_accepts_a_full_jwk() {
        let key = parse_key(sample_key_json().as_bytes()).unwrap();
        assert_eq!(key.kty, "RSA");
    }

    #[test]
    fn parse_key_rejects_non_json_with_hint() {
        let err = parse_key(b"not json at all").unwrap_err();
        assert_eq!(err.kind, weavecast_protocol::ErrorKind::Validation);
        assert_eq!(err.suggestion.as_deref(), Some("Select a valid key file"));
    }

    #[test]
    fn parse_key_rejects_wrong_kty() {
        let json = sample_key_json().replace("RSA", "EC");
        let err = parse_key(json.as_bytes()).unwrap_err();
        assert!(err.message.contains("RSA"));
    }

    #[test]
    fn parse_key_rejects_missing_field() {
        let json = r#"{"kty":"RSA","n":"abc","e":"AQAB"}"#;
        assert!(parse_key(json.as_bytes()).is_err());
    }

    #[tokio::test]
    async fn account_info_combines_address_and_balance() {
        let gateway = Arc::new(MemoryGateway::new());
        let service = KeyService::new(gateway.clone());
        let key = parse_key(sample_key_json().as_bytes()).unwrap();

        let address = service.derive_address(&key).await.unwrap();
        gateway.fund(&address, Winston(42));

        let info = service.account_info(&key).await.unwrap();
        assert_eq!(info.address, address);
        assert_eq!(info.balance, Winston(42));
    }

    #[tokio::test]
    async fn corrupt_key_fails_at_derivation() {
        let gateway = Arc::new(MemoryGateway::new());
        let service = KeyService::new(gateway);
        // Structurally valid, but the modulus is not base64url.
        let mut key = parse_key(sample_key_json().as_bytes()).unwrap();
        key.n = "!!corrupt!!".into();
        let err = service.derive_address(&key).await.unwrap_err();
        assert_eq!(err.kind, weavecast_protocol::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn network_failure_surfaces_as_network_error() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.fail_next("balance", 1);
        let service = KeyService::new(gateway);
        let err = service.balance("addr").await.unwrap_err();
        assert_eq!(err.kind, weavecast_protocol::ErrorKind::Network);
    }
}
