//! Fee estimation with bucketed caching.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use weavecast_gateway::Gateway;
use weavecast_protocol::Winston;

use crate::balance::BalanceCheck;

const MIB: u64 = 1024 * 1024;

/// How much to trust an estimate. Fee scaling is less linear for large
/// payloads, so confidence degrades with size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// A quote for storing a given byte count.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub amount: Winston,
    pub confidence: Confidence,
    pub as_of: DateTime<Utc>,
}

impl CostEstimate {
    /// An estimate older than the TTL must not back a balance decision.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.as_of);
        age.to_std().map(|age| age < ttl).unwrap_or(false)
    }
}

/// Estimator tuning knobs.
#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    /// Size of the sample payload whose fee anchors the linear scaling.
    pub sample_bytes: u64,
    /// Cache lifetime per size bucket.
    pub cache_ttl: Duration,
    /// Conservative flat rate used when the network is unreachable.
    pub fallback_winston_per_byte: u64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            sample_bytes: 1024,
            cache_ttl: Duration::from_secs(300),
            fallback_winston_per_byte: 1_000,
        }
    }
}

/// Predicts the network fee for storing N bytes.
pub struct CostEstimator {
    gateway: Arc<dyn Gateway>,
    config: EstimatorConfig,
    cache: Mutex<HashMap<u64, CostEstimate>>,
}

impl CostEstimator {
    pub fn new(gateway: Arc<dyn Gateway>, config: EstimatorConfig) -> Self {
        Self {
            gateway,
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Confidence band for a payload size: under 10 MiB high, under
    /// 100 MiB medium, otherwise low.
    pub fn confidence_for(bytes: u64) -> Confidence {
        if bytes < 10 * MIB {
            Confidence::High
        } else if bytes < 100 * MIB {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    /// Returns a quote for storing `bytes` bytes.
    ///
    /// Cached per nearest-MiB bucket for the configured TTL. Never
    /// fails: a network error degrades to the flat-rate fallback with
    /// low confidence.
    pub async fn estimate(&self, bytes: u64) -> CostEstimate {
        let bucket = Self::bucket_for(bytes);
        if let Some(cached) = self.cached(bucket) {
            debug!(bytes, bucket, "returning cached cost estimate");
            return cached;
        }

        let estimate = match self.gateway.price(self.config.sample_bytes).await {
            Ok(sample_fee) => {
                let amount = sample_fee.scale(bytes, self.config.sample_bytes);
                CostEstimate {
                    amount,
                    confidence: Self::confidence_for(bytes),
                    as_of: Utc::now(),
                }
            }
            Err(e) => {
                warn!(error = %e, bytes, "fee query failed, using flat-rate fallback");
                CostEstimate {
                    amount: Winston(bytes.saturating_mul(self.config.fallback_winston_per_byte)),
                    confidence: Confidence::Low,
                    as_of: Utc::now(),
                }
            }
        };

        self.cache
            .lock()
            .unwrap()
            .insert(bucket, estimate.clone());
        estimate
    }

    fn cached(&self, bucket: u64) -> Option<CostEstimate> {
        let cache = self.cache.lock().unwrap();
        cache
            .get(&bucket)
            .filter(|e| e.is_fresh(self.config.cache_ttl))
            .cloned()
    }

    /// Nearest-MiB bucket; sub-MiB sizes share bucket zero.
    fn bucket_for(bytes: u64) -> u64 {
        (bytes + MIB / 2) / MIB
    }

    /// Queries the live balance of `address` and compares it to
    /// `required`, returning the shortfall and a sized recommendation.
    pub async fn check_sufficient_balance(
        &self,
        address: &str,
        required: Winston,
    ) -> Result<BalanceCheck, weavecast_protocol::UploadError> {
        let balance = self.gateway.balance(address).await?;
        Ok(BalanceCheck::evaluate(balance, required))
    }
}
