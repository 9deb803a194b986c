//! Storage cost estimation.
//!
//! Quotes are derived by querying the fee for a small sample payload
//! and scaling linearly, cached per coarse size bucket with a short
//! TTL. Estimation never fails outright: when the network is
//! unreachable a conservative flat-rate fallback is returned with low
//! confidence so the caller can still attempt the upload.

mod balance;
mod estimator;

pub use balance::BalanceCheck;
pub use estimator::{Confidence, CostEstimate, CostEstimator, EstimatorConfig};
