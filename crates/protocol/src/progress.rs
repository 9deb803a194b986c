//! Progress snapshot emitted during a transfer.

use serde::Serialize;

/// A point-in-time view of an in-flight transfer.
///
/// `percent` spans the whole operation: 0–30 is reserved for
/// preparation (read, create, sign), 30–90 for chunk transfer, 90–100
/// for network confirmation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferProgress {
    pub percent: f64,
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    /// Rolling transfer speed. 0.0 until enough samples exist.
    pub bytes_per_second: f64,
    /// Estimated seconds remaining, when a speed estimate exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_secs: Option<f64>,
}

impl TransferProgress {
    /// A preparation-phase snapshot (no bytes on the wire yet).
    pub fn preparing(percent: f64, total_bytes: u64) -> Self {
        Self {
            percent,
            bytes_transferred: 0,
            total_bytes,
            bytes_per_second: 0.0,
            eta_secs: None,
        }
    }

    /// The terminal snapshot: everything transferred, 100 percent.
    pub fn completed(total_bytes: u64) -> Self {
        Self {
            percent: 100.0,
            bytes_transferred: total_bytes,
            total_bytes,
            bytes_per_second: 0.0,
            eta_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preparing_has_no_bytes() {
        let p = TransferProgress::preparing(10.0, 4096);
        assert_eq!(p.bytes_transferred, 0);
        assert_eq!(p.total_bytes, 4096);
        assert!(p.eta_secs.is_none());
    }

    #[test]
    fn completed_lands_on_exactly_100() {
        let p = TransferProgress::completed(4096);
        assert_eq!(p.percent, 100.0);
        assert_eq!(p.bytes_transferred, 4096);
    }

    #[test]
    fn serializes_camel_case() {
        let p = TransferProgress::preparing(5.0, 10);
        let json = serde_json::to_value(&p).unwrap();
        assert!(json.get("bytesTransferred").is_some());
        assert!(json.get("totalBytes").is_some());
        assert!(json.get("etaSecs").is_none());
    }
}
