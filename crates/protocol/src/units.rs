//! Currency units for the storage network.
//!
//! All arithmetic happens in winston, the network's smallest indivisible
//! unit. AR is a display convenience only (1 AR = 10^12 winston).

use serde::{Deserialize, Serialize};

/// Winston per AR.
pub const WINSTON_PER_AR: u64 = 1_000_000_000_000;

/// A non-negative amount of the network currency in its smallest unit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Winston(pub u64);

impl Winston {
    pub const ZERO: Winston = Winston(0);

    /// Converts a display-precision AR amount into winston, truncating
    /// below the smallest unit.
    pub fn from_ar(ar: f64) -> Self {
        Winston((ar.max(0.0) * WINSTON_PER_AR as f64) as u64)
    }

    /// Converts to display-precision AR.
    pub fn to_ar(self) -> f64 {
        self.0 as f64 / WINSTON_PER_AR as f64
    }

    /// Saturating addition.
    pub fn saturating_add(self, other: Winston) -> Winston {
        Winston(self.0.saturating_add(other.0))
    }

    /// Saturating subtraction (floors at zero).
    pub fn saturating_sub(self, other: Winston) -> Winston {
        Winston(self.0.saturating_sub(other.0))
    }

    /// Scales this amount by `numerator / denominator` using 128-bit
    /// intermediate math, saturating on overflow.
    pub fn scale(self, numerator: u64, denominator: u64) -> Winston {
        if denominator == 0 {
            return Winston::ZERO;
        }
        let scaled = self.0 as u128 * numerator as u128 / denominator as u128;
        Winston(u64::try_from(scaled).unwrap_or(u64::MAX))
    }
}

impl std::fmt::Display for Winston {
    /// Prints the amount in AR with up to six decimal places.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ar = self.to_ar();
        let s = format!("{ar:.6}");
        let trimmed = s.trim_end_matches('0').trim_end_matches('.');
        write!(f, "{trimmed} AR")
    }
}
