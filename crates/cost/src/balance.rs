//! Balance sufficiency evaluation.

use serde::Serialize;

use weavecast_protocol::Winston;
use weavecast_protocol::units::WINSTON_PER_AR;

/// Shortfalls under 0.1 AR get terse top-up advice.
const SMALL_SHORTFALL: Winston = Winston(WINSTON_PER_AR / 10);

/// Shortfalls of 10 AR or more put the upload far out of reach.
const LARGE_SHORTFALL: Winston = Winston(10 * WINSTON_PER_AR);

/// Outcome of comparing a spendable balance to an upload's cost.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceCheck {
    pub sufficient: bool,
    pub balance: Winston,
    pub required: Winston,
    /// Exact amount missing, only present when insufficient.
    pub shortfall: Option<Winston>,
    /// Human-facing funding advice, only present when insufficient.
    pub recommendation: Option<String>,
}

impl BalanceCheck {
    /// Compares a balance against a required amount. The shortfall is
    /// exact, never rounded, so callers can display precise top-up
    /// amounts; the recommendation wording scales with its size.
    pub fn evaluate(balance: Winston, required: Winston) -> Self {
        if balance >= required {
            return Self {
                sufficient: true,
                balance,
                required,
                shortfall: None,
                recommendation: None,
            };
        }

        let shortfall = required.saturating_sub(balance);
        let recommendation = if shortfall < SMALL_SHORTFALL {
            format!("Add {shortfall} to this wallet and try again")
        } else if shortfall < LARGE_SHORTFALL {
            format!("Add at least {shortfall} to this wallet, or choose a smaller file")
        } else {
            format!(
                "This upload costs {shortfall} more than the wallet holds; \
                 fund the wallet or pick a much smaller file"
            )
        };

        Self {
            sufficient: false,
            balance,
            required,
            shortfall: Some(shortfall),
            recommendation: Some(recommendation),
        }
    }
}
