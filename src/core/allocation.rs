use serde::{Deserialize, Serialize};

use super::types::{Allocation, UserProfile};

/// Estimated annual return per asset class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    pub bonds: f64,
    pub dividends: f64,
    pub stocks: f64,
}

impl Default for RateTable {
    fn default() -> Self {
        Self {
            bonds: 0.045,
            dividends: 0.07,
            stocks: 0.10,
        }
    }
}

impl RateTable {
    /// Allocation-weighted annual rate. Weights are taken as given, so a
    /// mix summing to something other than 1 scales the result.
    pub fn blended_rate(&self, allocation: &Allocation) -> f64 {
        allocation.bonds * self.bonds
            + allocation.dividends * self.dividends
            + allocation.stocks * self.stocks
    }
}

/// Suggested split for a savings horizon: the longer the money stays put,
/// the more of it goes to equities. Only `horizon_months` is read.
pub fn suggest_allocation(profile: &UserProfile) -> Allocation {
    match profile.horizon_months {
        0..=12 => Allocation {
            bonds: 0.80,
            dividends: 0.15,
            stocks: 0.05,
        },
        13..=36 => Allocation {
            bonds: 0.60,
            dividends: 0.25,
            stocks: 0.15,
        },
        37..=60 => Allocation {
            bonds: 0.40,
            dividends: 0.35,
            stocks: 0.25,
        },
        _ => Allocation {
            bonds: 0.20,
            dividends: 0.40,
            stocks: 0.40,
        },
    }
}
