use super::allocation::RateTable;
use super::types::{Allocation, MonthSnapshot, SimulationInput, SimulationResult, UserProfile};

const MONTHS_PER_YEAR: f64 = 12.0;

/// Month-by-month dollar-cost averaging projection.
///
/// Each month the running balance earns `annual_rate / 12` and then receives
/// the contribution. Snapshot and summary fields are rounded to cents on the
/// way out; the accumulation itself is never rounded.
pub fn simulate(input: &SimulationInput) -> SimulationResult {
    let monthly_rate = input.annual_rate / MONTHS_PER_YEAR;

    let mut value = input.initial_capital;
    let mut contributed = input.initial_capital;
    let mut snapshots = Vec::with_capacity(input.horizon_months as usize + 1);
    snapshots.push(MonthSnapshot {
        month: 0,
        total_value: input.initial_capital,
        total_contributed: input.initial_capital,
        gain: 0.0,
    });

    for month in 1..=input.horizon_months {
        value = value * (1.0 + monthly_rate) + input.monthly_contribution;
        contributed += input.monthly_contribution;
        snapshots.push(MonthSnapshot {
            month,
            total_value: round_cents(value),
            total_contributed: round_cents(contributed),
            gain: round_cents(value - contributed),
        });
    }

    let gain = value - contributed;
    let total_return_percent = if contributed > 0.0 {
        gain / contributed * 100.0
    } else {
        0.0
    };

    SimulationResult {
        final_value: round_cents(value),
        total_contributed: round_cents(contributed),
        gain: round_cents(gain),
        total_return_percent: round_cents(total_return_percent),
        snapshots,
        annual_rate: input.annual_rate,
    }
}

/// Projects the user's whole portfolio at the allocation's blended rate.
pub fn simulate_portfolio(
    profile: &UserProfile,
    allocation: &Allocation,
    rates: &RateTable,
) -> SimulationResult {
    simulate(&SimulationInput {
        initial_capital: profile.surplus,
        monthly_contribution: profile.monthly_contribution,
        horizon_months: profile.horizon_months,
        annual_rate: rates.blended_rate(allocation),
    })
}

/// Above this many cents an `f64` has no fractional part left to round.
const WHOLE_CENTS_LIMIT: f64 = 4_503_599_627_370_496.0;

/// Half-up rounding to two decimals. Magnitudes too large to carry cents are
/// returned unchanged.
pub(crate) fn round_cents(value: f64) -> f64 {
    let cents = value * 100.0;
    if cents.is_finite() && cents.abs() < WHOLE_CENTS_LIMIT {
        (cents + 0.5).floor() / 100.0
    } else {
        value
    }
}
