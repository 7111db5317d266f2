use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationInput {
    pub initial_capital: f64,
    pub monthly_contribution: f64,
    pub horizon_months: u32,
    pub annual_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthSnapshot {
    pub month: u32,
    pub total_value: f64,
    pub total_contributed: f64,
    pub gain: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub final_value: f64,
    pub total_contributed: f64,
    pub gain: f64,
    pub total_return_percent: f64,
    pub snapshots: Vec<MonthSnapshot>,
    pub annual_rate: f64,
}

/// Portfolio weights per asset class. Weights are expected to sum to 1 but
/// nothing here renormalises them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub bonds: f64,
    pub dividends: f64,
    pub stocks: f64,
}

impl Allocation {
    pub fn total(self) -> f64 {
        self.bonds + self.dividends + self.stocks
    }
}

impl Default for Allocation {
    fn default() -> Self {
        Self {
            bonds: 0.7,
            dividends: 0.2,
            stocks: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub surplus: f64,
    /// Emergency reserve kept aside; shown to the user, never projected.
    pub reserve: f64,
    pub monthly_contribution: f64,
    pub horizon_months: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateSource {
    /// Fixed rate curated by hand from published or historical returns.
    Curated,
    /// Rate meant to be refreshed from a market data feed.
    Market,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub annual_rate: f64,
    pub source: RateSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usd_cap: Option<f64>,
    pub color: String,
    pub risk: RiskTier,
    pub minimum_horizon_months: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentMixEntry {
    pub instrument_id: String,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MixSeries {
    pub instrument_id: String,
    pub label: String,
    pub color: String,
    pub risk: RiskTier,
    /// One entry per requested milestone; `None` below the instrument's
    /// minimum horizon.
    pub values: Vec<Option<f64>>,
    pub cap_exceeded: bool,
}
