use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use super::types::{InstrumentDescriptor, RateSource, RiskTier};

/// Highest annual rate a catalog entry may carry (1000 %).
pub const MAX_ANNUAL_RATE: f64 = 10.0;

/// Last month offered by the milestone helper.
pub const MILESTONE_RANGE_END: u32 = 36;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate instrument id: {0}")]
    DuplicateId(String),
    #[error("instrument {id} has a rate outside (-1, 10] or a non-finite cap")]
    InvalidRate { id: String },
}

/// Read-only set of instruments the mix projection can draw from.
#[derive(Debug, Clone)]
pub struct InstrumentCatalog {
    instruments: Vec<InstrumentDescriptor>,
}

#[derive(Deserialize)]
struct CatalogFile {
    instruments: Vec<InstrumentDescriptor>,
}

impl InstrumentCatalog {
    pub fn new(instruments: Vec<InstrumentDescriptor>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::with_capacity(instruments.len());
        for instrument in &instruments {
            if !seen.insert(instrument.id.as_str()) {
                return Err(CatalogError::DuplicateId(instrument.id.clone()));
            }
            let cap_ok = instrument.usd_cap.is_none_or(f64::is_finite);
            let rate = instrument.annual_rate;
            let rate_ok = rate.is_finite() && rate > -1.0 && rate <= MAX_ANNUAL_RATE;
            if !rate_ok || !cap_ok {
                return Err(CatalogError::InvalidRate {
                    id: instrument.id.clone(),
                });
            }
        }
        Ok(Self { instruments })
    }

    /// Accepts either `{"instruments": [...]}` or a bare array.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let instruments = if json.trim_start().starts_with('[') {
            serde_json::from_str::<Vec<InstrumentDescriptor>>(json)?
        } else {
            serde_json::from_str::<CatalogFile>(json)?.instruments
        };
        Self::new(instruments)
    }

    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let json = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn find(&self, id: &str) -> Option<&InstrumentDescriptor> {
        self.instruments.iter().find(|instrument| instrument.id == id)
    }

    pub fn instruments(&self) -> &[InstrumentDescriptor] {
        &self.instruments
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

impl Default for InstrumentCatalog {
    /// Curated rates are historical estimates, not guarantees; review them
    /// quarterly.
    fn default() -> Self {
        Self {
            instruments: vec![
                InstrumentDescriptor {
                    id: "tenpo".to_string(),
                    name: "Tenpo Control".to_string(),
                    description: "Digital savings account that stays liquid and earns daily interest.".to_string(),
                    annual_rate: 0.07,
                    source: RateSource::Curated,
                    ticker: None,
                    // Premium rate only applies up to roughly CLP 5M.
                    usd_cap: Some(5_500.0),
                    color: "#00FF88".to_string(),
                    risk: RiskTier::Low,
                    minimum_horizon_months: 3,
                    referral_url: None,
                },
                InstrumentDescriptor {
                    id: "mercadopago".to_string(),
                    name: "MercadoPago".to_string(),
                    description: "Interest-bearing account with instant liquidity.".to_string(),
                    annual_rate: 0.08,
                    source: RateSource::Curated,
                    ticker: None,
                    usd_cap: None,
                    color: "#3B82F6".to_string(),
                    risk: RiskTier::Low,
                    minimum_horizon_months: 3,
                    referral_url: None,
                },
                InstrumentDescriptor {
                    id: "fintual".to_string(),
                    name: "Fintual Moderado".to_string(),
                    description: "Diversified mutual fund with some month-to-month swings.".to_string(),
                    annual_rate: 0.08,
                    source: RateSource::Curated,
                    ticker: None,
                    usd_cap: None,
                    color: "#A855F7".to_string(),
                    risk: RiskTier::Medium,
                    // Entry/exit costs and monthly volatility make shorter
                    // windows noise rather than return.
                    minimum_horizon_months: 6,
                    referral_url: None,
                },
                InstrumentDescriptor {
                    id: "agg".to_string(),
                    name: "ETF AGG".to_string(),
                    description: "High-quality US bond fund, suited to protecting capital.".to_string(),
                    annual_rate: 0.045,
                    source: RateSource::Market,
                    ticker: Some("AGG".to_string()),
                    usd_cap: None,
                    color: "#F59E0B".to_string(),
                    risk: RiskTier::Low,
                    minimum_horizon_months: 3,
                    referral_url: None,
                },
                InstrumentDescriptor {
                    id: "vti".to_string(),
                    name: "ETF VTI".to_string(),
                    description: "Tracks the whole US stock market.".to_string(),
                    annual_rate: 0.10,
                    source: RateSource::Market,
                    ticker: Some("VTI".to_string()),
                    usd_cap: None,
                    color: "#EF4444".to_string(),
                    risk: RiskTier::High,
                    minimum_horizon_months: 3,
                    referral_url: None,
                },
            ],
        }
    }
}

/// Granularity of the milestone axis.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MilestoneStep {
    Quarterly,
    HalfYearly,
    Yearly,
}

impl MilestoneStep {
    pub fn months(self) -> u32 {
        match self {
            MilestoneStep::Quarterly => 3,
            MilestoneStep::HalfYearly => 6,
            MilestoneStep::Yearly => 12,
        }
    }

    pub fn from_months(months: u32) -> Option<Self> {
        match months {
            3 => Some(MilestoneStep::Quarterly),
            6 => Some(MilestoneStep::HalfYearly),
            12 => Some(MilestoneStep::Yearly),
            _ => None,
        }
    }
}

/// `step, 2*step, ..., 36`.
pub fn milestone_months(step: MilestoneStep) -> Vec<u32> {
    let step = step.months();
    (step..=MILESTONE_RANGE_END).step_by(step as usize).collect()
}
