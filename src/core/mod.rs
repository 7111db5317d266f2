mod allocation;
mod catalog;
mod engine;
mod mix;
mod types;

pub use allocation::{RateTable, suggest_allocation};
pub use catalog::{
    CatalogError, InstrumentCatalog, MILESTONE_RANGE_END, MilestoneStep, milestone_months,
};
pub use engine::{simulate, simulate_portfolio};
pub use mix::{MIN_COMPARABLE_MONTHS, MixError, MixProjection, project_mix};
pub use types::{
    Allocation, InstrumentDescriptor, InstrumentMixEntry, MixSeries, MonthSnapshot, RateSource,
    RiskTier, SimulationInput, SimulationResult, UserProfile,
};
