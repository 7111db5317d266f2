use log::debug;
use serde::Serialize;
use thiserror::Error;

use super::catalog::InstrumentCatalog;
use super::engine::simulate;
use super::types::{InstrumentDescriptor, InstrumentMixEntry, MixSeries, SimulationInput};

/// No instrument's annualised return is comparable before ~90 days.
pub const MIN_COMPARABLE_MONTHS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MixError {
    #[error("mix has no instrument with a positive percentage")]
    EmptyMix,
    #[error("no milestone is at least 3 months")]
    InvalidHorizonSet,
    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MixProjection {
    /// Milestones actually sampled, ascending.
    pub milestones: Vec<u32>,
    pub series: Vec<MixSeries>,
}

/// Splits `capital` and `monthly_contribution` across the active entries of
/// `mix` and projects each slice at its instrument's rate, sampling the
/// balance at every milestone.
///
/// All inputs are checked before anything is simulated; any error aborts
/// the whole projection.
pub fn project_mix(
    catalog: &InstrumentCatalog,
    capital: f64,
    monthly_contribution: f64,
    mix: &[InstrumentMixEntry],
    milestone_months: &[u32],
) -> Result<MixProjection, MixError> {
    let mut milestones: Vec<u32> = milestone_months
        .iter()
        .copied()
        .filter(|&month| month >= MIN_COMPARABLE_MONTHS)
        .collect();
    milestones.sort_unstable();
    let Some(&horizon_max) = milestones.last() else {
        return Err(MixError::InvalidHorizonSet);
    };

    let active: Vec<&InstrumentMixEntry> =
        mix.iter().filter(|entry| entry.percentage > 0.0).collect();
    if active.is_empty() {
        return Err(MixError::EmptyMix);
    }

    let resolved = active
        .into_iter()
        .map(|entry| {
            catalog
                .find(&entry.instrument_id)
                .map(|instrument| (entry, instrument))
                .ok_or_else(|| MixError::UnknownInstrument(entry.instrument_id.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let series = resolved
        .into_iter()
        .map(|(entry, instrument)| {
            project_instrument(
                instrument,
                entry.percentage,
                capital,
                monthly_contribution,
                &milestones,
                horizon_max,
            )
        })
        .collect();

    Ok(MixProjection { milestones, series })
}

fn project_instrument(
    instrument: &InstrumentDescriptor,
    percentage: f64,
    capital: f64,
    monthly_contribution: f64,
    milestones: &[u32],
    horizon_max: u32,
) -> MixSeries {
    let share = percentage / 100.0;
    let allocated_capital = capital * share;
    let result = simulate(&SimulationInput {
        initial_capital: allocated_capital,
        monthly_contribution: monthly_contribution * share,
        horizon_months: horizon_max,
        annual_rate: instrument.annual_rate,
    });

    let first_visible = instrument.minimum_horizon_months.max(MIN_COMPARABLE_MONTHS);
    let values = milestones
        .iter()
        .map(|&month| {
            if month < first_visible {
                None
            } else {
                result
                    .snapshots
                    .get(month as usize)
                    .map(|snapshot| snapshot.total_value)
            }
        })
        .collect();

    let cap_exceeded = instrument.usd_cap.is_some_and(|cap| allocated_capital > cap);
    debug!(
        "projected {} at {:.4} for {} months (share {:.2}%, cap exceeded: {})",
        instrument.id, instrument.annual_rate, horizon_max, percentage, cap_exceeded
    );

    MixSeries {
        instrument_id: instrument.id.clone(),
        label: instrument.name.clone(),
        color: instrument.color.clone(),
        risk: instrument.risk,
        values,
        cap_exceeded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{RateSource, RiskTier};
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    fn entry(id: &str, percentage: f64) -> InstrumentMixEntry {
        InstrumentMixEntry {
            instrument_id: id.to_string(),
            percentage,
        }
    }

    #[test]
    fn fintual_is_hidden_before_its_minimum_horizon() {
        let catalog = InstrumentCatalog::default();
        let projection = project_mix(
            &catalog,
            10_000.0,
            500.0,
            &[entry("fintual", 100.0)],
            &[3, 6, 12],
        )
        .expect("valid mix");

        assert_eq!(projection.milestones, vec![3, 6, 12]);
        assert_eq!(projection.series.len(), 1);
        let series = &projection.series[0];
        assert_eq!(series.label, "Fintual Moderado");
        assert_eq!(series.color, "#A855F7");
        assert_eq!(series.values[0], None);
        assert!(series.values[1].is_some());
        assert!(series.values[2].is_some());
    }

    #[test]
    fn values_match_standalone_simulation_of_the_slice() {
        let catalog = InstrumentCatalog::default();
        let projection = project_mix(
            &catalog,
            10_000.0,
            400.0,
            &[entry("vti", 25.0), entry("agg", 75.0)],
            &[12, 24],
        )
        .expect("valid mix");

        let vti = simulate(&SimulationInput {
            initial_capital: 2_500.0,
            monthly_contribution: 100.0,
            horizon_months: 24,
            annual_rate: 0.10,
        });
        assert_eq!(
            projection.series[0].values,
            vec![
                Some(vti.snapshots[12].total_value),
                Some(vti.snapshots[24].total_value)
            ]
        );
        assert_eq!(projection.series[1].instrument_id, "agg");
    }

    #[test]
    fn milestones_are_filtered_and_sorted() {
        let catalog = InstrumentCatalog::default();
        let projection = project_mix(
            &catalog,
            1_000.0,
            0.0,
            &[entry("mercadopago", 100.0)],
            &[24, 1, 6, 2, 12],
        )
        .expect("valid mix");
        assert_eq!(projection.milestones, vec![6, 12, 24]);
        assert_eq!(projection.series[0].values.len(), 3);
        assert!(projection.series[0].values.iter().all(Option::is_some));
    }

    #[test]
    fn inactive_entries_are_skipped_and_order_is_kept() {
        let catalog = InstrumentCatalog::default();
        let mix = [
            entry("vti", 40.0),
            entry("tenpo", 0.0),
            entry("does-not-exist", 0.0),
            entry("agg", 60.0),
        ];
        let projection = project_mix(&catalog, 1_000.0, 100.0, &mix, &[3, 6]).expect("valid mix");
        let ids: Vec<&str> = projection
            .series
            .iter()
            .map(|series| series.instrument_id.as_str())
            .collect();
        assert_eq!(ids, vec!["vti", "agg"]);
    }

    #[test]
    fn empty_active_mix_is_rejected() {
        let catalog = InstrumentCatalog::default();
        assert_eq!(
            project_mix(&catalog, 1_000.0, 0.0, &[], &[3]),
            Err(MixError::EmptyMix)
        );
        assert_eq!(
            project_mix(&catalog, 1_000.0, 0.0, &[entry("vti", 0.0)], &[3]),
            Err(MixError::EmptyMix)
        );
    }

    #[test]
    fn milestones_below_floor_are_rejected() {
        let catalog = InstrumentCatalog::default();
        assert_eq!(
            project_mix(&catalog, 1_000.0, 0.0, &[entry("vti", 100.0)], &[1, 2]),
            Err(MixError::InvalidHorizonSet)
        );
        assert_eq!(
            project_mix(&catalog, 1_000.0, 0.0, &[entry("vti", 100.0)], &[]),
            Err(MixError::InvalidHorizonSet)
        );
    }

    #[test]
    fn horizon_set_is_checked_before_mix() {
        let catalog = InstrumentCatalog::default();
        assert_eq!(
            project_mix(&catalog, 1_000.0, 0.0, &[], &[1]),
            Err(MixError::InvalidHorizonSet)
        );
    }

    #[test]
    fn unknown_instrument_aborts_whole_projection() {
        let catalog = InstrumentCatalog::default();
        let mix = [entry("vti", 50.0), entry("bitcoin", 50.0)];
        assert_eq!(
            project_mix(&catalog, 1_000.0, 0.0, &mix, &[3, 6]),
            Err(MixError::UnknownInstrument("bitcoin".to_string()))
        );
    }

    #[test]
    fn cap_is_flagged_when_allocated_capital_exceeds_it() {
        let catalog = InstrumentCatalog::default();
        let projection = project_mix(
            &catalog,
            10_000.0,
            0.0,
            &[entry("tenpo", 60.0), entry("vti", 40.0)],
            &[12],
        )
        .expect("valid mix");
        assert!(projection.series[0].cap_exceeded);
        assert!(!projection.series[1].cap_exceeded);

        let under = project_mix(&catalog, 5_000.0, 0.0, &[entry("tenpo", 100.0)], &[12])
            .expect("valid mix");
        assert!(!under.series[0].cap_exceeded);
    }

    #[test]
    fn alternate_catalog_drives_minimum_horizon() {
        let catalog = InstrumentCatalog::new(vec![InstrumentDescriptor {
            id: "locked".to_string(),
            name: "Locked deposit".to_string(),
            description: String::new(),
            annual_rate: 0.06,
            source: RateSource::Curated,
            ticker: None,
            usd_cap: None,
            color: "#000000".to_string(),
            risk: RiskTier::Low,
            minimum_horizon_months: 12,
            referral_url: None,
        }])
        .expect("valid catalog");

        let projection = project_mix(
            &catalog,
            1_000.0,
            0.0,
            &[entry("locked", 100.0)],
            &[3, 6, 12, 18],
        )
        .expect("valid mix");
        assert_eq!(projection.series[0].values[..2], [None, None]);
        assert!(projection.series[0].values[2].is_some());
        assert!(projection.series[0].values[3].is_some());
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_series_align_with_milestones(
            capital in 0u32..200_000,
            contribution in 0u32..5_000,
            split in 1u32..100,
            milestones in proptest::collection::vec(0u32..60, 1..10)
        ) {
            let catalog = InstrumentCatalog::default();
            let mix = [
                entry("fintual", split as f64),
                entry("vti", (100 - split) as f64),
            ];
            let result = project_mix(&catalog, capital as f64, contribution as f64, &mix, &milestones);
            let sampled: Vec<u32> = milestones.iter().copied().filter(|&m| m >= 3).collect();

            match result {
                Err(err) => {
                    prop_assert!(sampled.is_empty());
                    prop_assert_eq!(err, MixError::InvalidHorizonSet);
                }
                Ok(projection) => {
                    prop_assert_eq!(projection.milestones.len(), sampled.len());
                    prop_assert!(projection.milestones.windows(2).all(|w| w[0] <= w[1]));
                    for series in &projection.series {
                        prop_assert_eq!(series.values.len(), projection.milestones.len());
                        for value in series.values.iter().flatten() {
                            prop_assert!(value.is_finite());
                        }
                    }
                    for (month, value) in projection.milestones.iter().zip(&projection.series[0].values) {
                        prop_assert_eq!(value.is_none(), *month < 6);
                    }
                }
            }
        }
    }
}
