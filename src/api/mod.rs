use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::Parser;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::core::{
    Allocation, InstrumentCatalog, InstrumentDescriptor, InstrumentMixEntry, MilestoneStep,
    MixProjection, RateTable, SimulationResult, UserProfile, milestone_months, project_mix,
    simulate_portfolio, suggest_allocation,
};

/// Longest horizon accepted at the boundary: fifty years.
const MAX_HORIZON_MONTHS: u32 = 600;
/// Largest amount of money accepted at the boundary; keeps every projection
/// over the allowed horizon and rates finite.
const MAX_AMOUNT: f64 = 1e12;
/// Largest expected annual return accepted, in percent.
const MAX_RATE_PERCENT: f64 = 1_000.0;
const DEFAULT_MILESTONE_STEP: MilestoneStep = MilestoneStep::Quarterly;
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

pub const CATALOG_ENV_VAR: &str = "NESTEGG_CATALOG";

#[derive(Parser, Debug)]
#[command(
    name = "nestegg",
    about = "Deterministic savings projection (monthly compounding + recurring contributions)"
)]
struct Cli {
    #[arg(long, help = "Capital available to invest today")]
    surplus: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Emergency reserve kept aside; reported but never projected"
    )]
    reserve: f64,
    #[arg(long, default_value_t = 0.0)]
    monthly_contribution: f64,
    #[arg(long, help = "Projection horizon in months")]
    horizon_months: u32,
    #[arg(
        long,
        help = "Bond weight in percent; when no weight is given the allocation is suggested from the horizon"
    )]
    bonds: Option<f64>,
    #[arg(long, help = "Dividend ETF weight in percent")]
    dividends: Option<f64>,
    #[arg(long, help = "Stock weight in percent")]
    stocks: Option<f64>,
    #[arg(
        long,
        default_value_t = 4.5,
        help = "Expected annual bond return in percent"
    )]
    bond_rate: f64,
    #[arg(
        long,
        default_value_t = 7.0,
        help = "Expected annual dividend ETF return in percent"
    )]
    dividend_rate: f64,
    #[arg(
        long,
        default_value_t = 10.0,
        help = "Expected annual stock return in percent"
    )]
    stock_rate: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    surplus: Option<f64>,
    reserve: Option<f64>,
    monthly_contribution: Option<f64>,
    horizon_months: Option<u32>,
    bonds: Option<f64>,
    dividends: Option<f64>,
    stocks: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MixPayload {
    capital: Option<f64>,
    monthly_contribution: Option<f64>,
    mix: Vec<InstrumentMixEntry>,
    milestones: Option<Vec<u32>>,
    step: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MilestonesQuery {
    step: Option<u32>,
}

#[derive(Debug)]
struct PortfolioRequest {
    profile: UserProfile,
    allocation: Option<Allocation>,
    rates: RateTable,
}

#[derive(Debug)]
struct MixRequest {
    capital: f64,
    monthly_contribution: f64,
    mix: Vec<InstrumentMixEntry>,
    milestones: Vec<u32>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
enum AllocationSource {
    Suggested,
    Custom,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    profile: UserProfile,
    allocation: Allocation,
    allocation_source: AllocationSource,
    suggested_allocation: Allocation,
    blended_rate: f64,
    result: SimulationResult,
}

#[derive(Debug, Serialize)]
struct InstrumentsResponse<'a> {
    instruments: &'a [InstrumentDescriptor],
}

#[derive(Debug, Serialize)]
struct MilestonesResponse {
    step: u32,
    milestones: Vec<u32>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Immutable configuration shared by every request.
#[derive(Debug, Clone)]
pub struct AppState {
    pub catalog: InstrumentCatalog,
    pub rates: RateTable,
}

impl AppState {
    /// Built-in catalog, or the JSON file named by `NESTEGG_CATALOG`.
    pub fn from_env() -> Result<Self, String> {
        let catalog = match std::env::var_os(CATALOG_ENV_VAR) {
            Some(path) => load_catalog(Path::new(&path))?,
            None => InstrumentCatalog::default(),
        };
        Ok(Self {
            catalog,
            rates: RateTable::default(),
        })
    }
}

fn load_catalog(path: &Path) -> Result<InstrumentCatalog, String> {
    let catalog = InstrumentCatalog::from_path(path).map_err(|e| e.to_string())?;
    info!("loaded {} instruments from {}", catalog.len(), path.display());
    Ok(catalog)
}

fn build_request(cli: Cli) -> Result<PortfolioRequest, String> {
    for (name, value) in [
        ("--surplus", cli.surplus),
        ("--reserve", cli.reserve),
        ("--monthly-contribution", cli.monthly_contribution),
    ] {
        check_amount(name, value)?;
    }

    if cli.horizon_months > MAX_HORIZON_MONTHS {
        return Err(format!("--horizon-months must be <= {MAX_HORIZON_MONTHS}"));
    }

    for (name, rate) in [
        ("--bond-rate", cli.bond_rate),
        ("--dividend-rate", cli.dividend_rate),
        ("--stock-rate", cli.stock_rate),
    ] {
        if !rate.is_finite() || rate <= -100.0 || rate > MAX_RATE_PERCENT {
            return Err(format!("{name} must be > -100 and <= {MAX_RATE_PERCENT}"));
        }
    }

    let allocation = build_allocation(cli.bonds, cli.dividends, cli.stocks)?;

    Ok(PortfolioRequest {
        profile: UserProfile {
            surplus: cli.surplus,
            reserve: cli.reserve,
            monthly_contribution: cli.monthly_contribution,
            horizon_months: cli.horizon_months,
        },
        allocation,
        rates: RateTable {
            bonds: cli.bond_rate / 100.0,
            dividends: cli.dividend_rate / 100.0,
            stocks: cli.stock_rate / 100.0,
        },
    })
}

fn check_amount(name: &str, value: f64) -> Result<(), String> {
    if !(0.0..=MAX_AMOUNT).contains(&value) {
        return Err(format!("{name} must be between 0 and {MAX_AMOUNT}"));
    }
    Ok(())
}

/// Percent weights to an allocation. Missing weights count as zero as long as
/// at least one is given; none at all means "use the suggestion".
fn build_allocation(
    bonds: Option<f64>,
    dividends: Option<f64>,
    stocks: Option<f64>,
) -> Result<Option<Allocation>, String> {
    if bonds.is_none() && dividends.is_none() && stocks.is_none() {
        return Ok(None);
    }

    for (name, weight) in [
        ("--bonds", bonds),
        ("--dividends", dividends),
        ("--stocks", stocks),
    ] {
        if let Some(weight) = weight {
            if !(0.0..=100.0).contains(&weight) {
                return Err(format!("{name} must be between 0 and 100"));
            }
        }
    }

    let allocation = Allocation {
        bonds: bonds.unwrap_or(0.0) / 100.0,
        dividends: dividends.unwrap_or(0.0) / 100.0,
        stocks: stocks.unwrap_or(0.0) / 100.0,
    };
    if (allocation.total() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        warn!(
            "allocation weights sum to {:.4}; projecting the scaled rate as given",
            allocation.total()
        );
    }
    Ok(Some(allocation))
}

fn run_portfolio(request: &PortfolioRequest) -> SimulateResponse {
    let suggested = suggest_allocation(&request.profile);
    let (allocation, allocation_source) = match request.allocation {
        Some(allocation) => (allocation, AllocationSource::Custom),
        None => (suggested, AllocationSource::Suggested),
    };
    let result = simulate_portfolio(&request.profile, &allocation, &request.rates);

    SimulateResponse {
        profile: request.profile,
        allocation,
        allocation_source,
        suggested_allocation: suggested,
        blended_rate: request.rates.blended_rate(&allocation),
        result,
    }
}

/// One-shot terminal run: parse flags, project, print JSON.
pub fn run_cli() -> Result<(), String> {
    let request = build_request(Cli::parse())?;
    let response = run_portfolio(&request);
    let json = serde_json::to_string_pretty(&response)
        .map_err(|e| format!("failed to serialize response: {e}"))?;
    println!("{json}");
    Ok(())
}

pub async fn run_http_server(port: u16, state: AppState) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let instrument_count = state.catalog.len();
    let app = Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/mix", post(mix_handler))
        .route("/api/instruments", get(instruments_handler))
        .route("/api/milestones", get(milestones_handler))
        .fallback(not_found_handler)
        .with_state(Arc::new(state));

    let listener = TcpListener::bind(addr).await?;
    info!("nestegg HTTP API listening on http://{addr} ({instrument_count} instruments)");
    info!("Local access: http://127.0.0.1:{port}/api/instruments");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(
    State(state): State<Arc<AppState>>,
    Query(payload): Query<SimulatePayload>,
) -> Response {
    simulate_handler_impl(&state, payload)
}

async fn simulate_post_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SimulatePayload>,
) -> Response {
    simulate_handler_impl(&state, payload)
}

fn simulate_handler_impl(state: &AppState, payload: SimulatePayload) -> Response {
    let request = match portfolio_request_from_payload(payload, state.rates) {
        Ok(request) => request,
        Err(msg) => {
            warn!("rejected simulate request: {msg}");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };
    json_response(StatusCode::OK, run_portfolio(&request))
}

async fn mix_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<MixPayload>,
) -> Response {
    let request = match mix_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => {
            warn!("rejected mix request: {msg}");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };

    match run_mix(&state.catalog, &request) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(msg) => {
            warn!("mix projection failed: {msg}");
            error_response(StatusCode::BAD_REQUEST, &msg)
        }
    }
}

async fn instruments_handler(State(state): State<Arc<AppState>>) -> Response {
    json_response(
        StatusCode::OK,
        InstrumentsResponse {
            instruments: state.catalog.instruments(),
        },
    )
}

async fn milestones_handler(Query(query): Query<MilestonesQuery>) -> Response {
    let step = match query.step.map(parse_step).transpose() {
        Ok(step) => step.unwrap_or(DEFAULT_MILESTONE_STEP),
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    json_response(
        StatusCode::OK,
        MilestonesResponse {
            step: step.months(),
            milestones: milestone_months(step),
        },
    )
}

fn run_mix(catalog: &InstrumentCatalog, request: &MixRequest) -> Result<MixProjection, String> {
    project_mix(
        catalog,
        request.capital,
        request.monthly_contribution,
        &request.mix,
        &request.milestones,
    )
    .map_err(|e| e.to_string())
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn parse_step(step: u32) -> Result<MilestoneStep, String> {
    MilestoneStep::from_months(step).ok_or_else(|| "step must be one of 3, 6 or 12".to_string())
}

#[cfg(test)]
fn portfolio_request_from_json(json: &str) -> Result<PortfolioRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    portfolio_request_from_payload(payload, RateTable::default())
}

#[cfg(test)]
fn mix_request_from_json(json: &str) -> Result<MixRequest, String> {
    let payload = serde_json::from_str::<MixPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    mix_request_from_payload(payload)
}

fn portfolio_request_from_payload(
    payload: SimulatePayload,
    rates: RateTable,
) -> Result<PortfolioRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.surplus {
        cli.surplus = v;
    }
    if let Some(v) = payload.reserve {
        cli.reserve = v;
    }
    if let Some(v) = payload.monthly_contribution {
        cli.monthly_contribution = v;
    }
    if let Some(v) = payload.horizon_months {
        cli.horizon_months = v;
    }
    cli.bonds = payload.bonds;
    cli.dividends = payload.dividends;
    cli.stocks = payload.stocks;

    let mut request = build_request(cli)?;
    request.rates = rates;
    Ok(request)
}

fn mix_request_from_payload(payload: MixPayload) -> Result<MixRequest, String> {
    let capital = payload.capital.unwrap_or(0.0);
    let monthly_contribution = payload.monthly_contribution.unwrap_or(0.0);
    for (name, value) in [
        ("capital", capital),
        ("monthlyContribution", monthly_contribution),
    ] {
        check_amount(name, value)?;
    }

    for entry in &payload.mix {
        if !(0.0..=100.0).contains(&entry.percentage) {
            return Err(format!(
                "percentage for {} must be between 0 and 100",
                entry.instrument_id
            ));
        }
    }
    let total: f64 = payload.mix.iter().map(|entry| entry.percentage).sum();
    if total > 0.0 && (total - 100.0).abs() > WEIGHT_SUM_TOLERANCE {
        warn!("mix percentages sum to {total:.2}; projecting slices as given");
    }

    let milestones = match (payload.milestones, payload.step) {
        (Some(milestones), _) => milestones,
        (None, step) => {
            let step = step.map(parse_step).transpose()?;
            milestone_months(step.unwrap_or(DEFAULT_MILESTONE_STEP))
        }
    };
    if let Some(month) = milestones.iter().find(|&&month| month > MAX_HORIZON_MONTHS) {
        return Err(format!("milestone {month} exceeds {MAX_HORIZON_MONTHS} months"));
    }

    Ok(MixRequest {
        capital,
        monthly_contribution,
        mix: payload.mix,
        milestones,
    })
}

fn default_cli_for_api() -> Cli {
    Cli {
        surplus: 10_000.0,
        reserve: 0.0,
        monthly_contribution: 500.0,
        horizon_months: 12,
        bonds: None,
        dividends: None,
        stocks: None,
        bond_rate: 4.5,
        dividend_rate: 7.0,
        stock_rate: 10.0,
    }
}
