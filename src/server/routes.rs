use crate::engine::{PricerSelector, PricingEngine};
use crate::errors::{DomainError, DomainResult, EngineError, EngineResult};
use crate::models::binomial::LatticeValuation;
use crate::models::black_scholes::ClosedFormGreeks;
use crate::models::greeks::{self, Greeks, MIN_GREEKS_STEPS, THETA_UNIT};
use crate::models::monte_carlo::{MonteCarloResult, SimulationSettings};
use crate::models::surface::{SampleAxis, SurfaceRequest};
use crate::models::{ExerciseStyle, OptionContract, OptionKind, PricingResult};
use crate::state::{AppState, CounterSnapshot, PerfCounters};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use std::sync::Arc;

/// Steps used by the heatmap lattice when the query does not name any.
const DEFAULT_HEATMAP_LATTICE_STEPS: usize = 100;
const DEFAULT_SIMULATIONS: usize = 10_000;
/// One step per trading day over a year.
const DEFAULT_PATH_STEPS: usize = 252;

// ── Request / response bodies (field names follow the public API) ──

#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct ClosedFormRequest {
    #[serde(rename = "S")]
    pub spot: f64,
    #[serde(rename = "K")]
    pub strike: f64,
    #[serde(rename = "T")]
    pub maturity: f64,
    pub r: f64,
    pub sigma: f64,
}

impl ClosedFormRequest {
    fn contract(&self) -> DomainResult<OptionContract> {
        OptionContract::new(self.spot, self.strike, self.maturity, self.r, self.sigma)
    }
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct MonteCarloRequest {
    #[serde(flatten)]
    pub contract: ClosedFormRequest,
    #[serde(default = "default_simulations")]
    pub simulations: usize,
    #[serde(default = "default_path_steps")]
    pub steps: usize,
    /// Drawn at random when absent; echoed back in the response.
    pub seed: Option<u64>,
}

fn default_simulations() -> usize {
    DEFAULT_SIMULATIONS
}

fn default_path_steps() -> usize {
    DEFAULT_PATH_STEPS
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct LatticeRequest {
    pub stock_price: f64,
    pub strike_price: f64,
    pub risk_free_rate: f64,
    pub volatility: f64,
    pub time_to_expiration: f64,
    pub steps: usize,
    #[serde(default)]
    pub is_american: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct LatticeResponse {
    pub call_price: f64,
    pub put_price: f64,
    pub call_tree: Vec<Vec<f64>>,
    pub put_tree: Vec<Vec<f64>>,
    /// Call Greeks; null when the tree is too shallow for gamma.
    pub greeks: Option<Greeks>,
    pub theta_unit: &'static str,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatmapModel {
    #[default]
    BlackScholes,
    Binomial,
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct HeatmapQuery {
    pub min_spot_price: f64,
    pub max_spot_price: f64,
    pub min_volatility: f64,
    pub max_volatility: f64,
    pub spot_steps: usize,
    pub volatility_steps: usize,
    #[serde(rename = "K")]
    pub strike: f64,
    #[serde(rename = "T")]
    pub maturity: f64,
    pub r: f64,
    #[serde(default)]
    pub model: HeatmapModel,
    pub steps: Option<usize>,
    #[serde(default)]
    pub is_american: bool,
}

impl HeatmapQuery {
    fn surface_request(&self) -> SurfaceRequest {
        SurfaceRequest {
            strike: self.strike,
            maturity: self.maturity,
            rate: self.r,
            spot: SampleAxis::new(self.min_spot_price, self.max_spot_price, self.spot_steps),
            volatility: SampleAxis::new(self.min_volatility, self.max_volatility, self.volatility_steps),
        }
    }

    fn selector(&self) -> PricerSelector {
        match self.model {
            HeatmapModel::BlackScholes => PricerSelector::ClosedForm,
            HeatmapModel::Binomial => PricerSelector::Lattice {
                steps: self.steps.unwrap_or(DEFAULT_HEATMAP_LATTICE_STEPS),
                style: ExerciseStyle::from_american_flag(self.is_american),
            },
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HeatmapResponse {
    pub option_type: OptionKind,
    pub spot_prices: Vec<f64>,
    pub volatilities: Vec<f64>,
    /// Rows follow `volatilities`, columns follow `spot_prices`.
    pub prices: Vec<Vec<f64>>,
    pub computed_at: String,
}

// ── Errors ──

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            EngineError::Domain(e) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "detail": e.to_string(), "field": e.field() }),
            ),
            EngineError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, serde_json::json!({ "detail": msg })),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "detail": self.to_string() }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

fn reject(state: &AppState, e: DomainError) -> EngineError {
    PerfCounters::bump(&state.counters.domain_errors);
    tracing::warn!(field = e.field(), error = %e, "rejected pricing request");
    EngineError::Domain(e)
}

/// Run CPU-bound engine work off the async runtime.
async fn run_blocking<T, F>(state: &Arc<AppState>, work: F) -> EngineResult<T>
where
    F: FnOnce(PricingEngine) -> DomainResult<T> + Send + 'static,
    T: Send + 'static,
{
    let engine = state.engine;
    tokio::task::spawn_blocking(move || work(engine))
        .await?
        .map_err(|e| reject(state, e))
}

// ── Handlers ──

/// GET / -- liveness
pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "vanilla option pricing engine",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /calculate -- Black-Scholes call/put with d1, d2
pub async fn calculate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ClosedFormRequest>,
) -> EngineResult<Json<PricingResult>> {
    let result = req
        .contract()
        .and_then(|c| state.engine.price_closed_form(&c))
        .map_err(|e| reject(&state, e))?;
    PerfCounters::bump(&state.counters.closed_form_priced);
    Ok(Json(result))
}

/// POST /calculate/greeks -- analytic Black-Scholes Greeks
pub async fn calculate_greeks(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ClosedFormRequest>,
) -> EngineResult<Json<ClosedFormGreeks>> {
    let greeks = req
        .contract()
        .and_then(|c| state.engine.closed_form_greeks(&c))
        .map_err(|e| reject(&state, e))?;
    PerfCounters::bump(&state.counters.closed_form_priced);
    Ok(Json(greeks))
}

/// POST /calculate/monte_carlo -- simulated European call/put with 95% intervals
pub async fn calculate_monte_carlo(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MonteCarloRequest>,
) -> EngineResult<Json<MonteCarloResult>> {
    let settings = SimulationSettings::new(req.simulations, req.steps, req.seed.unwrap_or_else(rand::random));

    let result = run_blocking(&state, move |engine| {
        let contract = req.contract.contract()?;
        engine.price_monte_carlo(&contract, settings)
    })
    .await?;

    PerfCounters::bump(&state.counters.simulations_run);
    tracing::info!(
        simulations = settings.simulations,
        steps = settings.steps,
        seed = settings.seed,
        call = result.call.price,
        put = result.put.price,
        "monte carlo priced"
    );

    Ok(Json(result))
}

/// POST /calculate_option_prices -- CRR lattice prices, trees and call Greeks
pub async fn calculate_option_prices(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LatticeRequest>,
) -> EngineResult<Json<LatticeResponse>> {
    let style = ExerciseStyle::from_american_flag(req.is_american);
    let steps = req.steps;

    let (valuation, greeks) = run_blocking(&state, move |engine| {
        let contract = OptionContract::new(
            req.stock_price,
            req.strike_price,
            req.time_to_expiration,
            req.risk_free_rate,
            req.volatility,
        )?;
        let valuation: LatticeValuation = engine.price_lattice(&contract, steps, style)?;
        let greeks = if steps >= MIN_GREEKS_STEPS {
            Some(greeks::greeks_from_valuation(
                &valuation.tree,
                &valuation.params,
                OptionKind::Call,
            )?)
        } else {
            None
        };
        Ok((valuation, greeks))
    })
    .await?;

    PerfCounters::bump(&state.counters.lattices_priced);
    tracing::info!(steps, ?style, call = valuation.pricing.call_price, put = valuation.pricing.put_price, "lattice priced");

    Ok(Json(LatticeResponse {
        call_price: valuation.pricing.call_price,
        put_price: valuation.pricing.put_price,
        call_tree: valuation.tree.to_nested(OptionKind::Call),
        put_tree: valuation.tree.to_nested(OptionKind::Put),
        greeks,
        theta_unit: THETA_UNIT,
    }))
}

/// GET /heatmaps/{option_type} -- price matrix over spot x volatility
pub async fn heatmap(
    State(state): State<Arc<AppState>>,
    Path(option_type): Path<String>,
    Query(query): Query<HeatmapQuery>,
) -> EngineResult<Json<HeatmapResponse>> {
    let kind: OptionKind = option_type.parse().map_err(EngineError::InvalidRequest)?;
    let request = query.surface_request();
    let selector = query.selector();

    let surface = run_blocking(&state, move |engine| engine.evaluate_surface(&request, selector)).await?;
    PerfCounters::bump(&state.counters.surfaces_evaluated);

    let prices = match kind {
        OptionKind::Call => surface.call,
        OptionKind::Put => surface.put,
    };

    Ok(Json(HeatmapResponse {
        option_type: kind,
        spot_prices: surface.spot_prices,
        volatilities: surface.volatilities,
        prices,
        computed_at: chrono::Utc::now().to_rfc3339(),
    }))
}

/// GET /api/counters -- request counters (lock-free reads)
pub async fn get_counters(State(state): State<Arc<AppState>>) -> Json<CounterSnapshot> {
    Json(state.counters.snapshot())
}
