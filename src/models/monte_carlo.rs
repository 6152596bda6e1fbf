//! European vanilla pricing by simulating geometric Brownian motion paths
//! under the risk-neutral measure.

use crate::errors::{ensure_finite, DomainError, DomainResult};
use crate::models::{OptionContract, OptionKind};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

/// Sample variance needs at least two payoffs.
pub const MIN_SIMULATIONS: usize = 2;
pub const MIN_PATH_STEPS: usize = 1;
/// Two-sided 95% normal quantile.
const CONFIDENCE_Z: f64 = 1.96;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SimulationSettings {
    pub simulations: usize,
    /// Time steps per path.
    pub steps: usize,
    /// Same seed, same paths.
    pub seed: u64,
}

impl SimulationSettings {
    pub fn new(simulations: usize, steps: usize, seed: u64) -> Self {
        Self { simulations, steps, seed }
    }

    /// Normal draws consumed by one run.
    pub fn work(&self) -> u64 {
        (self.simulations as u64).saturating_mul(self.steps as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

impl ConfidenceInterval {
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// Discounted estimate for one side (call or put).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct MonteCarloEstimate {
    pub price: f64,
    /// Standard error of `price`.
    pub std_error: f64,
    /// 95% interval around `price`.
    pub interval: ConfidenceInterval,
    /// Share of paths finishing in the money.
    pub probability_itm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct MonteCarloResult {
    pub call: MonteCarloEstimate,
    pub put: MonteCarloEstimate,
    pub settings: SimulationSettings,
}

impl MonteCarloResult {
    pub fn estimate(&self, kind: OptionKind) -> &MonteCarloEstimate {
        match kind {
            OptionKind::Call => &self.call,
            OptionKind::Put => &self.put,
        }
    }
}

/// Running mean and sum of squared deviations (Welford).
#[derive(Debug, Default)]
struct PayoffStats {
    count: u64,
    mean: f64,
    m2: f64,
    in_the_money: u64,
}

impl PayoffStats {
    #[inline]
    fn push(&mut self, payoff: f64) {
        self.count += 1;
        let delta = payoff - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (payoff - self.mean);
        if payoff > 0.0 {
            self.in_the_money += 1;
        }
    }

    fn finish(&self, side: &'static str, discount: f64) -> DomainResult<MonteCarloEstimate> {
        let n = self.count as f64;
        let std_error = (self.m2 / (n - 1.0) / n).sqrt();
        let margin = CONFIDENCE_Z * std_error;
        Ok(MonteCarloEstimate {
            price: ensure_finite(side, discount * self.mean)?,
            std_error: ensure_finite("std_error", discount * std_error)?,
            interval: ConfidenceInterval {
                lower: discount * (self.mean - margin),
                upper: discount * (self.mean + margin),
            },
            probability_itm: self.in_the_money as f64 / n,
        })
    }
}

/// Simulate `settings.simulations` paths of `settings.steps` log-normal
/// increments each and discount the mean call and put payoffs.
///
/// ln S(t+dt) = ln S(t) + (r - sigma^2/2) dt + sigma sqrt(dt) Z
pub fn price_monte_carlo(contract: &OptionContract, settings: SimulationSettings) -> DomainResult<MonteCarloResult> {
    if settings.simulations < MIN_SIMULATIONS {
        return Err(DomainError::TooFewSteps {
            field: "simulations",
            value: settings.simulations,
            min: MIN_SIMULATIONS,
        });
    }
    if settings.steps < MIN_PATH_STEPS {
        return Err(DomainError::TooFewSteps {
            field: "steps",
            value: settings.steps,
            min: MIN_PATH_STEPS,
        });
    }

    let sigma = contract.volatility();
    let dt = contract.maturity() / settings.steps as f64;
    let drift = (contract.rate() - 0.5 * sigma * sigma) * dt;
    let diffusion = sigma * dt.sqrt();
    let strike = contract.strike();

    let mut rng = StdRng::seed_from_u64(settings.seed);
    let mut call = PayoffStats::default();
    let mut put = PayoffStats::default();

    for _ in 0..settings.simulations {
        let mut log_growth = 0.0_f64;
        for _ in 0..settings.steps {
            let z: f64 = StandardNormal.sample(&mut rng);
            log_growth += drift + diffusion * z;
        }
        let terminal = contract.spot() * log_growth.exp();
        call.push(OptionKind::Call.intrinsic(terminal, strike));
        put.push(OptionKind::Put.intrinsic(terminal, strike));
    }

    let discount = (-contract.rate() * contract.maturity()).exp();
    let result = MonteCarloResult {
        call: call.finish("call_price", discount)?,
        put: put.finish("put_price", discount)?,
        settings,
    };

    tracing::debug!(
        simulations = settings.simulations,
        steps = settings.steps,
        seed = settings.seed,
        call = result.call.price,
        put = result.put.price,
        "monte carlo priced"
    );

    Ok(result)
}
