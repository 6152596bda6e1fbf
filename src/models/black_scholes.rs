use crate::errors::{ensure_finite, ensure_positive, DomainResult};
use crate::models::normal::{normal_cdf, normal_pdf};
use crate::models::{OptionContract, OptionKind, PricingResult, VanillaPricer};

/// Black-Scholes-Merton pricing for European calls and puts.
///
/// d1 = (ln(S/K) + (r + sigma^2/2)*T) / (sigma * sqrt(T))
/// d2 = d1 - sigma * sqrt(T)
/// call = S*N(d1) - K*e^(-rT)*N(d2)
/// put  = K*e^(-rT)*N(-d2) - S*N(-d1)
pub struct BlackScholes;

impl BlackScholes {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BlackScholes {
    fn default() -> Self {
        Self::new()
    }
}

/// d1 and d2 for a contract. Shared by the pricer and the analytic Greeks.
#[inline]
pub fn d1_d2(contract: &OptionContract) -> DomainResult<(f64, f64)> {
    // The contract already guarantees these; recheck so the division below can never be by zero.
    let maturity = ensure_positive("maturity", contract.maturity())?;
    let sigma = ensure_positive("volatility", contract.volatility())?;

    let sigma_sqrt_t = sigma * maturity.sqrt();
    let ln_s_k = (contract.spot() / contract.strike()).ln();
    let d1 = (ln_s_k + (contract.rate() + 0.5 * sigma * sigma) * maturity) / sigma_sqrt_t;
    let d2 = d1 - sigma_sqrt_t;

    Ok((ensure_finite("d1", d1)?, ensure_finite("d2", d2)?))
}

/// Closed-form European call and put with d1/d2 populated.
pub fn price_closed_form(contract: &OptionContract) -> DomainResult<PricingResult> {
    let (d1, d2) = d1_d2(contract)?;
    let spot = contract.spot();
    let discounted_strike = contract.discounted_strike();

    let call = spot * normal_cdf(d1) - discounted_strike * normal_cdf(d2);
    let put = discounted_strike * normal_cdf(-d2) - spot * normal_cdf(-d1);

    // Cancellation deep out of the money can leave a value a few ulps below zero.
    Ok(PricingResult {
        call_price: ensure_finite("call_price", call)?.max(0.0),
        put_price: ensure_finite("put_price", put)?.max(0.0),
        d1: Some(d1),
        d2: Some(d2),
    })
}

impl VanillaPricer for BlackScholes {
    #[inline]
    fn name(&self) -> &'static str {
        "Black-Scholes"
    }

    fn price(&self, contract: &OptionContract) -> DomainResult<PricingResult> {
        price_closed_form(contract)
    }
}

/// Analytic sensitivities of one option kind.
///
/// Theta is per year and vega is per 1.00 of volatility (not per vol point).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct AnalyticGreeks {
    pub delta: f64,
    pub gamma: f64,
    pub vega: f64,
    pub theta: f64,
    pub rho: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ClosedFormGreeks {
    pub call: AnalyticGreeks,
    pub put: AnalyticGreeks,
}

fn analytic_greeks(contract: &OptionContract, kind: OptionKind, d1: f64, d2: f64) -> DomainResult<AnalyticGreeks> {
    let s = contract.spot();
    let t = contract.maturity();
    let sigma = contract.volatility();
    let r = contract.rate();
    let sqrt_t = t.sqrt();
    let pdf_d1 = normal_pdf(d1);
    let discounted_strike = contract.discounted_strike();

    let gamma = pdf_d1 / (s * sigma * sqrt_t);
    let vega = s * sqrt_t * pdf_d1;
    let decay = -(s * pdf_d1 * sigma) / (2.0 * sqrt_t);

    let (delta, theta, rho) = match kind {
        OptionKind::Call => (
            normal_cdf(d1),
            decay - r * discounted_strike * normal_cdf(d2),
            t * discounted_strike * normal_cdf(d2),
        ),
        OptionKind::Put => (
            normal_cdf(d1) - 1.0,
            decay + r * discounted_strike * normal_cdf(-d2),
            -t * discounted_strike * normal_cdf(-d2),
        ),
    };

    Ok(AnalyticGreeks {
        delta: ensure_finite("delta", delta)?,
        gamma: ensure_finite("gamma", gamma)?,
        vega: ensure_finite("vega", vega)?,
        theta: ensure_finite("theta", theta)?,
        rho: ensure_finite("rho", rho)?,
    })
}

/// Analytic Black-Scholes Greeks for both the call and the put.
pub fn closed_form_greeks(contract: &OptionContract) -> DomainResult<ClosedFormGreeks> {
    let (d1, d2) = d1_d2(contract)?;
    Ok(ClosedFormGreeks {
        call: analytic_greeks(contract, OptionKind::Call, d1, d2)?,
        put: analytic_greeks(contract, OptionKind::Put, d1, d2)?,
    })
}
