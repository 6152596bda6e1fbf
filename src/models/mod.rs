pub mod normal;
pub mod black_scholes;
pub mod binomial;
pub mod greeks;
pub mod monte_carlo;
pub mod surface;

use crate::errors::{ensure_finite, ensure_positive, DomainResult};

/// Every pricer implements this trait.
/// price() must be a pure function: deterministic output from the contract only.
/// Send + Sync so a pricer can be moved onto a blocking worker.
pub trait VanillaPricer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Call and put value for one contract. Never returns non-finite prices.
    fn price(&self, contract: &OptionContract) -> DomainResult<PricingResult>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Call,
    Put,
}

impl OptionKind {
    /// Payoff of exercising now at `spot`.
    #[inline]
    pub fn intrinsic(self, spot: f64, strike: f64) -> f64 {
        match self {
            Self::Call => (spot - strike).max(0.0),
            Self::Put => (strike - spot).max(0.0),
        }
    }
}

impl std::fmt::Display for OptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Put => write!(f, "put"),
        }
    }
}

impl std::str::FromStr for OptionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "call" => Ok(Self::Call),
            "put" => Ok(Self::Put),
            other => Err(format!("unknown option type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseStyle {
    /// Exercise only at expiry.
    #[default]
    European,
    /// Exercise at any lattice step up to and including expiry.
    American,
}

impl ExerciseStyle {
    #[inline]
    pub fn from_american_flag(is_american: bool) -> Self {
        if is_american {
            Self::American
        } else {
            Self::European
        }
    }
}

/// Immutable vanilla contract. Stack-allocated, Copy.
///
/// Only constructible through [`OptionContract::new`], so every instance
/// has strictly positive spot, strike, maturity and volatility and a finite rate.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct OptionContract {
    spot: f64,
    strike: f64,
    maturity: f64,
    rate: f64,
    volatility: f64,
}

impl OptionContract {
    pub fn new(spot: f64, strike: f64, maturity: f64, rate: f64, volatility: f64) -> DomainResult<Self> {
        Ok(Self {
            spot: ensure_positive("spot", spot)?,
            strike: ensure_positive("strike", strike)?,
            maturity: ensure_positive("maturity", maturity)?,
            rate: ensure_finite("rate", rate)?,
            volatility: ensure_positive("volatility", volatility)?,
        })
    }

    #[inline]
    pub fn spot(&self) -> f64 {
        self.spot
    }

    #[inline]
    pub fn strike(&self) -> f64 {
        self.strike
    }

    /// Time to maturity in years.
    #[inline]
    pub fn maturity(&self) -> f64 {
        self.maturity
    }

    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    #[inline]
    pub fn volatility(&self) -> f64 {
        self.volatility
    }

    /// Same contract with a different spot, re-validated.
    pub fn with_spot(&self, spot: f64) -> DomainResult<Self> {
        Self::new(spot, self.strike, self.maturity, self.rate, self.volatility)
    }

    /// Same contract with a different volatility, re-validated.
    pub fn with_volatility(&self, volatility: f64) -> DomainResult<Self> {
        Self::new(self.spot, self.strike, self.maturity, self.rate, volatility)
    }

    /// K * e^(-rT)
    #[inline]
    pub fn discounted_strike(&self) -> f64 {
        self.strike * (-self.rate * self.maturity).exp()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PricingResult {
    pub call_price: f64,
    pub put_price: f64,
    /// Populated by the closed-form pricer only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d1: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d2: Option<f64>,
}

impl PricingResult {
    #[inline]
    pub fn price(&self, kind: OptionKind) -> f64 {
        match kind {
            OptionKind::Call => self.call_price,
            OptionKind::Put => self.put_price,
        }
    }
}
