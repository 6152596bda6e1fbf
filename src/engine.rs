use crate::errors::DomainResult;
use crate::limits::ComputeLimits;
use crate::models::binomial::{self, BinomialLattice, LatticeValuation};
use crate::models::black_scholes::{self, BlackScholes, ClosedFormGreeks};
use crate::models::greeks::{self, Greeks};
use crate::models::monte_carlo::{self, MonteCarloResult, SimulationSettings};
use crate::models::surface::{self, Surface, SurfaceRequest};
use crate::models::{ExerciseStyle, OptionContract, OptionKind, PricingResult, VanillaPricer};

/// Which pricer a surface is evaluated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PricerSelector {
    #[default]
    ClosedForm,
    Lattice { steps: usize, style: ExerciseStyle },
}

impl PricerSelector {
    fn lattice_steps(&self) -> Option<usize> {
        match self {
            Self::ClosedForm => None,
            Self::Lattice { steps, .. } => Some(*steps),
        }
    }

    fn pricer(&self) -> Box<dyn VanillaPricer> {
        match *self {
            Self::ClosedForm => Box::new(BlackScholes::new()),
            Self::Lattice { steps, style } => Box::new(BinomialLattice::new(steps, style)),
        }
    }
}

/// Entry point for callers: the pricing operations behind compute limits.
///
/// Holds no state besides its limits, so it is cheap to copy into blocking workers.
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingEngine {
    limits: ComputeLimits,
}

impl PricingEngine {
    pub fn new(limits: ComputeLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ComputeLimits {
        &self.limits
    }

    /// Black-Scholes call and put with d1/d2.
    pub fn price_closed_form(&self, contract: &OptionContract) -> DomainResult<PricingResult> {
        black_scholes::price_closed_form(contract)
    }

    /// Analytic Black-Scholes Greeks for call and put.
    pub fn closed_form_greeks(&self, contract: &OptionContract) -> DomainResult<ClosedFormGreeks> {
        black_scholes::closed_form_greeks(contract)
    }

    /// CRR prices plus the full call/put value trees.
    pub fn price_lattice(
        &self,
        contract: &OptionContract,
        steps: usize,
        style: ExerciseStyle,
    ) -> DomainResult<LatticeValuation> {
        self.limits.check_lattice_steps(steps)?;
        binomial::price_lattice(contract, steps, style)
    }

    /// Lattice delta, gamma, theta (per year) and bumped vega for `kind`.
    pub fn compute_greeks(
        &self,
        contract: &OptionContract,
        steps: usize,
        style: ExerciseStyle,
        kind: OptionKind,
    ) -> DomainResult<Greeks> {
        self.limits.check_lattice_steps(steps)?;
        greeks::compute_greeks(contract, steps, style, kind)
    }

    /// Simulated European call and put with 95% intervals.
    pub fn price_monte_carlo(
        &self,
        contract: &OptionContract,
        settings: SimulationSettings,
    ) -> DomainResult<MonteCarloResult> {
        self.limits.check_monte_carlo(&settings)?;
        monte_carlo::price_monte_carlo(contract, settings)
    }

    /// Price matrices over the requested (spot, volatility) grid.
    pub fn evaluate_surface(&self, request: &SurfaceRequest, selector: PricerSelector) -> DomainResult<Surface> {
        self.limits.check_surface(request, selector.lattice_steps())?;
        let pricer = selector.pricer();
        tracing::debug!(pricer = pricer.name(), cells = request.cell_count(), "evaluating surface");
        surface::evaluate_surface(request, pricer.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DomainError;
    use crate::models::surface::SampleAxis;

    fn atm() -> OptionContract {
        OptionContract::new(100.0, 100.0, 1.0, 0.05, 0.2).unwrap()
    }

    #[test]
    fn test_lattice_limit_enforced_before_pricing() {
        let engine = PricingEngine::new(ComputeLimits {
            max_lattice_steps: 10,
            ..ComputeLimits::default()
        });
        let err = engine.price_lattice(&atm(), 11, ExerciseStyle::European).unwrap_err();
        assert_eq!(err.field(), "steps");
        assert!(engine.compute_greeks(&atm(), 11, ExerciseStyle::European, OptionKind::Call).is_err());
        assert!(engine.price_lattice(&atm(), 10, ExerciseStyle::European).is_ok());
    }

    #[test]
    fn test_surface_selector_switches_pricer() {
        let engine = PricingEngine::default();
        let request = SurfaceRequest {
            strike: 100.0,
            maturity: 1.0,
            rate: 0.05,
            spot: SampleAxis::new(90.0, 110.0, 3),
            volatility: SampleAxis::new(0.2, 0.2, 2),
        };
        let bs = engine.evaluate_surface(&request, PricerSelector::ClosedForm).unwrap();
        let crr = engine
            .evaluate_surface(
                &request,
                PricerSelector::Lattice {
                    steps: 400,
                    style: ExerciseStyle::European,
                },
            )
            .unwrap();
        for (a, b) in bs.call[0].iter().zip(&crr.call[0]) {
            assert!((a - b).abs() < 2e-2, "{a} vs {b}");
        }
        assert_eq!(bs.call[1][1], engine.price_closed_form(&atm()).unwrap().call_price);
    }

    #[test]
    fn test_sigma_zero_is_domain_error() {
        let err = OptionContract::new(100.0, 100.0, 1.0, 0.05, 0.0).unwrap_err();
        assert!(matches!(err, DomainError::NonPositive { field: "volatility", .. }));
    }

    #[test]
    fn test_monte_carlo_limit_enforced_before_simulating() {
        let engine = PricingEngine::new(ComputeLimits {
            max_monte_carlo_work: 1_000,
            ..ComputeLimits::default()
        });
        let err = engine
            .price_monte_carlo(&atm(), SimulationSettings::new(1_000, 2, 1))
            .unwrap_err();
        assert_eq!(err.field(), "monte_carlo_work");
        let ok = engine.price_monte_carlo(&atm(), SimulationSettings::new(500, 2, 1)).unwrap();
        assert!(ok.call.price > 0.0 && ok.put.price > 0.0);
    }
}
