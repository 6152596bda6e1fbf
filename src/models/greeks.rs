use crate::errors::{ensure_finite, DomainError, DomainResult};
use crate::models::binomial::{price_lattice, price_on_lattice, LatticeParameters, ValueTree};
use crate::models::{ExerciseStyle, OptionContract, OptionKind};

/// Fewest lattice steps that still give gamma its second layer.
pub const MIN_GREEKS_STEPS: usize = 2;

/// Volatility bump for the finite-difference vega: one vol point.
pub const VEGA_BUMP: f64 = 0.01;

/// Lattice sensitivities of one option kind from one lattice snapshot.
///
/// `theta` is a per-year rate of decay taken across the first two lattice
/// layers, not a per-day figure. `vega` is per 1.00 of volatility.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
}

/// Unit label for `Greeks::theta`, surfaced to callers alongside the values.
pub const THETA_UNIT: &str = "per_year";

/// Node value that the caller has already proven to be inside the triangle.
#[inline]
fn node(tree: &ValueTree, kind: OptionKind, step: usize, up_moves: usize) -> DomainResult<f64> {
    tree.get(kind, step, up_moves).ok_or(DomainError::TooFewSteps {
        field: "steps",
        value: tree.steps(),
        min: MIN_GREEKS_STEPS,
    })
}

/// Delta, gamma and theta read off the first two layers of a lattice.
///
/// delta = (V[1,1] - V[1,0]) / (S*u - S*d)
/// gamma = [(V[2,2]-V[2,1])/(S*u^2 - S) - (V[2,1]-V[2,0])/(S - S*d^2)] / (0.5*(S*u^2 - S*d^2))
/// theta = (V[1,1] - V[0,0]) / (2*dt)
fn tree_greeks(tree: &ValueTree, params: &LatticeParameters, kind: OptionKind) -> DomainResult<(f64, f64, f64)> {
    if tree.steps() < MIN_GREEKS_STEPS {
        return Err(DomainError::TooFewSteps {
            field: "steps",
            value: tree.steps(),
            min: MIN_GREEKS_STEPS,
        });
    }

    let s = params.contract().spot();
    let (u, d) = (params.up(), params.down());

    let v00 = node(tree, kind, 0, 0)?;
    let v10 = node(tree, kind, 1, 0)?;
    let v11 = node(tree, kind, 1, 1)?;
    let v20 = node(tree, kind, 2, 0)?;
    let v21 = node(tree, kind, 2, 1)?;
    let v22 = node(tree, kind, 2, 2)?;

    let delta = (v11 - v10) / (s * u - s * d);
    let upper = (v22 - v21) / (s * u * u - s);
    let lower = (v21 - v20) / (s - s * d * d);
    let gamma = (upper - lower) / (0.5 * (s * u * u - s * d * d));
    let theta = (v11 - v00) / (2.0 * params.dt());

    Ok((
        ensure_finite("delta", delta)?,
        ensure_finite("gamma", gamma)?,
        ensure_finite("theta", theta)?,
    ))
}

/// Lattice Greeks for `kind`.
///
/// Values a fresh tree, then re-prices with sigma + 0.01 (same steps, same
/// exercise style) for vega. The bumped pass is independent; the unbumped
/// tree is only read.
pub fn compute_greeks(
    contract: &OptionContract,
    steps: usize,
    style: ExerciseStyle,
    kind: OptionKind,
) -> DomainResult<Greeks> {
    if steps < MIN_GREEKS_STEPS {
        return Err(DomainError::TooFewSteps {
            field: "steps",
            value: steps,
            min: MIN_GREEKS_STEPS,
        });
    }

    let valuation = price_lattice(contract, steps, style)?;
    greeks_from_valuation(&valuation.tree, &valuation.params, kind)
}

/// Greeks from an already computed valuation. `tree` must come from `params`.
pub fn greeks_from_valuation(tree: &ValueTree, params: &LatticeParameters, kind: OptionKind) -> DomainResult<Greeks> {
    let (delta, gamma, theta) = tree_greeks(tree, params, kind)?;

    let base = tree.get(kind, 0, 0).ok_or(DomainError::TooFewSteps {
        field: "steps",
        value: tree.steps(),
        min: MIN_GREEKS_STEPS,
    })?;
    let bumped_contract = params.contract().with_volatility(params.contract().volatility() + VEGA_BUMP)?;
    let bumped = LatticeParameters::new(&bumped_contract, params.steps(), params.style())?;
    let bumped_price = price_on_lattice(&bumped)?.price(kind);
    let vega = ensure_finite("vega", (bumped_price - base) / VEGA_BUMP)?;

    tracing::debug!(%kind, delta, gamma, theta, vega, "lattice greeks");

    Ok(Greeks { delta, gamma, theta, vega })
}
