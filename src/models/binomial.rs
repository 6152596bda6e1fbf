use crate::errors::{ensure_finite, DomainError, DomainResult};
use crate::models::{ExerciseStyle, OptionContract, OptionKind, PricingResult, VanillaPricer};

/// Fewest steps a lattice can have: one step beyond the root.
pub const MIN_LATTICE_STEPS: usize = 1;

/// Cox-Ross-Rubinstein lattice quantities, derived once per valuation and
/// reused at every node.
///
/// dt = T/N, u = exp(sigma * sqrt(dt)), d = 1/u, p = (exp(r*dt) - d) / (u - d)
///
/// Only constructible through [`LatticeParameters::new`], so p is always in
/// (0, 1) and no node spot overflows.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct LatticeParameters {
    contract: OptionContract,
    steps: usize,
    style: ExerciseStyle,
    dt: f64,
    /// sigma * sqrt(dt): one up-move in log space.
    log_up: f64,
    up: f64,
    down: f64,
    probability: f64,
    discount: f64,
}

impl LatticeParameters {
    pub fn new(contract: &OptionContract, steps: usize, style: ExerciseStyle) -> DomainResult<Self> {
        if steps < MIN_LATTICE_STEPS {
            return Err(DomainError::TooFewSteps {
                field: "steps",
                value: steps,
                min: MIN_LATTICE_STEPS,
            });
        }

        let dt = contract.maturity() / steps as f64;
        let log_up = contract.volatility() * dt.sqrt();
        let up = ensure_finite("up", log_up.exp())?;
        let down = 1.0 / up;
        let growth = (contract.rate() * dt).exp();
        let probability = (growth - down) / (up - down);

        // Outside (0, 1) the tree admits arbitrage and prices can leave [0, S].
        if !probability.is_finite() || probability <= 0.0 || probability >= 1.0 {
            return Err(DomainError::Arbitrage {
                field: "probability",
                value: probability,
            });
        }

        // Highest terminal spot S * u^N must be representable.
        let span = log_up * steps as f64;
        let top = contract.spot() * span.exp();
        if !top.is_finite() {
            return Err(DomainError::NonFinite {
                field: "terminal_spot",
                value: top,
            });
        }

        Ok(Self {
            contract: *contract,
            steps,
            style,
            dt,
            log_up,
            up,
            down,
            probability,
            discount: (-contract.rate() * dt).exp(),
        })
    }

    pub fn contract(&self) -> &OptionContract {
        &self.contract
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn style(&self) -> ExerciseStyle {
        self.style
    }

    /// Length of one step in years.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn up(&self) -> f64 {
        self.up
    }

    pub fn down(&self) -> f64 {
        self.down
    }

    /// Risk-neutral probability of an up-move. Always in (0, 1).
    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Per-step discount factor e^(-r*dt).
    pub fn discount(&self) -> f64 {
        self.discount
    }

    /// Underlying price at node (step, up_moves): S * u^j * d^(i-j),
    /// evaluated as S * exp(sigma * sqrt(dt) * (2j - i)).
    #[inline]
    pub fn underlying(&self, step: usize, up_moves: usize) -> f64 {
        debug_assert!(up_moves <= step);
        let net_moves = 2.0 * up_moves as f64 - step as f64;
        self.contract.spot() * (self.log_up * net_moves).exp()
    }
}

/// Triangular lattice of node values, one for calls and one for puts.
///
/// Flat arena storage: row `i` holds `i + 1` values starting at offset
/// `i * (i + 1) / 2`. Node (i, j) is step `i` after `j` up-moves; cells with
/// `j > i` do not exist.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTree {
    steps: usize,
    call: Vec<f64>,
    put: Vec<f64>,
}

#[inline]
fn row_offset(step: usize) -> usize {
    step * (step + 1) / 2
}

impl ValueTree {
    fn with_steps(steps: usize) -> Self {
        let len = row_offset(steps + 1);
        Self {
            steps,
            call: vec![0.0; len],
            put: vec![0.0; len],
        }
    }

    #[inline]
    pub fn steps(&self) -> usize {
        self.steps
    }

    fn values(&self, kind: OptionKind) -> &[f64] {
        match kind {
            OptionKind::Call => &self.call,
            OptionKind::Put => &self.put,
        }
    }

    /// All node values at one step, ordered by up-move count.
    pub fn row(&self, kind: OptionKind, step: usize) -> Option<&[f64]> {
        if step > self.steps {
            return None;
        }
        let start = row_offset(step);
        Some(&self.values(kind)[start..start + step + 1])
    }

    /// Value at node (step, up_moves), `None` outside the triangle.
    pub fn get(&self, kind: OptionKind, step: usize, up_moves: usize) -> Option<f64> {
        self.row(kind, step)?.get(up_moves).copied()
    }

    /// Rows from the root to expiry. Row `i` has `i + 1` entries.
    pub fn rows(&self, kind: OptionKind) -> impl Iterator<Item = &[f64]> + '_ {
        (0..=self.steps).filter_map(move |i| self.row(kind, i))
    }

    /// Jagged copy of the tree for serialization.
    pub fn to_nested(&self, kind: OptionKind) -> Vec<Vec<f64>> {
        self.rows(kind).map(<[f64]>::to_vec).collect()
    }

    fn store_row(&mut self, step: usize, call: &[f64], put: &[f64]) {
        let start = row_offset(step);
        self.call[start..=start + step].copy_from_slice(&call[..=step]);
        self.put[start..=start + step].copy_from_slice(&put[..=step]);
    }
}

/// Result of a full lattice valuation: prices plus the tree they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct LatticeValuation {
    pub pricing: PricingResult,
    pub tree: ValueTree,
    pub params: LatticeParameters,
}

/// Backward induction over rolling call/put buffers.
///
/// `on_row(i, call_row, put_row)` sees every layer from expiry (i = N) back to
/// the root (i = 0); each slice has `i + 1` entries. Returns (call, put) at the root.
fn backward_induction<F>(params: &LatticeParameters, mut on_row: F) -> (f64, f64)
where
    F: FnMut(usize, &[f64], &[f64]),
{
    let n = params.steps;
    let strike = params.contract.strike();
    let american = params.style == ExerciseStyle::American;

    let disc_up = params.discount * params.probability;
    let disc_down = params.discount * (1.0 - params.probability);

    let mut call = vec![0.0_f64; n + 1];
    let mut put = vec![0.0_f64; n + 1];

    for j in 0..=n {
        let st = params.underlying(n, j);
        call[j] = OptionKind::Call.intrinsic(st, strike);
        put[j] = OptionKind::Put.intrinsic(st, strike);
    }
    on_row(n, &call, &put);

    for i in (0..n).rev() {
        // Ascending j reads index j + 1 before it is overwritten.
        for j in 0..=i {
            let call_cont = disc_up * call[j + 1] + disc_down * call[j];
            let put_cont = disc_up * put[j + 1] + disc_down * put[j];
            if american {
                let st = params.underlying(i, j);
                call[j] = call_cont.max(OptionKind::Call.intrinsic(st, strike));
                put[j] = put_cont.max(OptionKind::Put.intrinsic(st, strike));
            } else {
                call[j] = call_cont;
                put[j] = put_cont;
            }
        }
        on_row(i, &call[..=i], &put[..=i]);
    }

    (call[0], put[0])
}

fn pricing_result(call: f64, put: f64) -> DomainResult<PricingResult> {
    Ok(PricingResult {
        call_price: ensure_finite("call_price", call)?,
        put_price: ensure_finite("put_price", put)?,
        d1: None,
        d2: None,
    })
}

/// Price on a prepared lattice without materialising the tree.
pub(crate) fn price_on_lattice(params: &LatticeParameters) -> DomainResult<PricingResult> {
    let (call, put) = backward_induction(params, |_, _, _| {});
    pricing_result(call, put)
}

/// Full CRR valuation: call and put prices plus both value trees.
pub fn price_lattice(contract: &OptionContract, steps: usize, style: ExerciseStyle) -> DomainResult<LatticeValuation> {
    let params = LatticeParameters::new(contract, steps, style)?;
    let mut tree = ValueTree::with_steps(steps);
    let (call, put) = backward_induction(&params, |i, call_row, put_row| tree.store_row(i, call_row, put_row));

    tracing::debug!(steps, ?style, p = params.probability, call, put, "lattice valued");

    Ok(LatticeValuation {
        pricing: pricing_result(call, put)?,
        tree,
        params,
    })
}

/// Lattice pricer with a fixed step count and exercise style.
#[derive(Debug, Clone, Copy)]
pub struct BinomialLattice {
    pub steps: usize,
    pub style: ExerciseStyle,
}

impl BinomialLattice {
    pub fn new(steps: usize, style: ExerciseStyle) -> Self {
        Self { steps, style }
    }
}

impl VanillaPricer for BinomialLattice {
    #[inline]
    fn name(&self) -> &'static str {
        match self.style {
            ExerciseStyle::European => "CRR-European",
            ExerciseStyle::American => "CRR-American",
        }
    }

    fn price(&self, contract: &OptionContract) -> DomainResult<PricingResult> {
        let params = LatticeParameters::new(contract, self.steps, self.style)?;
        price_on_lattice(&params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::black_scholes::price_closed_form;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn atm() -> OptionContract {
        OptionContract::new(100.0, 100.0, 1.0, 0.05, 0.2).unwrap()
    }

    #[test]
    fn test_parameters_derived_once() {
        let p = LatticeParameters::new(&atm(), 4, ExerciseStyle::European).unwrap();
        assert_abs_diff_eq!(p.dt(), 0.25, epsilon = 1e-15);
        assert_abs_diff_eq!(p.up(), (0.2_f64 * 0.5).exp(), epsilon = 1e-15);
        assert_abs_diff_eq!(p.up() * p.down(), 1.0, epsilon = 1e-15);
        assert!(p.probability() > 0.0 && p.probability() < 1.0);
    }

    #[test]
    fn test_zero_steps_rejected() {
        let err = price_lattice(&atm(), 0, ExerciseStyle::European).unwrap_err();
        assert_eq!(err, DomainError::TooFewSteps { field: "steps", value: 0, min: 1 });
    }

    #[test]
    fn test_arbitrage_rate_rejected() {
        // exp(r*dt) above u: the up-state no longer dominates the risk-free growth.
        let c = OptionContract::new(100.0, 100.0, 1.0, 0.5, 0.05).unwrap();
        let err = price_lattice(&c, 10, ExerciseStyle::European).unwrap_err();
        assert_eq!(err.field(), "probability");
    }

    #[test]
    fn test_extreme_lattice_matches_closed_form() {
        // sigma * sqrt(T * N) = 670: d^N alone would underflow to zero.
        let c = OptionContract::new(100.0, 100.0, 50.0, 0.05, 3.0).unwrap();
        let lattice = price_lattice(&c, 1_000, ExerciseStyle::European).unwrap().pricing;
        let exact = price_closed_form(&c).unwrap();
        assert_abs_diff_eq!(lattice.call_price, exact.call_price, epsilon = 1e-6);
        let parity = lattice.call_price - lattice.put_price - (100.0 - 100.0 * (-0.05_f64 * 50.0).exp());
        assert!(parity.abs() < 1e-6, "parity gap {parity}");
    }

    #[test]
    fn test_overflowing_lattice_rejected() {
        // sigma * sqrt(T * N) = 949: the top terminal spot is beyond f64.
        let c = OptionContract::new(100.0, 100.0, 50.0, 0.05, 3.0).unwrap();
        let err = price_lattice(&c, 2_000, ExerciseStyle::European).unwrap_err();
        assert_eq!(err.field(), "terminal_spot");
        assert!(BinomialLattice::new(2_000, ExerciseStyle::American).price(&c).is_err());
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_node_spot_beyond_i32_steps() {
        let steps = 3_000_000_000_usize;
        let c = OptionContract::new(100.0, 100.0, 1.0, 0.0, 1e-6).unwrap();
        let p = LatticeParameters::new(&c, steps, ExerciseStyle::European).unwrap();
        let span = 1e-6 * (steps as f64).sqrt();
        assert_abs_diff_eq!(p.underlying(steps, steps), 100.0 * span.exp(), epsilon = 1e-9);
        assert_abs_diff_eq!(p.underlying(steps, 0), 100.0 * (-span).exp(), epsilon = 1e-9);
        assert_abs_diff_eq!(p.underlying(steps, steps / 2), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_one_step_by_hand() {
        let c = atm();
        let v = price_lattice(&c, 1, ExerciseStyle::European).unwrap();
        let p = v.params;
        let expected_call = p.discount() * p.probability() * (100.0 * p.up() - 100.0);
        let expected_put = p.discount() * (1.0 - p.probability()) * (100.0 - 100.0 * p.down());
        assert_abs_diff_eq!(v.pricing.call_price, expected_call, epsilon = 1e-12);
        assert_abs_diff_eq!(v.pricing.put_price, expected_put, epsilon = 1e-12);
    }

    #[test]
    fn test_tree_shape_and_root() {
        let v = price_lattice(&atm(), 3, ExerciseStyle::American).unwrap();
        assert_eq!(v.tree.steps(), 3);
        for (i, row) in v.tree.rows(OptionKind::Call).enumerate() {
            assert_eq!(row.len(), i + 1);
        }
        assert_eq!(v.tree.get(OptionKind::Call, 0, 0), Some(v.pricing.call_price));
        assert_eq!(v.tree.get(OptionKind::Put, 0, 0), Some(v.pricing.put_price));
        assert_eq!(v.tree.get(OptionKind::Call, 1, 2), None);
        assert_eq!(v.tree.get(OptionKind::Call, 4, 0), None);
        assert_eq!(v.tree.to_nested(OptionKind::Put).len(), 4);
    }

    #[test]
    fn test_terminal_layer_is_payoff() {
        let v = price_lattice(&atm(), 5, ExerciseStyle::European).unwrap();
        let row = v.tree.row(OptionKind::Put, 5).unwrap();
        for (j, value) in row.iter().enumerate() {
            let st = v.params.underlying(5, j);
            assert_abs_diff_eq!(*value, (100.0 - st).max(0.0), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_price_only_matches_tree() {
        let c = atm();
        let full = price_lattice(&c, 50, ExerciseStyle::American).unwrap();
        let quick = BinomialLattice::new(50, ExerciseStyle::American).price(&c).unwrap();
        assert_eq!(full.pricing, quick);
    }

    #[test]
    fn test_converges_to_closed_form() {
        let c = atm();
        let lattice = price_lattice(&c, 500, ExerciseStyle::European).unwrap().pricing;
        let exact = price_closed_form(&c).unwrap();
        assert_abs_diff_eq!(lattice.call_price, exact.call_price, epsilon = 1e-2);
        assert_abs_diff_eq!(lattice.put_price, exact.put_price, epsilon = 1e-2);
    }

    #[test]
    fn test_american_scenario() {
        let c = atm();
        let american = price_lattice(&c, 100, ExerciseStyle::American).unwrap().pricing;
        let exact = price_closed_form(&c).unwrap();
        assert_abs_diff_eq!(american.call_price, exact.call_price, epsilon = 0.05);
        assert!(american.put_price > exact.put_price, "{} <= {}", american.put_price, exact.put_price);
    }

    #[test]
    fn test_american_put_node_never_below_intrinsic() {
        let v = price_lattice(&atm(), 20, ExerciseStyle::American).unwrap();
        for i in 0..=20 {
            for (j, value) in v.tree.row(OptionKind::Put, i).unwrap().iter().enumerate() {
                assert!(*value >= 100.0 - v.params.underlying(i, j) - 1e-9);
            }
        }
    }

    proptest! {
        #[test]
        fn american_dominates_european(
            s in 20.0_f64..200.0,
            k in 20.0_f64..200.0,
            t in 0.1_f64..1.0,
            r in 0.0_f64..0.05,
            sigma in 0.1_f64..0.8,
            steps in 1_usize..120,
        ) {
            let c = OptionContract::new(s, k, t, r, sigma).unwrap();
            let eu = price_lattice(&c, steps, ExerciseStyle::European).unwrap().pricing;
            let am = price_lattice(&c, steps, ExerciseStyle::American).unwrap().pricing;
            prop_assert!(am.call_price >= eu.call_price - 1e-12);
            prop_assert!(am.put_price >= eu.put_price - 1e-12);
            prop_assert!(eu.call_price >= 0.0 && eu.put_price >= 0.0);
        }

        #[test]
        fn lattice_monotone_in_spot(
            s in 20.0_f64..200.0,
            bump in 0.0_f64..20.0,
            sigma in 0.1_f64..0.8,
            american in any::<bool>(),
        ) {
            let style = ExerciseStyle::from_american_flag(american);
            let pricer = BinomialLattice::new(60, style);
            let lo = pricer.price(&OptionContract::new(s, 100.0, 1.0, 0.03, sigma).unwrap()).unwrap();
            let hi = pricer.price(&OptionContract::new(s + bump, 100.0, 1.0, 0.03, sigma).unwrap()).unwrap();
            prop_assert!(hi.call_price >= lo.call_price - 1e-9);
            prop_assert!(hi.put_price <= lo.put_price + 1e-9);
        }
    }
}
