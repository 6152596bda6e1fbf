use crate::errors::{ensure_finite, DomainError, DomainResult};
use crate::models::{OptionContract, OptionKind, VanillaPricer};

/// Fewest samples that define an interval.
pub const MIN_AXIS_STEPS: usize = 2;

/// One sampled axis: closed interval [min, max] with `steps` evenly spaced points.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SampleAxis {
    pub min: f64,
    pub max: f64,
    pub steps: usize,
}

impl SampleAxis {
    pub fn new(min: f64, max: f64, steps: usize) -> Self {
        Self { min, max, steps }
    }

    /// Endpoint-inclusive linear samples. The last sample is exactly `max`.
    pub fn samples(&self, field: &'static str) -> DomainResult<Vec<f64>> {
        let min = ensure_finite(field, self.min)?;
        let max = ensure_finite(field, self.max)?;
        if self.steps < MIN_AXIS_STEPS {
            return Err(DomainError::TooFewSteps {
                field,
                value: self.steps,
                min: MIN_AXIS_STEPS,
            });
        }
        if min > max {
            return Err(DomainError::InvertedInterval { field, min, max });
        }

        let last = (self.steps - 1) as f64;
        let width = max - min;
        let mut out: Vec<f64> = (0..self.steps).map(|k| min + width * (k as f64 / last)).collect();
        if let Some(end) = out.last_mut() {
            *end = max;
        }
        Ok(out)
    }
}

/// Grid request: everything but spot and volatility held fixed.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SurfaceRequest {
    pub strike: f64,
    pub maturity: f64,
    pub rate: f64,
    pub spot: SampleAxis,
    pub volatility: SampleAxis,
}

impl SurfaceRequest {
    #[inline]
    pub fn cell_count(&self) -> u64 {
        self.spot.steps as u64 * self.volatility.steps as u64
    }
}

/// Price matrices over (volatility, spot).
///
/// `call[v][s]` is the call price at `volatilities[v]` and `spot_prices[s]`:
/// row 0 is the lowest volatility, column 0 the lowest spot.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Surface {
    pub spot_prices: Vec<f64>,
    pub volatilities: Vec<f64>,
    pub call: Vec<Vec<f64>>,
    pub put: Vec<Vec<f64>>,
}

impl Surface {
    pub fn matrix(&self, kind: OptionKind) -> &[Vec<f64>] {
        match kind {
            OptionKind::Call => &self.call,
            OptionKind::Put => &self.put,
        }
    }

    /// (rows, columns) = (volatility samples, spot samples)
    pub fn shape(&self) -> (usize, usize) {
        (self.volatilities.len(), self.spot_prices.len())
    }
}

/// Evaluate `pricer` at every (spot, volatility) pair of the grid.
pub fn evaluate_surface(request: &SurfaceRequest, pricer: &dyn VanillaPricer) -> DomainResult<Surface> {
    let spot_prices = request.spot.samples("spot_range")?;
    let volatilities = request.volatility.samples("volatility_range")?;

    let mut call = Vec::with_capacity(volatilities.len());
    let mut put = Vec::with_capacity(volatilities.len());

    for &sigma in &volatilities {
        let mut call_row = Vec::with_capacity(spot_prices.len());
        let mut put_row = Vec::with_capacity(spot_prices.len());
        for &spot in &spot_prices {
            let contract = OptionContract::new(spot, request.strike, request.maturity, request.rate, sigma)?;
            let priced = pricer.price(&contract)?;
            call_row.push(priced.call_price);
            put_row.push(priced.put_price);
        }
        call.push(call_row);
        put.push(put_row);
    }

    tracing::debug!(
        pricer = pricer.name(),
        rows = volatilities.len(),
        cols = spot_prices.len(),
        "surface evaluated"
    );

    Ok(Surface {
        spot_prices,
        volatilities,
        call,
        put,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::binomial::BinomialLattice;
    use crate::models::black_scholes::{price_closed_form, BlackScholes};
    use crate::models::ExerciseStyle;
    use approx::assert_abs_diff_eq;

    fn request(spot_steps: usize, vol_steps: usize) -> SurfaceRequest {
        SurfaceRequest {
            strike: 100.0,
            maturity: 1.0,
            rate: 0.05,
            spot: SampleAxis::new(80.0, 120.0, spot_steps),
            volatility: SampleAxis::new(0.1, 0.3, vol_steps),
        }
    }

    #[test]
    fn test_samples_inclusive() {
        let s = SampleAxis::new(80.0, 120.0, 5).samples("spot_range").unwrap();
        assert_eq!(s, vec![80.0, 90.0, 100.0, 110.0, 120.0]);
    }

    #[test]
    fn test_degenerate_interval_is_allowed() {
        let s = SampleAxis::new(0.2, 0.2, 3).samples("volatility_range").unwrap();
        assert_eq!(s, vec![0.2, 0.2, 0.2]);
    }

    #[test]
    fn test_inverted_interval_rejected() {
        let err = SampleAxis::new(120.0, 80.0, 5).samples("spot_range").unwrap_err();
        assert_eq!(err, DomainError::InvertedInterval { field: "spot_range", min: 120.0, max: 80.0 });
    }

    #[test]
    fn test_single_step_rejected() {
        let err = evaluate_surface(&request(1, 3), &BlackScholes::new()).unwrap_err();
        assert_eq!(err, DomainError::TooFewSteps { field: "spot_range", value: 1, min: 2 });
        let err = evaluate_surface(&request(5, 0), &BlackScholes::new()).unwrap_err();
        assert_eq!(err.field(), "volatility_range");
    }

    #[test]
    fn test_shape_and_orientation() {
        let surface = evaluate_surface(&request(5, 3), &BlackScholes::new()).unwrap();
        assert_eq!(surface.shape(), (3, 5));
        assert_eq!(surface.call.len(), 3);
        assert!(surface.call.iter().all(|row| row.len() == 5));
        assert_eq!(surface.volatilities[0], 0.1);
        assert_eq!(surface.spot_prices[0], 80.0);

        let corner = OptionContract::new(80.0, 100.0, 1.0, 0.05, 0.1).unwrap();
        let expected = price_closed_form(&corner).unwrap();
        assert_abs_diff_eq!(surface.call[0][0], expected.call_price, epsilon = 1e-12);
        assert_abs_diff_eq!(surface.matrix(OptionKind::Put)[0][0], expected.put_price, epsilon = 1e-12);
    }

    #[test]
    fn test_call_increases_along_rows_and_columns() {
        let surface = evaluate_surface(&request(6, 4), &BinomialLattice::new(50, ExerciseStyle::American)).unwrap();
        for row in &surface.call {
            assert!(row.windows(2).all(|w| w[1] >= w[0]));
        }
        for col in 0..6 {
            assert!((1..4).all(|v| surface.call[v][col] >= surface.call[v - 1][col] - 1e-9));
        }
    }

    #[test]
    fn test_zero_volatility_cell_is_domain_error() {
        let mut req = request(3, 3);
        req.volatility = SampleAxis::new(0.0, 0.3, 3);
        let err = evaluate_surface(&req, &BlackScholes::new()).unwrap_err();
        assert_eq!(err.field(), "volatility");
    }
}
