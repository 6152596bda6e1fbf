use crate::errors::{DomainError, DomainResult};
use crate::models::monte_carlo::SimulationSettings;
use crate::models::surface::SurfaceRequest;

/// Upper bounds on caller-controlled work.
///
/// Lattice cost is O(N^2) and a surface multiplies that by its cell count,
/// so every count coming from a request is checked here before anything is allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeLimits {
    pub max_lattice_steps: usize,
    pub max_grid_steps: usize,
    /// Node evaluations allowed for one surface (cells x nodes per lattice).
    pub max_surface_work: u64,
    /// Normal draws allowed for one simulation run (paths x steps).
    pub max_monte_carlo_work: u64,
}

impl Default for ComputeLimits {
    fn default() -> Self {
        Self {
            max_lattice_steps: 2_000,
            max_grid_steps: 200,
            max_surface_work: 50_000_000,
            max_monte_carlo_work: 50_000_000,
        }
    }
}

/// Nodes touched by one lattice valuation with `steps` steps.
#[inline]
pub fn lattice_nodes(steps: usize) -> u64 {
    let n = steps as u64;
    (n + 1) * (n + 2) / 2
}

impl ComputeLimits {
    /// Pure check, no side effects.
    pub fn check_lattice_steps(&self, steps: usize) -> DomainResult<()> {
        if steps > self.max_lattice_steps {
            return Err(DomainError::LimitExceeded {
                field: "steps",
                value: steps as u64,
                max: self.max_lattice_steps as u64,
            });
        }
        Ok(())
    }

    /// Checks both axes, then the total work. `lattice_steps` is `None` for closed form.
    pub fn check_surface(&self, request: &SurfaceRequest, lattice_steps: Option<usize>) -> DomainResult<()> {
        for (field, steps) in [
            ("spot_steps", request.spot.steps),
            ("volatility_steps", request.volatility.steps),
        ] {
            if steps > self.max_grid_steps {
                return Err(DomainError::LimitExceeded {
                    field,
                    value: steps as u64,
                    max: self.max_grid_steps as u64,
                });
            }
        }

        let per_cell = match lattice_steps {
            Some(steps) => {
                self.check_lattice_steps(steps)?;
                lattice_nodes(steps)
            }
            None => 1,
        };
        let work = request.cell_count().saturating_mul(per_cell);
        if work > self.max_surface_work {
            return Err(DomainError::LimitExceeded {
                field: "surface_work",
                value: work,
                max: self.max_surface_work,
            });
        }
        Ok(())
    }

    pub fn check_monte_carlo(&self, settings: &SimulationSettings) -> DomainResult<()> {
        let work = settings.work();
        if work > self.max_monte_carlo_work {
            return Err(DomainError::LimitExceeded {
                field: "monte_carlo_work",
                value: work,
                max: self.max_monte_carlo_work,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::surface::SampleAxis;

    fn request(spot_steps: usize, vol_steps: usize) -> SurfaceRequest {
        SurfaceRequest {
            strike: 100.0,
            maturity: 1.0,
            rate: 0.05,
            spot: SampleAxis::new(50.0, 150.0, spot_steps),
            volatility: SampleAxis::new(0.1, 0.5, vol_steps),
        }
    }

    #[test]
    fn test_lattice_nodes() {
        assert_eq!(lattice_nodes(1), 3);
        assert_eq!(lattice_nodes(2), 6);
    }

    #[test]
    fn test_lattice_limit() {
        let limits = ComputeLimits::default();
        assert!(limits.check_lattice_steps(2_000).is_ok());
        let err = limits.check_lattice_steps(2_001).unwrap_err();
        assert_eq!(err, DomainError::LimitExceeded { field: "steps", value: 2_001, max: 2_000 });
    }

    #[test]
    fn test_grid_axis_limit() {
        let limits = ComputeLimits::default();
        let err = limits.check_surface(&request(10, 500), None).unwrap_err();
        assert_eq!(err.field(), "volatility_steps");
    }

    #[test]
    fn test_surface_work_limit() {
        let limits = ComputeLimits::default();
        assert!(limits.check_surface(&request(200, 200), None).is_ok());
        // 40_000 cells x 5_151 nodes
        let err = limits.check_surface(&request(200, 200), Some(100)).unwrap_err();
        assert_eq!(err.field(), "surface_work");
        assert!(limits.check_surface(&request(10, 10), Some(100)).is_ok());
    }

    #[test]
    fn test_monte_carlo_work_limit() {
        let limits = ComputeLimits::default();
        assert!(limits.check_monte_carlo(&SimulationSettings::new(10_000, 252, 0)).is_ok());
        let err = limits
            .check_monte_carlo(&SimulationSettings::new(1_000_000, 252, 0))
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::LimitExceeded { field: "monte_carlo_work", value: 252_000_000, max: 50_000_000 }
        );
        // Saturates instead of wrapping.
        assert!(limits.check_monte_carlo(&SimulationSettings::new(usize::MAX, usize::MAX, 0)).is_err());
    }
}
