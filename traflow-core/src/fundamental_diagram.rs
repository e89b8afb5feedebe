//! Triangular fundamental diagrams.
//!
//! A [`FundamentalDiagram`] is made of two [`Branch`]es. The free-flow branch passes through the
//! origin with a slope equal to the maximum speed. The congested branch passes through
//! `(maximum_density, 0)` with a negative slope equal to the backward wave speed. The critical
//! density is where the two branches meet and the capacity is the flow at that density.
//!
//! The diagram can be recalibrated in two ways, each holding a different physical quantity fixed:
//!
//! - [`FundamentalDiagram::set_maximum_density`] keeps both wave speeds and moves the jam density;
//!   critical density and capacity follow from the new intersection.
//! - [`FundamentalDiagram::set_capacity`] keeps the maximum density and free-flow speed; the
//!   backward wave speed is re-derived so the congested branch passes through the new capacity.
//!
//! Both replace the whole diagram at once or leave it untouched on error.
mod branch;

pub use branch::Branch;
use crate::TraflowError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default jam density in pcu/km/lane.
pub const DEFAULT_MAXIMUM_DENSITY: f64 = 180.0;

/// Regime (branch) of a fundamental diagram.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    FreeFlow,
    Congested,
}

fn check_positive(name: &str, value: f64) -> Result<(), TraflowError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(TraflowError::invalid(format!("{name} must be positive (found: {value})")));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct FundamentalDiagram {
    free_flow: Branch,
    congested: Branch,
    maximum_density: f64,
    critical_density: f64,
    capacity: f64,
}

impl FundamentalDiagram {
    /// Create a triangular diagram from its two wave speeds and jam density.
    pub fn new(max_speed: f64, backward_wave_speed: f64, maximum_density: f64) -> Result<Self, TraflowError> {
        let (free_flow, congested) = Self::branches(max_speed, backward_wave_speed, maximum_density)?;

        let critical_density = free_flow
            .intersection(&congested)
            .ok_or_else(|| TraflowError::invalid("free-flow and congested branches are parallel"))?;
        let capacity = free_flow.flow(critical_density);

        Self::assemble(free_flow, congested, maximum_density, critical_density, capacity)
    }

    /// Create a diagram whose backward wave speed equals the maximum speed in magnitude, using
    /// [`DEFAULT_MAXIMUM_DENSITY`].
    pub fn symmetric(max_speed: f64) -> Result<Self, TraflowError> {
        Self::new(max_speed, -max_speed, DEFAULT_MAXIMUM_DENSITY)
    }

    /// Create a diagram from a target capacity.
    ///
    /// The critical density is `capacity / max_speed` and the backward wave speed is the slope of
    /// the line from `(critical_density, capacity)` to `(maximum_density, 0)`.
    pub fn with_capacity(max_speed: f64, capacity: f64, maximum_density: f64) -> Result<Self, TraflowError> {
        check_positive("maximum speed", max_speed)?;
        check_positive("maximum density", maximum_density)?;
        check_positive("capacity", capacity)?;

        let critical_density = capacity / max_speed;
        if critical_density >= maximum_density {
            return Err(TraflowError::invalid(format!(
                "capacity {capacity} requires a critical density of {critical_density} which is not below the maximum density {maximum_density}"
            )));
        }

        let backward_wave_speed = -capacity / (maximum_density - critical_density);
        let (free_flow, congested) = Self::branches(max_speed, backward_wave_speed, maximum_density)?;

        Self::assemble(free_flow, congested, maximum_density, critical_density, capacity)
    }

    fn branches(
        max_speed: f64,
        backward_wave_speed: f64,
        maximum_density: f64,
    ) -> Result<(Branch, Branch), TraflowError> {
        check_positive("maximum speed", max_speed)?;
        check_positive("maximum density", maximum_density)?;
        if !backward_wave_speed.is_finite() || backward_wave_speed >= 0.0 {
            return Err(TraflowError::invalid(format!(
                "backward wave speed must be negative (found: {backward_wave_speed})"
            )));
        }

        let free_flow = Branch::through_point(max_speed, 0.0, 0.0)?;
        let congested = Branch::through_point(backward_wave_speed, maximum_density, 0.0)?;
        Ok((free_flow, congested))
    }

    fn assemble(
        free_flow: Branch,
        congested: Branch,
        maximum_density: f64,
        critical_density: f64,
        capacity: f64,
    ) -> Result<Self, TraflowError> {
        if critical_density.is_nan() || critical_density <= 0.0 || critical_density >= maximum_density {
            return Err(TraflowError::invalid(format!(
                "critical density {critical_density} must lie strictly between 0 and the maximum density {maximum_density}"
            )));
        }
        check_positive("capacity", capacity)?;

        Ok(Self {
            free_flow,
            congested,
            maximum_density,
            critical_density,
            capacity,
        })
    }

    pub fn free_flow_branch(&self) -> &Branch {
        &self.free_flow
    }

    pub fn congested_branch(&self) -> &Branch {
        &self.congested
    }

    pub fn branch(&self, regime: Regime) -> &Branch {
        match regime {
            Regime::FreeFlow => &self.free_flow,
            Regime::Congested => &self.congested,
        }
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn critical_density(&self) -> f64 {
        self.critical_density
    }

    pub fn maximum_density(&self) -> f64 {
        self.maximum_density
    }

    /// Free-flow speed; the slope of the free-flow branch.
    pub fn maximum_speed(&self) -> f64 {
        self.free_flow.slope()
    }

    /// Propagation speed of congestion; the (negative) slope of the congested branch.
    pub fn backward_wave_speed(&self) -> f64 {
        self.congested.slope()
    }

    /// The regime a link at `density` is in. The critical density itself is free flow.
    pub fn regime_at_density(&self, density: f64) -> Regime {
        if density <= self.critical_density {
            Regime::FreeFlow
        } else {
            Regime::Congested
        }
    }

    fn check_density(&self, density: f64) -> Result<(), TraflowError> {
        if !density.is_finite() || density < 0.0 || density > self.maximum_density {
            return Err(TraflowError::invalid(format!(
                "density {density} is outside the diagram's range [0, {}]",
                self.maximum_density
            )));
        }
        Ok(())
    }

    /// Flow at `density` on the branch of the given regime.
    ///
    /// The regime is not required to match the density; evaluating the other branch is allowed
    /// for analysis.
    pub fn flow_at_density(&self, density: f64, regime: Regime) -> Result<f64, TraflowError> {
        self.check_density(density)?;
        Ok(self.branch(regime).flow(density))
    }

    /// Flow at `density` on the branch implied by the density.
    pub fn flow_at(&self, density: f64) -> Result<f64, TraflowError> {
        self.flow_at_density(density, self.regime_at_density(density))
    }

    /// Density at which the branch of the given regime carries `flow`.
    pub fn density_at_flow(&self, flow: f64, regime: Regime) -> Result<f64, TraflowError> {
        if !flow.is_finite() || flow < 0.0 || flow > self.capacity {
            return Err(TraflowError::invalid(format!(
                "flow {flow} is outside the diagram's range [0, {}]",
                self.capacity
            )));
        }
        Ok(self.branch(regime).density(flow))
    }

    /// Space-mean speed at `density`. An empty road travels at the maximum speed.
    pub fn speed_at_density(&self, density: f64) -> Result<f64, TraflowError> {
        let flow = self.flow_at(density)?;
        if density == 0.0 {
            Ok(self.maximum_speed())
        } else {
            Ok(flow / density)
        }
    }

    /// The flow a link at `density` wants to discharge (demand function).
    pub fn sending_flow(&self, density: f64) -> Result<f64, TraflowError> {
        self.check_density(density)?;
        match self.regime_at_density(density) {
            Regime::FreeFlow => Ok(self.free_flow.flow(density)),
            Regime::Congested => Ok(self.capacity),
        }
    }

    /// The flow a link at `density` can accept (supply function).
    pub fn receiving_flow(&self, density: f64) -> Result<f64, TraflowError> {
        self.check_density(density)?;
        match self.regime_at_density(density) {
            Regime::FreeFlow => Ok(self.capacity),
            Regime::Congested => Ok(self.congested.flow(density)),
        }
    }

    /// A copy of this diagram with a new jam density and both wave speeds unchanged.
    pub fn with_maximum_density(&self, maximum_density: f64) -> Result<Self, TraflowError> {
        Self::new(self.maximum_speed(), self.backward_wave_speed(), maximum_density)
    }

    /// A copy of this diagram with a new capacity, keeping maximum density and free-flow speed.
    pub fn with_capacity_flow(&self, capacity: f64) -> Result<Self, TraflowError> {
        Self::with_capacity(self.maximum_speed(), capacity, self.maximum_density)
    }

    /// Move the jam density, holding both wave speeds fixed.
    pub fn set_maximum_density(&mut self, maximum_density: f64) -> Result<(), TraflowError> {
        let updated = self.with_maximum_density(maximum_density)?;
        debug!(
            "Maximum density changed from {} to {}; capacity {} -> {}.",
            self.maximum_density, updated.maximum_density, self.capacity, updated.capacity
        );
        *self = updated;
        Ok(())
    }

    /// Recalibrate the capacity, holding maximum density and free-flow speed fixed.
    pub fn set_capacity(&mut self, capacity: f64) -> Result<(), TraflowError> {
        let updated = self.with_capacity_flow(capacity)?;
        debug!(
            "Capacity changed from {} to {}; backward wave speed {} -> {}.",
            self.capacity,
            updated.capacity,
            self.backward_wave_speed(),
            updated.backward_wave_speed()
        );
        *self = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{FundamentalDiagram, Regime, DEFAULT_MAXIMUM_DENSITY};
    use crate::TraflowError;
    use float_cmp::assert_approx_eq;

    const SPEED: f64 = 60.0;

    #[test]
    fn test_symmetric_diagram() {
        let fd = FundamentalDiagram::symmetric(SPEED).unwrap();

        assert_approx_eq!(f64, fd.maximum_density(), DEFAULT_MAXIMUM_DENSITY);
        assert_approx_eq!(f64, fd.critical_density(), DEFAULT_MAXIMUM_DENSITY / 2.0);
        assert_approx_eq!(f64, fd.capacity(), SPEED * DEFAULT_MAXIMUM_DENSITY / 2.0);
        assert_approx_eq!(f64, fd.maximum_speed(), SPEED);
        assert_approx_eq!(f64, fd.backward_wave_speed(), -SPEED);
    }

    #[test]
    fn test_asymmetric_diagram() {
        let fd = FundamentalDiagram::new(80.0, -20.0, 150.0).unwrap();

        assert_approx_eq!(f64, fd.critical_density(), 30.0, epsilon = 1e-9);
        assert_approx_eq!(f64, fd.capacity(), 2400.0, epsilon = 1e-9);
    }

    #[test]
    fn test_branch_boundary_values() {
        let fd = FundamentalDiagram::symmetric(SPEED).unwrap();
        let k = fd.maximum_density();

        assert_approx_eq!(f64, fd.congested_branch().flow(k), 0.0);
        assert_approx_eq!(f64, fd.free_flow_branch().density(0.0), 0.0);
        assert_approx_eq!(f64, fd.congested_branch().density(0.0), k);
        // Both branches agree at the critical density
        assert_approx_eq!(
            f64,
            fd.free_flow_branch().flow(fd.critical_density()),
            fd.congested_branch().flow(fd.critical_density())
        );
    }

    #[test]
    fn test_invalid_construction() {
        assert!(FundamentalDiagram::new(0.0, -10.0, 180.0).is_err());
        assert!(FundamentalDiagram::new(60.0, 10.0, 180.0).is_err());
        assert!(FundamentalDiagram::new(60.0, 0.0, 180.0).is_err());
        assert!(FundamentalDiagram::new(60.0, -10.0, -1.0).is_err());
        assert!(FundamentalDiagram::new(f64::NAN, -10.0, 180.0).is_err());
        assert!(FundamentalDiagram::with_capacity(60.0, 20000.0, 180.0).is_err());
    }

    #[test]
    fn test_flow_and_density_queries() {
        let fd = FundamentalDiagram::symmetric(SPEED).unwrap();

        assert_approx_eq!(f64, fd.flow_at_density(45.0, Regime::FreeFlow).unwrap(), 2700.0);
        assert_approx_eq!(f64, fd.flow_at_density(135.0, Regime::Congested).unwrap(), 2700.0);
        // Explicitly evaluating the other branch is allowed
        assert_approx_eq!(f64, fd.flow_at_density(45.0, Regime::Congested).unwrap(), 8100.0);
        assert_approx_eq!(f64, fd.flow_at(135.0).unwrap(), 2700.0);

        assert_approx_eq!(f64, fd.density_at_flow(2700.0, Regime::FreeFlow).unwrap(), 45.0);
        assert_approx_eq!(f64, fd.density_at_flow(2700.0, Regime::Congested).unwrap(), 135.0);
        assert_approx_eq!(f64, fd.density_at_flow(0.0, Regime::Congested).unwrap(), 180.0);

        assert!(matches!(
            fd.density_at_flow(fd.capacity() + 1.0, Regime::FreeFlow),
            Err(TraflowError::InvalidArgument(_))
        ));
        assert!(fd.density_at_flow(-1.0, Regime::FreeFlow).is_err());
        assert!(fd.flow_at_density(-1.0, Regime::FreeFlow).is_err());
        assert!(fd.flow_at_density(181.0, Regime::Congested).is_err());
    }

    #[test]
    fn test_regime_and_speed() {
        let fd = FundamentalDiagram::symmetric(SPEED).unwrap();

        assert_eq!(fd.regime_at_density(0.0), Regime::FreeFlow);
        assert_eq!(fd.regime_at_density(90.0), Regime::FreeFlow);
        assert_eq!(fd.regime_at_density(90.1), Regime::Congested);

        assert_approx_eq!(f64, fd.speed_at_density(0.0).unwrap(), SPEED);
        assert_approx_eq!(f64, fd.speed_at_density(45.0).unwrap(), SPEED);
        assert_approx_eq!(f64, fd.speed_at_density(135.0).unwrap(), 20.0);
        assert_approx_eq!(f64, fd.speed_at_density(180.0).unwrap(), 0.0);
    }

    #[test]
    fn test_sending_and_receiving_flows() {
        let fd = FundamentalDiagram::symmetric(SPEED).unwrap();

        assert_approx_eq!(f64, fd.sending_flow(30.0).unwrap(), 1800.0);
        assert_approx_eq!(f64, fd.sending_flow(150.0).unwrap(), fd.capacity());
        assert_approx_eq!(f64, fd.receiving_flow(30.0).unwrap(), fd.capacity());
        assert_approx_eq!(f64, fd.receiving_flow(150.0).unwrap(), 1800.0);
        assert_approx_eq!(f64, fd.receiving_flow(180.0).unwrap(), 0.0);
    }

    #[test]
    fn test_set_maximum_density() {
        let mut fd = FundamentalDiagram::symmetric(SPEED).unwrap();
        let original_capacity = fd.capacity();
        let k = fd.maximum_density();

        fd.set_maximum_density(k - 45.0).unwrap();

        assert_approx_eq!(f64, fd.maximum_density(), 135.0);
        assert_approx_eq!(f64, fd.capacity(), original_capacity * 0.75, epsilon = 1e-9);
        assert_approx_eq!(f64, fd.critical_density(), 67.5, epsilon = 1e-9);
        assert_approx_eq!(f64, fd.maximum_speed(), SPEED);
        assert_approx_eq!(f64, fd.backward_wave_speed().abs(), SPEED);
        assert_approx_eq!(f64, fd.congested_branch().flow(135.0), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_set_capacity() {
        let mut fd = FundamentalDiagram::symmetric(SPEED).unwrap();
        let k = fd.maximum_density();

        // Move away and back so the maximum density is restored to its original value
        fd.set_maximum_density(k - 45.0).unwrap();
        fd.set_maximum_density(k).unwrap();

        let new_capacity = 3600.0;
        fd.set_capacity(new_capacity).unwrap();

        let critical_density = new_capacity / SPEED;
        assert_approx_eq!(f64, fd.capacity(), new_capacity);
        assert_approx_eq!(f64, fd.critical_density(), critical_density);
        assert_approx_eq!(f64, fd.maximum_density(), k);
        assert_approx_eq!(f64, fd.maximum_speed(), SPEED);
        assert_approx_eq!(
            f64,
            fd.backward_wave_speed(),
            -new_capacity / (k - critical_density),
            epsilon = 1e-9
        );
        assert_approx_eq!(f64, fd.congested_branch().flow(k), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_set_capacity_is_idempotent() {
        let mut fd = FundamentalDiagram::new(90.0, -25.0, 160.0).unwrap();

        fd.set_capacity(2100.0).unwrap();
        let first = fd.clone();
        fd.set_capacity(2100.0).unwrap();

        assert_eq!(fd, first);
    }

    #[test]
    fn test_failed_mutation_leaves_diagram_unchanged() {
        let mut fd = FundamentalDiagram::symmetric(SPEED).unwrap();
        let original = fd.clone();

        assert!(fd.set_capacity(0.0).is_err());
        assert!(fd.set_capacity(-100.0).is_err());
        // Critical density would equal the maximum density
        assert!(fd.set_capacity(SPEED * DEFAULT_MAXIMUM_DENSITY).is_err());
        assert!(fd.set_maximum_density(0.0).is_err());
        assert!(fd.set_maximum_density(f64::NAN).is_err());

        assert_eq!(fd, original);
    }

    #[test]
    fn test_with_capacity_matches_set_capacity() {
        let mut fd = FundamentalDiagram::symmetric(SPEED).unwrap();
        fd.set_capacity(1800.0).unwrap();

        let direct = FundamentalDiagram::with_capacity(SPEED, 1800.0, DEFAULT_MAXIMUM_DENSITY).unwrap();
        assert_eq!(fd, direct);
    }
}
