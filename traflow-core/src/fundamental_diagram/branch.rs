use crate::TraflowError;

/// One linear regime of a fundamental diagram.
///
/// The branch is the line `flow = slope * density + intercept`. Its slope is the characteristic
/// wave speed of the regime: positive on the free-flow branch and negative on the congested branch.
/// Branches are immutable; a diagram that is reconfigured builds new branches.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Branch {
    slope: f64,
    intercept: f64,
}

impl Branch {
    pub fn new(slope: f64, intercept: f64) -> Result<Self, TraflowError> {
        if !slope.is_finite() || !intercept.is_finite() {
            return Err(TraflowError::invalid(format!(
                "branch coefficients must be finite (slope: {slope}, intercept: {intercept})"
            )));
        }
        if slope == 0.0 {
            return Err(TraflowError::invalid("branch slope must be non-zero"));
        }
        Ok(Self { slope, intercept })
    }

    /// The line with the given `slope` passing through `(density, flow)`.
    pub fn through_point(slope: f64, density: f64, flow: f64) -> Result<Self, TraflowError> {
        Self::new(slope, flow - slope * density)
    }

    pub fn flow(&self, density: f64) -> f64 {
        self.slope * density + self.intercept
    }

    pub fn density(&self, flow: f64) -> f64 {
        (flow - self.intercept) / self.slope
    }

    /// Characteristic wave speed of this regime.
    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn density_at_zero_flow(&self) -> f64 {
        self.density(0.0)
    }

    /// Density at which this branch and `other` carry the same flow.
    ///
    /// Returns `None` for parallel branches.
    pub fn intersection(&self, other: &Branch) -> Option<f64> {
        let denominator = self.slope - other.slope;
        if denominator == 0.0 {
            None
        } else {
            Some((other.intercept - self.intercept) / denominator)
        }
    }
}
