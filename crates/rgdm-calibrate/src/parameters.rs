//! Calibration parameters.

use rgdm_core::{BalancingParameters, RGDMError, RGDMResult};
use serde::{Deserialize, Serialize};

/// How the decay parameter is adjusted between model evaluations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateRule {
    /// Scale the decay by the ratio of modelled to observed mean trip length.
    ///
    /// $$\beta_{k+1} = \beta_k \frac{\bar{t}_{model}}{\bar{t}_{obs}}$$
    #[default]
    Proportional,

    /// Bracket the root of $\bar{t}_{model}(\beta) - \bar{t}_{obs}$ by doubling or
    /// halving the starting decay, then bisect the bracket.
    Bisection,
}

/// Parameters for [`crate::Calibrator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationParameters {
    /// Tolerance passed to the balancer on every model evaluation.
    ///
    /// Default: 1e-6
    pub balancing_tolerance: f64,

    /// Iteration cap passed to the balancer on every model evaluation.
    ///
    /// Default: 1000
    pub balancing_max_iterations: usize,

    /// Relative error in mean trip length at which calibration stops.
    ///
    /// Default: 0.01
    pub calibration_tolerance: f64,

    /// Maximum number of model evaluations.
    ///
    /// Default: 50
    pub calibration_max_iterations: usize,

    /// Default: [`UpdateRule::Proportional`]
    pub update_rule: UpdateRule,

    /// Bin width of the trip-length distributions compared in the report.
    ///
    /// Default: 5.0
    pub tld_bin_width: f64,
}

impl Default for CalibrationParameters {
    fn default() -> Self {
        Self {
            balancing_tolerance: 1e-6,
            balancing_max_iterations: 1000,
            calibration_tolerance: 0.01,
            calibration_max_iterations: 50,
            update_rule: UpdateRule::Proportional,
            tld_bin_width: 5.0,
        }
    }
}

fn ensure_positive(name: &str, value: f64) -> RGDMResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(RGDMError::invalid_parameter(
            name,
            format!("must be a positive number, got {}", value),
        ))
    }
}

impl CalibrationParameters {
    pub fn with_update_rule(mut self, update_rule: UpdateRule) -> Self {
        self.update_rule = update_rule;
        self
    }

    /// Balancer parameters used for each model evaluation.
    pub fn balancing(&self) -> BalancingParameters {
        BalancingParameters::new(self.balancing_tolerance, self.balancing_max_iterations)
    }

    pub fn validate(&self) -> RGDMResult<()> {
        ensure_positive("balancing_tolerance", self.balancing_tolerance)?;
        if self.balancing_max_iterations == 0 {
            return Err(RGDMError::invalid_parameter(
                "balancing_max_iterations",
                "must be at least 1",
            ));
        }
        ensure_positive("calibration_tolerance", self.calibration_tolerance)?;
        if self.calibration_max_iterations == 0 {
            return Err(RGDMError::invalid_parameter(
                "calibration_max_iterations",
                "must be at least 1",
            ));
        }
        ensure_positive("tld_bin_width", self.tld_bin_width)
    }
}
