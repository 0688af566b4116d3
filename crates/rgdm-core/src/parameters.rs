//! Balancing parameters.

use crate::errors::RGDMResult;
use crate::validation::{ensure_iterations, ensure_tolerance};
use serde::{Deserialize, Serialize};

/// Parameters controlling the Furness balancing loop.
///
/// The loop stops once the largest relative deviation of any row or column
/// sum from its target total drops below `tolerance`:
///
/// $$\max\left(\max_i \frac{|\sum_j T_{ij} - O_i|}{O_i}, \max_j \frac{|\sum_i T_{ij} - D_j|}{D_j}\right) < \varepsilon$$
///
/// or after `max_iterations` sweeps, whichever comes first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancingParameters {
    /// Convergence tolerance on the maximum relative marginal error.
    ///
    /// Default: 1e-3
    pub tolerance: f64,

    /// Maximum number of balancing sweeps (one `A` update plus one `B` update).
    ///
    /// Default: 100
    pub max_iterations: usize,
}

impl Default for BalancingParameters {
    fn default() -> Self {
        Self {
            tolerance: 1e-3,
            max_iterations: 100,
        }
    }
}

impl BalancingParameters {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }

    /// Reject a non-positive tolerance or iteration cap.
    pub fn validate(&self) -> RGDMResult<()> {
        ensure_tolerance("tolerance", self.tolerance)?;
        ensure_iterations("max_iterations", self.max_iterations)
    }
}
