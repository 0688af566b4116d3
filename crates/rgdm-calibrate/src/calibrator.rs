//! Search for the deterrence decay that reproduces an observed mean trip length.
//!
//! Each model evaluation derives friction from the trial decay, balances the
//! observed marginals over that friction and compares the modelled mean trip
//! length with the observed one:
//!
//! $$\epsilon = \frac{|\bar{t}_{model} - \bar{t}_{obs}|}{\bar{t}_{obs}}$$
//!
//! The search stops once $\epsilon$ drops below the calibration tolerance or
//! the evaluation budget is spent. Running out of evaluations is reported in
//! [`CalibrationResult::convergence`], never raised.

use crate::observed::ObservedTrips;
use crate::parameters::{CalibrationParameters, UpdateRule};
use rgdm_core::statistics::{coincidence_ratio, TripLengthDistribution};
use rgdm_core::{BalanceResult, Balancer, Convergence, DeterrenceFunction, FlowTable, RGDMResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

/// One model evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationStep {
    /// Decay parameter evaluated
    pub decay: f64,
    /// Modelled mean trip length, `None` if the model produced no flow
    pub mean_trip_length: Option<f64>,
    /// Relative error against the observed mean trip length
    pub relative_error: f64,
    /// Diagnostics of the balancing run behind this step
    pub balancing: Convergence,
}

/// Outcome of a calibration.
#[derive(Debug, Serialize, Deserialize)]
pub struct CalibrationResult {
    /// Deterrence function at the final decay
    pub deterrence: Box<dyn DeterrenceFunction>,
    /// Final decay parameter
    pub decay: f64,
    /// Flows of the final model evaluation
    pub flows: FlowTable,
    /// Calibration diagnostics; `achieved_error` is the relative mean trip length error
    pub convergence: Convergence,
    pub observed_mean_trip_length: f64,
    pub model_mean_trip_length: Option<f64>,
    /// Overlap of observed and modelled trip-length distributions
    pub coincidence_ratio: f64,
    pub history: Vec<CalibrationStep>,
}

/// Interval known to contain the calibrated decay.
///
/// `lower` produced trips that were too long and `upper` trips that were too short.
#[derive(Debug, Default, Clone, Copy)]
struct Bracket {
    lower: Option<f64>,
    upper: Option<f64>,
}

impl UpdateRule {
    fn next_decay(self, decay: f64, model: f64, observed: f64, bracket: &mut Bracket) -> f64 {
        match self {
            UpdateRule::Proportional => decay * model / observed,
            UpdateRule::Bisection => {
                if model > observed {
                    bracket.lower = Some(decay);
                } else {
                    bracket.upper = Some(decay);
                }
                match (bracket.lower, bracket.upper) {
                    (Some(lower), Some(upper)) => 0.5 * (lower + upper),
                    (Some(lower), None) => lower * 2.0,
                    (None, Some(upper)) => upper * 0.5,
                    (None, None) => decay,
                }
            }
        }
    }
}

/// Calibrates the decay parameter of a deterrence function.
#[derive(Debug, Clone)]
pub struct Calibrator {
    parameters: CalibrationParameters,
    balancer: Balancer,
}

impl Calibrator {
    pub fn new(parameters: CalibrationParameters) -> RGDMResult<Self> {
        parameters.validate()?;
        let balancer = Balancer::new(parameters.balancing())?;
        Ok(Self {
            parameters,
            balancer,
        })
    }

    pub fn parameters(&self) -> &CalibrationParameters {
        &self.parameters
    }

    /// Balance the observed marginals with `family` at the given decay.
    pub fn evaluate(
        &self,
        observed: &ObservedTrips,
        family: &dyn DeterrenceFunction,
        decay: f64,
    ) -> RGDMResult<BalanceResult> {
        let deterrence = family.with_decay(decay);
        let friction = observed.table().with_deterrence(deterrence.as_ref())?;
        self.balancer.balance(observed.zones(), &friction)
    }

    /// Calibrate the decay of `family` against `observed`.
    ///
    /// The search starts from `family.initial_decay` of the observed mean trip
    /// length, which for [`rgdm_core::Exponential`] is
    /// $\beta_0 = \sum T^{obs} / \sum T^{obs} t$. The decay `family` already
    /// carries is ignored.
    pub fn calibrate(
        &self,
        observed: &ObservedTrips,
        family: &dyn DeterrenceFunction,
    ) -> RGDMResult<CalibrationResult> {
        let _span = info_span!("calibration", rule = ?self.parameters.update_rule).entered();

        let target = observed.mean_trip_length();
        let tolerance = self.parameters.calibration_tolerance;
        let mut decay = family.initial_decay(target);
        let mut bracket = Bracket::default();
        let mut history = Vec::new();
        let mut converged = false;
        let mut last: Option<(f64, BalanceResult)> = None;

        info!(observed_mean = target, initial_decay = decay, "starting calibration");

        for iteration in 1..=self.parameters.calibration_max_iterations {
            let result = self.evaluate(observed, family, decay)?;
            let model = result.flows.mean_trip_length();
            let error = model.map_or(f64::INFINITY, |m| (m - target).abs() / target);

            debug!(iteration, decay, ?model, error, "calibration step");
            history.push(CalibrationStep {
                decay,
                mean_trip_length: model,
                relative_error: error,
                balancing: result.convergence,
            });
            last = Some((decay, result));

            let Some(model) = model else {
                warn!(decay, "model produced no flow; stopping calibration");
                break;
            };
            if error < tolerance {
                converged = true;
                break;
            }

            let next = self
                .parameters
                .update_rule
                .next_decay(decay, model, target, &mut bracket);
            if !(next.is_finite() && next > 0.0) {
                warn!(decay, next, "decay left the positive range; stopping calibration");
                break;
            }
            decay = next;
        }

        // At least one evaluation always runs
        let (decay, result) = match last {
            Some(last) => last,
            None => (decay, self.evaluate(observed, family, decay)?),
        };
        let final_error = history.last().map_or(f64::INFINITY, |s| s.relative_error);
        let convergence = Convergence {
            iterations: history.len(),
            converged,
            achieved_error: final_error,
        };

        if converged {
            info!(
                iterations = convergence.iterations,
                decay,
                error = final_error,
                "calibration converged"
            );
        } else {
            warn!(
                iterations = convergence.iterations,
                decay,
                error = final_error,
                tolerance,
                "calibration did not converge; returning best estimate"
            );
        }

        let bin_width = self.parameters.tld_bin_width;
        let observed_tld = observed.trip_length_distribution(bin_width)?;
        let model_tld = TripLengthDistribution::from_pairs(
            result
                .flows
                .iter()
                .filter_map(|r| r.travel_time.map(|t| (r.flow, t))),
            bin_width,
        )?;

        Ok(CalibrationResult {
            deterrence: family.with_decay(decay),
            decay,
            model_mean_trip_length: result.flows.mean_trip_length(),
            flows: result.flows,
            convergence,
            observed_mean_trip_length: target,
            coincidence_ratio: coincidence_ratio(&observed_tld, &model_tld)?,
            history,
        })
    }
}
