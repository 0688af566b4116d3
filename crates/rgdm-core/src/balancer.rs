//! Doubly-constrained gravity distribution by iterative proportional fitting.
//!
//! # Model
//!
//! The flow between origin $i$ and destination $j$ is
//!
//! $$T_{ij} = A_i O_i B_j D_j F_{ij}$$
//!
//! where $O_i$ and $D_j$ are the production and attraction totals, $F_{ij}$
//! is the friction of the pair and $A_i$, $B_j$ are balancing factors:
//!
//! $$A_i = \frac{1}{\sum_j B_j D_j F_{ij}} \qquad B_j = \frac{1}{\sum_i A_i O_i F_{ij}}$$
//!
//! # Algorithm
//!
//! Starting from $B_j = 1$ each sweep updates every $A_i$ from the current
//! $B$, then every $B_j$ from the new $A$, and measures the largest relative
//! deviation of a row or column sum from its target. Sums only run over the
//! pairs present in the friction table.
//!
//! A factor whose denominator is zero is set to zero instead of dividing. The
//! zone then carries no flow and is left out of the deviation measure.
//!
//! Running out of iterations is not an error: the best estimate is returned
//! with [`Convergence::converged`] set to `false`.

use crate::errors::{RGDMError, RGDMResult};
use crate::flows::{FlowRecord, FlowTable};
use crate::friction::FrictionTable;
use crate::network::Network;
use crate::parameters::BalancingParameters;
use crate::validation::ensure_nonnegative;
use crate::zone::{ZoneId, ZoneTotals};
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Diagnostics of an iterative run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Convergence {
    /// Number of iterations performed
    pub iterations: usize,
    /// Whether the tolerance was met within the iteration cap
    pub converged: bool,
    /// Error measure after the final iteration
    pub achieved_error: f64,
}

/// Final balancing factors of a run, keyed by zone.
///
/// Only zones present in the friction table appear. Passing these back to
/// [`Balancer::balance_from`] warm-starts a follow-up run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BalancingFactors {
    /// Origin-side factors $A_i$
    pub origin: IndexMap<ZoneId, f64>,
    /// Destination-side factors $B_j$
    pub destination: IndexMap<ZoneId, f64>,
}

/// Output of a balancing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceResult {
    pub flows: FlowTable,
    pub convergence: Convergence,
    pub factors: BalancingFactors,
}

/// Furness balancer for the doubly-constrained gravity model.
///
/// A balancer holds only its parameters, so one instance can be shared across
/// threads and reused for independent runs. It (de)serialises as its
/// parameters, which are validated on the way in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "BalancingParameters", into = "BalancingParameters")]
pub struct Balancer {
    parameters: BalancingParameters,
}

impl TryFrom<BalancingParameters> for Balancer {
    type Error = RGDMError;

    fn try_from(parameters: BalancingParameters) -> RGDMResult<Self> {
        Self::new(parameters)
    }
}

impl From<Balancer> for BalancingParameters {
    fn from(balancer: Balancer) -> Self {
        balancer.parameters
    }
}

impl Balancer {
    /// Create a balancer, rejecting a non-positive tolerance or iteration cap.
    pub fn new(parameters: BalancingParameters) -> RGDMResult<Self> {
        parameters.validate()?;
        Ok(Self { parameters })
    }

    pub fn parameters(&self) -> &BalancingParameters {
        &self.parameters
    }

    /// Distribute trips over the pairs of `friction`, starting from $B_j = 1$.
    ///
    /// Every friction record gets exactly one flow record, in the same order.
    /// Fails only if a record names a zone missing from `zones`.
    pub fn balance(
        &self,
        zones: &ZoneTotals,
        friction: &FrictionTable,
    ) -> RGDMResult<BalanceResult> {
        let network = Network::new(zones, friction)?;
        let b = vec![1.0; network.destinations.len()];
        Ok(self.run(&network, friction, b))
    }

    /// Like [`Balancer::balance`], but starting from the destination factors in `initial`.
    ///
    /// Destinations without an initial factor start at 1.
    pub fn balance_from(
        &self,
        zones: &ZoneTotals,
        friction: &FrictionTable,
        initial: &BalancingFactors,
    ) -> RGDMResult<BalanceResult> {
        let network = Network::new(zones, friction)?;
        let b = network
            .destinations
            .keys()
            .map(|zone| -> RGDMResult<f64> {
                let factor = initial.destination.get(zone).copied().unwrap_or(1.0);
                ensure_nonnegative("destination factor", factor, &format!("zone {}", zone))?;
                Ok(factor)
            })
            .collect::<RGDMResult<Vec<f64>>>()?;
        Ok(self.run(&network, friction, b))
    }

    fn run(&self, network: &Network, friction: &FrictionTable, mut b: Vec<f64>) -> BalanceResult {
        let tolerance = self.parameters.tolerance;
        warn_on_total_mismatch(network, tolerance);

        let mut a = vec![0.0; network.origins.len()];
        let mut flows = vec![0.0; network.n_records()];
        let mut convergence = Convergence {
            iterations: 0,
            converged: false,
            achieved_error: f64::INFINITY,
        };

        for iteration in 1..=self.parameters.max_iterations {
            // The B update needs every A, so the two phases stay separate
            a = origin_factors(network, &b);
            b = destination_factors(network, &a);
            compute_flows(network, &a, &b, &mut flows);

            let error = max_marginal_error(network, &a, &b, &flows);
            debug!(iteration, error, "balancing sweep");

            convergence.iterations = iteration;
            convergence.achieved_error = error;
            if error < tolerance {
                convergence.converged = true;
                break;
            }
        }

        if convergence.converged {
            info!(
                iterations = convergence.iterations,
                error = convergence.achieved_error,
                "balancing converged"
            );
        } else {
            warn!(
                iterations = convergence.iterations,
                error = convergence.achieved_error,
                tolerance,
                "balancing did not converge; returning best estimate"
            );
        }

        let records = friction
            .iter()
            .zip(&flows)
            .map(|(record, &flow)| FlowRecord {
                origin: record.origin.clone(),
                destination: record.destination.clone(),
                flow,
                travel_time: record.travel_time,
            })
            .collect();

        let factors = BalancingFactors {
            origin: network
                .origins
                .keys()
                .cloned()
                .zip(a.iter().copied())
                .collect(),
            destination: network
                .destinations
                .keys()
                .cloned()
                .zip(b.iter().copied())
                .collect(),
        };

        BalanceResult {
            flows: FlowTable::new(records),
            convergence,
            factors,
        }
    }
}

/// $1/x$, or zero when the reciprocal is not finite.
fn reciprocal_or_zero(sum: f64) -> f64 {
    if sum > 0.0 {
        let r = 1.0 / sum;
        if r.is_finite() {
            return r;
        }
    }
    0.0
}

fn origin_factors(network: &Network, b: &[f64]) -> Vec<f64> {
    network
        .by_origin
        .par_iter()
        .map(|records| {
            let sum: f64 = records
                .iter()
                .map(|&r| {
                    let j = network.record_destination[r];
                    b[j] * network.attractions[j] * network.friction[r]
                })
                .sum();
            reciprocal_or_zero(sum)
        })
        .collect()
}

fn destination_factors(network: &Network, a: &[f64]) -> Vec<f64> {
    network
        .by_destination
        .par_iter()
        .map(|records| {
            let sum: f64 = records
                .iter()
                .map(|&r| {
                    let i = network.record_origin[r];
                    a[i] * network.productions[i] * network.friction[r]
                })
                .sum();
            reciprocal_or_zero(sum)
        })
        .collect()
}

fn compute_flows(network: &Network, a: &[f64], b: &[f64], flows: &mut [f64]) {
    flows.par_iter_mut().enumerate().for_each(|(r, flow)| {
        let i = network.record_origin[r];
        let j = network.record_destination[r];
        *flow = a[i] * network.productions[i] * b[j] * network.attractions[j] * network.friction[r];
    });
}

/// Largest relative deviation of a row or column sum from its target.
///
/// Zones with a zero target or a zero (degenerate) factor are skipped.
fn max_marginal_error(network: &Network, a: &[f64], b: &[f64], flows: &[f64]) -> f64 {
    let deviation = |records: &[usize], target: f64| {
        let sum: f64 = records.iter().map(|&r| flows[r]).sum();
        (sum - target).abs() / target
    };

    let row_error = network
        .by_origin
        .par_iter()
        .enumerate()
        .filter(|(i, _)| network.productions[*i] > 0.0 && a[*i] > 0.0)
        .map(|(i, records)| deviation(records.as_slice(), network.productions[i]))
        .reduce(|| 0.0, f64::max);

    let column_error = network
        .by_destination
        .par_iter()
        .enumerate()
        .filter(|(j, _)| network.attractions[*j] > 0.0 && b[*j] > 0.0)
        .map(|(j, records)| deviation(records.as_slice(), network.attractions[j]))
        .reduce(|| 0.0, f64::max);

    row_error.max(column_error)
}

fn warn_on_total_mismatch(network: &Network, tolerance: f64) {
    let production: f64 = network.productions.iter().sum();
    let attraction: f64 = network.attractions.iter().sum();
    let scale = production.max(attraction);
    if scale > 0.0 && (production - attraction).abs() / scale > tolerance {
        warn!(
            production,
            attraction, "total production and attraction differ; marginals cannot both be met"
        );
    }
}
