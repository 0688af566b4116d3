//! Trip-length statistics used to compare modelled and observed flows.

use crate::errors::{RGDMError, RGDMResult};
use crate::validation::ensure_tolerance;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Flow-weighted mean travel time of `(flow, travel_time)` pairs.
///
/// $$\bar{t} = \frac{\sum_{ij} T_{ij} t_{ij}}{\sum_{ij} T_{ij}}$$
///
/// Returns `None` if the total flow is zero.
pub fn mean_trip_length(pairs: impl IntoIterator<Item = (f64, f64)>) -> Option<f64> {
    let (weighted, total) = pairs
        .into_iter()
        .fold((0.0, 0.0), |(weighted, total), (flow, t)| {
            (weighted + flow * t, total + flow)
        });
    if total > 0.0 {
        Some(weighted / total)
    } else {
        None
    }
}

/// Share of total flow falling in each travel-time bin.
///
/// Bin `k` covers `[k * bin_width, (k + 1) * bin_width)`. Only bins that
/// received a pair are stored. Times beyond `u64::MAX` bins share the last bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripLengthDistribution {
    pub bin_width: f64,
    pub shares: BTreeMap<u64, f64>,
}

impl TripLengthDistribution {
    /// Bin `(flow, travel_time)` pairs.
    ///
    /// With zero total flow every share is zero.
    pub fn from_pairs(
        pairs: impl IntoIterator<Item = (f64, f64)>,
        bin_width: f64,
    ) -> RGDMResult<Self> {
        ensure_tolerance("bin_width", bin_width)?;

        let mut shares: BTreeMap<u64, f64> = BTreeMap::new();
        for (flow, t) in pairs {
            // Float to int casts saturate
            let bin = (t / bin_width).floor().max(0.0) as u64;
            *shares.entry(bin).or_insert(0.0) += flow;
        }

        let total: f64 = shares.values().sum();
        if total > 0.0 {
            shares.values_mut().for_each(|s| *s /= total);
        }
        Ok(Self { bin_width, shares })
    }

    /// Share of bin `k`, zero for empty bins.
    pub fn share(&self, k: u64) -> f64 {
        self.shares.get(&k).copied().unwrap_or(0.0)
    }

    /// Upper edge of the last occupied bin.
    pub fn max_travel_time(&self) -> f64 {
        self.shares
            .keys()
            .next_back()
            .map_or(0.0, |&k| (k as f64 + 1.0) * self.bin_width)
    }
}

/// Overlap of two trip-length distributions.
///
/// $$CR = \frac{\sum_k \min(p_k, q_k)}{\sum_k \max(p_k, q_k)}$$
///
/// 1 for identical distributions, 0 for disjoint ones. Both distributions must
/// use the same bin width; a bin missing from one side counts as empty.
pub fn coincidence_ratio(
    a: &TripLengthDistribution,
    b: &TripLengthDistribution,
) -> RGDMResult<f64> {
    if (a.bin_width - b.bin_width).abs() > f64::EPSILON * a.bin_width.max(b.bin_width) {
        return Err(RGDMError::invalid_parameter(
            "bin_width",
            format!(
                "distributions use different bin widths ({} and {})",
                a.bin_width, b.bin_width
            ),
        ));
    }

    let bins: BTreeSet<u64> = a.shares.keys().chain(b.shares.keys()).copied().collect();
    let (overlap, union) = bins.into_iter().fold((0.0, 0.0), |(overlap, union), k| {
        let (p, q) = (a.share(k), b.share(k));
        (overlap + p.min(q), union + p.max(q))
    });

    if union > 0.0 {
        Ok(overlap / union)
    } else {
        Ok(1.0)
    }
}
