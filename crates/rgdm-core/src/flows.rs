//! Estimated origin-destination flows.

use crate::statistics::mean_trip_length;
use crate::zone::ZoneId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Estimated flow for one friction record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub origin: ZoneId,
    pub destination: ZoneId,
    pub flow: f64,
    /// Travel time carried over from the friction record, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_time: Option<f64>,
}

/// Flow estimate, one record per input friction record and in the same order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowTable {
    records: Vec<FlowRecord>,
}

impl FlowTable {
    pub fn new(records: Vec<FlowRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[FlowRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlowRecord> {
        self.records.iter()
    }

    /// Flow for an ordered pair, `None` if the pair is not in the table.
    pub fn get(&self, origin: &ZoneId, destination: &ZoneId) -> Option<f64> {
        self.records
            .iter()
            .find(|r| &r.origin == origin && &r.destination == destination)
            .map(|r| r.flow)
    }

    pub fn total(&self) -> f64 {
        self.records.iter().map(|r| r.flow).sum()
    }

    /// Total outgoing flow per origin zone, in order of first appearance.
    pub fn row_sums(&self) -> IndexMap<ZoneId, f64> {
        let mut sums = IndexMap::new();
        for r in &self.records {
            *sums.entry(r.origin.clone()).or_insert(0.0) += r.flow;
        }
        sums
    }

    /// Total incoming flow per destination zone, in order of first appearance.
    pub fn column_sums(&self) -> IndexMap<ZoneId, f64> {
        let mut sums = IndexMap::new();
        for r in &self.records {
            *sums.entry(r.destination.clone()).or_insert(0.0) += r.flow;
        }
        sums
    }

    /// Flow-weighted mean travel time over records that carry a travel time.
    ///
    /// Returns `None` when no flow has a travel time attached.
    pub fn mean_trip_length(&self) -> Option<f64> {
        mean_trip_length(
            self.records
                .iter()
                .filter_map(|r| r.travel_time.map(|t| (r.flow, t))),
        )
    }
}
