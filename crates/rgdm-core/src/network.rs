//! Sparse indexed view of a friction table against a set of zone totals.
//!
//! The balancer never builds a dense matrix. Instead each friction record is
//! addressed by position, and two groupings map every origin (destination)
//! slot to the records leaving (entering) it. Zones that appear in the zone
//! totals but in no friction record get no slot and produce no flow.

use crate::errors::{RGDMError, RGDMResult};
use crate::friction::FrictionTable;
use crate::zone::{ZoneId, ZoneTotals};
use indexmap::IndexMap;

#[derive(Debug, Clone)]
pub(crate) struct Network {
    /// Origin zones in order of first appearance in the friction table
    pub origins: IndexMap<ZoneId, usize>,
    /// Destination zones in order of first appearance in the friction table
    pub destinations: IndexMap<ZoneId, usize>,
    /// Production total per origin slot
    pub productions: Vec<f64>,
    /// Attraction total per destination slot
    pub attractions: Vec<f64>,
    /// Origin slot of each record
    pub record_origin: Vec<usize>,
    /// Destination slot of each record
    pub record_destination: Vec<usize>,
    pub friction: Vec<f64>,
    /// Record positions grouped by origin slot
    pub by_origin: Vec<Vec<usize>>,
    /// Record positions grouped by destination slot
    pub by_destination: Vec<Vec<usize>>,
}

impl Network {
    pub fn new(zones: &ZoneTotals, table: &FrictionTable) -> RGDMResult<Self> {
        let n_records = table.len();
        let mut network = Self {
            origins: IndexMap::new(),
            destinations: IndexMap::new(),
            productions: Vec::new(),
            attractions: Vec::new(),
            record_origin: Vec::with_capacity(n_records),
            record_destination: Vec::with_capacity(n_records),
            friction: Vec::with_capacity(n_records),
            by_origin: Vec::new(),
            by_destination: Vec::new(),
        };

        for (position, record) in table.iter().enumerate() {
            let origin_zone = zones
                .get(&record.origin)
                .ok_or_else(|| RGDMError::UnknownZone(record.origin.to_string()))?;
            let destination_zone = zones
                .get(&record.destination)
                .ok_or_else(|| RGDMError::UnknownZone(record.destination.to_string()))?;

            let next = network.origins.len();
            let i = *network.origins.entry(record.origin.clone()).or_insert(next);
            if i == next {
                network.productions.push(origin_zone.production);
                network.by_origin.push(Vec::new());
            }

            let next = network.destinations.len();
            let j = *network
                .destinations
                .entry(record.destination.clone())
                .or_insert(next);
            if j == next {
                network.attractions.push(destination_zone.attraction);
                network.by_destination.push(Vec::new());
            }

            network.record_origin.push(i);
            network.record_destination.push(j);
            network.friction.push(record.friction);
            network.by_origin[i].push(position);
            network.by_destination[j].push(position);
        }

        Ok(network)
    }

    pub fn n_records(&self) -> usize {
        self.friction.len()
    }
}
