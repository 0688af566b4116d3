//! Observed trips: the calibration target.

use rgdm_core::statistics::{mean_trip_length, TripLengthDistribution};
use rgdm_core::{FrictionRecord, FrictionTable, RGDMError, RGDMResult, Zone, ZoneId, ZoneTotals};
use std::collections::HashMap;

/// Observed flows and travel times for a set of zone pairs.
///
/// Every record must carry both an observed flow and a travel time. Zone totals
/// are derived from the observed flows so the model is compared under the
/// same marginals:
///
/// $$O_i = \sum_j T^{obs}_{ij} \qquad D_j = \sum_i T^{obs}_{ij}$$
#[derive(Debug, Clone)]
pub struct ObservedTrips {
    table: FrictionTable,
    zones: ZoneTotals,
    total_flow: f64,
    mean_trip_length: f64,
}

fn missing(field: &str, record: &FrictionRecord) -> RGDMError {
    RGDMError::InvalidValue {
        field: field.to_string(),
        value: "missing".to_string(),
        context: format!("pair {} -> {}", record.origin, record.destination),
    }
}

impl ObservedTrips {
    pub fn new(table: FrictionTable) -> RGDMResult<Self> {
        if table.is_empty() {
            return Err(RGDMError::EmptyInput("no observed trips".to_string()));
        }

        let mut order: Vec<ZoneId> = Vec::new();
        let mut productions: HashMap<ZoneId, f64> = HashMap::new();
        let mut attractions: HashMap<ZoneId, f64> = HashMap::new();
        let mut pairs = Vec::with_capacity(table.len());

        for record in table.iter() {
            let flow = record
                .observed_flow
                .ok_or_else(|| missing("observed_flow", record))?;
            let t = record.travel_time.ok_or_else(|| missing("travel_time", record))?;
            pairs.push((flow, t));

            for zone in [&record.origin, &record.destination] {
                if !productions.contains_key(zone) {
                    order.push(zone.clone());
                    productions.insert(zone.clone(), 0.0);
                    attractions.insert(zone.clone(), 0.0);
                }
            }
            *productions.entry(record.origin.clone()).or_insert(0.0) += flow;
            *attractions.entry(record.destination.clone()).or_insert(0.0) += flow;
        }

        let total_flow: f64 = pairs.iter().map(|(flow, _)| flow).sum();
        if total_flow <= 0.0 {
            return Err(RGDMError::EmptyInput("observed flows sum to zero".to_string()));
        }

        let mean_trip_length = mean_trip_length(pairs).unwrap_or(0.0);
        if mean_trip_length <= 0.0 {
            return Err(RGDMError::InvalidValue {
                field: "travel_time".to_string(),
                value: mean_trip_length.to_string(),
                context: "observed mean trip length must be positive".to_string(),
            });
        }

        let zones = ZoneTotals::new(
            order
                .into_iter()
                .map(|id| Zone::new(id.clone(), productions[&id], attractions[&id])),
        )?;

        Ok(Self {
            table,
            zones,
            total_flow,
            mean_trip_length,
        })
    }

    pub fn table(&self) -> &FrictionTable {
        &self.table
    }

    /// Zone totals derived from the observed row and column sums.
    pub fn zones(&self) -> &ZoneTotals {
        &self.zones
    }

    pub fn total_flow(&self) -> f64 {
        self.total_flow
    }

    /// Flow-weighted mean observed travel time.
    pub fn mean_trip_length(&self) -> f64 {
        self.mean_trip_length
    }

    /// $\beta_0 = \sum T^{obs} / \sum T^{obs} t$, the reciprocal of the mean trip length.
    pub fn initial_beta(&self) -> f64 {
        1.0 / self.mean_trip_length
    }

    pub fn trip_length_distribution(&self, bin_width: f64) -> RGDMResult<TripLengthDistribution> {
        TripLengthDistribution::from_pairs(
            self.table.iter().filter_map(|r| match (r.observed_flow, r.travel_time) {
                (Some(flow), Some(t)) => Some((flow, t)),
                _ => None,
            }),
            bin_width,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::BTreeMap;

    fn record(o: &str, d: &str, flow: f64, t: f64) -> FrictionRecord {
        FrictionRecord::new(o, d, 1.0)
            .with_observed_flow(flow)
            .with_travel_time(t)
    }

    #[test]
    fn test_initial_beta() {
        let observed = ObservedTrips::new(
            FrictionTable::new(vec![record("a", "a", 10.0, 10.0), record("a", "b", 10.0, 15.0)])
                .unwrap(),
        )
        .unwrap();

        assert_relative_eq!(observed.mean_trip_length(), 12.5);
        assert_relative_eq!(observed.initial_beta(), 0.08, max_relative = 1e-12);
        assert_eq!(observed.total_flow(), 20.0);
    }

    #[test]
    fn test_derived_marginals() {
        let observed = ObservedTrips::new(
            FrictionTable::new(vec![
                record("a", "a", 30.0, 10.0),
                record("a", "b", 10.0, 20.0),
                record("b", "a", 5.0, 20.0),
            ])
            .unwrap(),
        )
        .unwrap();

        let zones = observed.zones();
        let ids: Vec<&str> = zones.iter().map(|z| z.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let a = zones.get(&ZoneId::from("a")).unwrap();
        assert_eq!((a.production, a.attraction), (40.0, 35.0));
        let b = zones.get(&ZoneId::from("b")).unwrap();
        assert_eq!((b.production, b.attraction), (5.0, 10.0));
    }

    #[test]
    fn test_rejects_incomplete_input() {
        let empty = ObservedTrips::new(FrictionTable::default());
        assert!(matches!(empty, Err(RGDMError::EmptyInput(_))));

        let no_flow =
            FrictionTable::new(vec![FrictionRecord::new("a", "b", 1.0).with_travel_time(5.0)])
                .unwrap();
        let err = ObservedTrips::new(no_flow).unwrap_err();
        assert!(
            matches!(err, RGDMError::InvalidValue { ref field, .. } if field == "observed_flow")
        );

        let no_time =
            FrictionTable::new(vec![FrictionRecord::new("a", "b", 1.0).with_observed_flow(5.0)])
                .unwrap();
        assert!(ObservedTrips::new(no_time).is_err());

        let zero = FrictionTable::new(vec![record("a", "b", 0.0, 5.0)]).unwrap();
        assert!(matches!(ObservedTrips::new(zero), Err(RGDMError::EmptyInput(_))));

        let instant = FrictionTable::new(vec![record("a", "a", 5.0, 0.0)]).unwrap();
        assert!(ObservedTrips::new(instant).is_err());
    }

    #[test]
    fn test_trip_length_distribution() {
        let observed = ObservedTrips::new(
            FrictionTable::new(vec![record("a", "a", 30.0, 2.0), record("a", "b", 10.0, 12.0)])
                .unwrap(),
        )
        .unwrap();
        let tld = observed.trip_length_distribution(5.0).unwrap();
        assert_eq!(tld.shares, BTreeMap::from([(0, 0.75), (2, 0.25)]));
    }
}
