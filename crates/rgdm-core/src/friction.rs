//! Friction records: the set of reachable origin-destination pairs.

use crate::deterrence::DeterrenceFunction;
use crate::errors::{RGDMError, RGDMResult};
use crate::validation::ensure_nonnegative;
use crate::zone::ZoneId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One reachable ordered zone pair.
///
/// `travel_time` and `observed_flow` are optional and only read by the calibrator
/// and the trip statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrictionRecord {
    pub origin: ZoneId,
    pub destination: ZoneId,
    pub friction: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_flow: Option<f64>,
}

impl FrictionRecord {
    pub fn new(origin: impl Into<ZoneId>, destination: impl Into<ZoneId>, friction: f64) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            friction,
            travel_time: None,
            observed_flow: None,
        }
    }

    pub fn with_travel_time(mut self, travel_time: f64) -> Self {
        self.travel_time = Some(travel_time);
        self
    }

    pub fn with_observed_flow(mut self, observed_flow: f64) -> Self {
        self.observed_flow = Some(observed_flow);
        self
    }

    fn validate(&self) -> RGDMResult<()> {
        let context = format!("pair {} -> {}", self.origin, self.destination);
        ensure_nonnegative("friction", self.friction, &context)?;
        if let Some(t) = self.travel_time {
            ensure_nonnegative("travel_time", t, &context)?;
        }
        if let Some(flow) = self.observed_flow {
            ensure_nonnegative("observed_flow", flow, &context)?;
        }
        Ok(())
    }
}

/// Validated friction table.
///
/// Pairs are unique. Pairs without a record are unreachable and never
/// receive flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FrictionRecord>", into = "Vec<FrictionRecord>")]
pub struct FrictionTable {
    records: Vec<FrictionRecord>,
}

impl FrictionTable {
    pub fn new(records: Vec<FrictionRecord>) -> RGDMResult<Self> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            record.validate()?;
            if !seen.insert((&record.origin, &record.destination)) {
                return Err(RGDMError::DuplicatePair {
                    origin: record.origin.to_string(),
                    destination: record.destination.to_string(),
                });
            }
        }
        Ok(Self { records })
    }

    /// Build a table from a dense row-major friction matrix over zones named `"0"`, `"1"`, ...
    ///
    /// Every cell becomes a record, including zeros.
    pub fn from_matrix(matrix: &[Vec<f64>]) -> RGDMResult<Self> {
        let records = matrix
            .iter()
            .enumerate()
            .flat_map(|(i, row)| {
                row.iter()
                    .enumerate()
                    .map(move |(j, &f)| FrictionRecord::new(i.to_string(), j.to_string(), f))
            })
            .collect();
        Self::new(records)
    }

    /// Recompute every friction value from the record's travel time.
    ///
    /// Fails if any record lacks a travel time.
    pub fn with_deterrence(&self, deterrence: &dyn DeterrenceFunction) -> RGDMResult<Self> {
        let records = self
            .records
            .iter()
            .map(|r| -> RGDMResult<FrictionRecord> {
                let t = r.travel_time.ok_or_else(|| RGDMError::InvalidValue {
                    field: "travel_time".to_string(),
                    value: "missing".to_string(),
                    context: format!("pair {} -> {}", r.origin, r.destination),
                })?;
                Ok(FrictionRecord {
                    friction: deterrence.evaluate(t),
                    ..r.clone()
                })
            })
            .collect::<RGDMResult<Vec<_>>>()?;
        Self::new(records)
    }

    pub fn records(&self) -> &[FrictionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrictionRecord> {
        self.records.iter()
    }
}

impl TryFrom<Vec<FrictionRecord>> for FrictionTable {
    type Error = RGDMError;

    fn try_from(value: Vec<FrictionRecord>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FrictionTable> for Vec<FrictionRecord> {
    fn from(value: FrictionTable) -> Self {
        value.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deterrence::Exponential;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_matrix() {
        let table = FrictionTable::from_matrix(&[vec![1.0, 0.5], vec![0.5, 1.0]]).unwrap();
        assert_eq!(table.len(), 4);
        let r = &table.records()[1];
        assert_eq!(r.origin.as_str(), "0");
        assert_eq!(r.destination.as_str(), "1");
        assert_eq!(r.friction, 0.5);
    }

    #[test]
    fn test_rejects_duplicates_and_negatives() {
        let dup = FrictionTable::new(vec![
            FrictionRecord::new("a", "b", 1.0),
            FrictionRecord::new("a", "b", 2.0),
        ]);
        assert!(matches!(dup, Err(RGDMError::DuplicatePair { .. })));

        // Reverse direction is a different pair
        assert!(FrictionTable::new(vec![
            FrictionRecord::new("a", "b", 1.0),
            FrictionRecord::new("b", "a", 1.0),
        ])
        .is_ok());

        let negative = FrictionTable::new(vec![FrictionRecord::new("a", "b", -0.1)]);
        assert!(matches!(negative, Err(RGDMError::InvalidValue { .. })));

        let bad_time =
            FrictionTable::new(vec![FrictionRecord::new("a", "b", 1.0).with_travel_time(-5.0)]);
        assert!(bad_time.is_err());
    }

    #[test]
    fn test_with_deterrence() {
        let table = FrictionTable::new(vec![
            FrictionRecord::new("a", "a", 0.0).with_travel_time(0.0),
            FrictionRecord::new("a", "b", 0.0)
                .with_travel_time(10.0)
                .with_observed_flow(4.0),
        ])
        .unwrap();

        let derived = table.with_deterrence(&Exponential::new(0.1)).unwrap();
        assert_eq!(derived.records()[0].friction, 1.0);
        assert_relative_eq!(derived.records()[1].friction, (-1.0f64).exp(), max_relative = 1e-12);
        assert_eq!(derived.records()[1].observed_flow, Some(4.0));

        let missing = FrictionTable::new(vec![FrictionRecord::new("a", "b", 1.0)]).unwrap();
        assert!(missing.with_deterrence(&Exponential::new(0.1)).is_err());
    }
}
