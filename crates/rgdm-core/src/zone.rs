//! Zones and their trip production/attraction totals.

use crate::errors::{RGDMError, RGDMResult};
use crate::validation::ensure_nonnegative;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque zone identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(String);

impl ZoneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ZoneId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ZoneId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A zone with its production (trip origins) and attraction (trip destinations) totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub production: f64,
    pub attraction: f64,
}

impl Zone {
    pub fn new(id: impl Into<ZoneId>, production: f64, attraction: f64) -> Self {
        Self {
            id: id.into(),
            production,
            attraction,
        }
    }
}

/// Validated set of zone totals, kept in insertion order.
///
/// Every total is finite and nonnegative and each zone id appears once.
/// Zero totals are allowed; such zones receive no flow on that side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Zone>", into = "Vec<Zone>")]
pub struct ZoneTotals {
    zones: IndexMap<ZoneId, Zone>,
}

impl ZoneTotals {
    /// Build zone totals, rejecting duplicates and negative or non-finite totals.
    pub fn new(zones: impl IntoIterator<Item = Zone>) -> RGDMResult<Self> {
        let mut map = IndexMap::new();
        for zone in zones {
            let context = format!("zone {}", zone.id);
            ensure_nonnegative("production", zone.production, &context)?;
            ensure_nonnegative("attraction", zone.attraction, &context)?;
            if map.contains_key(&zone.id) {
                return Err(RGDMError::DuplicateZone(zone.id.to_string()));
            }
            map.insert(zone.id.clone(), zone);
        }
        Ok(Self { zones: map })
    }

    /// Build zone totals from parallel production and attraction slices.
    ///
    /// Zones are named by their position (`"0"`, `"1"`, ...). Mostly useful for
    /// small synthetic networks.
    pub fn from_vectors(productions: &[f64], attractions: &[f64]) -> RGDMResult<Self> {
        if productions.len() != attractions.len() {
            return Err(RGDMError::invalid_parameter(
                "attractions",
                format!(
                    "expected {} values to match productions, got {}",
                    productions.len(),
                    attractions.len()
                ),
            ));
        }
        Self::new(
            productions
                .iter()
                .zip(attractions)
                .enumerate()
                .map(|(i, (&o, &d))| Zone::new(i.to_string(), o, d)),
        )
    }

    pub fn get(&self, id: &ZoneId) -> Option<&Zone> {
        self.zones.get(id)
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values()
    }

    pub fn total_production(&self) -> f64 {
        self.zones.values().map(|z| z.production).sum()
    }

    pub fn total_attraction(&self) -> f64 {
        self.zones.values().map(|z| z.attraction).sum()
    }
}

impl TryFrom<Vec<Zone>> for ZoneTotals {
    type Error = RGDMError;

    fn try_from(value: Vec<Zone>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ZoneTotals> for Vec<Zone> {
    fn from(value: ZoneTotals) -> Self {
        value.zones.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_totals_keep_order() {
        let totals = ZoneTotals::new(vec![
            Zone::new("b", 1.0, 2.0),
            Zone::new("a", 3.0, 0.0),
            Zone::new("c", 0.0, 4.0),
        ])
        .unwrap();

        let ids: Vec<&str> = totals.iter().map(|z| z.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(totals.total_production(), 4.0);
        assert_eq!(totals.total_attraction(), 6.0);
        assert_eq!(totals.get(&ZoneId::from("a")).unwrap().production, 3.0);
    }

    #[test]
    fn test_zone_totals_validation() {
        let duplicate = ZoneTotals::new(vec![Zone::new("a", 1.0, 1.0), Zone::new("a", 2.0, 2.0)]);
        assert!(matches!(duplicate, Err(RGDMError::DuplicateZone(id)) if id == "a"));

        let negative = ZoneTotals::new(vec![Zone::new("a", -1.0, 1.0)]);
        assert!(matches!(negative, Err(RGDMError::InvalidValue { .. })));

        let nan = ZoneTotals::new(vec![Zone::new("a", 1.0, f64::NAN)]);
        assert!(nan.is_err());
    }

    #[test]
    fn test_from_vectors() {
        let totals = ZoneTotals::from_vectors(&[10.0, 20.0], &[15.0, 15.0]).unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals.get(&ZoneId::from("1")).unwrap().production, 20.0);

        assert!(ZoneTotals::from_vectors(&[1.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_serde_validates() {
        let json = r#"[{"id": "a", "production": 1.0, "attraction": 2.0}]"#;
        let totals: ZoneTotals = serde_json::from_str(json).unwrap();
        assert_eq!(totals.len(), 1);

        let json = r#"[{"id": "a", "production": -1.0, "attraction": 2.0}]"#;
        assert!(serde_json::from_str::<ZoneTotals>(json).is_err());
    }
}
