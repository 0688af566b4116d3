//! Independent distributions for several named sectors sharing one friction table.

use crate::balancer::{BalanceResult, Balancer};
use crate::errors::{RGDMError, RGDMResult};
use crate::friction::FrictionTable;
use crate::zone::ZoneTotals;
use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::info_span;

/// Zone totals for each sector (e.g. goods, services, total), in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectorTotals {
    sectors: IndexMap<String, ZoneTotals>,
}

impl SectorTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sector. Sector names must be unique.
    pub fn insert(&mut self, name: impl Into<String>, totals: ZoneTotals) -> RGDMResult<()> {
        let name = name.into();
        if self.sectors.contains_key(&name) {
            return Err(RGDMError::invalid_parameter(
                "sectors",
                format!("sector `{}` is defined more than once", name),
            ));
        }
        self.sectors.insert(name, totals);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ZoneTotals> {
        self.sectors.get(name)
    }

    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sectors.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ZoneTotals)> {
        self.sectors.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Balance every sector against the same friction table.
///
/// Sectors run in parallel and share nothing but the inputs. Results keep the
/// sector order of `sectors`. The first configuration error from any sector
/// is returned.
pub fn distribute_sectors(
    balancer: &Balancer,
    sectors: &SectorTotals,
    friction: &FrictionTable,
) -> RGDMResult<IndexMap<String, BalanceResult>> {
    let results = sectors
        .sectors
        .par_iter()
        .map(|(name, totals)| {
            let _span = info_span!("sector", name = %name).entered();
            balancer
                .balance(totals, friction)
                .map(|result| (name.clone(), result))
        })
        .collect::<RGDMResult<Vec<_>>>()?;

    Ok(results.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::BalancingParameters;
    use approx::assert_relative_eq;

    #[test]
    fn test_sectors_are_independent() {
        let friction = FrictionTable::from_matrix(&[vec![1.0, 0.5], vec![0.5, 1.0]]).unwrap();
        let mut sectors = SectorTotals::new();
        sectors
            .insert(
                "goods",
                ZoneTotals::from_vectors(&[10.0, 20.0], &[15.0, 15.0]).unwrap(),
            )
            .unwrap();
        sectors
            .insert(
                "services",
                ZoneTotals::from_vectors(&[5.0, 5.0], &[2.0, 8.0]).unwrap(),
            )
            .unwrap();

        let balancer = Balancer::new(BalancingParameters::new(1e-8, 500)).unwrap();
        let results = distribute_sectors(&balancer, &sectors, &friction).unwrap();

        let names: Vec<&String> = results.keys().collect();
        assert_eq!(names, vec!["goods", "services"]);

        for (name, totals) in sectors.iter() {
            let single = balancer.balance(totals, &friction).unwrap();
            let parallel = &results[name];
            assert!(parallel.convergence.converged);
            for (a, b) in single.flows.iter().zip(parallel.flows.iter()) {
                assert_relative_eq!(a.flow, b.flow);
            }
        }
        assert_relative_eq!(results["services"].flows.total(), 10.0, max_relative = 1e-8);
    }

    #[test]
    fn test_duplicate_sector() {
        let mut sectors = SectorTotals::new();
        let totals = ZoneTotals::from_vectors(&[1.0], &[1.0]).unwrap();
        sectors.insert("total", totals.clone()).unwrap();
        assert!(sectors.insert("total", totals).is_err());
        assert_eq!(sectors.names().collect::<Vec<_>>(), vec!["total"]);
    }

    #[test]
    fn test_error_from_any_sector_is_returned() {
        let friction = FrictionTable::from_matrix(&[vec![1.0, 1.0], vec![1.0, 1.0]]).unwrap();
        let mut sectors = SectorTotals::new();
        sectors
            .insert("ok", ZoneTotals::from_vectors(&[1.0, 1.0], &[1.0, 1.0]).unwrap())
            .unwrap();
        // Missing zone "1"
        sectors
            .insert("broken", ZoneTotals::from_vectors(&[1.0], &[1.0]).unwrap())
            .unwrap();

        let balancer = Balancer::new(BalancingParameters::default()).unwrap();
        assert!(distribute_sectors(&balancer, &sectors, &friction).is_err());
    }
}
