//! Doubly-constrained gravity distribution of origin-destination trips.
//!
//! Given per-zone trip productions and attractions and a friction value for
//! every reachable zone pair, the [`balancer::Balancer`] estimates a flow for
//! each pair whose row and column sums reproduce the zone totals.
//!
//! # Module Organisation
//!
//! - `zone`, `friction`: validated inputs
//! - `deterrence`: travel time to friction functions
//! - `balancer`: Furness balancing
//! - `flows`, `statistics`: outputs and trip-length statistics
//! - `sectors`: several independent runs over one friction table
//! - `io`: CSV tables addressed by column name

pub mod balancer;
pub mod deterrence;
pub mod errors;
pub mod flows;
pub mod friction;
pub mod io;
mod network;
pub mod parameters;
pub mod sectors;
pub mod statistics;
mod validation;
pub mod zone;

pub use balancer::{BalanceResult, Balancer, BalancingFactors, Convergence};
pub use deterrence::{DeterrenceFunction, Exponential, Power, Tanner};
pub use errors::{RGDMError, RGDMResult};
pub use flows::{FlowRecord, FlowTable};
pub use friction::{FrictionRecord, FrictionTable};
pub use parameters::BalancingParameters;
pub use sectors::{distribute_sectors, SectorTotals};
pub use zone::{Zone, ZoneId, ZoneTotals};
