//! Calibration of the gravity model deterrence function.
//!
//! Given observed flows and travel times, [`Calibrator`] searches for the
//! decay parameter whose balanced flows reproduce the observed mean trip
//! length. The zone totals of every model run are the row and column sums of
//! the observed flows.
//!
//! ```no_run
//! use rgdm_calibrate::{CalibrationParameters, Calibrator, ObservedTrips};
//! use rgdm_core::{Exponential, FrictionTable};
//!
//! # fn run(table: FrictionTable) -> rgdm_core::RGDMResult<()> {
//! let observed = ObservedTrips::new(table)?;
//! let calibrator = Calibrator::new(CalibrationParameters::default())?;
//! let result = calibrator.calibrate(&observed, &Exponential::new(0.1))?;
//! println!("beta = {}", result.decay);
//! # Ok(())
//! # }
//! ```

pub mod calibrator;
pub mod observed;
pub mod parameters;

pub use calibrator::{CalibrationResult, CalibrationStep, Calibrator};
pub use observed::ObservedTrips;
pub use parameters::{CalibrationParameters, UpdateRule};
