//! Input checks shared by the table constructors and parameter structs.

use crate::errors::{RGDMError, RGDMResult};

/// Checks that `value` is finite and not negative.
pub(crate) fn ensure_nonnegative(field: &str, value: f64, context: &str) -> RGDMResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(RGDMError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            context: context.to_string(),
        })
    }
}

/// Checks that a tolerance is finite and strictly positive.
pub(crate) fn ensure_tolerance(name: &str, value: f64) -> RGDMResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(RGDMError::invalid_parameter(
            name,
            format!("must be a finite number greater than zero, got {}", value),
        ))
    }
}

/// Checks that an iteration cap is at least one.
pub(crate) fn ensure_iterations(name: &str, value: usize) -> RGDMResult<()> {
    if value > 0 {
        Ok(())
    } else {
        Err(RGDMError::invalid_parameter(name, "must be greater than zero"))
    }
}
