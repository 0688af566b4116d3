use thiserror::Error;

/// Error type for invalid inputs and configuration.
///
/// Non-convergence is never an error: it is reported through
/// [`Convergence`](crate::balancer::Convergence) instead.
#[derive(Error, Debug)]
pub enum RGDMError {
    #[error("Required option `{0}` is missing")]
    MissingOption(String),
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("Invalid value for {field}: {value} ({context})")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },
    #[error("Zone `{0}` is defined more than once")]
    DuplicateZone(String),
    #[error("Pair {origin} -> {destination} appears more than once")]
    DuplicatePair { origin: String, destination: String },
    #[error("Zone `{0}` is referenced by a friction record but has no totals")]
    UnknownZone(String),
    #[error("Column `{column}` not found in {table} table")]
    MissingColumn { column: String, table: String },
    #[error("Empty input: {0}")]
    EmptyInput(String),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RGDMError {
    /// Create an [`RGDMError::InvalidParameter`].
    pub fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        RGDMError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error belongs to the configuration class.
    ///
    /// Configuration errors are raised before any iteration runs: missing
    /// options or columns, non-positive tolerances or caps, and inputs that
    /// violate the data model.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, RGDMError::Csv(_) | RGDMError::Io(_))
    }
}

/// Convenience type for `Result<T, RGDMError>`.
pub type RGDMResult<T> = Result<T, RGDMError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_class() {
        assert!(RGDMError::MissingOption("zone_id".to_string()).is_configuration());
        assert!(RGDMError::invalid_parameter("tolerance", "must be positive").is_configuration());

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(!RGDMError::from(io).is_configuration());
    }

    #[test]
    fn test_messages() {
        let err = RGDMError::MissingColumn {
            column: "o_total".to_string(),
            table: "zone".to_string(),
        };
        assert_eq!(err.to_string(), "Column `o_total` not found in zone table");

        let err = RGDMError::invalid_parameter("max_iterations", "must be greater than zero");
        assert_eq!(
            err.to_string(),
            "Invalid parameter `max_iterations`: must be greater than zero"
        );
    }
}
