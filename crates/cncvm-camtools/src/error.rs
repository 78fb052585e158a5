//! Error types for the CAM tools crate.

use thiserror::Error;

/// Errors related to optimizer and exporter parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    /// A parameter value is out of the valid range.
    #[error("Parameter '{name}' out of range: {value} (valid: {min}..{max})")]
    OutOfRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A parameter value is invalid.
    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue { name: String, reason: String },
}

/// Result type for parameter validation.
pub type ParameterResult<T> = Result<T, ParameterError>;
