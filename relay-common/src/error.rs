//! Error types for the relay-common crate.

use thiserror::Error;

use crate::address::AddressError;

/// Errors raised while validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required configuration field is missing or blank.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A numeric field is outside its accepted range.
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    /// A configured address does not parse as an addr-spec.
    #[error("{field} is not a valid email address: {source}")]
    InvalidAddress {
        field: &'static str,
        #[source]
        source: AddressError,
    },

    /// Any other invalid value.
    #[error("Invalid configuration for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn check_range(field: &'static str, value: u64, min: u64, max: u64) -> Result<(), Self> {
        if (min..=max).contains(&value) {
            Ok(())
        } else {
            Err(Self::OutOfRange {
                field,
                value,
                min,
                max,
            })
        }
    }

    pub(crate) fn check_not_blank(field: &'static str, value: &str) -> Result<(), Self> {
        if value.trim().is_empty() {
            Err(Self::MissingField(field))
        } else {
            Ok(())
        }
    }

    pub(crate) fn check_address(field: &'static str, value: &str) -> Result<(), Self> {
        crate::address::parse_address(value)
            .map(|_| ())
            .map_err(|source| Self::InvalidAddress { field, source })
    }
}
