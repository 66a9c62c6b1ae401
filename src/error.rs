//! Domain error types
//!
//! Validation errors are returned to the caller; store errors never leave the
//! state objects, they are logged and swallowed there.

use std::ops::RangeInclusive;
use thiserror::Error;

/// Setter input rejected, state left unchanged
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("valid {field} values range from {min} to {max} {unit}, got {value}")]
    OutOfRange {
        field: &'static str,
        unit: &'static str,
        value: i32,
        min: i32,
        max: i32,
    },

    #[error("drink amount must be positive, got {0}")]
    NonPositiveDrink(i32),

    #[error("adding {added} mL to {amount} mL exceeds the largest recordable amount")]
    AmountOverflow { amount: i32, added: i32 },
}

impl ValidationError {
    /// Check `value` against `range`, naming the field in the error
    pub fn check(
        field: &'static str,
        unit: &'static str,
        value: i32,
        range: RangeInclusive<i32>,
    ) -> Result<i32, Self> {
        if range.contains(&value) {
            Ok(value)
        } else {
            Err(ValidationError::OutOfRange {
                field,
                unit,
                value,
                min: *range.start(),
                max: *range.end(),
            })
        }
    }
}

/// Errors raised by a key-value store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored record exists but does not decode into a valid value
    #[error("Corrupt record '{key}': {reason}")]
    Corrupt { key: String, reason: String },

    /// Backend refused the operation (used by the in-memory store)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
