//! Validation errors for caller-supplied values.
//!
//! Missing history is never an error here; analytics functions return
//! "no data" results for that. These variants cover inputs that are wrong.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("invalid category: {0} (expected routine, regular, treat or uncategorized)")]
    UnknownCategory(String),

    #[error("unknown holiday: {0}")]
    UnknownHoliday(String),

    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    #[error("unknown config key: {0}")]
    UnknownConfigKey(String),

    #[error("config value for {key} is invalid: {reason}")]
    ConfigOutOfRange { key: String, reason: String },

    #[error("quantity must be at least 1 (got {0})")]
    InvalidQuantity(i64),

    #[error("an order needs at least one item")]
    EmptyOrder,

    #[error("{field} must be between 0 and 100 (got {value})")]
    PercentOutOfRange { field: &'static str, value: f64 },
}

pub type ValidationResult<T> = Result<T, ValidationError>;
