//! Error types for the store and its services

use larder_core::ValidationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// The database rejected a statement
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A caller-supplied value was rejected
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A JSON payload (migration marker) could not be (de)serialized
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The product is not tracked where the operation needs it
    #[error("product not tracked: {0}")]
    NotTracked(String),

    /// A stored value could not be read back
    #[error("corrupt value in {table}.{column}: {value}")]
    CorruptRow {
        table: &'static str,
        column: &'static str,
        value: String,
    },
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
