//! Error types for pgqb

use thiserror::Error;

/// Result type alias for pgqb operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for building and running queries
#[derive(Debug, Error)]
pub enum OrmError {
    /// Malformed builder input, detected before any SQL is produced
    #[error("Construction error: {0}")]
    Construction(String),

    /// An "at most one row" operation affected or returned several rows
    #[error("More than one row: {0}")]
    MoreThanOneRow(String),

    /// `insert_from` was given a source query returning many rows
    #[error("Cannot create based on a query which returns multiple records")]
    CreateFromMultipleRows,

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Query execution error, passed through from the driver
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Row decode error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Registry configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl OrmError {
    /// Create a construction error
    pub fn construction(message: impl Into<String>) -> Self {
        Self::Construction(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a "more than one row" error from an observed row count
    pub fn more_than_one_row(got: u64) -> Self {
        Self::MoreThanOneRow(format!(
            "Only one row was expected to find, found {got} rows."
        ))
    }

    /// Check if this is a construction error
    pub fn is_construction(&self) -> bool {
        matches!(self, Self::Construction(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a "more than one row" error
    pub fn is_more_than_one_row(&self) -> bool {
        matches!(self, Self::MoreThanOneRow(_))
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
