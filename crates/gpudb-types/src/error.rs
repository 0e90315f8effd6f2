//! Error types for gpudb-types crate.

use thiserror::Error;

/// Errors raised while translating column metadata or binding decoded values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Unknown column type {type_name} for column {column}")]
    UnknownColumnType { column: String, type_name: String },

    #[error("Unsupported binary schema: {0}")]
    UnsupportedBinarySchema(String),

    #[error("Missing value for field '{0}'")]
    MissingField(String),

    #[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },
}

/// Result type alias for gpudb-types operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
