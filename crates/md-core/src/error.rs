//! Error types for md-core

use thiserror::Error;

/// Core error type for Medallion
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Configuration file not found
    #[error("[E001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// E003: Invalid configuration value
    #[error("[E003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// E004: A row is missing a column the record type requires
    #[error("[E004] Table '{table}' row is missing column '{column}'")]
    MissingColumn { table: String, column: String },

    /// E005: A column holds a value of the wrong type
    #[error("[E005] Table '{table}' column '{column}': expected {expected}, found {found}")]
    ColumnType {
        table: String,
        column: String,
        expected: String,
        found: String,
    },

    /// E006: Unknown column type name in a schema definition
    #[error("[E006] Unknown column type '{name}'")]
    UnknownColumnType { name: String },

    /// E014: IO error
    #[error("[E014] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// E016: IO error with file path context
    #[error("[E016] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// E015: YAML parse error
    #[error("[E015] YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
