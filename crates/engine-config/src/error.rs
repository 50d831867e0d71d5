use connectors::lakehouse::error::LakehouseError;
use thiserror::Error;

/// Errors raised while resolving run parameters and configuration. All of
/// them are fatal and happen before any table is fetched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required parameter --{0}")]
    MissingParameter(&'static str),

    #[error("Invalid --tables value: {0}")]
    InvalidTables(String),

    #[error("Invalid --{name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Connection `{name}`: {reason}")]
    Connection { name: String, reason: String },

    #[error("Env file error: {0}")]
    EnvFile(String),

    #[error("Warehouse configuration error: {0}")]
    Catalog(#[from] LakehouseError),
}
