use model::{core::data_type::DataType, records::batch::BatchError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LakehouseError {
    #[error("Invalid warehouse location: {0}")]
    InvalidLocation(String),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Metadata serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt metadata for `{table}`: {reason}")]
    CorruptMetadata { table: String, reason: String },

    /// A batch column cannot be stored in the existing column.
    #[error("Column `{column}` of `{table}` is {existing}, cannot store {incoming}")]
    SchemaConflict {
        table: String,
        column: String,
        existing: DataType,
        incoming: DataType,
    },

    #[error("Column `{column}` expected {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
    },

    /// Another writer committed version `version` first.
    #[error("Commit conflict on `{table}`: version {version} already exists")]
    CommitConflict { table: String, version: u64 },

    #[error("Invalid batch: {0}")]
    InvalidBatch(#[from] BatchError),

    #[error("Unsupported table format version {0}")]
    UnsupportedFormatVersion(u8),
}

impl LakehouseError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, LakehouseError::CommitConflict { .. })
    }
}
