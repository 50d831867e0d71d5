use connectors::{lakehouse::error::LakehouseError, servicenow::error::ServiceNowError};
use model::records::batch::BatchError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    ServiceNow(#[from] ServiceNowError),

    /// The whole fetch exceeded its time budget.
    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Source error: {0}")]
    Other(String),
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::ServiceNow(err) => err.is_transient(),
            SourceError::Timeout(_) => true,
            SourceError::Other(_) => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error(transparent)]
    Lakehouse(#[from] LakehouseError),

    #[error("Sink error: {0}")]
    Other(String),
}

impl SinkError {
    /// Another writer committed the same table version first.
    pub fn is_conflict(&self) -> bool {
        matches!(self, SinkError::Lakehouse(err) if err.is_conflict())
    }
}

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Malformed batch: {0}")]
    Batch(#[from] BatchError),
}

#[derive(Error, Debug)]
pub enum FinalizeError {
    #[error("Failed to store run marker: {0}")]
    Store(String),

    #[error("Failed to serialize run report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Finalize error: {0}")]
    Other(String),
}
