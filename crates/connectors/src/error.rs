use crate::{lakehouse::error::LakehouseError, servicenow::error::ServiceNowError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    /// Failed to set up or talk to the ServiceNow instance.
    #[error("ServiceNow error: {0}")]
    ServiceNow(#[from] ServiceNowError),

    /// Failed to open the warehouse or write to it.
    #[error("Lakehouse error: {0}")]
    Lakehouse(#[from] LakehouseError),

    #[error("Expected a {expected} adapter, found {found}")]
    UnexpectedKind {
        expected: &'static str,
        found: &'static str,
    },
}
