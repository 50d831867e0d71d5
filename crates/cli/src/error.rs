use connectors::servicenow::error::ServiceNowError;
use engine_config::error::ConfigError;
use engine_runtime::error::SyncError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Sync run failed: {0}")]
    Sync(#[from] SyncError),

    #[error("ServiceNow error: {0}")]
    ServiceNow(#[from] ServiceNowError),

    #[error("Failed to write the run report: {0}")]
    ReportWrite(#[from] std::io::Error),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),
}
