use connectors::error::AdapterError;
use engine_config::error::ConfigError;
use engine_core::error::FinalizeError;
use thiserror::Error;

/// Run-level failures. Anything that goes wrong with a single table is
/// recorded in the run report instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Parameters, connection or catalog settings could not be resolved.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The source client or the warehouse store could not be set up.
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// Every table was attempted but the run could not be marked complete.
    #[error("Finalization failed: {0}")]
    Finalize(#[from] FinalizeError),
}
