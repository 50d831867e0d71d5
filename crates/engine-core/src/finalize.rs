use crate::error::FinalizeError;
use async_trait::async_trait;
use model::execution::outcome::RunReport;

/// Signals the host scheduler that a run finished.
///
/// Called exactly once per run, after every table has been attempted. An
/// error here fails the whole run even if every table succeeded.
#[async_trait]
pub trait JobFinalizer: Send + Sync {
    async fn commit(&self, report: &RunReport) -> Result<(), FinalizeError>;
}
