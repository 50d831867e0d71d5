use async_trait::async_trait;
use connectors::lakehouse::catalog::WarehouseCatalog;
use engine_core::{error::FinalizeError, finalize::JobFinalizer};
use model::execution::outcome::RunReport;
use object_store::{PutPayload, path::Path};
use std::sync::Arc;
use tracing::info;

const JOBS_DIR: &str = "_jobs";

/// Marks a run complete by writing its report next to the tables it
/// produced: `_jobs/{job}/runs/{run_id}.json` plus `_jobs/{job}/latest.json`.
#[derive(Debug, Clone)]
pub struct WarehouseJobMarker {
    catalog: Arc<WarehouseCatalog>,
}

impl WarehouseJobMarker {
    pub fn new(catalog: Arc<WarehouseCatalog>) -> Self {
        WarehouseJobMarker { catalog }
    }

    pub fn run_path(job_name: &str, run_id: &str) -> Path {
        let file = format!("{run_id}.json");
        Path::from_iter([JOBS_DIR, job_name, "runs", file.as_str()])
    }

    pub fn latest_path(job_name: &str) -> Path {
        Path::from_iter([JOBS_DIR, job_name, "latest.json"])
    }
}

#[async_trait]
impl JobFinalizer for WarehouseJobMarker {
    async fn commit(&self, report: &RunReport) -> Result<(), FinalizeError> {
        let body = serde_json::to_vec_pretty(report)?;
        let store = self.catalog.store();

        let run_path = Self::run_path(&report.job_name, report.run_id.as_str());
        store
            .put(&run_path, PutPayload::from(body.clone()))
            .await
            .map_err(|e| FinalizeError::Store(e.to_string()))?;

        // Only advanced once the run's own marker exists.
        store
            .put(&Self::latest_path(&report.job_name), PutPayload::from(body))
            .await
            .map_err(|e| FinalizeError::Store(e.to_string()))?;

        info!("Run {} marked complete at {}", report.run_id.as_str(), run_path);
        Ok(())
    }
}
