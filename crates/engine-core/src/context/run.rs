use crate::metrics::Metrics;
use chrono::{DateTime, Utc};
use model::{core::identifiers::RunId, execution::outcome::RunReport};

/// Per-invocation state shared by every table of a run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: RunId,
    pub job_name: String,
    pub namespace: String,
    pub started_at: DateTime<Utc>,
    pub metrics: Metrics,
}

impl RunContext {
    pub fn new(job_name: &str, namespace: &str) -> Self {
        RunContext {
            run_id: RunId::generate(),
            job_name: job_name.to_string(),
            namespace: namespace.to_string(),
            started_at: Utc::now(),
            metrics: Metrics::new(),
        }
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    /// Empty report for this run, ready to receive table outcomes.
    pub fn report(&self) -> RunReport {
        RunReport::new(
            self.run_id.clone(),
            &self.job_name,
            &self.namespace,
            self.started_at,
        )
    }
}
