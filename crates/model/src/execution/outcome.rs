use crate::core::identifiers::{RunId, TableIdent, TableName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Non-terminal states a table passes through during a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStage {
    Pending,
    Fetching,
    Transforming,
    Publishing,
}

impl TableStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableStage::Pending => "pending",
            TableStage::Fetching => "fetching",
            TableStage::Transforming => "transforming",
            TableStage::Publishing => "publishing",
        }
    }
}

impl fmt::Display for TableStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of a single table within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableOutcome {
    Written { rows: usize, created: bool },
    Empty,
    Failed { stage: TableStage, reason: String },
    Skipped { reason: String },
}

impl TableOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, TableOutcome::Failed { .. })
    }

    pub fn rows_written(&self) -> usize {
        match self {
            TableOutcome::Written { rows, .. } => *rows,
            _ => 0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TableOutcome::Written { .. } => "written",
            TableOutcome::Empty => "empty",
            TableOutcome::Failed { .. } => "failed",
            TableOutcome::Skipped { .. } => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableReport {
    /// Position of the table in the input list.
    pub index: usize,
    pub table: TableName,
    pub destination: TableIdent,
    #[serde(flatten)]
    pub outcome: TableOutcome,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub tables: usize,
    pub written: usize,
    pub empty: usize,
    pub failed: usize,
    pub skipped: usize,
    pub rows_written: usize,
}

/// Aggregate result of one invocation, in input-list order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub job_name: String,
    pub namespace: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub tables: Vec<TableReport>,
    pub retries: u64,
    pub interrupted: bool,
}

impl RunReport {
    pub fn new(run_id: RunId, job_name: &str, namespace: &str, started_at: DateTime<Utc>) -> Self {
        RunReport {
            run_id,
            job_name: job_name.to_string(),
            namespace: namespace.to_string(),
            started_at,
            finished_at: None,
            tables: Vec::new(),
            retries: 0,
            interrupted: false,
        }
    }

    pub fn summary(&self) -> RunSummary {
        self.tables
            .iter()
            .fold(RunSummary::default(), |mut acc, report| {
                acc.tables += 1;
                match &report.outcome {
                    TableOutcome::Written { rows, .. } => {
                        acc.written += 1;
                        acc.rows_written += rows;
                    }
                    TableOutcome::Empty => acc.empty += 1,
                    TableOutcome::Failed { .. } => acc.failed += 1,
                    TableOutcome::Skipped { .. } => acc.skipped += 1,
                }
                acc
            })
    }

    pub fn failed_tables(&self) -> Vec<&TableReport> {
        self.tables
            .iter()
            .filter(|r| r.outcome.is_failure())
            .collect()
    }
}
