use chrono::Utc;
use engine_config::settings::SyncSettings;
use engine_core::{
    connectors::{destination::TableSink, source::TableSource},
    error::{SinkError, SourceError},
    metrics::Metrics,
    retry::{RetryDisposition, RetryError},
    transform::stamp_extract_timestamp,
};
use model::{
    core::identifiers::{TableIdent, TableName},
    execution::outcome::{TableOutcome, TableReport, TableStage},
    records::batch::Batch,
};
use std::{fmt::Display, sync::Arc, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// One entry of the table list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTask {
    pub index: usize,
    pub table: TableName,
    pub destination: TableIdent,
}

impl TableTask {
    pub fn new(index: usize, table: TableName, namespace: &str) -> Self {
        let destination = table.destination(namespace);
        TableTask {
            index,
            table,
            destination,
        }
    }
}

#[derive(Debug)]
struct TableFailure {
    stage: TableStage,
    reason: String,
}

impl TableFailure {
    fn at(stage: TableStage) -> impl FnOnce(String) -> Self {
        move |reason| TableFailure { stage, reason }
    }
}

/// Runs the fetch, transform and publish steps for single tables. Never
/// returns an error: every failure ends up in the table's report.
#[derive(Clone)]
pub struct TableRunner {
    source: Arc<dyn TableSource>,
    sink: Arc<dyn TableSink>,
    settings: Arc<SyncSettings>,
    metrics: Metrics,
}

impl TableRunner {
    pub fn new(
        source: Arc<dyn TableSource>,
        sink: Arc<dyn TableSink>,
        settings: Arc<SyncSettings>,
        metrics: Metrics,
    ) -> Self {
        TableRunner {
            source,
            sink,
            settings,
            metrics,
        }
    }

    /// Syncs `tasks` one after another, in order. Tasks not yet started when
    /// `cancel` fires are reported as skipped.
    pub async fn run_all(&self, tasks: Vec<TableTask>, cancel: &CancellationToken) -> Vec<TableReport> {
        let mut reports = Vec::with_capacity(tasks.len());
        for task in tasks {
            let report = if cancel.is_cancelled() {
                self.skip(task)
            } else {
                self.sync(task).await
            };
            reports.push(report);
        }
        reports
    }

    pub async fn sync(&self, task: TableTask) -> TableReport {
        info!("Processing table: {}", task.table);
        let started = Instant::now();

        let outcome = match self.process(&task).await {
            Ok(outcome) => outcome,
            Err(failure) => {
                error!("Error processing table {}: {}", task.table, failure.reason);
                self.metrics.record_failed();
                TableOutcome::Failed {
                    stage: failure.stage,
                    reason: failure.reason,
                }
            }
        };

        Self::report(task, outcome, started)
    }

    fn skip(&self, task: TableTask) -> TableReport {
        warn!("Shutdown requested, skipping table {}", task.table);
        self.metrics.record_skipped();
        let outcome = TableOutcome::Skipped {
            reason: "shutdown requested".to_string(),
        };
        Self::report(task, outcome, Instant::now())
    }

    fn report(task: TableTask, outcome: TableOutcome, started: Instant) -> TableReport {
        TableReport {
            index: task.index,
            table: task.table,
            destination: task.destination,
            outcome,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    async fn process(&self, task: &TableTask) -> Result<TableOutcome, TableFailure> {
        let mut batch = self
            .fetch(&task.table)
            .await
            .map_err(TableFailure::at(TableStage::Fetching))?;

        let rows = batch.row_count();
        if rows == 0 {
            info!("No data found for table {}", task.table);
            self.metrics.record_empty();
            return Ok(TableOutcome::Empty);
        }
        debug!(
            "Fetched {} rows ({} bytes) for table {}",
            rows,
            batch.size_bytes(),
            task.table
        );

        stamp_extract_timestamp(&mut batch, Utc::now())
            .map_err(|e| e.to_string())
            .map_err(TableFailure::at(TableStage::Transforming))?;

        let published = self
            .publish(&task.destination, &batch)
            .await
            .map_err(TableFailure::at(TableStage::Publishing))?;

        info!("Successfully wrote {} records to {}", rows, task.destination);
        self.metrics.record_written(rows as u64);
        Ok(TableOutcome::Written {
            rows,
            created: published,
        })
    }

    /// Fetch with a per-attempt timeout, retrying transient failures.
    async fn fetch(&self, table: &TableName) -> Result<Batch, String> {
        let source = self.source.as_ref();
        let timeout = self.settings.fetch_timeout;

        self.settings
            .retry
            .run_observed(
                move || async move {
                    match tokio::time::timeout(timeout, source.fetch_table(table)).await {
                        Ok(result) => result,
                        Err(_) => Err(SourceError::Timeout(timeout)),
                    }
                },
                |err: &SourceError| {
                    if err.is_transient() {
                        RetryDisposition::Retry
                    } else {
                        RetryDisposition::Stop
                    }
                },
                |err, attempt, delay| self.on_retry("fetching", table, err, attempt, delay),
            )
            .await
            .map_err(|e| describe(e, "fetch"))
    }

    /// Publish, re-running the whole attempt when another writer committed
    /// the same table version first. Returns whether the table was created.
    async fn publish(&self, ident: &TableIdent, batch: &Batch) -> Result<bool, String> {
        let sink = self.sink.as_ref();

        let result = self
            .settings
            .retry
            .run_observed(
                move || async move { sink.publish(ident, batch).await },
                |err: &SinkError| {
                    if err.is_conflict() {
                        RetryDisposition::Retry
                    } else {
                        RetryDisposition::Stop
                    }
                },
                |err, attempt, delay| self.on_retry("publishing", ident, err, attempt, delay),
            )
            .await
            .map_err(|e| describe(e, "publish"))?;

        Ok(result.created)
    }

    fn on_retry(
        &self,
        action: &str,
        target: &dyn Display,
        err: &dyn Display,
        attempt: usize,
        delay: std::time::Duration,
    ) {
        warn!(
            "Retrying {} {} after attempt {} failed: {} (next try in {:?})",
            action, target, attempt, err, delay
        );
        self.metrics.increment_retries(1);
    }
}

fn describe<E: Display>(err: RetryError<E>, action: &str) -> String {
    match err {
        RetryError::Fatal(e) => e.to_string(),
        RetryError::AttemptsExceeded(e) => format!("{e} ({action} gave up after retries)"),
    }
}
