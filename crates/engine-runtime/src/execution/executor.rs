use crate::{
    error::SyncError,
    execution::{
        factory::{ComponentFactory, JobComponents},
        table::{TableRunner, TableTask},
    },
};
use chrono::Utc;
use engine_config::{
    job::{JobArgs, RawJobArgs},
    settings::SyncSettings,
};
use engine_core::context::run::RunContext;
use futures::{StreamExt, stream};
use model::{
    core::identifiers::TableIdent,
    execution::outcome::{RunReport, TableReport},
};
use std::{collections::HashMap, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A fully configured run: validated parameters plus the collaborators it
/// reads from and writes to.
pub struct SyncJob {
    pub args: JobArgs,
    pub settings: SyncSettings,
    pub components: JobComponents,
    pub context: RunContext,
}

impl SyncJob {
    pub fn new(args: JobArgs, settings: SyncSettings, components: JobComponents) -> Self {
        let context = RunContext::new(&args.job_name, &args.database_name);
        SyncJob {
            args,
            settings,
            components,
            context,
        }
    }

    pub fn with_context(mut self, context: RunContext) -> Self {
        self.context = context;
        self
    }
}

/// Resolves parameters, builds the collaborators and runs the job. Nothing
/// is fetched unless parameter resolution and setup both succeed.
pub async fn launch(
    raw: RawJobArgs,
    settings: SyncSettings,
    factory: &dyn ComponentFactory,
    cancel: CancellationToken,
) -> Result<RunReport, SyncError> {
    let args = JobArgs::resolve(raw)?;
    let components = factory.build(&args, &settings).await?;
    run(SyncJob::new(args, settings, components), cancel).await
}

pub async fn run(job: SyncJob, cancel: CancellationToken) -> Result<RunReport, SyncError> {
    SyncExecutor::new(job, cancel).execute().await
}

struct SyncExecutor {
    job: SyncJob,
    runner: TableRunner,
    cancel: CancellationToken,
}

impl SyncExecutor {
    fn new(job: SyncJob, cancel: CancellationToken) -> Self {
        let runner = TableRunner::new(
            job.components.source.clone(),
            job.components.sink.clone(),
            Arc::new(job.settings.clone()),
            job.context.metrics.clone(),
        );
        SyncExecutor {
            job,
            runner,
            cancel,
        }
    }

    async fn execute(self) -> Result<RunReport, SyncError> {
        let ctx = &self.job.context;
        info!(
            "Sync run {} for job {}: {} table(s) into {}",
            ctx.run_id.as_str(),
            ctx.job_name,
            self.job.args.tables.len(),
            ctx.namespace
        );

        let tasks: Vec<TableTask> = self
            .job
            .args
            .tables
            .iter()
            .enumerate()
            .map(|(i, t)| TableTask::new(i, t.clone(), &self.job.args.database_name))
            .collect();

        let mut tables = if self.job.settings.is_sequential() {
            self.runner.run_all(tasks, &self.cancel).await
        } else {
            self.run_concurrent(tasks).await
        };
        tables.sort_by_key(|r| r.index);

        let mut report = ctx.report();
        report.tables = tables;
        report.finished_at = Some(Utc::now());
        report.retries = ctx.metrics.snapshot().retry_count;
        report.interrupted = self.cancel.is_cancelled();

        let summary = report.summary();
        info!(
            "Run finished: {} written ({} rows), {} empty, {} failed, {} skipped",
            summary.written, summary.rows_written, summary.empty, summary.failed, summary.skipped
        );
        if report.interrupted {
            warn!("Run {} was interrupted by a shutdown request", ctx.run_id.as_str());
        }

        if let Err(e) = self.job.components.finalizer.commit(&report).await {
            error!("Failed to finalize run {}: {}", ctx.run_id.as_str(), e);
            return Err(SyncError::Finalize(e));
        }

        Ok(report)
    }

    /// Tables sharing a destination stay together and run in list order;
    /// distinct destinations run side by side.
    async fn run_concurrent(&self, tasks: Vec<TableTask>) -> Vec<TableReport> {
        let groups = group_by_destination(tasks);
        let limit = self.job.settings.concurrency;
        info!(
            "Syncing {} destination(s), at most {} at a time",
            groups.len(),
            limit
        );

        stream::iter(groups)
            .map(|group| {
                let runner = self.runner.clone();
                let cancel = self.cancel.clone();
                async move { runner.run_all(group, &cancel).await }
            })
            .buffer_unordered(limit)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}

fn group_by_destination(tasks: Vec<TableTask>) -> Vec<Vec<TableTask>> {
    let mut positions: HashMap<TableIdent, usize> = HashMap::new();
    let mut groups: Vec<Vec<TableTask>> = Vec::new();

    for task in tasks {
        match positions.get(&task.destination) {
            Some(&i) => groups[i].push(task),
            None => {
                positions.insert(task.destination.clone(), groups.len());
                groups.push(vec![task]);
            }
        }
    }
    groups
}
