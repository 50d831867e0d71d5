use clap::{Args, Subcommand};
use engine_config::{job::RawJobArgs, settings::SyncSettings};
use std::{path::PathBuf, time::Duration};

#[derive(Subcommand)]
pub enum Commands {
    /// Copy the listed ServiceNow tables into the warehouse
    Sync(SyncArgs),

    /// Check that a named ServiceNow connection is reachable and authorized
    TestConn {
        #[arg(long = "connection_name")]
        connection_name: String,

        /// Table to read a single row from
        #[arg(long, default_value = "sys_user")]
        table: String,

        #[arg(long, help = "Load variables from this .env file first")]
        env_file: Option<PathBuf>,
    },
}

/// Run parameters keep their historic job-argument spelling so existing
/// schedules can call the binary unchanged. Missing ones are read from
/// `SNOWSYNC_*` variables.
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[arg(long = "JOB_NAME")]
    pub job_name: Option<String>,

    #[arg(long = "database_name")]
    pub database_name: Option<String>,

    #[arg(long = "connection_name")]
    pub connection_name: Option<String>,

    #[arg(long = "output_bucket")]
    pub output_bucket: Option<String>,

    #[arg(long = "output_prefix")]
    pub output_prefix: Option<String>,

    /// JSON array of table names, e.g. '["incident","problem"]'
    #[arg(long = "tables")]
    pub tables: Option<String>,

    #[arg(long, help = "Load variables from this .env file first")]
    pub env_file: Option<PathBuf>,

    #[arg(long, default_value_t = 1, help = "Destinations synced at the same time")]
    pub concurrency: usize,

    #[arg(long, default_value_t = 3, help = "Attempts per fetch and per commit")]
    pub max_attempts: usize,

    #[arg(long, default_value_t = 300)]
    pub fetch_timeout_secs: u64,

    #[arg(long, value_delimiter = ',', help = "Merge key columns [default: sys_id]")]
    pub identifier_columns: Vec<String>,

    #[arg(long)]
    pub page_size: Option<usize>,

    #[arg(long, help = "ServiceNow Table API version [default: v2]")]
    pub api_version: Option<String>,

    #[arg(long, help = "Also write the JSON run report to this file")]
    pub report: Option<PathBuf>,
}

impl SyncArgs {
    pub fn raw_job_args(&self) -> RawJobArgs {
        RawJobArgs {
            job_name: self.job_name.clone(),
            database_name: self.database_name.clone(),
            connection_name: self.connection_name.clone(),
            output_bucket: self.output_bucket.clone(),
            output_prefix: self.output_prefix.clone(),
            tables: self.tables.clone(),
        }
    }

    pub fn settings(&self) -> SyncSettings {
        let mut builder = SyncSettings::builder()
            .concurrency(self.concurrency)
            .max_attempts(self.max_attempts)
            .fetch_timeout(Duration::from_secs(self.fetch_timeout_secs));

        if !self.identifier_columns.is_empty() {
            builder = builder.identifier_columns(self.identifier_columns.iter().cloned());
        }
        if let Some(size) = self.page_size {
            builder = builder.page_size(size);
        }
        if let Some(version) = &self.api_version {
            builder = builder.api_version(version.clone());
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: Commands,
    }

    fn parse_sync(args: &[&str]) -> SyncArgs {
        let argv = ["snowsync", "sync"].iter().chain(args.iter());
        match TestCli::parse_from(argv).command {
            Commands::Sync(args) => args,
            Commands::TestConn { .. } => panic!("expected sync"),
        }
    }

    #[test]
    fn test_job_style_flags() {
        let args = parse_sync(&[
            "--JOB_NAME",
            "nightly",
            "--database_name",
            "servicenow_raw",
            "--connection_name",
            "prod",
            "--output_bucket",
            "lake",
            "--output_prefix",
            "servicenow",
            "--tables",
            r#"["incident"]"#,
        ]);

        let raw = args.raw_job_args();
        assert_eq!(raw.job_name.as_deref(), Some("nightly"));
        assert_eq!(raw.database_name.as_deref(), Some("servicenow_raw"));
        assert_eq!(raw.tables.as_deref(), Some(r#"["incident"]"#));

        let settings = args.settings();
        assert!(settings.is_sequential());
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.fetch_timeout, Duration::from_secs(300));
        assert_eq!(settings.identifier_columns, vec!["sys_id".to_string()]);
    }

    #[test]
    fn test_tuning_flags() {
        let args = parse_sync(&[
            "--concurrency",
            "4",
            "--max-attempts",
            "5",
            "--fetch-timeout-secs",
            "30",
            "--identifier-columns",
            "sys_id,number",
            "--page-size",
            "500",
            "--api-version",
            "v1",
        ]);

        assert!(args.job_name.is_none());
        let settings = args.settings();
        assert_eq!(settings.concurrency, 4);
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.fetch_timeout, Duration::from_secs(30));
        assert_eq!(settings.identifier_columns, vec!["sys_id", "number"]);
        assert_eq!(settings.page_size, Some(500));
        assert_eq!(settings.api_version.as_deref(), Some("v1"));
    }
}
