use crate::{error::SyncError, finalize::WarehouseJobMarker};
use async_trait::async_trait;
use connectors::{
    adapter::Adapter,
    lakehouse::sink::LakehouseSink,
    servicenow::source::ServiceNowSource,
};
use engine_config::{
    catalog::catalog_config, connection::resolve_connection, env::EnvManager, job::JobArgs,
    settings::SyncSettings,
};
use engine_core::{
    connectors::{destination::TableSink, source::TableSource},
    finalize::JobFinalizer,
};
use std::sync::Arc;
use tracing::info;

/// The three collaborators a sync run talks to.
#[derive(Clone)]
pub struct JobComponents {
    pub source: Arc<dyn TableSource>,
    pub sink: Arc<dyn TableSink>,
    pub finalizer: Arc<dyn JobFinalizer>,
}

/// Builds the collaborators for a validated set of run parameters. Runs
/// once per invocation, before any table is touched; any error is fatal.
#[async_trait]
pub trait ComponentFactory: Send + Sync {
    async fn build(
        &self,
        args: &JobArgs,
        settings: &SyncSettings,
    ) -> Result<JobComponents, SyncError>;
}

/// ServiceNow source, lakehouse sink and a run marker written to the same
/// warehouse.
#[derive(Debug, Clone, Default)]
pub struct DefaultComponentFactory {
    env: EnvManager,
}

impl DefaultComponentFactory {
    pub fn new(env: EnvManager) -> Self {
        DefaultComponentFactory { env }
    }
}

#[async_trait]
impl ComponentFactory for DefaultComponentFactory {
    async fn build(
        &self,
        args: &JobArgs,
        settings: &SyncSettings,
    ) -> Result<JobComponents, SyncError> {
        let profile = resolve_connection(&args.connection_name, &self.env, settings)?;
        let source_adapter = Adapter::servicenow(profile)?;

        let config = catalog_config(args, settings)?;
        let sink_adapter = Adapter::lakehouse(config)?;
        let catalog = sink_adapter.get_lakehouse()?;

        info!(
            "Source {} ({}), destination {}",
            args.connection_name,
            source_adapter.kind(),
            catalog.config().location
        );

        let source = ServiceNowSource::new(source_adapter.get_servicenow()?.clone());
        Ok(JobComponents {
            source: Arc::new(source),
            sink: Arc::new(LakehouseSink::new(catalog.clone())),
            finalizer: Arc::new(WarehouseJobMarker::new(catalog)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_config::error::ConfigError;
    use model::core::identifiers::TableName;

    fn args(bucket: &str) -> JobArgs {
        JobArgs {
            job_name: "nightly".into(),
            database_name: "raw".into(),
            connection_name: "snow".into(),
            output_bucket: bucket.into(),
            output_prefix: "wh".into(),
            tables: vec![TableName::from("incident")],
        }
    }

    fn env() -> EnvManager {
        let mut env = EnvManager::empty();
        env.set("SNOWSYNC_CONN_SNOW_URL", "https://acme.service-now.com");
        env.set("SNOWSYNC_CONN_SNOW_TOKEN", "t");
        env
    }

    #[tokio::test]
    async fn test_builds_default_components() {
        let factory = DefaultComponentFactory::new(env());
        let components = factory
            .build(&args("memory://"), &SyncSettings::default())
            .await
            .unwrap();

        assert_eq!(components.source.name(), "servicenow");
        assert_eq!(components.sink.name(), "lakehouse");
    }

    #[tokio::test]
    async fn test_unknown_connection_is_fatal() {
        let factory = DefaultComponentFactory::new(EnvManager::empty());
        let err = factory
            .build(&args("memory://"), &SyncSettings::default())
            .await
            .err()
            .unwrap();

        assert!(matches!(err, SyncError::Config(ConfigError::Connection { .. })));
    }
}
