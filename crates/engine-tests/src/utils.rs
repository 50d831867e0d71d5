#![allow(dead_code)]

use crate::{TEST_DATABASE, TEST_JOB};
use async_trait::async_trait;
use connectors::{
    lakehouse::{
        catalog::WarehouseCatalog,
        config::{CatalogConfig, StorageLocation},
        sink::LakehouseSink,
    },
    servicenow::{adapter::Record, decode::decode_records, error::ServiceNowError},
};
use engine_config::{
    job::{JobArgs, RawJobArgs},
    settings::SyncSettings,
};
use engine_core::{
    connectors::{
        destination::{PublishResult, TableSink},
        source::TableSource,
    },
    error::{SinkError, SourceError},
    retry::RetryPolicy,
};
use engine_runtime::{
    execution::{
        executor::{self, SyncJob},
        factory::JobComponents,
    },
    finalize::WarehouseJobMarker,
};
use model::{
    core::{
        identifiers::{TableIdent, TableName},
        value::Value,
    },
    execution::outcome::RunReport,
    records::{batch::Batch, row::RowData},
};
use object_store::{ObjectStore, memory::InMemory, path::Path};
use serde_json::{Value as JsonValue, json};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio_util::sync::CancellationToken;

pub const WAREHOUSE_PREFIX: &str = "servicenow";

/// Source serving canned Table API records, decoded exactly the way the
/// ServiceNow source decodes them.
#[derive(Default)]
pub struct FixtureSource {
    tables: HashMap<String, Vec<Record>>,
    unreachable: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// `records` must be a JSON array of objects.
    pub fn with_table(mut self, name: &str, records: JsonValue) -> Self {
        let records = match records {
            JsonValue::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    JsonValue::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        self.tables.insert(name.to_string(), records);
        self
    }

    /// Fetching `name` fails as if the instance were down.
    pub fn unreachable(mut self, name: &str) -> Self {
        self.unreachable.insert(name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TableSource for FixtureSource {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn fetch_table(&self, table: &TableName) -> Result<Batch, SourceError> {
        self.calls.lock().unwrap().push(table.to_string());

        if self.unreachable.contains(table.as_str()) {
            return Err(ServiceNowError::Connection("connection refused".into()).into());
        }
        match self.tables.get(table.as_str()) {
            Some(records) => Ok(decode_records(table, records.clone())),
            None => Err(ServiceNowError::NotFound(table.to_string()).into()),
        }
    }
}

/// Real lakehouse sink that counts publishes and can be told to reject one
/// destination.
pub struct CountingSink {
    inner: LakehouseSink,
    publishes: AtomicUsize,
    reject: Option<String>,
}

impl CountingSink {
    pub fn publishes(&self) -> usize {
        self.publishes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TableSink for CountingSink {
    fn name(&self) -> &str {
        "counting-lakehouse"
    }

    async fn table_exists(&self, ident: &TableIdent) -> Result<bool, SinkError> {
        TableSink::table_exists(&self.inner, ident).await
    }

    async fn publish(&self, ident: &TableIdent, batch: &Batch) -> Result<PublishResult, SinkError> {
        self.publishes.fetch_add(1, Ordering::SeqCst);
        if self.reject.as_deref() == Some(ident.name()) {
            return Err(SinkError::Other(format!("write to {ident} rejected")));
        }
        TableSink::publish(&self.inner, ident, batch).await
    }
}

/// In-memory warehouse rooted at [`WAREHOUSE_PREFIX`].
pub struct Warehouse {
    pub root: Arc<InMemory>,
    pub catalog: Arc<WarehouseCatalog>,
    pub sink: Arc<CountingSink>,
}

impl Warehouse {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn rejecting(table: &str) -> Self {
        Self::build(Some(table.to_string()))
    }

    fn build(reject: Option<String>) -> Self {
        let root = Arc::new(InMemory::new());
        let config = CatalogConfig::new(StorageLocation::Memory {
            prefix: WAREHOUSE_PREFIX.to_string(),
        });
        let catalog = Arc::new(WarehouseCatalog::with_store(config, root.clone()));
        let sink = Arc::new(CountingSink {
            inner: LakehouseSink::new(catalog.clone()),
            publishes: AtomicUsize::new(0),
            reject,
        });
        Warehouse {
            root,
            catalog,
            sink,
        }
    }

    pub fn components(&self, source: Arc<FixtureSource>) -> JobComponents {
        JobComponents {
            source,
            sink: self.sink.clone(),
            finalizer: Arc::new(WarehouseJobMarker::new(self.catalog.clone())),
        }
    }

    pub async fn table_exists(&self, table: &str) -> bool {
        self.catalog
            .table_exists(&TableIdent::new(TEST_DATABASE, table))
            .await
            .unwrap()
    }

    pub async fn rows(&self, table: &str) -> Vec<RowData> {
        LakehouseSink::new(self.catalog.clone())
            .scan(&TableIdent::new(TEST_DATABASE, table))
            .await
            .unwrap()
    }

    pub async fn version(&self, table: &str) -> Option<u64> {
        self.catalog
            .current_version(&TableIdent::new(TEST_DATABASE, table))
            .await
            .unwrap()
    }

    /// The report the last finalized run left behind.
    pub async fn latest_marker(&self) -> Option<RunReport> {
        let path = Path::from(format!("{WAREHOUSE_PREFIX}/_jobs/{TEST_JOB}/latest.json"));
        let bytes = self.root.get(&path).await.ok()?.bytes().await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub async fn object_count(&self) -> usize {
        use futures::TryStreamExt;
        self.root
            .list(None)
            .try_collect::<Vec<_>>()
            .await
            .unwrap()
            .len()
    }
}

impl Default for Warehouse {
    fn default() -> Self {
        Self::new()
    }
}

pub fn tables_json(tables: &[&str]) -> String {
    serde_json::to_string(tables).unwrap()
}

pub fn raw_args(tables: &[&str]) -> RawJobArgs {
    RawJobArgs {
        job_name: Some(TEST_JOB.into()),
        database_name: Some(TEST_DATABASE.into()),
        connection_name: Some("snow_test".into()),
        output_bucket: Some("memory://".into()),
        output_prefix: Some(WAREHOUSE_PREFIX.into()),
        tables: Some(tables_json(tables)),
    }
}

pub fn job_args(tables: &[&str]) -> JobArgs {
    JobArgs::resolve(raw_args(tables)).unwrap()
}

/// Sequential settings with no backoff, so failing tests stay fast.
pub fn fast_settings() -> SyncSettings {
    SyncSettings::builder()
        .retry(RetryPolicy::new(2, Duration::ZERO, Duration::ZERO))
        .fetch_timeout(Duration::from_secs(5))
        .build()
}

pub async fn run_tables(
    warehouse: &Warehouse,
    source: Arc<FixtureSource>,
    tables: &[&str],
    settings: SyncSettings,
) -> RunReport {
    let job = SyncJob::new(job_args(tables), settings, warehouse.components(source));
    executor::run(job, CancellationToken::new()).await.unwrap()
}

/// A Table API incident record.
pub fn incident(sys_id: &str, number: &str, state: i64) -> JsonValue {
    json!({
        "sys_id": sys_id,
        "number": number,
        "state": state,
        "assigned_to": { "value": "6816f79cc0a8016401c5a33be04be441", "link": "https://x/api/now/table/sys_user/6816f79cc0a8016401c5a33be04be441" },
        "sys_updated_on": "2024-05-01 10:00:00",
    })
}

pub fn find_row<'a>(rows: &'a [RowData], sys_id: &str) -> Option<&'a RowData> {
    rows.iter()
        .find(|r| r.get_value("sys_id") == Value::String(sys_id.to_string()))
}

pub fn get_cell_as_string(rows: &[RowData], sys_id: &str, column: &str) -> Option<String> {
    match find_row(rows, sys_id)?.get_value(column) {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

pub fn get_cell_as_i64(rows: &[RowData], sys_id: &str, column: &str) -> Option<i64> {
    find_row(rows, sys_id)?.get_value(column).as_i64()
}
