use crate::lakehouse::{
    catalog::{LoadedTable, WarehouseCatalog},
    encoder,
    error::LakehouseError,
    merge::{align_rows, upsert},
    metadata::{DataFile, TableMetadata},
};
use model::{
    core::identifiers::TableIdent,
    records::{
        batch::{Batch, ColumnSchema},
        row::RowData,
    },
};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub ident: TableIdent,
    /// Rows carried by the published batch.
    pub rows_written: usize,
    pub created: bool,
    pub version: u64,
    pub inserted: usize,
    pub updated: usize,
    /// Rows in the table after the commit.
    pub total_records: u64,
}

/// Writes record batches into warehouse tables with upsert semantics:
/// a missing table is created from the batch, an existing one is merged
/// with it on the table's identifier columns.
#[derive(Debug, Clone)]
pub struct LakehouseSink {
    catalog: Arc<WarehouseCatalog>,
}

impl LakehouseSink {
    pub fn new(catalog: Arc<WarehouseCatalog>) -> Self {
        LakehouseSink { catalog }
    }

    pub fn catalog(&self) -> &Arc<WarehouseCatalog> {
        &self.catalog
    }

    pub async fn table_exists(&self, ident: &TableIdent) -> Result<bool, LakehouseError> {
        self.catalog.table_exists(ident).await
    }

    /// One publish attempt. A concurrent writer committing first surfaces as
    /// [`LakehouseError::CommitConflict`]; calling again re-reads the table.
    pub async fn upsert(
        &self,
        ident: &TableIdent,
        batch: &Batch,
    ) -> Result<PublishReport, LakehouseError> {
        batch.validate()?;

        match self.catalog.load_table(ident).await? {
            None => self.create(ident, batch).await,
            Some(loaded) => self.merge(ident, loaded, batch).await,
        }
    }

    async fn create(
        &self,
        ident: &TableIdent,
        batch: &Batch,
    ) -> Result<PublishReport, LakehouseError> {
        let config = self.catalog.config();
        let mut metadata = TableMetadata::create(
            self.catalog.table_location(ident),
            &batch.columns,
            &config.identifier_columns,
            config.table_properties(),
            config.format_version,
        )?;

        let columns = metadata.current_schema()?.columns();
        let rows = align_rows(&columns, batch.rows.clone())?;
        let file = self.write_rows(ident, &columns, &rows).await?;

        let summary = BTreeMap::from([
            ("added-records".to_string(), rows.len().to_string()),
            ("added-data-files".to_string(), "1".to_string()),
        ]);
        metadata.add_snapshot("append", vec![file.clone()], summary);

        self.commit_or_discard(ident, 1, &metadata, &file).await?;
        info!("Created table {} with {} records", ident, rows.len());

        Ok(PublishReport {
            ident: ident.clone(),
            rows_written: batch.row_count(),
            created: true,
            version: 1,
            inserted: rows.len(),
            updated: 0,
            total_records: rows.len() as u64,
        })
    }

    async fn merge(
        &self,
        ident: &TableIdent,
        loaded: LoadedTable,
        batch: &Batch,
    ) -> Result<PublishReport, LakehouseError> {
        let LoadedTable {
            version,
            mut metadata,
        } = loaded;
        let previous_file = self.catalog.metadata_path(ident, version).to_string();
        let previous_updated_ms = metadata.last_updated_ms;

        if metadata.evolve_schema(&ident.to_string(), &batch.columns)? {
            debug!("Evolved schema of {} to id {}", ident, metadata.current_schema_id);
        }

        let schema = metadata.current_schema()?;
        let columns = schema.columns();
        let key_columns = schema.identifier_columns();
        let incoming = align_rows(&columns, batch.rows.clone())?;
        let previous_files: Vec<DataFile> = metadata
            .current_snapshot()
            .map(|s| s.data_files.clone())
            .unwrap_or_default();

        let (operation, data_files, file, inserted, updated) =
            if key_columns.is_empty() || !self.catalog.config().upsert_enabled {
                let inserted = incoming.len();
                let file = self.write_rows(ident, &columns, &incoming).await?;
                let mut files = previous_files;
                files.push(file.clone());
                ("append", files, file, inserted, 0)
            } else {
                let mut existing = Vec::new();
                for data_file in &previous_files {
                    let bytes = self.catalog.read_data_file(ident, data_file).await?;
                    existing.extend(encoder::decode(bytes, &columns, batch.table.as_str())?);
                }

                let merged = upsert(existing, incoming, &key_columns);
                let file = self.write_rows(ident, &columns, &merged.rows).await?;
                (
                    "overwrite",
                    vec![file.clone()],
                    file,
                    merged.inserted,
                    merged.updated,
                )
            };

        let summary = BTreeMap::from([
            ("added-records".to_string(), inserted.to_string()),
            ("updated-records".to_string(), updated.to_string()),
            ("added-data-files".to_string(), "1".to_string()),
        ]);
        let total_records = metadata
            .add_snapshot(operation, data_files, summary)
            .total_records();
        metadata.record_previous_metadata(previous_file, previous_updated_ms);

        let next = version + 1;
        self.commit_or_discard(ident, next, &metadata, &file).await?;
        info!(
            "Merged {} records into {} ({} inserted, {} updated, version {})",
            batch.row_count(),
            ident,
            inserted,
            updated,
            next
        );

        Ok(PublishReport {
            ident: ident.clone(),
            rows_written: batch.row_count(),
            created: false,
            version: next,
            inserted,
            updated,
            total_records,
        })
    }

    async fn write_rows(
        &self,
        ident: &TableIdent,
        columns: &[ColumnSchema],
        rows: &[RowData],
    ) -> Result<DataFile, LakehouseError> {
        let bytes = encoder::encode(columns, rows)?;
        self.catalog
            .write_data_file(ident, rows.len() as u64, bytes)
            .await
    }

    async fn commit_or_discard(
        &self,
        ident: &TableIdent,
        version: u64,
        metadata: &TableMetadata,
        file: &DataFile,
    ) -> Result<(), LakehouseError> {
        if let Err(e) = self.catalog.commit(ident, version, metadata).await {
            self.catalog.discard_data_file(ident, file).await;
            return Err(e);
        }
        Ok(())
    }

    /// Reads the current rows of a table, in storage order.
    pub async fn scan(
        &self,
        ident: &TableIdent,
    ) -> Result<Vec<RowData>, LakehouseError> {
        let Some(loaded) = self.catalog.load_table(ident).await? else {
            return Ok(Vec::new());
        };

        let columns = loaded.metadata.current_schema()?.columns();
        let mut rows = Vec::new();
        if let Some(snapshot) = loaded.metadata.current_snapshot() {
            for file in &snapshot.data_files {
                let bytes = self.catalog.read_data_file(ident, file).await?;
                rows.extend(encoder::decode(bytes, &columns, ident.name())?);
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lakehouse::config::{CatalogConfig, StorageLocation};
    use model::core::{
        data_type::DataType,
        identifiers::TableName,
        value::{FieldValue, Value},
    };
    use object_store::memory::InMemory;

    fn sink() -> LakehouseSink {
        let config = CatalogConfig::new(StorageLocation::Memory {
            prefix: String::new(),
        });
        LakehouseSink::new(Arc::new(WarehouseCatalog::with_store(
            config,
            Arc::new(InMemory::new()),
        )))
    }

    fn batch(rows: &[(&str, &str)], extra: Option<&str>) -> Batch {
        let mut columns = vec![
            ColumnSchema::new("sys_id", DataType::String, false),
            ColumnSchema::new("state", DataType::String, false),
        ];
        if let Some(name) = extra {
            columns.push(ColumnSchema::new(name, DataType::Int, false));
        }

        let rows = rows
            .iter()
            .map(|(id, state)| {
                let mut fields = vec![
                    FieldValue::new("sys_id", Some(Value::String(id.to_string())), DataType::String),
                    FieldValue::new("state", Some(Value::String(state.to_string())), DataType::String),
                ];
                if let Some(name) = extra {
                    fields.push(FieldValue::new(name, Some(Value::Int(1)), DataType::Int));
                }
                RowData::new("incident", fields)
            })
            .collect();

        Batch::new(TableName::from("incident"), columns, rows)
    }

    fn state_of(rows: &[RowData], id: &str) -> Value {
        rows.iter()
            .find(|r| r.get_value("sys_id") == Value::String(id.into()))
            .map(|r| r.get_value("state"))
            .unwrap_or(Value::Null)
    }

    #[tokio::test]
    async fn test_first_publish_creates_table() {
        let sink = sink();
        let ident = TableIdent::new("db", "incident");

        let report = sink
            .upsert(&ident, &batch(&[("a", "new"), ("b", "new")], None))
            .await
            .unwrap();

        assert!(report.created);
        assert_eq!(report.version, 1);
        assert_eq!(report.rows_written, 2);
        assert!(sink.table_exists(&ident).await.unwrap());
        assert_eq!(sink.scan(&ident).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_second_publish_upserts_by_sys_id() {
        let sink = sink();
        let ident = TableIdent::new("db", "incident");

        sink.upsert(&ident, &batch(&[("a", "new"), ("b", "new")], None))
            .await
            .unwrap();
        let report = sink
            .upsert(&ident, &batch(&[("b", "closed"), ("c", "new")], None))
            .await
            .unwrap();

        assert!(!report.created);
        assert_eq!(report.version, 2);
        assert_eq!((report.inserted, report.updated), (1, 1));
        assert_eq!(report.total_records, 3);

        let rows = sink.scan(&ident).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(state_of(&rows, "a"), Value::String("new".into()));
        assert_eq!(state_of(&rows, "b"), Value::String("closed".into()));
    }

    #[tokio::test]
    async fn test_new_columns_evolve_schema() {
        let sink = sink();
        let ident = TableIdent::new("db", "incident");

        sink.upsert(&ident, &batch(&[("a", "new")], None))
            .await
            .unwrap();
        sink.upsert(&ident, &batch(&[("b", "new")], Some("priority")))
            .await
            .unwrap();

        let rows = sink.scan(&ident).await.unwrap();
        let a = rows
            .iter()
            .find(|r| r.get_value("sys_id") == Value::String("a".into()))
            .unwrap();
        let b = rows
            .iter()
            .find(|r| r.get_value("sys_id") == Value::String("b".into()))
            .unwrap();
        assert_eq!(a.get_value("priority"), Value::Null);
        assert_eq!(b.get_value("priority"), Value::Int(1));
    }

    #[tokio::test]
    async fn test_table_without_key_appends() {
        let config = CatalogConfig::new(StorageLocation::Memory {
            prefix: String::new(),
        })
        .with_identifier_columns(vec!["number".to_string()]);
        let sink = LakehouseSink::new(Arc::new(WarehouseCatalog::with_store(
            config,
            Arc::new(InMemory::new()),
        )));
        let ident = TableIdent::new("db", "incident");

        sink.upsert(&ident, &batch(&[("a", "new")], None))
            .await
            .unwrap();
        let report = sink
            .upsert(&ident, &batch(&[("a", "closed")], None))
            .await
            .unwrap();

        assert_eq!(report.inserted, 1);
        assert_eq!(report.total_records, 2);
        assert_eq!(sink.scan(&ident).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_incompatible_column_fails_without_commit() {
        let sink = sink();
        let ident = TableIdent::new("db", "incident");
        sink.upsert(&ident, &batch(&[("a", "new")], Some("priority")))
            .await
            .unwrap();

        let mut bad = batch(&[("b", "new")], None);
        bad.set_column(ColumnSchema::new("priority", DataType::Boolean, false), |_| {
            Some(Value::Boolean(true))
        });

        let err = sink.upsert(&ident, &bad).await.unwrap_err();
        assert!(matches!(err, LakehouseError::SchemaConflict { .. }));
        assert_eq!(sink.catalog().current_version(&ident).await.unwrap(), Some(1));
    }
}
