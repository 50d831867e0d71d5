use crate::lakehouse::error::LakehouseError;
use chrono::Utc;
use model::{core::data_type::DataType, records::batch::ColumnSchema};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const SUPPORTED_FORMAT_VERSION: u8 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NestedField {
    pub id: i32,
    pub name: String,
    pub required: bool,
    #[serde(rename = "type")]
    pub field_type: String,
}

impl NestedField {
    pub fn data_type(&self) -> DataType {
        DataType::from_table_type_name(&self.field_type).unwrap_or(DataType::String)
    }

    pub fn to_column(&self) -> ColumnSchema {
        ColumnSchema::new(self.name.clone(), self.data_type(), !self.required)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TableSchema {
    pub schema_id: i32,
    #[serde(default)]
    pub identifier_field_ids: Vec<i32>,
    pub fields: Vec<NestedField>,
}

impl TableSchema {
    pub fn field(&self, name: &str) -> Option<&NestedField> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn columns(&self) -> Vec<ColumnSchema> {
        self.fields.iter().map(NestedField::to_column).collect()
    }

    /// Names of the merge key columns, in key order.
    pub fn identifier_columns(&self) -> Vec<String> {
        self.identifier_field_ids
            .iter()
            .filter_map(|id| self.fields.iter().find(|f| f.id == *id))
            .map(|f| f.name.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DataFile {
    /// Path relative to the table root, e.g. `data/<uuid>.parquet`.
    pub file_path: String,
    pub file_format: String,
    pub record_count: u64,
    pub file_size_in_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Snapshot {
    pub snapshot_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_snapshot_id: Option<i64>,
    pub sequence_number: u64,
    pub timestamp_ms: i64,
    pub schema_id: i32,
    pub summary: BTreeMap<String, String>,
    pub data_files: Vec<DataFile>,
}

impl Snapshot {
    pub fn operation(&self) -> &str {
        self.summary.get("operation").map_or("", String::as_str)
    }

    pub fn total_records(&self) -> u64 {
        self.data_files.iter().map(|f| f.record_count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SnapshotLogEntry {
    pub snapshot_id: i64,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MetadataLogEntry {
    pub metadata_file: String,
    pub timestamp_ms: i64,
}

/// Contents of one `v{N}.metadata.json` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TableMetadata {
    pub format_version: u8,
    pub table_uuid: Uuid,
    pub location: String,
    pub last_sequence_number: u64,
    pub last_updated_ms: i64,
    pub last_column_id: i32,
    pub current_schema_id: i32,
    pub schemas: Vec<TableSchema>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_snapshot_id: Option<i64>,
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
    #[serde(default)]
    pub snapshot_log: Vec<SnapshotLogEntry>,
    #[serde(default)]
    pub metadata_log: Vec<MetadataLogEntry>,
}

impl TableMetadata {
    /// Metadata for a new table whose schema is `columns`. Every configured
    /// identifier column found among `columns` becomes part of the key.
    pub fn create(
        location: String,
        columns: &[ColumnSchema],
        identifier_columns: &[String],
        properties: BTreeMap<String, String>,
        format_version: u8,
    ) -> Result<Self, LakehouseError> {
        if format_version != SUPPORTED_FORMAT_VERSION {
            return Err(LakehouseError::UnsupportedFormatVersion(format_version));
        }

        let fields: Vec<NestedField> = columns
            .iter()
            .zip(1..)
            .map(|(column, id)| NestedField {
                id,
                name: column.name.clone(),
                required: !column.nullable,
                field_type: column.data_type.table_type_name().to_string(),
            })
            .collect();

        let identifier_field_ids = identifier_columns
            .iter()
            .filter_map(|key| fields.iter().find(|f| f.name.eq_ignore_ascii_case(key)))
            .map(|f| f.id)
            .collect();

        Ok(TableMetadata {
            format_version,
            table_uuid: Uuid::new_v4(),
            location,
            last_sequence_number: 0,
            last_updated_ms: Utc::now().timestamp_millis(),
            last_column_id: fields.len() as i32,
            current_schema_id: 0,
            schemas: vec![TableSchema {
                schema_id: 0,
                identifier_field_ids,
                fields,
            }],
            properties,
            current_snapshot_id: None,
            snapshots: Vec::new(),
            snapshot_log: Vec::new(),
            metadata_log: Vec::new(),
        })
    }

    pub fn current_schema(&self) -> Result<&TableSchema, LakehouseError> {
        self.schemas
            .iter()
            .find(|s| s.schema_id == self.current_schema_id)
            .ok_or_else(|| LakehouseError::CorruptMetadata {
                table: self.location.clone(),
                reason: format!("current schema {} is missing", self.current_schema_id),
            })
    }

    pub fn current_snapshot(&self) -> Option<&Snapshot> {
        let id = self.current_snapshot_id?;
        self.snapshots.iter().find(|s| s.snapshot_id == id)
    }

    /// Brings the current schema in line with `columns`: unknown columns are
    /// appended as optional fields and existing fields that may now receive
    /// nulls stop being required. Returns whether a new schema was added.
    pub fn evolve_schema(
        &mut self,
        table: &str,
        columns: &[ColumnSchema],
    ) -> Result<bool, LakehouseError> {
        let current = self.current_schema()?;
        let mut fields = current.fields.clone();
        let identifier_field_ids = current.identifier_field_ids.clone();
        let mut last_column_id = self.last_column_id;
        let mut changed = false;

        for column in columns {
            match fields
                .iter_mut()
                .find(|f| f.name.eq_ignore_ascii_case(&column.name))
            {
                Some(field) => {
                    let existing = field.data_type();
                    if !existing.accepts(column.data_type) {
                        return Err(LakehouseError::SchemaConflict {
                            table: table.to_string(),
                            column: column.name.clone(),
                            existing,
                            incoming: column.data_type,
                        });
                    }
                    if field.required && column.nullable {
                        field.required = false;
                        changed = true;
                    }
                }
                None => {
                    last_column_id += 1;
                    fields.push(NestedField {
                        id: last_column_id,
                        name: column.name.clone(),
                        required: false,
                        field_type: column.data_type.table_type_name().to_string(),
                    });
                    changed = true;
                }
            }
        }

        // Fields the batch does not carry will be null for its rows
        for field in fields.iter_mut() {
            let carried = columns
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&field.name));
            if !carried && field.required {
                field.required = false;
                changed = true;
            }
        }

        if changed {
            let schema_id = self.schemas.iter().map(|s| s.schema_id).max().unwrap_or(0) + 1;
            self.schemas.push(TableSchema {
                schema_id,
                identifier_field_ids,
                fields,
            });
            self.current_schema_id = schema_id;
            self.last_column_id = last_column_id;
        }

        Ok(changed)
    }

    /// Appends a snapshot made of `data_files` and makes it current.
    pub fn add_snapshot(
        &mut self,
        operation: &str,
        data_files: Vec<DataFile>,
        mut summary: BTreeMap<String, String>,
    ) -> &Snapshot {
        let now = Utc::now().timestamp_millis();
        let snapshot_id = (Uuid::new_v4().as_u64_pair().0 & i64::MAX as u64) as i64;
        let sequence_number = self.last_sequence_number + 1;

        summary.insert("operation".to_string(), operation.to_string());
        summary.insert(
            "total-records".to_string(),
            data_files
                .iter()
                .map(|f| f.record_count)
                .sum::<u64>()
                .to_string(),
        );
        summary.insert("total-data-files".to_string(), data_files.len().to_string());

        self.snapshots.push(Snapshot {
            snapshot_id,
            parent_snapshot_id: self.current_snapshot_id,
            sequence_number,
            timestamp_ms: now,
            schema_id: self.current_schema_id,
            summary,
            data_files,
        });
        self.snapshot_log.push(SnapshotLogEntry {
            snapshot_id,
            timestamp_ms: now,
        });
        self.current_snapshot_id = Some(snapshot_id);
        self.last_sequence_number = sequence_number;
        self.last_updated_ms = now;

        &self.snapshots[self.snapshots.len() - 1]
    }

    /// Records the metadata file this version replaces.
    pub fn record_previous_metadata(&mut self, metadata_file: String, timestamp_ms: i64) {
        self.metadata_log.push(MetadataLogEntry {
            metadata_file,
            timestamp_ms,
        });
    }
}
