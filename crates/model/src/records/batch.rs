use crate::{
    core::{
        data_type::DataType,
        identifiers::TableName,
        value::{FieldValue, Value},
    },
    records::row::RowData,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        ColumnSchema {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum BatchError {
    #[error("Row {row} of `{table}` has field `{field}` which is not a declared column")]
    UndeclaredField {
        table: String,
        row: usize,
        field: String,
    },

    #[error("Duplicate column `{column}` in `{table}`")]
    DuplicateColumn { table: String, column: String },
}

/// All rows fetched for one source table, with the column layout they share.
#[derive(Debug, Clone)]
pub struct Batch {
    pub table: TableName,
    pub columns: Vec<ColumnSchema>,
    pub rows: Vec<RowData>,
    pub fetched_at: chrono::DateTime<chrono::Utc>,
}

impl Batch {
    pub fn new(table: TableName, columns: Vec<ColumnSchema>, rows: Vec<RowData>) -> Self {
        Batch {
            table,
            columns,
            rows,
            fetched_at: chrono::Utc::now(),
        }
    }

    pub fn empty(table: TableName) -> Self {
        Self::new(table, Vec::new(), Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Adds `column` (or replaces a column of the same name) and sets its
    /// value on every row using `value_for`.
    pub fn set_column<F>(&mut self, column: ColumnSchema, value_for: F)
    where
        F: Fn(&RowData) -> Option<Value>,
    {
        for row in self.rows.iter_mut() {
            let value = value_for(row);
            row.set(FieldValue::new(column.name.clone(), value, column.data_type));
        }

        match self
            .columns
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(&column.name))
        {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }

    /// Checks that every field carried by a row is a declared column.
    pub fn validate(&self) -> Result<(), BatchError> {
        for (idx, column) in self.columns.iter().enumerate() {
            if self.columns[..idx]
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&column.name))
            {
                return Err(BatchError::DuplicateColumn {
                    table: self.table.to_string(),
                    column: column.name.clone(),
                });
            }
        }

        for (row_idx, row) in self.rows.iter().enumerate() {
            if let Some(field) = row
                .field_values
                .iter()
                .find(|f| self.column(&f.name).is_none())
            {
                return Err(BatchError::UndeclaredField {
                    table: self.table.to_string(),
                    row: row_idx,
                    field: field.name.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn size_bytes(&self) -> usize {
        self.rows.iter().map(|r| r.size_bytes()).sum()
    }
}
