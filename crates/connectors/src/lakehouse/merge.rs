use crate::lakehouse::error::LakehouseError;
use model::{
    core::value::{FieldValue, Value},
    records::{batch::ColumnSchema, row::RowData},
};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct MergeOutcome {
    pub rows: Vec<RowData>,
    pub inserted: usize,
    pub updated: usize,
}

/// Reshapes `rows` to exactly `columns`, in column order, coercing each
/// value into the column's type. Missing fields become null.
pub fn align_rows(
    columns: &[ColumnSchema],
    rows: Vec<RowData>,
) -> Result<Vec<RowData>, LakehouseError> {
    rows.into_iter()
        .map(|row| {
            let field_values = columns
                .iter()
                .map(|column| {
                    let value = match row.get_value(&column.name) {
                        Value::Null => None,
                        v => Some(v.clone().coerce(column.data_type).ok_or_else(|| {
                            LakehouseError::TypeMismatch {
                                column: column.name.clone(),
                                expected: column.data_type.to_string(),
                                found: v.data_type().to_string(),
                            }
                        })?),
                    };
                    Ok(FieldValue::new(column.name.clone(), value, column.data_type))
                })
                .collect::<Result<Vec<_>, LakehouseError>>()?;
            Ok(RowData::new(&row.entity, field_values))
        })
        .collect()
}

fn row_key(row: &RowData, key_columns: &[String]) -> Option<Vec<Value>> {
    key_columns
        .iter()
        .map(|k| match row.get_value(k) {
            Value::Null => None,
            v => Some(v),
        })
        .collect()
}

/// Upserts `incoming` into `existing` keyed by `key_columns`.
///
/// Incoming rows whose key matches an existing row replace it in place,
/// the rest are appended in batch order. Rows with a null key component
/// never match. With no key columns every incoming row is appended.
pub fn upsert(existing: Vec<RowData>, incoming: Vec<RowData>, key_columns: &[String]) -> MergeOutcome {
    let mut outcome = MergeOutcome {
        rows: existing,
        ..Default::default()
    };

    if key_columns.is_empty() {
        outcome.inserted = incoming.len();
        outcome.rows.extend(incoming);
        return outcome;
    }

    let mut index: HashMap<Vec<Value>, usize> = HashMap::with_capacity(outcome.rows.len());
    for (pos, row) in outcome.rows.iter().enumerate() {
        if let Some(key) = row_key(row, key_columns) {
            index.insert(key, pos);
        }
    }

    for row in incoming {
        match row_key(&row, key_columns) {
            Some(key) => match index.get(&key) {
                Some(&pos) => {
                    outcome.rows[pos] = row;
                    outcome.updated += 1;
                }
                None => {
                    index.insert(key, outcome.rows.len());
                    outcome.rows.push(row);
                    outcome.inserted += 1;
                }
            },
            None => {
                outcome.rows.push(row);
                outcome.inserted += 1;
            }
        }
    }

    outcome
}
