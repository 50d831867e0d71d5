use crate::servicenow::adapter::Record;
use model::{
    core::{
        data_type::DataType,
        identifiers::TableName,
        value::{FieldValue, Value},
    },
    records::{
        batch::{Batch, ColumnSchema},
        row::RowData,
    },
};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Builds a [`Batch`] from raw Table API records.
///
/// Columns are ordered by first appearance across the records. A column's
/// type is the widest type seen for it, and every value is coerced into
/// that type. Columns that are missing or null in any record are nullable.
pub fn decode_records(table: &TableName, records: Vec<Record>) -> Batch {
    let mut columns: Vec<ColumnSchema> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut decoded: Vec<Vec<(usize, Value)>> = Vec::with_capacity(records.len());

    for record in records {
        let mut fields = Vec::with_capacity(record.len());
        for (name, raw) in record {
            let value = json_to_value(raw);
            let pos = *positions.entry(name.clone()).or_insert_with(|| {
                columns.push(ColumnSchema::new(name, DataType::Null, false));
                columns.len() - 1
            });

            let column = &mut columns[pos];
            column.data_type = column.data_type.widen(value.data_type());
            if value.is_null() {
                column.nullable = true;
            }
            fields.push((pos, value));
        }
        decoded.push(fields);
    }

    for column in columns.iter_mut() {
        // Entirely null columns carry no type information
        if column.data_type == DataType::Null {
            column.data_type = DataType::String;
        }
    }

    let rows = decoded
        .into_iter()
        .map(|fields| {
            let mut values: Vec<Option<Value>> = vec![None; columns.len()];
            for (pos, value) in fields {
                let target = columns[pos].data_type;
                values[pos] = match value {
                    Value::Null => None,
                    v => v.coerce(target),
                };
            }

            let field_values = columns
                .iter_mut()
                .zip(values)
                .map(|(column, value)| {
                    if value.is_none() {
                        column.nullable = true;
                    }
                    FieldValue::new(column.name.clone(), value, column.data_type)
                })
                .collect();
            RowData::new(table.as_str(), field_values)
        })
        .collect();

    Batch::new(table.clone(), columns, rows)
}

/// Maps a Table API JSON value onto the value model. Reference fields
/// (`{"value": .., "link": ..}` or `{"value": .., "display_value": ..}`)
/// collapse to their `value`.
pub fn json_to_value(raw: JsonValue) -> Value {
    match raw {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Boolean(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => n.as_f64().map_or(Value::Null, Value::Float),
        },
        JsonValue::String(s) => Value::String(s),
        JsonValue::Object(mut obj) if obj.contains_key("value") => {
            json_to_value(obj.remove("value").unwrap_or(JsonValue::Null))
        }
        other => Value::Json(other),
    }
}
