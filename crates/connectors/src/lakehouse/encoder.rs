use crate::lakehouse::error::LakehouseError;
use arrow::{
    array::{
        Array, ArrayRef, BooleanArray, BooleanBuilder, Float64Array, Float64Builder, Int64Array,
        Int64Builder, StringArray, StringBuilder, TimestampMicrosecondArray,
        TimestampMicrosecondBuilder,
    },
    datatypes::{DataType as ArrowType, Field, Schema, SchemaRef, TimeUnit},
    record_batch::RecordBatch,
};
use bytes::Bytes;
use chrono::DateTime;
use model::{
    core::{
        data_type::DataType,
        value::{FieldValue, Value},
    },
    records::{batch::ColumnSchema, row::RowData},
};
use parquet::{
    arrow::{ArrowWriter, arrow_reader::ParquetRecordBatchReaderBuilder},
    basic::Compression,
    file::properties::WriterProperties,
};
use std::{io::Cursor, sync::Arc};

const UTC: &str = "UTC";

fn arrow_type(data_type: DataType) -> ArrowType {
    match data_type {
        DataType::Int => ArrowType::Int64,
        DataType::Float => ArrowType::Float64,
        DataType::Boolean => ArrowType::Boolean,
        DataType::Timestamp => ArrowType::Timestamp(TimeUnit::Microsecond, Some(UTC.into())),
        DataType::String | DataType::Json | DataType::Null => ArrowType::Utf8,
    }
}

/// Arrow schema for `columns`. Every field is nullable in the file so that
/// rows written before a column existed can be read back.
pub fn arrow_schema(columns: &[ColumnSchema]) -> SchemaRef {
    Arc::new(Schema::new(
        columns
            .iter()
            .map(|c| Field::new(&c.name, arrow_type(c.data_type), true))
            .collect::<Vec<_>>(),
    ))
}

fn mismatch(column: &ColumnSchema, value: &Value) -> LakehouseError {
    LakehouseError::TypeMismatch {
        column: column.name.clone(),
        expected: column.data_type.to_string(),
        found: value.data_type().to_string(),
    }
}

fn build_column(column: &ColumnSchema, rows: &[RowData]) -> Result<ArrayRef, LakehouseError> {
    let values = rows.iter().map(|r| r.get_value(&column.name));

    let array: ArrayRef = match column.data_type {
        DataType::Int => {
            let mut builder = Int64Builder::with_capacity(rows.len());
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    v => builder.append_value(v.as_i64().ok_or_else(|| mismatch(column, &v))?),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Float => {
            let mut builder = Float64Builder::with_capacity(rows.len());
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    v => builder.append_value(v.as_f64().ok_or_else(|| mismatch(column, &v))?),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Boolean => {
            let mut builder = BooleanBuilder::with_capacity(rows.len());
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    v => builder.append_value(v.as_bool().ok_or_else(|| mismatch(column, &v))?),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Timestamp => {
            let mut builder = TimestampMicrosecondBuilder::with_capacity(rows.len())
                .with_timezone(UTC);
            for value in values {
                match value.clone().coerce(DataType::Timestamp) {
                    Some(Value::Null) => builder.append_null(),
                    Some(Value::Timestamp(ts)) => builder.append_value(ts.timestamp_micros()),
                    _ => return Err(mismatch(column, &value)),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::String | DataType::Json | DataType::Null => {
            let mut builder = StringBuilder::with_capacity(rows.len(), rows.len() * 16);
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    v => builder.append_value(v.to_string()),
                }
            }
            Arc::new(builder.finish())
        }
    };

    Ok(array)
}

/// Converts rows into a single Arrow batch laid out as `columns`.
pub fn to_record_batch(
    columns: &[ColumnSchema],
    rows: &[RowData],
) -> Result<RecordBatch, LakehouseError> {
    let arrays = columns
        .iter()
        .map(|c| build_column(c, rows))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RecordBatch::try_new(arrow_schema(columns), arrays)?)
}

/// Encodes rows as one Snappy-compressed Parquet file.
pub fn encode(columns: &[ColumnSchema], rows: &[RowData]) -> Result<Bytes, LakehouseError> {
    let batch = to_record_batch(columns, rows)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_created_by(concat!("snowsync ", env!("CARGO_PKG_VERSION")).to_string())
        .build();

    let mut cursor = Cursor::new(Vec::<u8>::new());
    let mut writer = ArrowWriter::try_new(&mut cursor, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(Bytes::from(cursor.into_inner()))
}

fn read_value(array: &dyn Array, idx: usize) -> Option<Value> {
    if array.is_null(idx) {
        return None;
    }

    let any = array.as_any();
    if let Some(a) = any.downcast_ref::<Int64Array>() {
        Some(Value::Int(a.value(idx)))
    } else if let Some(a) = any.downcast_ref::<Float64Array>() {
        Some(Value::Float(a.value(idx)))
    } else if let Some(a) = any.downcast_ref::<BooleanArray>() {
        Some(Value::Boolean(a.value(idx)))
    } else if let Some(a) = any.downcast_ref::<TimestampMicrosecondArray>() {
        DateTime::from_timestamp_micros(a.value(idx)).map(Value::Timestamp)
    } else {
        any.downcast_ref::<StringArray>()
            .map(|a| Value::String(a.value(idx).to_string()))
    }
}

/// Reads a Parquet file back into rows shaped as `columns`. Columns the
/// file does not contain come back as nulls.
pub fn decode(
    bytes: Bytes,
    columns: &[ColumnSchema],
    entity: &str,
) -> Result<Vec<RowData>, LakehouseError> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)?.build()?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch?;
        let arrays: Vec<Option<&ArrayRef>> = columns
            .iter()
            .map(|c| batch.column_by_name(&c.name))
            .collect();

        for idx in 0..batch.num_rows() {
            let field_values = columns
                .iter()
                .zip(arrays.iter().copied())
                .map(|(column, array)| {
                    let value = array
                        .and_then(|a| read_value(a.as_ref(), idx))
                        .and_then(|v| v.coerce(column.data_type));
                    FieldValue::new(column.name.clone(), value, column.data_type)
                })
                .collect();
            rows.push(RowData::new(entity, field_values));
        }
    }

    Ok(rows)
}
