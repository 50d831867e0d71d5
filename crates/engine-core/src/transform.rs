use crate::error::TransformError;
use chrono::{DateTime, SubsecRound, Utc};
use model::{
    core::{data_type::DataType, value::Value},
    records::batch::{Batch, ColumnSchema},
};

/// Column added to every published row.
pub const EXTRACT_TIMESTAMP_COLUMN: &str = "extract_timestamp";

/// Sets `extract_timestamp` to `ts` on every row of `batch`, replacing a
/// column of that name if the source already returned one. The value is
/// truncated to microseconds, the precision the table stores.
pub fn stamp_extract_timestamp(
    batch: &mut Batch,
    ts: DateTime<Utc>,
) -> Result<(), TransformError> {
    batch.validate()?;

    let ts = ts.trunc_subsecs(6);
    batch.set_column(
        ColumnSchema::new(EXTRACT_TIMESTAMP_COLUMN, DataType::Timestamp, false),
        |_| Some(Value::Timestamp(ts)),
    );
    Ok(())
}
