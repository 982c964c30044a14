//! Struct rows to ordered [`Row`] values.

use std::sync::Arc;

use arrow::array::{Array, StructArray};
use arrow::datatypes::Schema;
use arrow::json::writer::{JsonArray, WriterBuilder};
use arrow::record_batch::RecordBatch;
use ensembler_plugin_common::Row;

use crate::errors::ExtResult;

/// Decode each row of `rows` into a [`Row`] keyed by struct field name.
///
/// Null fields are kept as explicit nulls so every row carries the full set
/// of keys in field order.
pub fn decode_struct_rows(rows: &StructArray) -> ExtResult<Vec<Row>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let schema = Arc::new(Schema::new(rows.fields().clone()));
    let batch = RecordBatch::try_new(schema, rows.columns().to_vec())?;
    let mut writer = WriterBuilder::new()
        .with_explicit_nulls(true)
        .build::<_, JsonArray>(Vec::new());
    writer.write(&batch)?;
    writer.finish()?;
    let decoded: Vec<Row> = serde_json::from_slice(&writer.into_inner())?;
    Ok(decoded)
}
