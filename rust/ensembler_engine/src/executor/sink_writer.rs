//! Sink adapters.
//!
//! Save-mode checks run before the result is computed: `ERRORIFEXISTS`
//! aborts and `IGNORE` skips when the target already holds a table.

use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use datafusion::dataframe::DataFrame;
use datafusion_common::{DataFusionError, Result};
use deltalake::protocol::SaveMode as DeltaSaveMode;
use tracing::info;

use super::result::SinkReport;
use crate::providers::warehouse::Warehouse;
use crate::spec::dataset::TableId;
use crate::spec::sink::{SaveMode, Sink, SinkTarget};

/// Outcome of the pre-write check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkDecision {
    Write,
    /// Target exists and the save mode is `IGNORE`.
    Skip,
}

fn delta_err(err: deltalake::errors::DeltaTableError) -> DataFusionError {
    DataFusionError::External(Box::new(err))
}

fn sink_table(sink: &Sink) -> Result<Option<TableId>> {
    sink.table_id()
        .map_err(|err| DataFusionError::Plan(err.to_string()))
}

/// Apply the save mode against the current state of the target.
pub async fn check_sink(sink: &Sink, warehouse: &Warehouse) -> Result<SinkDecision> {
    let Some(table) = sink_table(sink)? else {
        return Ok(SinkDecision::Write);
    };
    if !matches!(sink.save_mode, SaveMode::ErrorIfExists | SaveMode::Ignore) {
        return Ok(SinkDecision::Write);
    }
    let exists = warehouse.table_exists(&table).await.map_err(delta_err)?;
    match (sink.save_mode, exists) {
        (SaveMode::ErrorIfExists, true) => Err(DataFusionError::Execution(format!(
            "Sink table {table} already exists and save_mode is {}",
            sink.save_mode
        ))),
        (SaveMode::Ignore, true) => {
            info!(table = %table, "Sink table exists and save_mode is IGNORE; skipping write");
            Ok(SinkDecision::Skip)
        }
        _ => Ok(SinkDecision::Write),
    }
}

/// Report for a run whose write was skipped.
pub fn skipped_report(sink: &Sink) -> SinkReport {
    SinkReport {
        kind: sink.target.kind().to_string(),
        save_mode: sink.save_mode.to_string(),
        target: target_label(sink),
        rows_written: 0,
        skipped: true,
        delta_version: None,
    }
}

fn target_label(sink: &Sink) -> Option<String> {
    match &sink.target {
        SinkTarget::Bq { bq_config } => Some(bq_config.table.clone()),
        SinkTarget::Console { .. } => None,
    }
}

/// Execute `df` and hand the rows to the sink.
pub async fn write_sink(df: DataFrame, sink: &Sink, warehouse: &Warehouse) -> Result<SinkReport> {
    match &sink.target {
        SinkTarget::Console { console_config } => {
            let batches = df.limit(0, Some(console_config.limit))?.collect().await?;
            let rows = count_rows(&batches);
            println!("{}", pretty_format_batches(&batches)?);
            Ok(SinkReport {
                kind: sink.target.kind().to_string(),
                save_mode: sink.save_mode.to_string(),
                target: None,
                rows_written: rows,
                skipped: false,
                delta_version: None,
            })
        }
        SinkTarget::Bq { .. } => {
            let Some(table) = sink_table(sink)? else {
                return Err(DataFusionError::Internal(
                    "BQ sink without a table id".to_string(),
                ));
            };
            let schema = Arc::new(df.schema().as_arrow().clone());
            let mut batches = df.collect().await?;
            let rows = count_rows(&batches);
            if batches.is_empty() {
                batches.push(RecordBatch::new_empty(schema));
            }

            let handle = warehouse.table_for_write(&table).await.map_err(delta_err)?;
            let mut builder = handle.write(batches).with_save_mode(delta_save_mode(sink.save_mode));
            if sink.save_mode == SaveMode::Overwrite {
                builder = builder.with_schema_mode(deltalake::operations::write::SchemaMode::Overwrite);
            }
            let written = builder.await.map_err(delta_err)?;
            let version = written.version();
            info!(
                table = %table,
                rows,
                version = ?version,
                save_mode = %sink.save_mode,
                "Wrote ensembling result"
            );
            Ok(SinkReport {
                kind: sink.target.kind().to_string(),
                save_mode: sink.save_mode.to_string(),
                target: Some(table.to_string()),
                rows_written: rows,
                skipped: false,
                delta_version: version,
            })
        }
    }
}

fn delta_save_mode(mode: SaveMode) -> DeltaSaveMode {
    match mode {
        SaveMode::ErrorIfExists => DeltaSaveMode::ErrorIfExists,
        SaveMode::Overwrite => DeltaSaveMode::Overwrite,
        SaveMode::Append => DeltaSaveMode::Append,
        SaveMode::Ignore => DeltaSaveMode::Ignore,
    }
}

fn count_rows(batches: &[RecordBatch]) -> u64 {
    batches.iter().map(|b| b.num_rows() as u64).sum()
}
