#![allow(dead_code)]

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::{col, DataFrame, SessionContext};
use ensembler_engine::providers::Warehouse;
use ensembler_engine::session::{EnvironmentClass, EnvironmentProfile, SessionFactory};
use ensembler_engine::spec::EngineAnnotations;
use ensembler_plugin_common::{
    EnsembleInput, Ensembler, EnsemblerError, FnEnsembler, Headers, Value,
};

pub fn session(warehouse: Warehouse) -> (SessionContext, SessionFactory) {
    let factory = SessionFactory::new(
        EnvironmentProfile::from_class(EnvironmentClass::Small),
        warehouse,
    );
    let ctx = factory
        .build_session(&EngineAnnotations::default())
        .expect("session builds");
    (ctx, factory)
}

pub fn register(ctx: &SessionContext, name: &str, columns: Vec<(&str, ArrayRef)>) {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
        .collect();
    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(
        Arc::clone(&schema),
        columns.into_iter().map(|(_, array)| array).collect(),
    )
    .expect("valid batch");
    let table = MemTable::try_new(schema, vec![vec![batch]]).expect("memtable");
    ctx.register_table(name, Arc::new(table))
        .expect("register table");
}

pub fn ints(values: &[i64]) -> ArrayRef {
    Arc::new(Int64Array::from(values.to_vec()))
}

pub fn floats(values: &[f64]) -> ArrayRef {
    Arc::new(Float64Array::from(values.to_vec()))
}

pub fn strings(values: &[&str]) -> ArrayRef {
    Arc::new(StringArray::from(values.to_vec()))
}

pub fn ensembler<F>(func: F) -> Arc<dyn Ensembler>
where
    F: Fn(&EnsembleInput) -> Result<Value, EnsemblerError> + Send + Sync + 'static,
{
    Arc::new(FnEnsembler::new(move |input: &EnsembleInput, _: Option<&Headers>| {
        func(input)
    }))
}

/// Collect `df` ordered by `key` into a single batch.
pub async fn collect_sorted(df: DataFrame, key: &str) -> RecordBatch {
    let batches = df
        .sort(vec![col(key).sort(true, true)])
        .expect("sort")
        .collect()
        .await
        .expect("collect");
    let schema = batches
        .first()
        .map(|b| b.schema())
        .unwrap_or_else(|| Arc::new(Schema::empty()));
    arrow::compute::concat_batches(&schema, &batches).expect("concat")
}

pub fn column_type(batch: &RecordBatch, name: &str) -> DataType {
    batch
        .schema()
        .field_with_name(name)
        .expect("column exists")
        .data_type()
        .clone()
}

/// Job YAML over `test.ds.*` tables with the given result block and sink block.
pub fn job_yaml(result: &str, sink: &str) -> String {
    format!(
        r#"
metadata:
  name: test-job
  annotations:
    spark/spark.executor.instances: "2"
spec:
  source:
    dataset:
      type: BQ
      bq_config:
        table: test.ds.features
        features: [customer_id, treatment]
    join_on: [customer_id]
  predictions:
    model_a:
      dataset:
        type: BQ
        bq_config:
          table: test.ds.model_a
      join_on: [customer_id]
      columns: [score]
    model_b:
      dataset:
        type: BQ
        bq_config:
          query: SELECT customer_id, score FROM test.ds.model_b
      join_on: [customer_id]
      columns: [score]
  ensembler:
    uri: /unused/in/tests
    result:
{result}
  sink:
{sink}
"#
    )
}
