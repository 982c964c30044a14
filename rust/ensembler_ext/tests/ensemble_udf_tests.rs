use std::sync::Arc;

use arrow::array::{AsArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::SessionContext;
use datafusion_expr::ScalarUDF;
use ensembler_ext::{EnsembleUdf, RowLayout};
use ensembler_plugin_common::{
    EnsembleInput, EnsemblerError, FnEnsembler, Headers, PrimitiveType, ResultType, Value,
};

fn joined_table() -> MemTable {
    let schema = Arc::new(Schema::new(vec![
        Field::new("customer_id", DataType::Int64, false),
        Field::new("segment", DataType::Utf8, true),
        Field::new("__predictions__model_a_score", DataType::Float64, true),
        Field::new("__predictions__model_b_score", DataType::Float64, true),
    ]));
    let batch = RecordBatch::try_new(
        Arc::clone(&schema),
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3])),
            Arc::new(StringArray::from(vec![Some("gold"), None, Some("silver")])),
            Arc::new(Float64Array::from(vec![Some(0.5), Some(0.25), None])),
            Arc::new(Float64Array::from(vec![Some(1.5), None, None])),
        ],
    )
    .expect("batch");
    MemTable::try_new(schema, vec![vec![batch]]).expect("mem table")
}

fn layout() -> RowLayout {
    let mut layout = RowLayout::new();
    layout.add_prediction("model_a", "score", "__predictions__model_a_score");
    layout.add_prediction("model_b", "score", "__predictions__model_b_score");
    layout
}

fn sum_scores(input: &EnsembleInput, _: Option<&Headers>) -> Result<Value, EnsemblerError> {
    assert!(input.features.contains_key("customer_id"));
    assert!(!input.features.contains_key("__predictions__model_a_score"));
    let total: f64 = input
        .predictions
        .iter()
        .filter_map(|(_, prediction)| prediction["score"].as_f64())
        .sum();
    Ok(Value::Float(total))
}

const QUERY: &str = r#"SELECT ensemble(named_struct(
    'customer_id', customer_id,
    'segment', segment,
    '__predictions__model_a_score', "__predictions__model_a_score",
    '__predictions__model_b_score', "__predictions__model_b_score"
)) AS result FROM joined ORDER BY customer_id"#;

#[tokio::test]
async fn ensemble_udf_sees_stripped_predictions() {
    let ctx = SessionContext::new();
    ctx.register_table("joined", Arc::new(joined_table()))
        .expect("register");
    let udf = EnsembleUdf::new(
        "ensemble",
        Arc::new(FnEnsembler::new(sum_scores)),
        layout(),
        ResultType::Primitive(PrimitiveType::Double),
    );
    ctx.register_udf(ScalarUDF::new_from_impl(udf));

    let batches = ctx.sql(QUERY).await.expect("plan").collect().await.expect("collect");
    let values: Vec<f64> = batches
        .iter()
        .flat_map(|batch| batch.column(0).as_primitive::<Float64Type>().values().to_vec())
        .collect();
    assert_eq!(values, vec![2.0, 0.25, 0.0]);
}

#[tokio::test]
async fn ensemble_udf_returns_native_integers() {
    let ctx = SessionContext::new();
    ctx.register_table("joined", Arc::new(joined_table()))
        .expect("register");
    let udf = EnsembleUdf::new(
        "ensemble",
        Arc::new(FnEnsembler::new(|input: &EnsembleInput, _: Option<&Headers>| {
            Ok(input.features["customer_id"].clone())
        })),
        layout(),
        ResultType::Primitive(PrimitiveType::Integer),
    );
    ctx.register_udf(ScalarUDF::new_from_impl(udf));

    let batches = ctx.sql(QUERY).await.expect("plan").collect().await.expect("collect");
    let column = batches[0].column(0);
    assert_eq!(column.data_type(), &DataType::Int64);
    assert_eq!(column.as_primitive::<Int64Type>().value(2), 3);
}

#[tokio::test]
async fn ensemble_udf_surfaces_type_mismatch() {
    let ctx = SessionContext::new();
    ctx.register_table("joined", Arc::new(joined_table()))
        .expect("register");
    let udf = EnsembleUdf::new(
        "ensemble",
        Arc::new(FnEnsembler::new(|_: &EnsembleInput, _: Option<&Headers>| {
            Ok(Value::from("not a number"))
        })),
        layout(),
        ResultType::Primitive(PrimitiveType::Double),
    );
    ctx.register_udf(ScalarUDF::new_from_impl(udf));

    let err = ctx
        .sql(QUERY)
        .await
        .expect("plan")
        .collect()
        .await
        .expect_err("string result for DOUBLE column");
    assert!(err.to_string().contains("does not match declared type DOUBLE"), "{err}");
}
