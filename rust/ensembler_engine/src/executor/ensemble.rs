//! Appending the ensembler result column to the combined dataframe.

use std::sync::Arc;

use datafusion::dataframe::DataFrame;
use datafusion::functions::core::expr_fn::named_struct;
use datafusion::prelude::{cast, lit};
use datafusion_common::{Column, DataFusionError, Result};
use datafusion_expr::{Expr, ScalarUDF};
use ensembler_ext::result_type::{declared_data_type, native_data_type};
use ensembler_ext::{EnsembleUdf, RowLayout};
use ensembler_plugin_common::{Ensembler, ResultType};
use tracing::debug;

pub const ENSEMBLE_UDF_NAME: &str = "ensemble";

/// Add `result_column` holding the ensembler output for every row.
///
/// The UDF receives one struct of every column of `df`. When the declared
/// Arrow type is narrower than what the UDF produces (`INTEGER`, `FLOAT` and
/// their array forms) the output is cast, and an out-of-range value fails
/// the query.
pub fn apply_ensembler(
    df: DataFrame,
    ensembler: Arc<dyn Ensembler>,
    layout: RowLayout,
    result_type: ResultType,
    result_column: &str,
) -> Result<DataFrame> {
    let mut struct_args = Vec::with_capacity(df.schema().fields().len() * 2);
    for (qualifier, field) in df.schema().iter() {
        struct_args.push(lit(field.name().as_str()));
        struct_args.push(Expr::Column(Column::new(qualifier.cloned(), field.name())));
    }
    if struct_args.is_empty() {
        return Err(DataFusionError::Plan(
            "Cannot apply an ensembler to a dataframe without columns".to_string(),
        ));
    }

    let udf = ScalarUDF::new_from_impl(EnsembleUdf::new(
        ENSEMBLE_UDF_NAME,
        ensembler,
        layout,
        result_type,
    ));
    let mut expr = udf.call(vec![named_struct(struct_args)]);

    let native = native_data_type(&result_type);
    let declared = declared_data_type(&result_type);
    if native != declared {
        debug!(from = %native, to = %declared, "Casting ensembler output to declared type");
        expr = cast(expr, declared);
    }
    df.with_column(result_column, expr)
}

/// Keep exactly `columns`, in the given order.
pub fn project_columns(df: DataFrame, columns: Option<&[String]>) -> Result<DataFrame> {
    match columns {
        Some(columns) => {
            let names: Vec<&str> = columns.iter().map(String::as_str).collect();
            df.select_columns(&names)
        }
        None => Ok(df),
    }
}
