//! Join planning between the features source and the prediction sources.
//!
//! The planner renders one SQL statement:
//!
//! ```text
//! WITH "__ensembler_features" AS (<features query>),
//!      "__ensembler_predictions_0" AS (
//!          SELECT "k", "score" AS "__predictions__model_a_score" FROM (<query>) AS "src"),
//!      ...
//! SELECT "__ensembler_features".*, "__ensembler_predictions_0"."__predictions__model_a_score", ...
//! FROM "__ensembler_features"
//! LEFT JOIN "__ensembler_predictions_0"
//!   ON "__ensembler_features"."k" = "__ensembler_predictions_0"."k"
//! ...
//! ```
//!
//! Joins use explicit qualified equalities so the join keys of the features
//! side are the only copies that reach the combined row.

use std::collections::BTreeMap;

use datafusion_common::{DataFusionError, Result};
use ensembler_ext::RowLayout;
use ensembler_plugin_common::{prediction_alias, PREDICTION_COLUMN_PREFIX};
use tracing::debug;

use super::sql_template::{quote_ident, quote_path, trim_query, SqlTemplate};
use crate::spec::dataset::DatasetSource;

const FEATURES_CTE: &str = "__ensembler_features";
const PREDICTIONS_CTE: &str = "__ensembler_predictions";

/// One prediction source, with its dataset already rendered to SQL.
#[derive(Debug, Clone)]
pub struct PredictionQuery<'a> {
    pub model: &'a str,
    pub sql: String,
    pub join_on: &'a [String],
    pub columns: &'a [String],
}

/// Output of join planning.
#[derive(Debug, Clone)]
pub struct JoinPlan {
    pub sql: String,
    /// Maps the prefixed prediction columns back to `(model, column)`.
    pub layout: RowLayout,
    /// Every prefixed prediction column, in select order.
    pub prediction_columns: Vec<String>,
}

/// Render the SQL reading a dataset.
///
/// `table_override` replaces the warehouse table reference, used when the
/// table was registered under an internal name (e.g. a version-pinned scan).
pub fn dataset_sql(source: &DatasetSource<'_>, table_override: Option<&str>) -> Result<String> {
    match source {
        DatasetSource::Query(query) => Ok(trim_query(query).to_string()),
        DatasetSource::Table { table, features } => {
            let table_ref = match table_override {
                Some(name) => quote_ident(name),
                None => quote_path([
                    table.project.as_str(),
                    table.dataset.as_str(),
                    table.table.as_str(),
                ]),
            };
            let template = SqlTemplate::new("SELECT {{columns}} FROM {{table}}")
                .trusted("table", table_ref);
            match features {
                Some(features) => template.idents("columns", features).render(),
                None => template.trusted("columns", "*").render(),
            }
        }
    }
}

/// Build the combined-row query.
pub fn plan_join(
    features_sql: &str,
    source_join_on: &[String],
    predictions: &[PredictionQuery<'_>],
) -> Result<JoinPlan> {
    let mut layout = RowLayout::new();
    let mut prediction_columns = Vec::new();
    let mut owners: BTreeMap<String, (&str, &str)> = BTreeMap::new();
    let mut ctes = vec![SqlTemplate::new("{{name}} AS ({{query}})")
        .ident("name", FEATURES_CTE)
        .trusted("query", trim_query(features_sql))
        .render()?];
    let mut selected = vec![format!("{}.*", quote_ident(FEATURES_CTE))];
    let mut joins = Vec::with_capacity(predictions.len());

    for (idx, prediction) in predictions.iter().enumerate() {
        if let Some(column) = prediction
            .join_on
            .iter()
            .find(|column| !source_join_on.contains(column))
        {
            return Err(DataFusionError::Plan(format!(
                "Join column '{column}' of predictions '{}' is not a join column of the source",
                prediction.model
            )));
        }

        let cte_name = format!("{PREDICTIONS_CTE}_{idx}");
        let mut projections: Vec<String> =
            prediction.join_on.iter().map(|c| quote_ident(c)).collect();
        for column in prediction.columns {
            let alias = prediction_alias(prediction.model, column);
            if let Some((other_model, other_column)) =
                owners.insert(alias.clone(), (prediction.model, column.as_str()))
            {
                return Err(DataFusionError::Plan(format!(
                    "Prediction column '{column}' of model '{}' and column '{other_column}' of \
                     model '{other_model}' both map to '{alias}'",
                    prediction.model
                )));
            }
            projections.push(
                SqlTemplate::new("{{column}} AS {{alias}}")
                    .ident("column", column)
                    .ident("alias", &alias)
                    .render()?,
            );
            selected.push(format!("{}.{}", quote_ident(&cte_name), quote_ident(&alias)));
            layout.add_prediction(prediction.model, column, &alias);
            prediction_columns.push(alias);
        }

        ctes.push(
            SqlTemplate::new("{{name}} AS (SELECT {{projections}} FROM ({{query}}) AS {{src}})")
                .ident("name", &cte_name)
                .trusted("projections", projections.join(", "))
                .trusted("query", trim_query(&prediction.sql))
                .ident("src", "src")
                .render()?,
        );

        let condition = prediction
            .join_on
            .iter()
            .map(|column| {
                SqlTemplate::new("{{features}}.{{column}} = {{predictions}}.{{column}}")
                    .ident("features", FEATURES_CTE)
                    .ident("predictions", &cte_name)
                    .ident("column", column)
                    .render()
            })
            .collect::<Result<Vec<_>>>()?
            .join(" AND ");
        joins.push(
            SqlTemplate::new("LEFT JOIN {{name}} ON {{condition}}")
                .ident("name", &cte_name)
                .trusted("condition", condition)
                .render()?,
        );
    }

    let sql = SqlTemplate::new("WITH {{ctes}}\nSELECT {{selected}}\nFROM {{features}}{{joins}}")
        .trusted("ctes", ctes.join(",\n"))
        .trusted("selected", selected.join(", "))
        .ident("features", FEATURES_CTE)
        .trusted(
            "joins",
            joins
                .iter()
                .map(|join| format!("\n{join}"))
                .collect::<String>(),
        )
        .render()?;
    debug!(sql = %sql, "Planned ensembling join");

    Ok(JoinPlan {
        sql,
        layout,
        prediction_columns,
    })
}

/// Check that the combined schema carries exactly the planned prediction
/// columns under the reserved prefix.
pub fn check_prediction_columns<'a>(
    plan: &JoinPlan,
    column_names: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    let mut seen = Vec::new();
    for name in column_names {
        if !name.starts_with(PREDICTION_COLUMN_PREFIX) {
            continue;
        }
        if !plan.prediction_columns.iter().any(|alias| alias == name) {
            return Err(DataFusionError::Plan(format!(
                "Column '{name}' uses the reserved prefix {PREDICTION_COLUMN_PREFIX} but is not \
                 a planned prediction column"
            )));
        }
        if seen.contains(&name) {
            return Err(DataFusionError::Plan(format!(
                "Prediction column '{name}' appears more than once in the joined row"
            )));
        }
        seen.push(name);
    }
    if let Some(missing) = plan
        .prediction_columns
        .iter()
        .find(|alias| !seen.contains(&alias.as_str()))
    {
        return Err(DataFusionError::Plan(format!(
            "Prediction column '{missing}' is missing from the joined row"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::dataset::TableId;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_dataset_sql_from_table() {
        let features = strings(&["customer_id", "segment"]);
        let source = DatasetSource::Table {
            table: TableId::new("p", "d", "customers"),
            features: Some(&features),
        };
        assert_eq!(
            dataset_sql(&source, None).unwrap(),
            "SELECT \"customer_id\", \"segment\" FROM \"p\".\"d\".\"customers\""
        );
        let all = DatasetSource::Table {
            table: TableId::new("p", "d", "customers"),
            features: None,
        };
        assert_eq!(
            dataset_sql(&all, Some("__pinned_0")).unwrap(),
            "SELECT * FROM \"__pinned_0\""
        );
    }

    #[test]
    fn test_dataset_sql_query_trusted() {
        let source = DatasetSource::Query("SELECT a FROM t WHERE b = 'x';");
        assert_eq!(
            dataset_sql(&source, None).unwrap(),
            "SELECT a FROM t WHERE b = 'x'"
        );
    }

    #[test]
    fn test_plan_join_prefixes_columns() {
        let join_on = strings(&["customer_id", "target_date"]);
        let a_join = strings(&["customer_id", "target_date"]);
        let a_cols = strings(&["score"]);
        let b_join = strings(&["customer_id"]);
        let b_cols = strings(&["score", "label"]);
        let plan = plan_join(
            "SELECT * FROM features",
            &join_on,
            &[
                PredictionQuery {
                    model: "model_a",
                    sql: "SELECT * FROM a".to_string(),
                    join_on: &a_join,
                    columns: &a_cols,
                },
                PredictionQuery {
                    model: "model_b",
                    sql: "SELECT * FROM b".to_string(),
                    join_on: &b_join,
                    columns: &b_cols,
                },
            ],
        )
        .unwrap();

        assert_eq!(
            plan.prediction_columns,
            strings(&[
                "__predictions__model_a_score",
                "__predictions__model_b_score",
                "__predictions__model_b_label",
            ])
        );
        assert!(plan.sql.contains(
            "\"__ensembler_predictions_1\" AS (SELECT \"customer_id\", \"score\" AS \
             \"__predictions__model_b_score\", \"label\" AS \"__predictions__model_b_label\" \
             FROM (SELECT * FROM b) AS \"src\")"
        ));
        assert!(plan.sql.contains(
            "LEFT JOIN \"__ensembler_predictions_0\" ON \"__ensembler_features\".\"customer_id\" \
             = \"__ensembler_predictions_0\".\"customer_id\" AND \
             \"__ensembler_features\".\"target_date\" = \"__ensembler_predictions_0\".\"target_date\""
        ));
        assert!(plan.layout.is_prediction_column("__predictions__model_b_label"));
    }

    #[test]
    fn test_alias_collision_rejected() {
        let join_on = strings(&["id"]);
        let cols_c = strings(&["b_c"]);
        let cols_bc = strings(&["c"]);
        let err = plan_join(
            "SELECT 1 AS id",
            &join_on,
            &[
                PredictionQuery {
                    model: "a",
                    sql: "SELECT 1 AS id, 2 AS b_c".to_string(),
                    join_on: &join_on,
                    columns: &cols_c,
                },
                PredictionQuery {
                    model: "a_b",
                    sql: "SELECT 1 AS id, 2 AS c".to_string(),
                    join_on: &join_on,
                    columns: &cols_bc,
                },
            ],
        )
        .unwrap_err();
        assert!(err.to_string().contains("__predictions__a_b_c"), "{err}");
    }

    #[test]
    fn test_unknown_join_column_rejected() {
        let join_on = strings(&["id"]);
        let other = strings(&["account"]);
        let cols = strings(&["score"]);
        let err = plan_join(
            "SELECT 1 AS id",
            &join_on,
            &[PredictionQuery {
                model: "m",
                sql: "SELECT 1 AS account, 0.5 AS score".to_string(),
                join_on: &other,
                columns: &cols,
            }],
        )
        .unwrap_err();
        assert!(err.to_string().contains("account"));
    }

    #[test]
    fn test_check_prediction_columns() {
        let join_on = strings(&["id"]);
        let cols = strings(&["score"]);
        let plan = plan_join(
            "SELECT 1 AS id",
            &join_on,
            &[PredictionQuery {
                model: "m",
                sql: "SELECT 1 AS id, 0.5 AS score".to_string(),
                join_on: &join_on,
                columns: &cols,
            }],
        )
        .unwrap();
        check_prediction_columns(&plan, ["id", "__predictions__m_score"]).unwrap();
        assert!(check_prediction_columns(
            &plan,
            ["id", "__predictions__rogue", "__predictions__m_score"]
        )
        .is_err());
        assert!(check_prediction_columns(&plan, ["id"]).is_err());
    }
}
