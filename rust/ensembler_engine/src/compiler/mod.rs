//! SQL generation for the combined features/predictions row.

pub mod join_planner;
pub mod sql_template;

pub use join_planner::{check_prediction_columns, dataset_sql, plan_join, JoinPlan, PredictionQuery};
