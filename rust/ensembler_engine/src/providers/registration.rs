//! Dataset registration.
//!
//! Turns each dataset of a job into the SQL the join planner nests. Table
//! datasets read through the warehouse catalog; a `version` reader option
//! pins the Delta snapshot by registering it under an internal name.

use std::sync::Arc;

use datafusion::prelude::SessionContext;
use datafusion_common::{DataFusionError, Result};
use tracing::{info, warn};

use super::warehouse::Warehouse;
use crate::compiler::dataset_sql;
use crate::spec::dataset::{Dataset, DatasetSource, VERSION_OPTION};

/// Prefix of the names version-pinned tables are registered under.
pub const PINNED_TABLE_PREFIX: &str = "__ensembler_pinned_";

/// Render a dataset to SQL, registering a pinned snapshot when requested.
///
/// # Arguments
/// * `ctx` - Session the job runs in
/// * `warehouse` - Warehouse holding the table datasets
/// * `dataset` - Dataset descriptor from the job spec
/// * `path` - Spec path of the dataset, used in messages
/// * `slot` - Distinguishes the pinned registration of this dataset
pub async fn resolve_dataset(
    ctx: &SessionContext,
    warehouse: &Warehouse,
    dataset: &Dataset,
    path: &str,
    slot: &str,
) -> Result<String> {
    let source = dataset
        .source(path)
        .map_err(|err| DataFusionError::Plan(err.to_string()))?;
    let version = dataset
        .version_pin(path)
        .map_err(|err| DataFusionError::Plan(err.to_string()))?;

    for key in dataset.options().keys() {
        if key != VERSION_OPTION {
            warn!(path, option = %key, "Ignoring unsupported reader option");
        }
    }

    match (&source, version) {
        (DatasetSource::Table { table, .. }, Some(version)) => {
            let provider = warehouse
                .table_provider(table, Some(version))
                .await?
                .ok_or_else(|| {
                    DataFusionError::Plan(format!(
                        "Table {table} not found in warehouse {} (needed by {path})",
                        warehouse.root()
                    ))
                })?;
            let name = format!("{PINNED_TABLE_PREFIX}{slot}");
            ctx.register_table(name.as_str(), Arc::clone(&provider))?;
            info!(path, table = %table, version, registered_as = %name, "Pinned table version");
            dataset_sql(&source, Some(&name))
        }
        (DatasetSource::Query(_), Some(_)) => {
            warn!(path, "Reader option `version` only applies to table datasets; ignoring");
            dataset_sql(&source, None)
        }
        _ => dataset_sql(&source, None),
    }
}
