//! Session factory for ensembling jobs.
//!
//! Uses SessionStateBuilder for builder-first session creation with the
//! warehouse catalog list installed up front.

use std::sync::Arc;

use datafusion::execution::context::SessionContext;
use datafusion::execution::disk_manager::{DiskManagerBuilder, DiskManagerMode};
use datafusion::execution::memory_pool::FairSpillPool;
use datafusion::execution::runtime_env::RuntimeEnvBuilder;
use datafusion::execution::session_state::SessionStateBuilder;
use datafusion::prelude::SessionConfig;
use datafusion_common::{DataFusionError, Result};
use tracing::debug;

use super::profiles::EnvironmentProfile;
use crate::providers::warehouse::{Warehouse, WarehouseCatalogList};
use crate::spec::annotations::EngineAnnotations;

pub const DEFAULT_CATALOG: &str = "ensembler";
pub const DEFAULT_SCHEMA: &str = "public";

/// Factory for job sessions.
pub struct SessionFactory {
    profile: EnvironmentProfile,
    warehouse: Arc<Warehouse>,
}

impl SessionFactory {
    pub fn new(profile: EnvironmentProfile, warehouse: Warehouse) -> Self {
        Self {
            profile,
            warehouse: Arc::new(warehouse),
        }
    }

    pub fn profile(&self) -> &EnvironmentProfile {
        &self.profile
    }

    pub fn warehouse(&self) -> &Arc<Warehouse> {
        &self.warehouse
    }

    /// Builds the SessionContext a job runs in.
    ///
    /// Construction order:
    /// 1. Build RuntimeEnv with memory pool and disk manager
    /// 2. Build SessionConfig from the profile, then apply `datafusion/*` annotations
    /// 3. Build SessionState with the warehouse catalog list
    ///
    /// # Errors
    /// Returns a plan error naming the annotation when a `datafusion/*`
    /// annotation is not a valid config key or value.
    pub fn build_session(&self, annotations: &EngineAnnotations) -> Result<SessionContext> {
        let memory_pool = Arc::new(FairSpillPool::new(self.profile.memory_pool_size()?));
        let disk_manager_builder =
            DiskManagerBuilder::default().with_mode(DiskManagerMode::OsTmpDirectory);

        let runtime = RuntimeEnvBuilder::default()
            .with_memory_pool(memory_pool)
            .with_disk_manager_builder(disk_manager_builder)
            .build_arc()?;

        let mut config = SessionConfig::new()
            .with_default_catalog_and_schema(DEFAULT_CATALOG, DEFAULT_SCHEMA)
            .with_information_schema(true)
            .with_target_partitions(self.profile.target_partitions as usize)
            .with_batch_size(self.profile.batch_size as usize)
            .with_repartition_joins(true);

        let config_opts = config.options_mut();
        config_opts.optimizer.skip_failed_rules = false;
        // Warehouse identifiers are case-sensitive.
        config_opts.sql_parser.enable_ident_normalization = false;

        for (key, value) in annotations.datafusion_config_entries() {
            config_opts.set(&key, value).map_err(|err| {
                DataFusionError::Plan(format!(
                    "Invalid datafusion annotation '{key}' = '{value}': {err}"
                ))
            })?;
            debug!(key = %key, value, "Applied datafusion annotation");
        }

        let catalog_list = Arc::new(WarehouseCatalogList::new(Arc::clone(&self.warehouse)));
        let state = SessionStateBuilder::new()
            .with_config(config)
            .with_runtime_env(runtime)
            .with_default_features()
            .with_catalog_list(catalog_list)
            .build();

        Ok(SessionContext::new_with_state(state))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use datafusion::datasource::MemTable;

    use super::*;
    use crate::session::profiles::EnvironmentClass;

    fn factory() -> SessionFactory {
        SessionFactory::new(
            EnvironmentProfile::from_class(EnvironmentClass::Small),
            Warehouse::new("memory:///warehouse"),
        )
    }

    fn annotations(entries: &[(&str, &str)]) -> EngineAnnotations {
        let raw: BTreeMap<String, String> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineAnnotations::from_annotations(&raw)
    }

    #[tokio::test]
    async fn test_session_factory_builds_context() {
        let ctx = factory().build_session(&EngineAnnotations::default()).unwrap();
        let batches = ctx.sql("SELECT 1 AS one").await.unwrap().collect().await.unwrap();
        assert_eq!(batches[0].num_rows(), 1);
        assert_eq!(ctx.state().config().target_partitions(), 4);
    }

    #[tokio::test]
    async fn test_datafusion_annotations_applied() {
        let ctx = factory()
            .build_session(&annotations(&[("datafusion/execution.batch_size", "1024")]))
            .unwrap();
        assert_eq!(ctx.state().config().batch_size(), 1024);
    }

    #[test]
    fn test_invalid_datafusion_annotation() {
        let err = factory()
            .build_session(&annotations(&[("datafusion/execution.no_such_knob", "1")]))
            .err().expect("expected build_session to fail");
        assert!(err.to_string().contains("execution.no_such_knob"), "{err}");
    }

    #[tokio::test]
    async fn test_registered_warehouse_table_resolves() {
        let ctx = factory().build_session(&EngineAnnotations::default()).unwrap();
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        let batch = RecordBatch::try_new(
            Arc::clone(&schema),
            vec![Arc::new(Int64Array::from(vec![1, 2, 3]))],
        )
        .unwrap();
        let table = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
        ctx.register_table("proj.ds.ids", Arc::new(table)).unwrap();

        let batches = ctx
            .sql("SELECT count(*) AS n FROM proj.ds.ids")
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();
        let counts = batches[0]
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(counts.value(0), 3);
    }
}
