//! End-to-end batch job execution.
//!
//! Stage order:
//! 1. Route annotations and build the session
//! 2. Apply the sink save mode against the target
//! 3. Render every dataset to SQL and plan the join
//! 4. Run the join and append the ensembler result column
//! 5. Project to `sink.columns` and write

use std::sync::Arc;

use chrono::Utc;
use datafusion::dataframe::DataFrame;
use datafusion::prelude::SessionContext;
use datafusion_common::DataFusionError;
use ensembler_plugin_common::Ensembler;
use ensembler_plugin_host::{load_ensembler, StoreOptions};
use tracing::{info, instrument, warn};

use super::ensemble::{apply_ensembler, project_columns};
use super::result::RunResult;
use super::sink_writer::{check_sink, skipped_report, write_sink, SinkDecision};
use crate::compiler::{check_prediction_columns, plan_join, PredictionQuery};
use crate::error::JobError;
use crate::providers::registration::resolve_dataset;
use crate::providers::warehouse::Warehouse;
use crate::session::{EnvironmentProfile, SessionFactory};
use crate::spec::annotations::EngineAnnotations;
use crate::spec::hashing::spec_hash_hex;
use crate::spec::JobSpec;

/// Runs ensembling jobs against one warehouse.
pub struct JobRunner {
    profile: EnvironmentProfile,
    warehouse: Warehouse,
    store_options: StoreOptions,
}

impl JobRunner {
    pub fn new(profile: EnvironmentProfile, warehouse: Warehouse) -> Self {
        Self {
            profile,
            warehouse,
            store_options: StoreOptions::default(),
        }
    }

    pub fn with_store_options(mut self, store_options: StoreOptions) -> Self {
        self.store_options = store_options;
        self
    }

    /// Session factory for `job`, with the job's storage annotations applied
    /// to the warehouse.
    pub fn session_factory(&self, job: &JobSpec) -> SessionFactory {
        let annotations = EngineAnnotations::from_annotations(&job.metadata.annotations);
        SessionFactory::new(
            self.profile.clone(),
            self.warehouse
                .clone()
                .with_storage_options(&annotations.storage_options),
        )
    }

    /// Load the job's ensembler artifact and run the job.
    pub async fn run(&self, job: &JobSpec) -> Result<RunResult, JobError> {
        let mut store_options = self.store_options.clone();
        let annotations = EngineAnnotations::from_annotations(&job.metadata.annotations);
        store_options.storage_options.extend(
            annotations
                .storage_options
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        let loaded = load_ensembler(&job.spec.ensembler.uri, &store_options).await?;
        self.run_with_ensembler(job, loaded.ensembler).await
    }

    /// Run the job with an already constructed ensembler.
    pub async fn run_with_ensembler(
        &self,
        job: &JobSpec,
        ensembler: Arc<dyn Ensembler>,
    ) -> Result<RunResult, JobError> {
        let factory = self.session_factory(job);
        let annotations = EngineAnnotations::from_annotations(&job.metadata.annotations);
        let ctx = factory.build_session(&annotations)?;
        execute_job(&ctx, factory.warehouse(), job, ensembler).await
    }
}

/// Execute `job` inside an existing session.
///
/// Tables registered in `ctx` under warehouse names take precedence over
/// the stored Delta tables.
#[instrument(skip_all, fields(job = %job.name()))]
pub async fn execute_job(
    ctx: &SessionContext,
    warehouse: &Warehouse,
    job: &JobSpec,
    ensembler: Arc<dyn Ensembler>,
) -> Result<RunResult, JobError> {
    let started_at = Utc::now();
    let spec_hash = spec_hash_hex(job).map_err(|err| DataFusionError::External(Box::new(err)))?;
    let annotations = EngineAnnotations::from_annotations(&job.metadata.annotations);
    info!(spec_hash = %spec_hash, "Starting ensembling job");
    for (group, entries) in &annotations.passthrough {
        warn!(group = %group, keys = entries.len(), "Forwarding annotations the engine does not interpret");
    }

    let builder = RunResult::builder()
        .with_job(job.name(), spec_hash)
        .with_passthrough_annotations(annotations.passthrough.clone())
        .started_at(started_at);

    let sink = &job.spec.sink;
    if check_sink(sink, warehouse).await? == SinkDecision::Skip {
        return Ok(builder.with_sink(skipped_report(sink)).build());
    }

    let output = build_output(ctx, warehouse, job, ensembler).await?;
    let report = write_sink(output, sink, warehouse).await?;
    let result = builder.with_sink(report).build();
    info!(
        rows = result.sink.rows_written,
        sink = %result.sink.kind,
        "Ensembling job finished"
    );
    Ok(result)
}

/// Plan the combined dataframe, append the result column and apply the
/// sink projection, without writing anything.
pub async fn build_output(
    ctx: &SessionContext,
    warehouse: &Warehouse,
    job: &JobSpec,
    ensembler: Arc<dyn Ensembler>,
) -> Result<DataFrame, JobError> {
    let result_type = job.result_type()?;
    if let Some(declared) = ensembler.result_type() {
        if declared != result_type {
            return Err(JobError::ResultTypeMismatch {
                ensembler: declared,
                job: result_type,
            });
        }
    }

    let spec = &job.spec;
    let features_sql = resolve_dataset(
        ctx,
        warehouse,
        &spec.source.dataset,
        "spec.source.dataset",
        "source",
    )
    .await?;
    let mut predictions = Vec::with_capacity(spec.predictions.len());
    for (idx, (model, prediction)) in spec.predictions.iter().enumerate() {
        let sql = resolve_dataset(
            ctx,
            warehouse,
            &prediction.dataset,
            &format!("spec.predictions.{model}.dataset"),
            &format!("predictions_{idx}"),
        )
        .await?;
        predictions.push(PredictionQuery {
            model: model.as_str(),
            sql,
            join_on: &prediction.join_on,
            columns: &prediction.columns,
        });
    }

    let plan = plan_join(&features_sql, &spec.source.join_on, &predictions)?;
    let combined = ctx.sql(&plan.sql).await?;
    check_prediction_columns(
        &plan,
        combined
            .schema()
            .fields()
            .iter()
            .map(|field| field.name().as_str()),
    )?;
    info!(
        models = spec.predictions.len(),
        columns = combined.schema().fields().len(),
        "Planned combined dataframe"
    );

    let result_column = &spec.ensembler.result.column_name;
    let with_result = apply_ensembler(combined, ensembler, plan.layout, result_type, result_column)?;
    Ok(project_columns(with_result, spec.sink.columns.as_deref())?)
}
