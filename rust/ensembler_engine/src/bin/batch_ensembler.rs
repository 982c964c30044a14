use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ensembler_engine::providers::Warehouse;
use ensembler_engine::session::{EnvironmentClass, EnvironmentProfile};
use ensembler_engine::{JobError, JobRunner, JobSpec};
use ensembler_ext::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use tracing::{error, info};

/// Run a batch ensembling job.
#[derive(Debug, Parser)]
#[command(name = "batch-ensembler", version)]
struct Args {
    /// Path to the YAML job spec.
    #[arg(long = "job-spec")]
    job_spec: PathBuf,

    /// DEBUG, INFO, WARNING, ERROR or CRITICAL.
    #[arg(long = "log-level", default_value = "INFO")]
    log_level: String,

    /// Root URI of the Delta warehouse.
    #[arg(
        long = "warehouse-root",
        env = "ENSEMBLER_WAREHOUSE_ROOT",
        default_value = "file:///tmp/warehouse"
    )]
    warehouse_root: String,

    /// Session sizing profile.
    #[arg(long, value_enum, default_value_t = EnvironmentClass::Small)]
    environment: EnvironmentClass,
}

async fn run(args: &Args) -> Result<(), JobError> {
    let job = JobSpec::from_path(&args.job_spec)?;
    info!(
        job = %job.name(),
        spec = %args.job_spec.display(),
        warehouse = %args.warehouse_root,
        "Loaded job spec"
    );
    let runner = JobRunner::new(
        EnvironmentProfile::from_class(args.environment),
        Warehouse::new(args.warehouse_root.clone()),
    );
    let result = runner.run(&job).await?;
    match result.to_json() {
        Ok(json) => info!(result = %json, "Run result"),
        Err(err) => error!(error = %err, "Failed to serialize run result"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(err) = init_telemetry(&TelemetryConfig::new("batch-ensembler", &args.log_level)) {
        eprintln!("batch-ensembler: {err}");
        return ExitCode::from(2);
    }

    let outcome = run(&args).await;
    let code = match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Ensembling job failed");
            ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
        }
    };
    shutdown_telemetry();
    code
}
