use std::process::ExitCode;

use clap::Parser;
use ensembler_ext::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use ensembler_plugin_host::StoreOptions;
use ensembler_runner::{run, shutdown_signal, ArtifactLoader, RunnerArgs};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let args = RunnerArgs::parse();
    if let Err(err) = init_telemetry(&TelemetryConfig::new("ensembler-runner", &args.log_level)) {
        eprintln!("ensembler-runner: {err}");
        return ExitCode::from(2);
    }

    let loader = ArtifactLoader::new(StoreOptions::default());
    let code = match run(&args, &loader, shutdown_signal()).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Ensembler runner failed");
            ExitCode::FAILURE
        }
    };
    shutdown_telemetry();
    code
}
