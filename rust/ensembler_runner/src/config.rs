//! Command line configuration of the runner.

use std::num::NonZeroUsize;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::runtime::PoolSettings;

pub const DEFAULT_PORT: u16 = 8083;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Protocol {
    Http,
    Grpc,
}

/// Serve a packaged ensembler over HTTP or GRPC.
#[derive(Debug, Clone, Parser)]
#[command(name = "ensembler-runner", version)]
pub struct RunnerArgs {
    /// Local path or URI of the ensembler artifact.
    #[arg(long = "mlflow_ensembler_dir")]
    pub ensembler_uri: String,

    /// Load the artifact and exit without serving.
    #[arg(long = "dry_run")]
    pub dry_run: bool,

    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    #[arg(long, value_enum, default_value_t = Protocol::Http)]
    pub protocol: Protocol,

    /// Worker threads running the ensembler; defaults to available parallelism.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Requests allowed to wait for a worker.
    #[arg(long = "queue-depth", default_value_t = 64)]
    pub queue_depth: usize,

    #[arg(long = "request-timeout-ms", default_value_t = 30_000)]
    pub request_timeout_ms: u64,

    #[arg(long = "shutdown-grace-secs", default_value_t = 10)]
    pub shutdown_grace_secs: u64,

    /// DEBUG, INFO, WARNING, ERROR or CRITICAL.
    #[arg(long = "log-level", env = "LOG_LEVEL", default_value = "INFO")]
    pub log_level: String,
}

impl RunnerArgs {
    pub fn pool_settings(&self) -> PoolSettings {
        let workers = self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
        });
        PoolSettings {
            workers,
            queue_depth: self.queue_depth,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
