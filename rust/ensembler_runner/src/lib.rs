//! Online ensembler runner.
//!
//! A request body `{request, response: {route_responses, experiment}}` is
//! flattened into one dotted-key row under the reserved feature, prediction
//! and treatment-config prefixes, split back into an [`EnsembleInput`] and
//! handed to the loaded ensembler on a bounded worker pool. The JSON result is
//! the response body.
//!
//! [`EnsembleInput`]: ensembler_plugin_common::EnsembleInput

pub mod config;
pub mod error;
pub mod flatten;
pub mod grpc;
pub mod http;
pub mod lifecycle;
pub mod loader;
pub mod normalize;
pub mod pool;
pub mod runtime;
pub mod server;

pub use config::{Protocol, RunnerArgs, DEFAULT_PORT};
pub use error::{RequestError, RunnerError};
pub use lifecycle::{Lifecycle, Phase};
pub use loader::{ArtifactLoader, EnsemblerLoader};
pub use runtime::{EnsemblerRuntime, PoolSettings};
pub use server::{run, serve, shutdown_signal};
