//! Batch ensembling engine.
//!
//! Reads a YAML job spec, joins the features source with every prediction
//! source in one DataFusion query, applies the packaged ensembler as a
//! scalar UDF over the combined row and writes the typed result to a sink.
//!
//! Design principles:
//! 1. One SessionContext per job
//! 2. One join query, rendered through an identifier-escaping templater
//! 3. Warehouse tables resolve lazily through the session catalog
//! 4. Delta-native sinks with explicit save modes

pub mod compiler;
pub mod error;
pub mod executor;
pub mod providers;
pub mod session;
pub mod spec;

pub use error::JobError;
pub use executor::{execute_job, JobRunner, RunResult};
pub use spec::{JobSpec, SpecError};
