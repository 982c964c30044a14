//! Batch execution: ensembler application, sinks and the job pipeline.

pub mod ensemble;
pub mod pipeline;
pub mod result;
pub mod sink_writer;

pub use pipeline::{build_output, execute_job, JobRunner};
pub use result::{RunResult, SinkReport};
