//! Job specification: YAML document types, validation, annotation routing
//! and canonical hashing.

pub mod annotations;
pub mod dataset;
pub mod error;
pub mod hashing;
pub mod job;
pub mod sink;

pub use annotations::{group_annotations, EngineAnnotations};
pub use dataset::{Dataset, DatasetSource, TableId};
pub use error::SpecError;
pub use job::{EnsemblingSpec, JobSpec, PredictionSource, ResultConfig, Source};
pub use sink::{SaveMode, Sink, SinkTarget};
