//! DataFusion plumbing for running ensemblers over tables, plus the logging
//! bootstrap both binaries share.

pub mod error_conversion;
pub mod errors;
pub mod result_type;
pub mod telemetry;
pub mod udf;

pub use errors::{ExtError, ExtResult};
pub use udf::{EnsembleUdf, RowLayout};
