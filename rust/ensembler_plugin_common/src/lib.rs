//! Contract shared by ensembler implementations and the runtimes that host them.
//!
//! Batch jobs and the online runner both reduce a request to an [`EnsembleInput`]
//! and hand it to an [`Ensembler`]. Plugins loaded through the C ABI are wrapped
//! behind the same trait, so callers never care where an ensembler came from.

mod ensembler;
mod input;
mod result_type;
mod row;
mod value;

pub use ensembler::{caps, invoke, panic_message, EnsemblerError, Ensembler, FnEnsembler};
pub use input::{Artifacts, EnsembleInput, Headers};
pub use result_type::{PrimitiveType, ResultType, ResultTypeError};
pub use row::Row;
pub use value::Value;

/// Prefix carried by every joined prediction column in batch mode.
pub const PREDICTION_COLUMN_PREFIX: &str = "__predictions__";
/// Prefix applied to flattened request fields in online mode.
pub const FEATURE_PREFIX: &str = "__features__";
/// Prefix applied to the flattened experiment treatment in online mode.
pub const TREATMENT_CONFIG_PREFIX: &str = "__treatment_config__";

/// Column name under which `column` of prediction source `model` is joined.
pub fn prediction_alias(model: &str, column: &str) -> String {
    format!("{PREDICTION_COLUMN_PREFIX}{model}_{column}")
}

pub fn parse_major(version: &str) -> Result<u16, String> {
    let major = version.split_once('.').map_or(version, |(major, _)| major);
    major
        .trim()
        .parse::<u16>()
        .map_err(|err| format!("Invalid version string {version:?}: {err}"))
}
