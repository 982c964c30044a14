use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading or validating a job spec.
///
/// Every variant carries the dotted path of the offending field so a job
/// author can find it in the YAML.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("failed to read job spec {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid job spec at `{path}`: {details}")]
    Parse { path: String, details: String },
    #[error("invalid job spec at `{path}`: {details}")]
    Invalid { path: String, details: String },
}

impl SpecError {
    pub fn invalid(path: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.into(),
            details: details.into(),
        }
    }

    /// Path of the field the error refers to, `.` for the document root.
    pub fn path(&self) -> &str {
        match self {
            Self::Io { .. } => ".",
            Self::Parse { path, .. } | Self::Invalid { path, .. } => path,
        }
    }
}
