use std::error::Error;
use std::fmt;

use arrow::error::ArrowError;
use datafusion_common::DataFusionError;
use ensembler_plugin_common::EnsemblerError;

#[derive(Debug)]
pub enum ExtError {
    DataFusion(Box<DataFusionError>),
    Arrow(ArrowError),
    Json(serde_json::Error),
    /// User code failed while scoring one row of a batch.
    Ensembler {
        row: usize,
        source: EnsemblerError,
    },
}

impl fmt::Display for ExtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtError::DataFusion(err) => write!(f, "DataFusion error: {err}"),
            ExtError::Arrow(err) => write!(f, "Arrow error: {err}"),
            ExtError::Json(err) => write!(f, "JSON error: {err}"),
            ExtError::Ensembler { row, source } => {
                write!(f, "Ensembler failed on row {row}: {source}")
            }
        }
    }
}

impl Error for ExtError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ExtError::DataFusion(err) => Some(err.as_ref()),
            ExtError::Arrow(err) => Some(err),
            ExtError::Json(err) => Some(err),
            ExtError::Ensembler { source, .. } => Some(source),
        }
    }
}

crate::impl_error_from!(ExtError, ArrowError, Arrow);
crate::impl_error_from!(ExtError, DataFusionError, DataFusion, |err| Box::new(err));
crate::impl_error_from!(ExtError, serde_json::Error, Json);

impl From<ExtError> for DataFusionError {
    fn from(err: ExtError) -> Self {
        match err {
            ExtError::DataFusion(inner) => *inner,
            ExtError::Arrow(inner) => DataFusionError::from(inner),
            other => DataFusionError::Execution(other.to_string()),
        }
    }
}

pub type ExtResult<T> = std::result::Result<T, ExtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensembler_error_becomes_execution_error() {
        let err = ExtError::Ensembler {
            row: 2,
            source: EnsemblerError::Failed("no score".to_string()),
        };
        assert!(err.source().is_some());
        match DataFusionError::from(err) {
            DataFusionError::Execution(message) => {
                assert_eq!(message, "Ensembler failed on row 2: ensembler failed: no score")
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
