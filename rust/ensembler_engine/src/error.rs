use datafusion_common::DataFusionError;
use ensembler_plugin_common::ResultType;
use ensembler_plugin_host::HostError;
use thiserror::Error;

use crate::spec::SpecError;

/// Top-level failure of a batch job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Spec(#[from] SpecError),
    #[error("Failed to load ensembler: {0}")]
    Ensembler(#[from] HostError),
    #[error("Ensembler declares result type {ensembler} but the job declares {job}")]
    ResultTypeMismatch { ensembler: ResultType, job: ResultType },
    #[error(transparent)]
    Execution(#[from] DataFusionError),
}

impl JobError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            JobError::Spec(_) => 2,
            JobError::Ensembler(_) | JobError::ResultTypeMismatch { .. } => 3,
            JobError::Execution(_) => 1,
        }
    }
}
