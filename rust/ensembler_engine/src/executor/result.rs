//! Result envelope for a batch ensembling run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::spec::annotations::AnnotationGroups;

/// Summary of one job run, logged as JSON when the run ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub job_name: String,
    /// Hex BLAKE3 hash of the canonical job spec.
    pub spec_hash: String,
    pub sink: SinkReport,
    pub passthrough_annotations: AnnotationGroups,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// What the sink did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkReport {
    pub kind: String,
    pub save_mode: String,
    pub target: Option<String>,
    pub rows_written: u64,
    pub skipped: bool,
    pub delta_version: Option<i64>,
}

impl RunResult {
    pub fn builder() -> RunResultBuilder {
        RunResultBuilder::default()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Default)]
pub struct RunResultBuilder {
    job_name: String,
    spec_hash: String,
    sink: Option<SinkReport>,
    passthrough_annotations: AnnotationGroups,
    started_at: Option<DateTime<Utc>>,
}

impl RunResultBuilder {
    pub fn with_job(mut self, job_name: impl Into<String>, spec_hash: impl Into<String>) -> Self {
        self.job_name = job_name.into();
        self.spec_hash = spec_hash.into();
        self
    }

    pub fn with_passthrough_annotations(mut self, annotations: AnnotationGroups) -> Self {
        self.passthrough_annotations = annotations;
        self
    }

    pub fn started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self
    }

    pub fn with_sink(mut self, sink: SinkReport) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Finish the result, stamping the completion time.
    pub fn build(self) -> RunResult {
        let completed_at = Utc::now();
        RunResult {
            job_name: self.job_name,
            spec_hash: self.spec_hash,
            sink: self.sink.unwrap_or_else(|| SinkReport {
                kind: String::new(),
                save_mode: String::new(),
                target: None,
                rows_written: 0,
                skipped: true,
                delta_version: None,
            }),
            passthrough_annotations: self.passthrough_annotations,
            started_at: self.started_at.unwrap_or(completed_at),
            completed_at,
        }
    }
}
