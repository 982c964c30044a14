//! Wire types of the control-plane API.

pub mod ensembler;
pub mod job;
pub mod router;

use serde::{Deserialize, Serialize};

pub use ensembler::{BuildImageRequest, Ensembler, EnsemblerImage, EnsemblerType, ImageBuildStatus, ImageRunnerType};
pub use job::{EnsemblingJob, EnsemblingResources, InfraConfig, JobStatus};
pub use router::{
    Enricher, ExperimentEngine, FieldSource, ResourceRequest, Route, Router, RouterConfig,
    RouterEnsemblerConfig, RouterStatus, RouterVersion, RuleOperator, TrafficRule,
    TrafficRuleCondition,
};

/// Paged list responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    pub total: u64,
    pub page: u32,
    pub pages: u32,
}

/// Query parameters of paged list calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}
