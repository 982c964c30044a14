use ensembler_engine::JobSpec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Building,
    Running,
    Terminating,
    Terminated,
    Completed,
    Failed,
    FailedSubmission,
    FailedBuilding,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Terminated
                | JobStatus::Completed
                | JobStatus::Failed
                | JobStatus::FailedSubmission
                | JobStatus::FailedBuilding
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnsemblingResources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_cpu_request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_memory_request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor_replica: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor_cpu_request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor_memory_request: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfraConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<EnsemblingResources>,
}

/// A batch ensembling job: the job spec plus where and how it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsemblingJob {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub ensembler_id: i64,
    pub environment_name: String,
    #[serde(default)]
    pub infra_config: InfraConfig,
    pub job_config: JobSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring_url: Option<String>,
}

impl EnsemblingJob {
    pub fn new(ensembler_id: i64, environment_name: impl Into<String>, job_config: JobSpec) -> Self {
        Self {
            id: None,
            name: None,
            ensembler_id,
            environment_name: environment_name.into(),
            infra_config: InfraConfig::default(),
            job_config,
            status: None,
            error: None,
            monitoring_url: None,
        }
    }

    pub fn with_infra_config(mut self, infra_config: InfraConfig) -> Self {
        self.infra_config = infra_config;
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_status_wire_names() {
        let status: JobStatus = serde_json::from_value(json!("failed_submission")).unwrap();
        assert_eq!(status, JobStatus::FailedSubmission);
        assert!(status.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        let status: JobStatus = serde_json::from_value(json!("queued")).unwrap();
        assert_eq!(status, JobStatus::Unknown);
    }
}
