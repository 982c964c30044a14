use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnsemblerType {
    #[default]
    #[serde(rename = "pyfunc")]
    PyFunc,
    #[serde(rename = "docker")]
    Docker,
}

/// A registered ensembler and the artifact it was packaged into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ensembler {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: EnsemblerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mlflow_experiment_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mlflow_run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Ensembler {
    pub fn pyfunc(name: impl Into<String>, artifact_uri: impl Into<String>) -> Self {
        Self {
            id: None,
            project_id: None,
            name: name.into(),
            kind: EnsemblerType::PyFunc,
            artifact_uri: Some(artifact_uri.into()),
            mlflow_experiment_id: None,
            mlflow_run_id: None,
            python_version: None,
            created_at: None,
            updated_at: None,
        }
    }
}

/// Which runtime an ensembler image is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageRunnerType {
    Job,
    Service,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageBuildStatus {
    #[default]
    Unknown,
    Active,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsemblerImage {
    pub project_id: i64,
    pub ensembler_id: i64,
    pub runner_type: ImageRunnerType,
    pub image_ref: String,
    #[serde(default)]
    pub exists: bool,
    #[serde(default)]
    pub image_building_job_status: ImageBuildStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildImageRequest {
    pub runner_type: ImageRunnerType,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_pyfunc_kind_on_the_wire() {
        let wire = serde_json::to_value(Ensembler::pyfunc("ens", "gs://bucket/ens")).unwrap();
        assert_eq!(wire["type"], json!("pyfunc"));
        assert!(wire.get("id").is_none());

        let parsed: Ensembler =
            serde_json::from_value(json!({"id": 3, "name": "ens", "type": "pyfunc"})).unwrap();
        assert_eq!(parsed.kind, EnsemblerType::PyFunc);
        assert_eq!(parsed.id, Some(3));
    }
}
