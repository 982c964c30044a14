use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterStatus {
    #[default]
    Pending,
    Failed,
    Deployed,
    Undeployed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Router {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub project_id: Option<i64>,
    pub environment_name: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub status: RouterStatus,
    #[serde(default)]
    pub config: Option<RouterVersion>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    #[serde(rename = "type", default = "default_route_type")]
    pub kind: String,
    pub endpoint: String,
    /// Duration string such as `100ms`.
    pub timeout: String,
}

fn default_route_type() -> String {
    "PROXY".to_string()
}

/// Where a traffic rule reads the field it matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldSource {
    Header,
    Payload,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleOperator {
    #[default]
    In,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficRuleCondition {
    pub field_source: FieldSource,
    pub field: String,
    #[serde(default)]
    pub operator: RuleOperator,
    pub values: Vec<String>,
}

/// Sends matching requests to `routes` in addition to the default route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficRule {
    pub name: String,
    pub conditions: Vec<TrafficRuleCondition>,
    pub routes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentEngine {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

impl ExperimentEngine {
    pub fn nop() -> Self {
        Self {
            kind: "nop".to_string(),
            config: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub min_replica: u32,
    pub max_replica: u32,
    pub cpu_request: String,
    pub memory_request: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enricher {
    pub image: String,
    pub resource_request: ResourceRequest,
    pub endpoint: String,
    pub timeout: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// Ensembler stage of a router: `nop`, `standard`, `docker` or `pyfunc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterEnsemblerConfig {
    #[serde(rename = "type")]
    pub kind: String,
    /// Remaining type-specific settings, e.g. `pyfunc_config`.
    #[serde(flatten)]
    pub settings: BTreeMap<String, serde_json::Value>,
}

impl RouterEnsemblerConfig {
    /// Route through a registered ensembler served by the online runner.
    pub fn pyfunc(project_id: i64, ensembler_id: i64, timeout: &str) -> Self {
        let mut settings = BTreeMap::new();
        settings.insert(
            "pyfunc_config".to_string(),
            serde_json::json!({
                "project_id": project_id,
                "ensembler_id": ensembler_id,
                "timeout": timeout,
            }),
        );
        Self {
            kind: "pyfunc".to_string(),
            settings,
        }
    }
}

/// Body of router create/update and router version create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    pub name: String,
    pub environment_name: String,
    pub routes: Vec<Route>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_route_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<TrafficRule>,
    pub experiment_engine: ExperimentEngine,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_request: Option<ResourceRequest>,
    pub timeout: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enricher: Option<Enricher>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ensembler: Option<RouterEnsemblerConfig>,
}

impl RouterConfig {
    /// Route ids referenced by traffic rules that are not defined routes.
    pub fn unknown_rule_routes(&self) -> Vec<&str> {
        self.rules
            .iter()
            .flat_map(|rule| rule.routes.iter())
            .map(String::as_str)
            .filter(|id| !self.routes.iter().any(|route| route.id == *id))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterVersion {
    #[serde(default)]
    pub id: Option<i64>,
    pub version: i64,
    #[serde(default)]
    pub status: RouterStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub default_route_id: Option<String>,
    #[serde(default)]
    pub rules: Vec<TrafficRule>,
    #[serde(default)]
    pub experiment_engine: Option<ExperimentEngine>,
    #[serde(default)]
    pub ensembler: Option<RouterEnsemblerConfig>,
    #[serde(default)]
    pub created_at: Option<String>,
}
