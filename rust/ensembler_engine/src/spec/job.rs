//! The ensembling job document.
//!
//! A job is authored as YAML, parsed with path-tracking deserialization and
//! validated once. A `JobSpec` returned by [`JobSpec::from_yaml`] or
//! [`JobSpec::from_path`] has passed every check in [`JobSpec::validate`].

use std::collections::BTreeMap;
use std::path::Path;

use ensembler_plugin_common::{ResultType, ResultTypeError, PREDICTION_COLUMN_PREFIX};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::dataset::Dataset;
use super::error::SpecError;
use super::sink::Sink;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub metadata: Metadata,
    pub spec: EnsemblingSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Metadata {
    pub name: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnsemblingSpec {
    pub source: Source,
    pub predictions: BTreeMap<String, PredictionSource>,
    pub ensembler: EnsemblerConfig,
    pub sink: Sink,
}

/// The features table and its join keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Source {
    pub dataset: Dataset,
    pub join_on: Vec<String>,
}

/// One model's prediction table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PredictionSource {
    pub dataset: Dataset,
    pub join_on: Vec<String>,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnsemblerConfig {
    pub uri: String,
    pub result: ResultConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResultConfig {
    pub column_name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
}

impl ResultConfig {
    pub fn result_type(&self) -> Result<ResultType, SpecError> {
        ResultType::from_parts(&self.type_name, self.item_type.as_deref()).map_err(|err| {
            let field = match err {
                ResultTypeError::Unknown(_) => "type",
                ResultTypeError::MissingItemType
                | ResultTypeError::InvalidItemType(_)
                | ResultTypeError::UnexpectedItemType => "item_type",
            };
            SpecError::invalid(format!("spec.ensembler.result.{field}"), err.to_string())
        })
    }
}

impl JobSpec {
    /// Parse and validate a YAML job document.
    pub fn from_yaml(text: &str) -> Result<Self, SpecError> {
        let deserializer = serde_yaml::Deserializer::from_str(text);
        let spec: JobSpec =
            serde_path_to_error::deserialize(deserializer).map_err(|err| SpecError::Parse {
                path: err.path().to_string(),
                details: err.into_inner().to_string(),
            })?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn from_path(path: &Path) -> Result<Self, SpecError> {
        let text = std::fs::read_to_string(path).map_err(|source| SpecError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn result_type(&self) -> Result<ResultType, SpecError> {
        self.spec.ensembler.result.result_type()
    }

    /// Check the cross-field rules serde cannot express.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.metadata.name.trim().is_empty() {
            return Err(SpecError::invalid("metadata.name", "name must not be empty"));
        }

        let spec = &self.spec;
        check_columns("spec.source.join_on", &spec.source.join_on)?;
        check_dataset("spec.source.dataset", &spec.source.dataset)?;

        if spec.predictions.is_empty() {
            return Err(SpecError::invalid(
                "spec.predictions",
                "at least one prediction source is required",
            ));
        }
        for (model, prediction) in &spec.predictions {
            let path = format!("spec.predictions.{model}");
            if model.trim().is_empty() {
                return Err(SpecError::invalid(path, "model name must not be empty"));
            }
            check_dataset(&format!("{path}.dataset"), &prediction.dataset)?;
            check_columns(&format!("{path}.join_on"), &prediction.join_on)?;
            check_columns(&format!("{path}.columns"), &prediction.columns)?;
            for (idx, column) in prediction.join_on.iter().enumerate() {
                if !spec.source.join_on.contains(column) {
                    return Err(SpecError::invalid(
                        format!("{path}.join_on[{idx}]"),
                        format!("join column `{column}` is not one of spec.source.join_on"),
                    ));
                }
            }
        }

        if spec.ensembler.uri.trim().is_empty() {
            return Err(SpecError::invalid("spec.ensembler.uri", "uri must not be empty"));
        }
        let column_name = &spec.ensembler.result.column_name;
        if column_name.trim().is_empty() {
            return Err(SpecError::invalid(
                "spec.ensembler.result.column_name",
                "column_name must not be empty",
            ));
        }
        if column_name.starts_with(PREDICTION_COLUMN_PREFIX) {
            return Err(SpecError::invalid(
                "spec.ensembler.result.column_name",
                format!("column_name must not start with the reserved prefix {PREDICTION_COLUMN_PREFIX}"),
            ));
        }
        self.result_type()?;
        spec.sink.validate()
    }
}

fn check_dataset(path: &str, dataset: &Dataset) -> Result<(), SpecError> {
    dataset.source(path)?;
    dataset.version_pin(path)?;
    let config = dataset.bq_config();
    if config.query.is_some() && config.table.is_some() {
        warn!(
            path,
            "Dataset sets both `query` and `table`; using `query` and ignoring `table`/`features`"
        );
    }
    Ok(())
}

fn check_columns(path: &str, columns: &[String]) -> Result<(), SpecError> {
    if columns.is_empty() {
        return Err(SpecError::invalid(path, "at least one column is required"));
    }
    for (idx, column) in columns.iter().enumerate() {
        if column.trim().is_empty() {
            return Err(SpecError::invalid(
                format!("{path}[{idx}]"),
                "column name must not be empty",
            ));
        }
        if columns[..idx].contains(column) {
            return Err(SpecError::invalid(
                format!("{path}[{idx}]"),
                format!("duplicate column `{column}`"),
            ));
        }
    }
    Ok(())
}
