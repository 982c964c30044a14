use std::collections::BTreeMap;
use std::fs;
use std::sync::OnceLock;

use ensembler_plugin_common::{
    caps, Artifacts, EnsembleInput, Ensembler, EnsemblerError, Headers, PrimitiveType,
    ResultType, Value,
};
use serde::Deserialize;

/// Artifact name holding [`WeightsConfig`] JSON.
pub const WEIGHTS_ARTIFACT: &str = "weights";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeightsConfig {
    /// Field read from each model's prediction when it is a map.
    #[serde(default = "default_score_field")]
    pub score_field: String,
    /// Per-model weight; models absent here weigh 1.0.
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
}

fn default_score_field() -> String {
    "score".to_string()
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            score_field: default_score_field(),
            weights: BTreeMap::new(),
        }
    }
}

/// Weighted mean of every model's score. Null or missing scores are skipped;
/// a row with no scores at all yields null.
#[derive(Debug, Default)]
pub struct WeightedAverage {
    config: OnceLock<WeightsConfig>,
}

impl WeightedAverage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: WeightsConfig) -> Self {
        Self {
            config: OnceLock::from(config),
        }
    }

    fn config(&self) -> &WeightsConfig {
        self.config.get_or_init(WeightsConfig::default)
    }

    fn score_of(&self, prediction: &Value) -> Result<Option<f64>, EnsemblerError> {
        let score = match prediction {
            Value::Map(_) => &prediction[self.config().score_field.as_str()],
            other => other,
        };
        match score {
            Value::Null => Ok(None),
            value => value.as_f64().map(Some).ok_or_else(|| {
                EnsemblerError::InvalidInput(format!(
                    "score must be numeric, found {}",
                    value.kind()
                ))
            }),
        }
    }
}

impl Ensembler for WeightedAverage {
    fn capabilities(&self) -> u64 {
        caps::INITIALIZE
    }

    fn result_type(&self) -> Option<ResultType> {
        Some(ResultType::Primitive(PrimitiveType::Double))
    }

    /// The first successful call fixes the weights; later calls leave them
    /// unchanged. A concurrent call that read different weights is an error.
    fn initialize(&self, artifacts: &Artifacts) -> Result<(), EnsemblerError> {
        if self.config.get().is_some() {
            return Ok(());
        }
        let Some(path) = artifacts.get(WEIGHTS_ARTIFACT) else {
            return Ok(());
        };
        let text = fs::read_to_string(path)
            .map_err(|err| EnsemblerError::Initialize(format!("{}: {err}", path.display())))?;
        let config: WeightsConfig = serde_json::from_str(&text)
            .map_err(|err| EnsemblerError::Initialize(format!("{}: {err}", path.display())))?;
        match self.config.set(config) {
            Ok(()) => Ok(()),
            Err(config) if self.config.get() == Some(&config) => Ok(()),
            Err(_) => Err(EnsemblerError::Initialize(
                "weights were already configured with different values".to_string(),
            )),
        }
    }

    fn ensemble(
        &self,
        input: &EnsembleInput,
        _headers: Option<&Headers>,
    ) -> Result<Value, EnsemblerError> {
        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        for (model, prediction) in input.predictions.iter() {
            let Some(score) = self.score_of(prediction)? else {
                continue;
            };
            let weight = self.config().weights.get(model).copied().unwrap_or(1.0);
            weighted += score * weight;
            total_weight += weight;
        }
        if total_weight == 0.0 {
            return Ok(Value::Null);
        }
        Ok(Value::Float(weighted / total_weight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensembler_plugin_common::Row;

    fn input(predictions: Vec<(&str, Value)>) -> EnsembleInput {
        EnsembleInput::new(Row::new(), predictions.into_iter().collect())
    }

    #[test]
    fn test_weighted_mean_over_map_predictions() {
        let mut weights = BTreeMap::new();
        weights.insert("a".to_string(), 3.0);
        let ensembler = WeightedAverage::with_config(WeightsConfig {
            score_field: "score".to_string(),
            weights,
        });
        let a: Row = vec![("score", Value::Float(1.0))].into_iter().collect();
        let b: Row = vec![("score", Value::Float(5.0))].into_iter().collect();
        let result = ensembler
            .ensemble(&input(vec![("a", a.into()), ("b", b.into())]), None)
            .unwrap();
        assert_eq!(result, Value::Float(2.0));
    }

    #[test]
    fn test_all_null_scores_yield_null() {
        let ensembler = WeightedAverage::new();
        let result = ensembler
            .ensemble(&input(vec![("a", Value::Null)]), None)
            .unwrap();
        assert!(result.is_null());
    }

    #[test]
    fn test_initialize_reads_weights_artifact() {
        let dir = std::env::temp_dir().join(format!("weights-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("weights.json");
        fs::write(&path, r#"{"score_field": "p", "weights": {"x": 2.0}}"#).unwrap();
        let mut artifacts = Artifacts::new();
        artifacts.insert(WEIGHTS_ARTIFACT.to_string(), path);

        let ensembler = WeightedAverage::new();
        ensembler.initialize(&artifacts).unwrap();
        let x: Row = vec![("p", Value::Int(4))].into_iter().collect();
        assert_eq!(
            ensembler.ensemble(&input(vec![("x", x.into())]), None).unwrap(),
            Value::Float(4.0)
        );
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_initialize_twice_keeps_first_weights() {
        let dir = std::env::temp_dir().join(format!("weights-twice-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let first = dir.join("first.json");
        let second = dir.join("second.json");
        fs::write(&first, r#"{"weights": {"a": 3.0}}"#).unwrap();
        fs::write(&second, r#"{"weights": {"b": 3.0}}"#).unwrap();
        let artifacts = |path: &std::path::Path| {
            let mut artifacts = Artifacts::new();
            artifacts.insert(WEIGHTS_ARTIFACT.to_string(), path.to_path_buf());
            artifacts
        };
        let a: Row = vec![("score", Value::Float(1.0))].into_iter().collect();
        let b: Row = vec![("score", Value::Float(5.0))].into_iter().collect();
        let scores = input(vec![("a", a.into()), ("b", b.into())]);

        let ensembler = WeightedAverage::new();
        ensembler.initialize(&artifacts(&first)).unwrap();
        let before = ensembler.ensemble(&scores, None).unwrap();
        ensembler.initialize(&artifacts(&first)).unwrap();
        ensembler.initialize(&artifacts(&second)).unwrap();
        assert_eq!(ensembler.ensemble(&scores, None).unwrap(), before);
        assert_eq!(before, Value::Float(2.0));
        fs::remove_dir_all(dir).unwrap();
    }
}
