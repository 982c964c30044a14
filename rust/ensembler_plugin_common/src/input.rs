use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::row::Row;
use crate::value::Value;

/// Request metadata forwarded to ensemblers that accept it.
pub type Headers = BTreeMap<String, String>;

/// Logical artifact names resolved to local paths, handed over at initialization.
pub type Artifacts = BTreeMap<String, PathBuf>;

/// Everything an ensembler sees for a single row or request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnsembleInput {
    /// Feature name to value, in source order.
    pub features: Row,
    /// Model name to that model's columns (batch) or route response (online).
    pub predictions: Row,
    /// Experiment treatment for the request; always absent in batch mode.
    #[serde(default)]
    pub treatment_config: Option<Value>,
}

impl EnsembleInput {
    pub fn new(features: Row, predictions: Row) -> Self {
        Self {
            features,
            predictions,
            treatment_config: None,
        }
    }

    pub fn with_treatment_config(mut self, treatment_config: Option<Value>) -> Self {
        self.treatment_config = treatment_config.filter(|value| !value.is_null());
        self
    }
}
