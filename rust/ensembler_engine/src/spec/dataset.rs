//! Typed dataset descriptors and warehouse table identifiers.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::SpecError;

/// Reader option pinning a Delta table version.
pub const VERSION_OPTION: &str = "version";

/// Source of rows for the features table or a prediction table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Dataset {
    #[serde(rename = "BQ")]
    Bq(BqDataset),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BqDataset {
    pub bq_config: BqConfig,
}

/// Warehouse table or query, with optional reader options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BqConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

/// What a dataset reads, after the query-or-table rule is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource<'a> {
    /// User SQL, used as written.
    Query(&'a str),
    /// A warehouse table with an optional column list (`None` reads all columns).
    Table {
        table: TableId,
        features: Option<&'a [String]>,
    },
}

impl Dataset {
    pub fn bq_config(&self) -> &BqConfig {
        match self {
            Dataset::Bq(dataset) => &dataset.bq_config,
        }
    }

    /// Reader options forwarded to the table adapter.
    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.bq_config().options
    }

    /// Resolve the query-or-table choice.
    ///
    /// An explicit `query` wins over `table`/`features`; specifying neither is
    /// an error reported against `path`.
    pub fn source(&self, path: &str) -> Result<DatasetSource<'_>, SpecError> {
        let config = self.bq_config();
        if let Some(query) = config.query.as_deref() {
            if query.trim().is_empty() {
                return Err(SpecError::invalid(
                    format!("{path}.bq_config.query"),
                    "query must not be empty",
                ));
            }
            return Ok(DatasetSource::Query(query));
        }
        let Some(table) = config.table.as_deref() else {
            return Err(SpecError::invalid(
                format!("{path}.bq_config"),
                "either `query` or `table` must be set",
            ));
        };
        let table = table
            .parse::<TableId>()
            .map_err(|details| SpecError::invalid(format!("{path}.bq_config.table"), details))?;
        if let Some(features) = config.features.as_deref() {
            if features.iter().any(|feature| feature.trim().is_empty()) {
                return Err(SpecError::invalid(
                    format!("{path}.bq_config.features"),
                    "feature names must not be empty",
                ));
            }
        }
        Ok(DatasetSource::Table {
            table,
            features: config.features.as_deref().filter(|f| !f.is_empty()),
        })
    }

    /// Version pin requested through reader options, if any.
    pub fn version_pin(&self, path: &str) -> Result<Option<i64>, SpecError> {
        self.options()
            .get(VERSION_OPTION)
            .map(|raw| {
                raw.trim().parse::<i64>().map_err(|_| {
                    SpecError::invalid(
                        format!("{path}.bq_config.options.{VERSION_OPTION}"),
                        format!("expected an integer table version, found `{raw}`"),
                    )
                })
            })
            .transpose()
    }
}

/// Fully qualified warehouse table, `project.dataset.table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableId {
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }
}

impl FromStr for TableId {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim().trim_matches('`');
        let parts: Vec<&str> = trimmed.split('.').collect();
        match parts.as_slice() {
            [project, dataset, table]
                if !project.is_empty() && !dataset.is_empty() && !table.is_empty() =>
            {
                Ok(Self::new(*project, *dataset, *table))
            }
            _ => Err(format!(
                "expected a table id of the form `project.dataset.table`, found `{raw}`"
            )),
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bq(config: BqConfig) -> Dataset {
        Dataset::Bq(BqDataset { bq_config: config })
    }

    #[test]
    fn test_query_wins_over_table() {
        let dataset = bq(BqConfig {
            table: Some("p.d.t".to_string()),
            query: Some("SELECT 1".to_string()),
            features: Some(vec!["a".to_string()]),
            ..Default::default()
        });
        assert_eq!(
            dataset.source("spec.source.dataset").unwrap(),
            DatasetSource::Query("SELECT 1")
        );
    }

    #[test]
    fn test_table_with_features() {
        let features = vec!["a".to_string(), "b".to_string()];
        let dataset = bq(BqConfig {
            table: Some("`proj.ds.customers`".to_string()),
            features: Some(features.clone()),
            ..Default::default()
        });
        assert_eq!(
            dataset.source("x").unwrap(),
            DatasetSource::Table {
                table: TableId::new("proj", "ds", "customers"),
                features: Some(features.as_slice()),
            }
        );
    }

    #[test]
    fn test_neither_query_nor_table() {
        let err = bq(BqConfig::default())
            .source("spec.source.dataset")
            .unwrap_err();
        assert_eq!(err.path(), "spec.source.dataset.bq_config");
    }

    #[test]
    fn test_bad_table_id() {
        let err = bq(BqConfig {
            table: Some("just_a_table".to_string()),
            ..Default::default()
        })
        .source("spec.source.dataset")
        .unwrap_err();
        assert_eq!(err.path(), "spec.source.dataset.bq_config.table");
    }

    #[test]
    fn test_version_pin() {
        let mut options = BTreeMap::new();
        options.insert(VERSION_OPTION.to_string(), "3".to_string());
        let dataset = bq(BqConfig {
            table: Some("p.d.t".to_string()),
            options,
            ..Default::default()
        });
        assert_eq!(dataset.version_pin("x").unwrap(), Some(3));

        let mut options = BTreeMap::new();
        options.insert(VERSION_OPTION.to_string(), "latest".to_string());
        let dataset = bq(BqConfig {
            table: Some("p.d.t".to_string()),
            options,
            ..Default::default()
        });
        assert!(dataset.version_pin("x").is_err());
    }
}
