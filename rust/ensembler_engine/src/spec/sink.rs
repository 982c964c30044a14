//! Sink descriptors and save modes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::dataset::TableId;
use super::error::SpecError;

/// Rows printed by a `CONSOLE` sink when no limit is configured.
pub const DEFAULT_CONSOLE_LIMIT: usize = 20;

/// Policy for reconciling a write with data already at the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SaveMode {
    #[default]
    ErrorIfExists,
    Overwrite,
    Append,
    Ignore,
}

impl fmt::Display for SaveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SaveMode::ErrorIfExists => "ERRORIFEXISTS",
            SaveMode::Overwrite => "OVERWRITE",
            SaveMode::Append => "APPEND",
            SaveMode::Ignore => "IGNORE",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sink {
    #[serde(flatten)]
    pub target: SinkTarget,
    #[serde(default)]
    pub save_mode: SaveMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SinkTarget {
    #[serde(rename = "BQ")]
    Bq { bq_config: BqSinkConfig },
    #[serde(rename = "CONSOLE")]
    Console {
        #[serde(default)]
        console_config: ConsoleSinkConfig,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BqSinkConfig {
    pub table: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsoleSinkConfig {
    #[serde(default = "default_console_limit")]
    pub limit: usize,
}

impl Default for ConsoleSinkConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_CONSOLE_LIMIT,
        }
    }
}

fn default_console_limit() -> usize {
    DEFAULT_CONSOLE_LIMIT
}

impl SinkTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            SinkTarget::Bq { .. } => "BQ",
            SinkTarget::Console { .. } => "CONSOLE",
        }
    }
}

impl Sink {
    /// Warehouse table written by a `BQ` sink.
    pub fn table_id(&self) -> Result<Option<TableId>, SpecError> {
        match &self.target {
            SinkTarget::Bq { bq_config } => bq_config
                .table
                .parse::<TableId>()
                .map(Some)
                .map_err(|details| SpecError::invalid("spec.sink.bq_config.table", details)),
            SinkTarget::Console { .. } => Ok(None),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), SpecError> {
        self.table_id()?;
        if let SinkTarget::Console { console_config } = &self.target {
            if console_config.limit == 0 {
                return Err(SpecError::invalid(
                    "spec.sink.console_config.limit",
                    "limit must be positive",
                ));
            }
        }
        if let Some(columns) = &self.columns {
            if columns.is_empty() {
                return Err(SpecError::invalid(
                    "spec.sink.columns",
                    "columns must list at least one column when set",
                ));
            }
            for (idx, column) in columns.iter().enumerate() {
                if columns[..idx].contains(column) {
                    return Err(SpecError::invalid(
                        format!("spec.sink.columns[{idx}]"),
                        format!("duplicate column `{column}`"),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_mode_labels() {
        let modes: Vec<SaveMode> =
            serde_yaml::from_str("[ERRORIFEXISTS, OVERWRITE, APPEND, IGNORE]").unwrap();
        assert_eq!(
            modes,
            vec![
                SaveMode::ErrorIfExists,
                SaveMode::Overwrite,
                SaveMode::Append,
                SaveMode::Ignore
            ]
        );
        assert_eq!(SaveMode::ErrorIfExists.to_string(), "ERRORIFEXISTS");
    }

    #[test]
    fn test_console_sink_defaults() {
        let sink: Sink = serde_yaml::from_str("type: CONSOLE\n").unwrap();
        assert_eq!(sink.save_mode, SaveMode::ErrorIfExists);
        assert_eq!(
            sink.target,
            SinkTarget::Console {
                console_config: ConsoleSinkConfig { limit: 20 }
            }
        );
        assert_eq!(sink.table_id().unwrap(), None);
    }

    #[test]
    fn test_bq_sink_table() {
        let sink: Sink = serde_yaml::from_str(
            "type: BQ\nsave_mode: OVERWRITE\nbq_config:\n  table: p.d.results\ncolumns: [a, b]\n",
        )
        .unwrap();
        assert_eq!(sink.save_mode, SaveMode::Overwrite);
        assert_eq!(sink.table_id().unwrap(), Some(TableId::new("p", "d", "results")));
        sink.validate().unwrap();
    }

    #[test]
    fn test_duplicate_projection_column() {
        let sink: Sink =
            serde_yaml::from_str("type: CONSOLE\ncolumns: [a, b, a]\n").unwrap();
        let err = sink.validate().unwrap_err();
        assert_eq!(err.path(), "spec.sink.columns[2]");
    }
}
