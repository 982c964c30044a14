use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use ensembler_plugin_api::ENSEMBLER_ABI_MAJOR;
use ensembler_plugin_common::{parse_major, ResultType};
use serde::{Deserialize, Serialize};

use crate::artifact::checksum::sanitize_rel_path;
use crate::error::ArtifactError;

pub const DESCRIPTOR_FILE: &str = "ensembler.yaml";

/// Contents of `ensembler.yaml` at the artifact root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnsemblerDescriptor {
    pub name: String,
    /// ABI version the packaged library targets, e.g. `"1.0"`.
    #[serde(default)]
    pub abi_version: Option<String>,
    pub entry_point: EntryPoint,
    #[serde(default)]
    pub result: Option<ResultSpec>,
    /// Logical artifact name to path relative to the artifact root.
    #[serde(default)]
    pub artifacts: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntryPoint {
    pub library: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResultSpec {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub item_type: Option<String>,
}

impl EnsemblerDescriptor {
    pub fn load(root: &Path) -> Result<Self, ArtifactError> {
        let path = root.join(DESCRIPTOR_FILE);
        if !path.is_file() {
            return Err(ArtifactError::MissingFile(DESCRIPTOR_FILE.to_string()));
        }
        Self::parse(&fs::read_to_string(path)?)
    }

    pub fn parse(text: &str) -> Result<Self, ArtifactError> {
        let deserializer = serde_yaml::Deserializer::from_str(text);
        let descriptor: Self =
            serde_path_to_error::deserialize(deserializer).map_err(|err| {
                ArtifactError::InvalidDescriptor {
                    path: err.path().to_string(),
                    details: err.into_inner().to_string(),
                }
            })?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn result_type(&self) -> Result<Option<ResultType>, ArtifactError> {
        let Some(result) = &self.result else {
            return Ok(None);
        };
        ResultType::from_parts(&result.type_name, result.item_type.as_deref())
            .map(Some)
            .map_err(|err| ArtifactError::InvalidDescriptor {
                path: "result".to_string(),
                details: err.to_string(),
            })
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        if self.name.trim().is_empty() {
            return Err(invalid("name", "must not be empty"));
        }
        if let Some(version) = &self.abi_version {
            let major = parse_major(version).map_err(|err| invalid("abi_version", &err))?;
            if major != ENSEMBLER_ABI_MAJOR {
                return Err(invalid(
                    "abi_version",
                    &format!("expected major {ENSEMBLER_ABI_MAJOR} got {major}"),
                ));
            }
        }
        sanitize_rel_path(&self.entry_point.library)
            .map_err(|err| invalid("entry_point.library", &err.to_string()))?;
        for (name, rel) in &self.artifacts {
            sanitize_rel_path(rel)
                .map_err(|err| invalid(&format!("artifacts.{name}"), &err.to_string()))?;
        }
        self.result_type()?;
        Ok(())
    }
}

fn invalid(path: &str, details: &str) -> ArtifactError {
    ArtifactError::InvalidDescriptor {
        path: path.to_string(),
        details: details.to_string(),
    }
}
