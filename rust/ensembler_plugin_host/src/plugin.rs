use std::sync::OnceLock;

use abi_stable::std_types::{RNone, ROption, RResult, RSome, RStr, RString};
use ensembler_plugin_api::{caps, EnsemblerManifestV1};
use ensembler_plugin_common::{
    Artifacts, EnsembleInput, Ensembler, EnsemblerError, Headers, ResultType, Value,
};
use tracing::info;

use crate::artifact::EnsemblerArtifact;
use crate::error::PluginError;
use crate::loader::{load_plugin, PluginHandle};

/// An [`Ensembler`] backed by a dynamically loaded plugin library.
pub struct PluginEnsembler {
    handle: PluginHandle,
    result_type: Option<ResultType>,
    initialized: OnceLock<Result<(), String>>,
}

impl PluginEnsembler {
    /// Load the library named by the artifact descriptor and reconcile its
    /// declared result type with the descriptor's.
    pub fn load(artifact: &EnsemblerArtifact) -> Result<Self, PluginError> {
        let library = artifact.library_path().map_err(|err| PluginError::Load {
            path: artifact.descriptor().entry_point.library.clone(),
            details: err.to_string(),
        })?;
        let handle = load_plugin(&library)?;
        let plugin_type = handle.result_type()?;
        let artifact_type = artifact
            .descriptor()
            .result_type()
            .map_err(|err| PluginError::Incompatible(err.to_string()))?;
        if let (Some(plugin), Some(artifact)) = (plugin_type, artifact_type) {
            if plugin != artifact {
                return Err(PluginError::ResultTypeMismatch { plugin, artifact });
            }
        }
        info!(
            plugin = %handle.manifest().plugin_name,
            version = %handle.manifest().plugin_version,
            build = %handle.manifest().build_id,
            "Loaded ensembler plugin"
        );
        Ok(Self {
            handle,
            result_type: artifact_type.or(plugin_type),
            initialized: OnceLock::new(),
        })
    }

    pub fn manifest(&self) -> &EnsemblerManifestV1 {
        self.handle.manifest()
    }
}

impl Ensembler for PluginEnsembler {
    fn capabilities(&self) -> u64 {
        self.handle.manifest().capabilities
    }

    fn result_type(&self) -> Option<ResultType> {
        self.result_type
    }

    fn initialize(&self, artifacts: &Artifacts) -> Result<(), EnsemblerError> {
        if self.capabilities() & caps::INITIALIZE == 0 {
            return Ok(());
        }
        let outcome = self.initialized.get_or_init(|| {
            let payload = serde_json::to_string(artifacts).map_err(|err| err.to_string())?;
            match (self.handle.module().initialize())(RStr::from(payload.as_str())) {
                RResult::ROk(()) => Ok(()),
                RResult::RErr(err) => Err(err.into_string()),
            }
        });
        outcome.clone().map_err(EnsemblerError::Initialize)
    }

    fn ensemble(
        &self,
        input: &EnsembleInput,
        headers: Option<&Headers>,
    ) -> Result<Value, EnsemblerError> {
        let input_json = serde_json::to_string(input)
            .map_err(|err| EnsemblerError::InvalidInput(err.to_string()))?;
        let headers_json: ROption<RString> = match headers {
            Some(headers) if self.capabilities() & caps::HEADERS != 0 => RSome(RString::from(
                serde_json::to_string(headers)
                    .map_err(|err| EnsemblerError::InvalidInput(err.to_string()))?,
            )),
            _ => RNone,
        };
        match (self.handle.module().ensemble())(RStr::from(input_json.as_str()), headers_json) {
            RResult::ROk(output) => serde_json::from_str::<Value>(output.as_str())
                .map_err(|err| EnsemblerError::Output(err.to_string())),
            RResult::RErr(err) => Err(EnsemblerError::Failed(err.into_string())),
        }
    }
}
