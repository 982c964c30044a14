use std::mem::size_of;
use std::path::Path;

use abi_stable::library::RootModule;
use ensembler_plugin_api::{
    EnsemblerManifestV1, EnsemblerMod_Ref, ENSEMBLER_ABI_MAJOR, ENSEMBLER_ABI_MINOR,
};
use ensembler_plugin_common::ResultType;

use crate::error::PluginError;

pub struct PluginHandle {
    module: EnsemblerMod_Ref,
    manifest: EnsemblerManifestV1,
}

impl PluginHandle {
    pub fn manifest(&self) -> &EnsemblerManifestV1 {
        &self.manifest
    }

    pub(crate) fn module(&self) -> &EnsemblerMod_Ref {
        &self.module
    }

    /// Result type recorded in the plugin manifest, if any.
    pub fn result_type(&self) -> Result<Option<ResultType>, PluginError> {
        match self.manifest.result_type.as_ref().into_option() {
            None => Ok(None),
            Some(raw) => raw.as_str().parse().map(Some).map_err(|err| {
                PluginError::Incompatible(format!(
                    "Plugin {name} declares an invalid result type: {err}",
                    name = self.manifest.plugin_name
                ))
            }),
        }
    }
}

fn validate_manifest(manifest: &EnsemblerManifestV1) -> Result<(), PluginError> {
    if manifest.abi_major != ENSEMBLER_ABI_MAJOR {
        return Err(PluginError::Incompatible(format!(
            "Plugin ABI mismatch: expected {expected} got {actual}",
            expected = ENSEMBLER_ABI_MAJOR,
            actual = manifest.abi_major,
        )));
    }
    if manifest.abi_minor > ENSEMBLER_ABI_MINOR {
        return Err(PluginError::Incompatible(format!(
            "Plugin ABI minor version too new: expected <= {expected} got {actual}",
            expected = ENSEMBLER_ABI_MINOR,
            actual = manifest.abi_minor,
        )));
    }
    let expected_size = size_of::<EnsemblerManifestV1>() as u32;
    if manifest.struct_size < expected_size {
        return Err(PluginError::Incompatible(format!(
            "Plugin manifest struct_size {actual} is smaller than expected {expected}",
            actual = manifest.struct_size,
            expected = expected_size,
        )));
    }
    if manifest.plugin_name.trim().is_empty() {
        return Err(PluginError::Incompatible(
            "Plugin manifest has an empty plugin_name".to_string(),
        ));
    }
    Ok(())
}

pub fn load_plugin(path: &Path) -> Result<PluginHandle, PluginError> {
    let module = EnsemblerMod_Ref::load_from_file(path).map_err(|err| PluginError::Load {
        path: path.display().to_string(),
        details: err.to_string(),
    })?;
    let manifest = (module.manifest())();
    validate_manifest(&manifest)?;
    Ok(PluginHandle { module, manifest })
}

#[cfg(test)]
mod tests {
    use super::validate_manifest;
    use abi_stable::std_types::{RNone, RString};
    use ensembler_plugin_api::{
        caps, EnsemblerManifestV1, ENSEMBLER_ABI_MAJOR, ENSEMBLER_ABI_MINOR,
    };
    use std::mem::size_of;

    fn sample_manifest() -> EnsemblerManifestV1 {
        EnsemblerManifestV1 {
            struct_size: size_of::<EnsemblerManifestV1>() as u32,
            abi_major: ENSEMBLER_ABI_MAJOR,
            abi_minor: ENSEMBLER_ABI_MINOR,
            plugin_name: RString::from("ensembler_test"),
            plugin_version: RString::from("0.1.0"),
            build_id: RString::from("test"),
            capabilities: caps::INITIALIZE,
            result_type: RNone,
        }
    }

    #[test]
    fn validate_manifest_accepts_matching_versions() {
        validate_manifest(&sample_manifest()).expect("manifest validation");
    }

    #[test]
    fn validate_manifest_rejects_abi_major() {
        let mut manifest = sample_manifest();
        manifest.abi_major = ENSEMBLER_ABI_MAJOR + 1;
        assert!(validate_manifest(&manifest).is_err());
    }

    #[test]
    fn validate_manifest_rejects_truncated_struct() {
        let mut manifest = sample_manifest();
        manifest.struct_size = 8;
        let err = validate_manifest(&manifest).unwrap_err();
        assert!(err.to_string().contains("struct_size"));
    }
}
