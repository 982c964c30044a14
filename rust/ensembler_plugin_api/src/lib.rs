#![allow(non_camel_case_types)]

//! Stable ABI between ensembler plugins and their hosts.
//!
//! Everything crosses the boundary as JSON text: the host serializes an
//! `EnsembleInput` (and, for plugins advertising `caps::HEADERS`, the request
//! headers) and the plugin answers with the JSON encoding of its result.

mod manifest;

use abi_stable::StableAbi;
use abi_stable::library::RootModule;
use abi_stable::sabi_types::version::VersionStrings;
use abi_stable::std_types::{ROption, RResult, RStr, RString};

pub use ensembler_plugin_common::caps;
pub use manifest::{EnsemblerManifestV1, ENSEMBLER_ABI_MAJOR, ENSEMBLER_ABI_MINOR};

pub type EnsResult<T> = RResult<T, RString>;

#[repr(C)]
#[derive(StableAbi)]
#[sabi(kind(Prefix(prefix_ref = EnsemblerMod_Ref)))]
#[sabi(missing_field(panic))]
pub struct EnsemblerMod {
    pub manifest: extern "C" fn() -> EnsemblerManifestV1,
    /// Receives a JSON object mapping artifact names to absolute paths.
    pub initialize: extern "C" fn(artifacts_json: RStr<'_>) -> EnsResult<()>,
    #[sabi(last_prefix_field)]
    pub ensemble: extern "C" fn(
        input_json: RStr<'_>,
        headers_json: ROption<RString>,
    ) -> EnsResult<RString>,
}

impl RootModule for EnsemblerMod_Ref {
    abi_stable::declare_root_module_statics! {EnsemblerMod_Ref}

    const BASE_NAME: &'static str = "ensembler_plugin";
    const NAME: &'static str = "ensembler_plugin";
    const VERSION_STRINGS: VersionStrings = abi_stable::package_version_strings!();
}
