use abi_stable::StableAbi;
use abi_stable::std_types::{ROption, RString};

pub const ENSEMBLER_ABI_MAJOR: u16 = 1;
pub const ENSEMBLER_ABI_MINOR: u16 = 0;

#[repr(C)]
#[derive(Debug, StableAbi, Clone)]
pub struct EnsemblerManifestV1 {
    pub struct_size: u32,
    pub abi_major: u16,
    pub abi_minor: u16,
    pub plugin_name: RString,
    pub plugin_version: RString,
    pub build_id: RString,
    pub capabilities: u64,
    /// Result type the plugin was packaged with, e.g. `DOUBLE` or `ARRAY<LONG>`.
    pub result_type: ROption<RString>,
}

impl EnsemblerManifestV1 {
    /// Manifest stamped with this crate's ABI version and struct size.
    pub fn current(
        plugin_name: &str,
        plugin_version: &str,
        capabilities: u64,
        result_type: Option<&str>,
    ) -> Self {
        Self {
            struct_size: std::mem::size_of::<Self>() as u32,
            abi_major: ENSEMBLER_ABI_MAJOR,
            abi_minor: ENSEMBLER_ABI_MINOR,
            plugin_name: RString::from(plugin_name),
            plugin_version: RString::from(plugin_version),
            build_id: RString::from(option_env!("ENSEMBLER_BUILD_ID").unwrap_or("dev")),
            capabilities,
            result_type: result_type.map(RString::from).into(),
        }
    }
}
