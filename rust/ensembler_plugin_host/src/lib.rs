//! Hosting for packaged ensemblers.
//!
//! [`load_ensembler`] runs the whole lifecycle: resolve the artifact URI,
//! verify the directory against its manifest, load the plugin library and
//! initialize it with the artifact's auxiliary files.

pub mod artifact;
mod error;
mod loader;
mod plugin;

use std::sync::Arc;

use ensembler_plugin_common::Ensembler;
use tracing::info;

pub use artifact::store::{fetch_artifact, ArtifactLocation, StoreOptions};
pub use artifact::EnsemblerArtifact;
pub use ensembler_plugin_api::{ENSEMBLER_ABI_MAJOR, ENSEMBLER_ABI_MINOR};
pub use error::{ArtifactError, HostError, PluginError};
pub use loader::{load_plugin, PluginHandle};
pub use plugin::PluginEnsembler;

/// An initialized ensembler together with the artifact it came from.
pub struct LoadedEnsembler {
    pub artifact: EnsemblerArtifact,
    pub ensembler: Arc<dyn Ensembler>,
}

pub async fn load_ensembler(uri: &str, options: &StoreOptions) -> Result<LoadedEnsembler, HostError> {
    let root = fetch_artifact(uri, options).await?;
    let artifact = EnsemblerArtifact::open(&root)?;
    let plugin = PluginEnsembler::load(&artifact)?;
    plugin.initialize(&artifact.artifacts()?)?;
    info!(uri, name = %artifact.descriptor().name, "Ensembler ready");
    Ok(LoadedEnsembler {
        artifact,
        ensembler: Arc::new(plugin),
    })
}
