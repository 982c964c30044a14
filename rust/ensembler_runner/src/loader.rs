//! Ensembler sources for the runner.

use std::sync::Arc;

use async_trait::async_trait;
use ensembler_plugin_common::Ensembler;
use ensembler_plugin_host::{load_ensembler, HostError, StoreOptions};

#[async_trait]
pub trait EnsemblerLoader: Send + Sync {
    /// Resolve `uri` into an initialized ensembler.
    async fn load(&self, uri: &str) -> Result<Arc<dyn Ensembler>, HostError>;
}

/// Loads packaged plugin artifacts through the artifact store.
#[derive(Debug, Clone, Default)]
pub struct ArtifactLoader {
    options: StoreOptions,
}

impl ArtifactLoader {
    pub fn new(options: StoreOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl EnsemblerLoader for ArtifactLoader {
    async fn load(&self, uri: &str) -> Result<Arc<dyn Ensembler>, HostError> {
        let loaded = load_ensembler(uri, &self.options).await?;
        Ok(loaded.ensembler)
    }
}
