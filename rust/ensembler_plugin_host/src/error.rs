use ensembler_plugin_common::{EnsemblerError, ResultType};

/// Errors raised while resolving or verifying an ensembler artifact.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),
    #[error("Invalid artifact URI {uri:?}: {details}")]
    InvalidUri { uri: String, details: String },
    #[error("Artifact not found: {0}")]
    NotFound(String),
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),
    #[error("Invalid descriptor at '{path}': {details}")]
    InvalidDescriptor { path: String, details: String },
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Missing file: {0}")]
    MissingFile(String),
    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },
    #[error("Size mismatch for {path}: expected {expected} bytes, got {actual} bytes")]
    SizeMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },
}

/// Errors raised while loading a plugin library.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Failed to load ensembler plugin {path}: {details}")]
    Load { path: String, details: String },
    #[error("{0}")]
    Incompatible(String),
    #[error("Plugin result type {plugin} does not match artifact result type {artifact}")]
    ResultTypeMismatch {
        plugin: ResultType,
        artifact: ResultType,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Plugin(#[from] PluginError),
    #[error(transparent)]
    Ensembler(#[from] EnsemblerError),
}
