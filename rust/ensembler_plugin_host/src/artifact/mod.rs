//! Ensembler artifacts: a directory holding the plugin library, its
//! descriptor, a frozen file manifest and any auxiliary files.
//!
//! ```text
//! <root>/
//!   ensembler.yaml
//!   manifest.json
//!   lib/<plugin library>
//!   artifacts/...
//! ```

pub mod checksum;
pub mod descriptor;
pub mod manifest;
pub mod store;

use std::path::{Path, PathBuf};

use ensembler_plugin_common::Artifacts;
use tracing::debug;

use crate::artifact::checksum::{safe_join, verify_files};
use crate::artifact::descriptor::{EnsemblerDescriptor, DESCRIPTOR_FILE};
use crate::artifact::manifest::{load_manifest, ArtifactManifest};
use crate::error::ArtifactError;

/// A verified artifact directory on local disk.
#[derive(Debug, Clone)]
pub struct EnsemblerArtifact {
    root: PathBuf,
    descriptor: EnsemblerDescriptor,
    manifest: ArtifactManifest,
}

impl EnsemblerArtifact {
    /// Open `root`, checking every manifest entry before anything is loaded.
    pub fn open(root: &Path) -> Result<Self, ArtifactError> {
        let manifest = load_manifest(root)?;
        verify_files(root, &manifest)?;
        if !manifest
            .files
            .iter()
            .any(|file| file.rel_path == DESCRIPTOR_FILE)
        {
            return Err(ArtifactError::InvalidManifest(format!(
                "{DESCRIPTOR_FILE} is not listed in the manifest"
            )));
        }
        let descriptor = EnsemblerDescriptor::load(root)?;
        debug!(
            root = %root.display(),
            name = %descriptor.name,
            files = manifest.files.len(),
            "Verified ensembler artifact"
        );
        Ok(Self {
            root: root.to_path_buf(),
            descriptor,
            manifest,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn descriptor(&self) -> &EnsemblerDescriptor {
        &self.descriptor
    }

    pub fn manifest(&self) -> &ArtifactManifest {
        &self.manifest
    }

    pub fn library_path(&self) -> Result<PathBuf, ArtifactError> {
        safe_join(&self.root, &self.descriptor.entry_point.library)
    }

    /// Logical artifact names resolved to absolute paths.
    pub fn artifacts(&self) -> Result<Artifacts, ArtifactError> {
        let root = self.root.canonicalize()?;
        let mut resolved = Artifacts::new();
        for (name, rel) in &self.descriptor.artifacts {
            let path = safe_join(&root, rel)?;
            if !path.exists() {
                return Err(ArtifactError::MissingFile(rel.clone()));
            }
            resolved.insert(name.clone(), path);
        }
        Ok(resolved)
    }
}
