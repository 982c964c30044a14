use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::artifact::checksum::{sanitize_rel_path, sha256_file};
use crate::error::ArtifactError;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Frozen inventory of an artifact directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactManifest {
    /// ABI major version the plugin library was built against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi_major: Option<u16>,
    pub files: Vec<ManifestFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
    pub rel_path: String,
    pub size_bytes: u64,
    /// sha256 hex digest, optionally prefixed with `sha256:`.
    pub checksum: String,
}

pub fn load_manifest(root: &Path) -> Result<ArtifactManifest, ArtifactError> {
    let path = root.join(MANIFEST_FILE);
    if !path.is_file() {
        return Err(ArtifactError::MissingFile(MANIFEST_FILE.to_string()));
    }
    let value: serde_json::Value = serde_json::from_slice(&fs::read(path)?)
        .map_err(|err| ArtifactError::InvalidManifest(err.to_string()))?;
    parse_manifest(value)
}

/// Parse a manifest, normalizing paths and rejecting duplicates.
pub fn parse_manifest(value: serde_json::Value) -> Result<ArtifactManifest, ArtifactError> {
    let mut manifest: ArtifactManifest = serde_json::from_value(value)
        .map_err(|err| ArtifactError::InvalidManifest(err.to_string()))?;

    let mut seen = HashSet::new();
    for file in &mut manifest.files {
        let rel = sanitize_rel_path(&file.rel_path)?;
        file.rel_path = rel.to_string_lossy().into_owned();
        if file.rel_path == MANIFEST_FILE {
            return Err(ArtifactError::InvalidManifest(
                "manifest cannot list itself".to_string(),
            ));
        }
        if !seen.insert(file.rel_path.clone()) {
            return Err(ArtifactError::InvalidManifest(format!(
                "duplicate file path in manifest: {}",
                file.rel_path
            )));
        }
    }
    Ok(manifest)
}

/// Inventory every regular file under `root` and write `manifest.json`.
pub fn write_manifest(root: &Path, abi_major: Option<u16>) -> Result<ArtifactManifest, ArtifactError> {
    let mut files = Vec::new();
    collect_files(root, root, &mut files)?;
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    let manifest = ArtifactManifest { abi_major, files };
    let bytes = serde_json::to_vec_pretty(&manifest)
        .map_err(|err| ArtifactError::InvalidManifest(err.to_string()))?;
    fs::write(root.join(MANIFEST_FILE), bytes)?;
    Ok(manifest)
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<ManifestFile>) -> Result<(), ArtifactError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
            continue;
        }
        let rel = path
            .strip_prefix(root)
            .map_err(|err| ArtifactError::InvalidPath(err.to_string()))?
            .to_string_lossy()
            .replace('\\', "/");
        if rel == MANIFEST_FILE {
            continue;
        }
        let (checksum, size_bytes) = sha256_file(&path)?;
        out.push(ManifestFile {
            rel_path: rel,
            size_bytes,
            checksum,
        });
    }
    Ok(())
}
