//! Resolution of artifact URIs to local directories.
//!
//! Local paths and `file://` URIs are used in place. Anything else is treated
//! as an object store prefix and mirrored into a cache directory keyed by the
//! URI, reusing a previous download when its manifest still verifies.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use futures::TryStreamExt;
use object_store::path::Path as ObjectPath;
use object_store::ObjectMeta;
use tracing::{debug, info};
use url::Url;

use crate::artifact::checksum::{safe_join, verify_files};
use crate::artifact::manifest::load_manifest;
use crate::error::ArtifactError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocation {
    Local(PathBuf),
    Remote(Url),
}

impl ArtifactLocation {
    pub fn parse(uri: &str) -> Result<Self, ArtifactError> {
        let trimmed = uri.trim();
        if trimmed.is_empty() {
            return Err(ArtifactError::InvalidUri {
                uri: uri.to_string(),
                details: "URI is empty".to_string(),
            });
        }
        if !trimmed.contains("://") {
            return Ok(ArtifactLocation::Local(PathBuf::from(trimmed)));
        }
        let url = Url::parse(trimmed).map_err(|err| ArtifactError::InvalidUri {
            uri: uri.to_string(),
            details: err.to_string(),
        })?;
        if url.scheme() == "file" {
            let path = url.to_file_path().map_err(|_| ArtifactError::InvalidUri {
                uri: uri.to_string(),
                details: "file URI has no local path".to_string(),
            })?;
            return Ok(ArtifactLocation::Local(path));
        }
        Ok(ArtifactLocation::Remote(url))
    }
}

/// Where remote artifacts are mirrored and which credentials reach them.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub cache_dir: PathBuf,
    /// Passed through to the object store builder (e.g. `aws_region`).
    pub storage_options: HashMap<String, String>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            cache_dir: std::env::temp_dir().join("ensembler-artifacts"),
            storage_options: HashMap::new(),
        }
    }
}

/// Resolve `uri` to a local artifact directory.
pub async fn fetch_artifact(uri: &str, options: &StoreOptions) -> Result<PathBuf, ArtifactError> {
    match ArtifactLocation::parse(uri)? {
        ArtifactLocation::Local(path) => {
            if !path.is_dir() {
                return Err(ArtifactError::NotFound(uri.to_string()));
            }
            Ok(path)
        }
        ArtifactLocation::Remote(url) => mirror_prefix(&url, options).await,
    }
}

fn cache_key(url: &Url) -> String {
    let digest = blake3::hash(url.as_str().as_bytes());
    digest.to_hex().as_str()[..16].to_string()
}

fn cached_copy_is_valid(dest: &Path) -> bool {
    match load_manifest(dest) {
        Ok(manifest) => verify_files(dest, &manifest).is_ok(),
        Err(_) => false,
    }
}

async fn mirror_prefix(url: &Url, options: &StoreOptions) -> Result<PathBuf, ArtifactError> {
    let dest = options.cache_dir.join(cache_key(url));
    if cached_copy_is_valid(&dest) {
        debug!(uri = %url, dest = %dest.display(), "Reusing cached ensembler artifact");
        return Ok(dest);
    }

    let (store, prefix) = object_store::parse_url_opts(url, options.storage_options.iter())?;
    let objects: Vec<ObjectMeta> = store.list(Some(&prefix)).try_collect().await?;
    if objects.is_empty() {
        return Err(ArtifactError::NotFound(url.to_string()));
    }

    fs::create_dir_all(&dest)?;
    for meta in &objects {
        let rel = relative_key(&prefix, &meta.location)?;
        let target = safe_join(&dest, &rel)?;
        let bytes = store.get(&meta.location).await?.bytes().await?;
        write_atomically(&target, &bytes)?;
    }
    info!(
        uri = %url,
        dest = %dest.display(),
        objects = objects.len(),
        "Downloaded ensembler artifact"
    );
    Ok(dest)
}

fn relative_key(prefix: &ObjectPath, location: &ObjectPath) -> Result<String, ArtifactError> {
    let rel = location
        .as_ref()
        .strip_prefix(prefix.as_ref())
        .ok_or_else(|| {
            ArtifactError::InvalidPath(format!("{location} is outside prefix {prefix}"))
        })?
        .trim_start_matches('/');
    Ok(rel.to_string())
}

fn write_atomically(target: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let file_name = target
        .file_name()
        .ok_or_else(|| ArtifactError::InvalidPath("missing file name".to_string()))?
        .to_string_lossy();
    let tmp = target.with_file_name(format!(".{file_name}.partial"));
    fs::write(&tmp, bytes)?;
    fs::rename(tmp, target)?;
    Ok(())
}
