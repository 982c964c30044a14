//! File integrity checks against an artifact manifest.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use sha2::Digest;

use crate::artifact::manifest::{ArtifactManifest, ManifestFile};
use crate::error::ArtifactError;

/// Verify every file listed in `manifest` exists under `root` with the
/// recorded size and digest.
pub fn verify_files(root: &Path, manifest: &ArtifactManifest) -> Result<(), ArtifactError> {
    for file in &manifest.files {
        verify_file(root, file)?;
    }
    Ok(())
}

pub fn verify_file(root: &Path, expected: &ManifestFile) -> Result<(), ArtifactError> {
    let path = safe_join(root, &expected.rel_path)?;
    if !path.is_file() {
        return Err(ArtifactError::MissingFile(expected.rel_path.clone()));
    }
    let actual_size = fs::metadata(&path)?.len();
    if actual_size != expected.size_bytes {
        return Err(ArtifactError::SizeMismatch {
            path: expected.rel_path.clone(),
            expected: expected.size_bytes,
            actual: actual_size,
        });
    }
    let (digest, _) = sha256_file(&path)?;
    let expected_digest = normalize_checksum(&expected.checksum)?;
    if digest != expected_digest {
        return Err(ArtifactError::ChecksumMismatch {
            path: expected.rel_path.clone(),
            expected: expected_digest,
            actual: digest,
        });
    }
    Ok(())
}

/// SHA-256 hex digest and byte length of a file.
pub fn sha256_file(path: &Path) -> Result<(String, u64), ArtifactError> {
    let mut file = File::open(path)?;
    let mut hasher = sha2::Sha256::new();
    let mut buf = [0u8; 1024 * 64];
    let mut total = 0u64;
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
        total += read as u64;
    }
    Ok((format!("{:x}", hasher.finalize()), total))
}

/// Accepts bare hex or `sha256:`-prefixed digests.
pub fn normalize_checksum(value: &str) -> Result<String, ArtifactError> {
    let lower = value.trim().to_ascii_lowercase();
    if lower.is_empty() {
        return Err(ArtifactError::InvalidManifest("checksum is empty".to_string()));
    }
    let digest = match lower.strip_prefix("sha256:") {
        Some(rest) => rest.to_string(),
        None if lower.contains(':') => {
            return Err(ArtifactError::InvalidManifest(format!(
                "unsupported checksum format: {value}"
            )));
        }
        None => lower,
    };
    if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ArtifactError::InvalidManifest(format!(
            "checksum is not a sha256 hex digest: {value}"
        )));
    }
    Ok(digest)
}

/// Normalize separators and reject anything that could escape the artifact root.
pub fn sanitize_rel_path(path: &str) -> Result<PathBuf, ArtifactError> {
    let normalized = path.trim().replace('\\', "/");
    let normalized = normalized.trim_start_matches("./");
    if normalized.is_empty() {
        return Err(ArtifactError::InvalidPath("path is empty".to_string()));
    }
    let rel = Path::new(normalized);
    for component in rel.components() {
        if !matches!(component, Component::Normal(_)) {
            return Err(ArtifactError::InvalidPath(format!(
                "invalid path component in {path}"
            )));
        }
    }
    Ok(rel.to_path_buf())
}

pub fn safe_join(root: &Path, rel: &str) -> Result<PathBuf, ArtifactError> {
    Ok(root.join(sanitize_rel_path(rel)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_rejects_traversal() {
        assert!(sanitize_rel_path("../etc/passwd").is_err());
        assert!(sanitize_rel_path("/abs/path").is_err());
        assert!(sanitize_rel_path("lib/../../x").is_err());
        assert_eq!(
            sanitize_rel_path("./lib\\plugin.so").unwrap(),
            PathBuf::from("lib/plugin.so")
        );
    }

    #[test]
    fn test_normalize_checksum_prefix_and_case() {
        let digest = "AB".repeat(32);
        assert_eq!(
            normalize_checksum(&format!("sha256:{digest}")).unwrap(),
            "ab".repeat(32)
        );
        assert!(normalize_checksum("md5:abc").is_err());
        assert!(normalize_checksum("abc").is_err());
    }
}
