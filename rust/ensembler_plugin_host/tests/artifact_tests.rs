use std::fs;
use std::path::Path;

use ensembler_plugin_host::artifact::manifest::write_manifest;
use ensembler_plugin_host::{
    load_ensembler, ArtifactError, EnsemblerArtifact, HostError, PluginError, StoreOptions,
};

fn build_artifact(root: &Path) {
    fs::create_dir_all(root.join("lib")).expect("lib dir");
    fs::create_dir_all(root.join("artifacts")).expect("artifacts dir");
    fs::write(
        root.join("ensembler.yaml"),
        "name: weighted\nentry_point:\n  library: lib/libweighted.so\nartifacts:\n  weights: artifacts/weights.json\n",
    )
    .expect("descriptor");
    fs::write(root.join("lib/libweighted.so"), b"not a real library").expect("library");
    fs::write(root.join("artifacts/weights.json"), b"{\"a\": 0.5}").expect("weights");
    write_manifest(root, Some(1)).expect("manifest");
}

#[test]
fn open_verifies_and_resolves_artifacts() {
    let dir = tempfile::tempdir().expect("tempdir");
    build_artifact(dir.path());

    let artifact = EnsemblerArtifact::open(dir.path()).expect("open artifact");
    assert_eq!(artifact.descriptor().name, "weighted");
    let artifacts = artifact.artifacts().expect("artifacts");
    let weights = &artifacts["weights"];
    assert!(weights.is_absolute());
    assert!(weights.ends_with("artifacts/weights.json"));
}

#[test]
fn open_rejects_tampered_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    build_artifact(dir.path());
    fs::write(dir.path().join("artifacts/weights.json"), b"{\"a\": 0.9}").expect("tamper");

    let err = EnsemblerArtifact::open(dir.path()).expect_err("tampered artifact");
    assert!(matches!(err, ArtifactError::ChecksumMismatch { .. }), "{err}");
}

#[test]
fn open_requires_manifest() {
    let dir = tempfile::tempdir().expect("tempdir");
    build_artifact(dir.path());
    fs::remove_file(dir.path().join("manifest.json")).expect("remove manifest");

    let err = EnsemblerArtifact::open(dir.path()).expect_err("missing manifest");
    assert!(matches!(err, ArtifactError::MissingFile(_)), "{err}");
}

#[tokio::test]
async fn load_ensembler_reports_unloadable_library() {
    let dir = tempfile::tempdir().expect("tempdir");
    build_artifact(dir.path());
    let uri = dir.path().to_string_lossy().into_owned();

    let err = match load_ensembler(&uri, &StoreOptions::default()).await {
        Ok(_) => panic!("garbage library should not load"),
        Err(err) => err,
    };
    assert!(
        matches!(err, HostError::Plugin(PluginError::Load { .. })),
        "{err}"
    );
}
