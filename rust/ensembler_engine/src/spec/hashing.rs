//! Canonical BLAKE3 hashing for job spec identity.
//!
//! The job spec is converted to JSON, object keys are sorted recursively, and
//! the compact encoding is hashed.

use std::collections::BTreeMap;

use serde::Serialize;

use super::job::JobSpec;

/// Canonical BLAKE3 hash of a job spec.
pub fn hash_spec(spec: &JobSpec) -> serde_json::Result<[u8; 32]> {
    let canonical = canonicalize_value(serde_json::to_value(spec)?);
    let bytes = serde_json::to_vec(&canonical)?;
    Ok(*blake3::hash(&bytes).as_bytes())
}

/// Hex form of [`hash_spec`], as logged and stored in the run result.
pub fn spec_hash_hex(spec: &JobSpec) -> serde_json::Result<String> {
    hash_spec(spec).map(hex::encode)
}

#[derive(Serialize)]
#[serde(untagged)]
enum CanonicalValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<CanonicalValue>),
    Object(BTreeMap<String, CanonicalValue>),
}

fn canonicalize_value(value: serde_json::Value) -> CanonicalValue {
    match value {
        serde_json::Value::Null => CanonicalValue::Null,
        serde_json::Value::Bool(b) => CanonicalValue::Bool(b),
        serde_json::Value::Number(n) => CanonicalValue::Number(n),
        serde_json::Value::String(s) => CanonicalValue::String(s),
        serde_json::Value::Array(items) => {
            CanonicalValue::Array(items.into_iter().map(canonicalize_value).collect())
        }
        serde_json::Value::Object(entries) => CanonicalValue::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k, canonicalize_value(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: &str = r#"
metadata:
  name: hash-me
  annotations:
    b/x: "1"
    a/y: "2"
spec:
  source:
    dataset: {type: BQ, bq_config: {table: p.d.features}}
    join_on: [id]
  predictions:
    model_a:
      dataset: {type: BQ, bq_config: {table: p.d.model_a}}
      join_on: [id]
      columns: [score]
  ensembler:
    uri: /artifacts/ens
    result: {column_name: result, type: DOUBLE}
  sink:
    type: CONSOLE
"#;

    #[test]
    fn test_hash_is_stable() {
        let spec = JobSpec::from_yaml(SPEC).unwrap();
        let again = JobSpec::from_yaml(SPEC).unwrap();
        assert_eq!(hash_spec(&spec).unwrap(), hash_spec(&again).unwrap());
        assert_eq!(spec_hash_hex(&spec).unwrap().len(), 64);
    }

    #[test]
    fn test_hash_changes_with_content() {
        let spec = JobSpec::from_yaml(SPEC).unwrap();
        let other = JobSpec::from_yaml(&SPEC.replace("hash-me", "hash-you")).unwrap();
        assert_ne!(hash_spec(&spec).unwrap(), hash_spec(&other).unwrap());
    }
}
