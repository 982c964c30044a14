//! Annotation grouping.
//!
//! Job annotations use `<group>/<subkey>` names. The engine consumes the
//! `datafusion` group as session configuration and the `hadoopConfiguration`
//! group as object-store options; every other group is carried through
//! untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Group whose entries become DataFusion session config keys.
pub const DATAFUSION_GROUP: &str = "datafusion";
/// Group whose entries become object-store / Delta storage options.
pub const STORAGE_GROUP: &str = "hadoopConfiguration";

pub type AnnotationGroups = BTreeMap<String, BTreeMap<String, String>>;

/// Split `<group>/<subkey>` annotations into nested maps.
///
/// The split happens at the first `/`, so subkeys may themselves contain
/// slashes. Names without a slash are not grouped and are skipped here.
pub fn group_annotations(annotations: &BTreeMap<String, String>) -> AnnotationGroups {
    let mut grouped = AnnotationGroups::new();
    for (name, value) in annotations {
        if let Some((group, subkey)) = name.split_once('/') {
            grouped
                .entry(group.to_string())
                .or_default()
                .insert(subkey.to_string(), value.clone());
        }
    }
    grouped
}

/// Annotations routed to their consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineAnnotations {
    pub datafusion: BTreeMap<String, String>,
    pub storage_options: BTreeMap<String, String>,
    /// Groups the engine does not interpret, forwarded verbatim.
    pub passthrough: AnnotationGroups,
    /// Annotations without a group prefix.
    pub ungrouped: BTreeMap<String, String>,
}

impl EngineAnnotations {
    pub fn from_annotations(annotations: &BTreeMap<String, String>) -> Self {
        let mut routed = Self::default();
        for (group, entries) in group_annotations(annotations) {
            match group.as_str() {
                DATAFUSION_GROUP => routed.datafusion = entries,
                STORAGE_GROUP => routed.storage_options = entries,
                _ => {
                    routed.passthrough.insert(group, entries);
                }
            }
        }
        routed.ungrouped = annotations
            .iter()
            .filter(|(name, _)| !name.contains('/'))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        routed
    }

    /// DataFusion config keys, with the `datafusion.` namespace added when
    /// the annotation omitted it.
    pub fn datafusion_config_entries(&self) -> impl Iterator<Item = (String, &str)> {
        self.datafusion.iter().map(|(key, value)| {
            let key = if key.starts_with("datafusion.") {
                key.clone()
            } else {
                format!("datafusion.{key}")
            };
            (key, value.as_str())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotations(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_grouping_round_trip() {
        let original = annotations(&[
            ("spark/spark.executor.memory", "4g"),
            ("hadoopConfiguration/fs.gs.project.id", "proj"),
            ("datafusion/execution.batch_size", "1024"),
            ("custom/a/b", "nested"),
        ]);
        let grouped = group_annotations(&original);
        for (name, value) in &original {
            let (group, subkey) = name.split_once('/').unwrap();
            assert_eq!(&grouped[group][subkey], value);
        }
        assert_eq!(grouped["custom"]["a/b"], "nested");
    }

    #[test]
    fn test_routing() {
        let routed = EngineAnnotations::from_annotations(&annotations(&[
            ("spark/spark.executor.cores", "2"),
            ("hadoopConfiguration/google_service_account_path", "/secrets/sa.json"),
            ("datafusion/execution.target_partitions", "2"),
            ("owner", "team-a"),
        ]));
        assert_eq!(routed.datafusion["execution.target_partitions"], "2");
        assert_eq!(
            routed.storage_options["google_service_account_path"],
            "/secrets/sa.json"
        );
        assert_eq!(routed.passthrough["spark"]["spark.executor.cores"], "2");
        assert_eq!(routed.ungrouped["owner"], "team-a");
        let entries: Vec<_> = routed.datafusion_config_entries().collect();
        assert_eq!(
            entries,
            vec![("datafusion.execution.target_partitions".to_string(), "2")]
        );
    }
}
