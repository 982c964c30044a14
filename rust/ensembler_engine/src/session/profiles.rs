//! Session sizing for batch jobs, selected with `--environment`.

use datafusion_common::{DataFusionError, Result};
use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

/// Expected size of an ensembling job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentClass {
    /// Up to a few million joined rows.
    #[default]
    Small,
    Medium,
    /// Joins that do not fit in memory without spilling.
    Large,
}

impl EnvironmentClass {
    /// `(target_partitions, batch_size, memory pool MiB)`.
    const fn sizing(self) -> (u32, u32, u64) {
        match self {
            EnvironmentClass::Small => (4, 4096, 512),
            EnvironmentClass::Medium => (8, 8192, 2048),
            EnvironmentClass::Large => (16, 16384, 8192),
        }
    }
}

/// Partitioning, batch and memory limits for a job session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentProfile {
    pub class: EnvironmentClass,
    pub target_partitions: u32,
    /// Rows per record batch handed to the ensembler UDF.
    pub batch_size: u32,
    pub memory_pool_bytes: u64,
}

impl EnvironmentProfile {
    pub fn from_class(class: EnvironmentClass) -> Self {
        let (target_partitions, batch_size, pool_mib) = class.sizing();
        Self {
            class,
            target_partitions,
            batch_size,
            memory_pool_bytes: pool_mib * MIB,
        }
    }

    /// Memory pool size for the spill pool, checked against the platform's
    /// address width.
    pub fn memory_pool_size(&self) -> Result<usize> {
        usize::try_from(self.memory_pool_bytes).map_err(|_| {
            DataFusionError::Configuration(format!(
                "Memory pool of {} bytes does not fit this platform",
                self.memory_pool_bytes
            ))
        })
    }
}

impl Default for EnvironmentProfile {
    fn default() -> Self {
        Self::from_class(EnvironmentClass::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_grow_with_class() {
        let small = EnvironmentProfile::from_class(EnvironmentClass::Small);
        let large = EnvironmentProfile::from_class(EnvironmentClass::Large);
        assert_eq!(small.target_partitions, 4);
        assert_eq!(small.memory_pool_bytes, 512 * MIB);
        assert!(large.target_partitions > small.target_partitions);
        assert!(large.batch_size > small.batch_size);
        assert_eq!(large.memory_pool_bytes, 8192 * MIB);
    }

    #[test]
    fn test_default_is_small() {
        assert_eq!(EnvironmentProfile::default().class, EnvironmentClass::Small);
    }

    #[test]
    fn test_memory_pool_size() {
        let profile = EnvironmentProfile::default();
        assert_eq!(profile.memory_pool_size().unwrap(), 512 * 1024 * 1024);
    }

    #[test]
    fn test_class_names() {
        let json = serde_json::to_string(&EnvironmentClass::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
        let parsed = <EnvironmentClass as clap::ValueEnum>::from_str("large", true).unwrap();
        assert_eq!(parsed, EnvironmentClass::Large);
    }
}
