//! Streaming configuration loaded from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::streaming::density::PopulationBaseline;
use crate::streaming::profile::ProfileTable;

/// How generation work items are executed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutorKind {
    /// Run each frame's jobs on the rayon pool during the next tick (deterministic).
    Inline,
    /// Run jobs on a dedicated tokio runtime and poll results each tick.
    Threaded {
        /// Maximum number of jobs running at once
        max_concurrent: usize,
    },
}

impl Default for ExecutorKind {
    fn default() -> Self {
        Self::Inline
    }
}

/// Top-level configuration for a [`WorldStreamer`](crate::streaming::WorldStreamer).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Initial performance mode name ("normal", "minimal" or a custom table entry).
    pub mode: String,
    /// Custom profile table. `None` uses the built-in normal/minimal table.
    pub profiles: Option<ProfileTable>,
    /// Seed mixed into every chunk-local seed.
    pub world_seed: u32,
    /// Baseline per-chunk population before density scaling.
    pub population: PopulationBaseline,
    /// Generation executor.
    pub executor: ExecutorKind,
    /// Number of evicted coordinates remembered for double-eviction checks.
    pub tombstone_capacity: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            mode: "normal".to_string(),
            profiles: None,
            world_seed: 12345,
            population: PopulationBaseline::default(),
            executor: ExecutorKind::Inline,
            tombstone_capacity: 1024,
        }
    }
}

impl StreamingConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let config = Self::from_json(&data)?;
        log::info!("Loaded streaming config from {}", path.display());
        Ok(config)
    }

    /// The profile table in effect: the custom table or the built-in one.
    pub fn profile_table(&self) -> ProfileTable {
        self.profiles.clone().unwrap_or_default()
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if let Some(table) = &self.profiles {
            table.validate()?;
        }
        if let ExecutorKind::Threaded { max_concurrent: 0 } = self.executor {
            return Err(Error::Config("threaded executor needs max_concurrent >= 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = StreamingConfig::default();
        assert_eq!(config.mode, "normal");
        assert_eq!(config.executor, ExecutorKind::Inline);
        assert!(config.validate().is_ok());
        assert_eq!(config.profile_table().names(), vec!["normal", "minimal"]);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = StreamingConfig::from_json(r#"{ "mode": "minimal", "world_seed": 7 }"#).unwrap();
        assert_eq!(config.mode, "minimal");
        assert_eq!(config.world_seed, 7);
        assert_eq!(config.tombstone_capacity, 1024);
        assert!(config.profiles.is_none());
    }

    #[test]
    fn test_threaded_executor_json() {
        let config = StreamingConfig::from_json(
            r#"{ "executor": { "kind": "threaded", "max_concurrent": 3 } }"#,
        )
        .unwrap();
        assert_eq!(config.executor, ExecutorKind::Threaded { max_concurrent: 3 });
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let result = StreamingConfig::from_json(
            r#"{ "executor": { "kind": "threaded", "max_concurrent": 0 } }"#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_json() {
        let result = StreamingConfig::from_json("{ mode: ");
        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "mode": "minimal", "tombstone_capacity": 16 }}"#).unwrap();

        let config = StreamingConfig::load(file.path()).unwrap();
        assert_eq!(config.mode, "minimal");
        assert_eq!(config.tombstone_capacity, 16);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = StreamingConfig::load(dir.path().join("missing.json"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_round_trip_through_json() {
        let config = StreamingConfig {
            profiles: Some(ProfileTable::default()),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed = StreamingConfig::from_json(&json).unwrap();
        assert_eq!(parsed.profile_table(), ProfileTable::default());
    }

    #[test]
    fn test_oversized_profile_radius_rejected() {
        let mut normal = crate::streaming::profile::PerformanceProfile::normal();
        normal.view_distance = 100_000;
        normal.buffer_distance = 100_000;
        let config = StreamingConfig {
            profiles: Some(serde_json::from_value(serde_json::json!([normal])).unwrap()),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(matches!(StreamingConfig::from_json(&json), Err(Error::Config(_))));
    }
}
