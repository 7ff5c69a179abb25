//! Configuration types for partkv
//!
//! Sources are layered: built-in defaults, then an optional TOML file, then
//! `PARTKV__SECTION__FIELD` environment variables.

use crate::error::{Error, Result};
use crate::types::ShardCount;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix, e.g. `PARTKV__COORDINATOR__SHARD_COUNT`
pub const ENV_PREFIX: &str = "PARTKV";

/// Separator between prefix, section and field in environment keys
pub const ENV_SEPARATOR: &str = "__";

/// Root configuration for partkv
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Routing and shard table configuration
    pub coordinator: CoordinatorConfig,
    /// Shard creation budget
    pub provisioning: ProvisioningConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from defaults, an optional file, and the environment
    ///
    /// A missing file is not an error; a malformed one is.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env = config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true);
        Self::load_with_env(path, env)
    }

    fn load_with_env(path: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let config: Self = builder.add_source(env).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML document, without environment overrides
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would leave the coordinator unusable
    pub fn validate(&self) -> Result<()> {
        if self.coordinator.mailbox_capacity == 0 {
            return Err(Error::configuration(
                "coordinator.mailbox_capacity must be at least 1",
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(Error::configuration("logging.level must not be empty"));
        }
        Ok(())
    }
}

/// Coordinator configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Number of partitions (N). Fixed for the life of the coordinator.
    pub shard_count: ShardCount,
    /// Bound of each shard's request mailbox
    pub mailbox_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            shard_count: ShardCount::DEFAULT,
            mailbox_capacity: 1024,
        }
    }
}

/// Resource budget for creating shards
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    /// Total units the coordinator may spend on shard creation
    pub budget: u64,
    /// Units granted to each new shard, paid once per partition
    pub shard_grant: u64,
}

impl ProvisioningConfig {
    /// Number of shards the budget can fund
    #[must_use]
    pub const fn fundable_shards(&self) -> u64 {
        if self.shard_grant == 0 {
            u64::MAX
        } else {
            self.budget / self.shard_grant
        }
    }
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            budget: 1000,
            shard_grant: 100,
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (`RUST_LOG` takes precedence)
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn empty_env() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(Some(HashMap::new()))
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.coordinator.shard_count.get(), 8);
        assert_eq!(config.provisioning.fundable_shards(), 10);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_without_file_gives_defaults() {
        let config = Config::load_with_env(None, empty_env()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[coordinator]\nshard_count = 16\n\n[provisioning]\nbudget = 50\nshard_grant = 10"
        )
        .unwrap();

        let config = Config::load_with_env(Some(file.path()), empty_env()).unwrap();
        assert_eq!(config.coordinator.shard_count.get(), 16);
        assert_eq!(config.coordinator.mailbox_capacity, 1024);
        assert_eq!(config.provisioning.budget, 50);
        assert_eq!(config.provisioning.fundable_shards(), 5);
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = Config::load_with_env(Some(&path), empty_env()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[coordinator]\nshard_count = 16").unwrap();

        let vars = HashMap::from([(
            "PARTKV__COORDINATOR__SHARD_COUNT".to_string(),
            "4".to_string(),
        )]);
        let env = empty_env().source(Some(vars));

        let config = Config::load_with_env(Some(file.path()), env).unwrap();
        assert_eq!(config.coordinator.shard_count.get(), 4);
    }

    #[test]
    fn test_zero_shard_count_rejected() {
        let err = Config::from_toml_str("[coordinator]\nshard_count = 0").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_zero_mailbox_rejected() {
        let err = Config::from_toml_str("[coordinator]\nmailbox_capacity = 0").unwrap_err();
        assert!(err.to_string().contains("mailbox_capacity"));
    }

    #[test]
    fn test_free_shards() {
        let config = Config::from_toml_str("[provisioning]\nshard_grant = 0").unwrap();
        assert_eq!(config.provisioning.fundable_shards(), u64::MAX);
    }
}
