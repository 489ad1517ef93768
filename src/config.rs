//! Configuration for the registry service.

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "config/registry.toml";

/// Service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Bank connection.
    pub bank: BankConfig,
    /// Worker pool configuration.
    #[serde(default)]
    pub poller: PollerConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection URL.
    pub url: String,
    /// Maximum connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Bank connection.
#[derive(Debug, Clone, Deserialize)]
pub struct BankConfig {
    /// Base URL of the bank API.
    pub url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_bank_timeout")]
    pub timeout_secs: u64,
}

impl BankConfig {
    /// The request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    /// Number of concurrent workers.
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    /// Seconds between two polls of the same worker.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl PollerConfig {
    /// The polling period.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            num_workers: default_num_workers(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

const fn default_max_connections() -> u32 {
    5
}

const fn default_bank_timeout() -> u64 {
    3
}

const fn default_num_workers() -> usize {
    2
}

const fn default_poll_interval() -> u64 {
    10
}

impl RegistryConfig {
    /// Load configuration from [`DEFAULT_CONFIG_FILE`] and the environment.
    ///
    /// # Errors
    ///
    /// Returns error if configuration cannot be loaded or parsed.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from `path`, overridden by `REGISTRY_*` environment
    /// variables (`REGISTRY_DATABASE__URL`, `REGISTRY_POLLER__NUM_WORKERS`, …).
    ///
    /// # Errors
    ///
    /// Returns error if configuration cannot be loaded, parsed, or is invalid.
    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config: Self = Self::figment(path).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("REGISTRY_").split("__"))
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.poller.num_workers > 0, "poller.num_workers must be positive");
        anyhow::ensure!(
            self.poller.poll_interval_secs > 0,
            "poller.poll_interval_secs must be positive"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_poller_config() {
        let config = PollerConfig::default();
        assert_eq!(config.num_workers, 2);
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: RegistryConfig = Figment::new()
            .merge(Toml::string(
                r#"
                [database]
                url = "postgres://localhost/registry"

                [bank]
                url = "http://bank.local"
                "#,
            ))
            .extract()
            .unwrap();

        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.bank.timeout(), Duration::from_secs(3));
        assert_eq!(config.poller.num_workers, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let config: RegistryConfig = Figment::new()
            .merge(Toml::string(
                r#"
                [database]
                url = "postgres://localhost/registry"

                [bank]
                url = "http://bank.local"

                [poller]
                num_workers = 0
                "#,
            ))
            .extract()
            .unwrap();

        assert!(config.validate().is_err());
    }
}
