// ABOUTME: Configuration management for mapper-proxy
// Handles the proxy config file, pool descriptors and hot reload watching

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub mod pool;
pub mod watcher;

pub use pool::PoolUrl;
pub use watcher::ConfigWatcher;

/// Environment variable overriding `reuse_timeout` (seconds)
pub const ENV_REUSE_TIMEOUT: &str = "MAPPER_PROXY_REUSE_TIMEOUT";

/// Environment variable overriding `colors` (`0`/`false` disables)
pub const ENV_COLORS: &str = "MAPPER_PROXY_COLORS";

// === Config Errors ===

/// Errors raised while validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Pool URL could not be parsed
    #[error("Invalid pool URL '{url}': {reason}")]
    InvalidPoolUrl { url: String, reason: String },

    /// Pool URL uses a scheme other than stratum+tcp/ssl/tls
    #[error("Unsupported pool scheme: {0}")]
    UnsupportedScheme(String),

    /// No upstream pools configured
    #[error("At least one pool must be configured")]
    NoPools,

    /// Tick interval of zero would spin the control loop
    #[error("tick_interval must be greater than zero")]
    ZeroTickInterval,
}

// === Proxy Config ===

/// Proxy configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// How long a mapper is kept after its miner leaves; 0 disables reuse
    #[serde(default, with = "duration_secs")]
    pub reuse_timeout: Duration,

    /// Colored console summaries
    #[serde(default = "default_true")]
    pub colors: bool,

    /// Interval between sweeper ticks
    #[serde(default = "default_tick_interval", with = "duration_secs")]
    pub tick_interval: Duration,

    /// Interval between connection summaries (0 disables)
    #[serde(default = "default_print_interval", with = "duration_secs")]
    pub print_interval: Duration,

    /// Reload the config file when it changes on disk
    #[serde(default = "default_true")]
    pub watch: bool,

    /// Interval between config file checks
    #[serde(default = "default_watch_interval", with = "duration_secs")]
    pub watch_interval: Duration,

    /// Upstream pools, in failover order
    #[serde(default)]
    pub pools: Vec<PoolUrl>,
}

fn default_true() -> bool {
    true
}

fn default_tick_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_print_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_watch_interval() -> Duration {
    Duration::from_secs(5)
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            reuse_timeout: Duration::ZERO,
            colors: default_true(),
            tick_interval: default_tick_interval(),
            print_interval: default_print_interval(),
            watch: default_true(),
            watch_interval: default_watch_interval(),
            pools: Vec::new(),
        }
    }
}

impl ProxyConfig {
    /// Load and validate a config file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        config.apply_env_overrides();
        config
            .validate()
            .with_context(|| format!("Invalid config in {}", path.display()))?;

        Ok(config)
    }

    /// Default config location: `~/.mapper-proxy/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home_dir.join(".mapper-proxy").join("config.toml"))
    }

    /// Check invariants the routing core relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pools.is_empty() {
            return Err(ConfigError::NoPools);
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroTickInterval);
        }
        Ok(())
    }

    /// Whether idle mappers are retained at all
    pub fn reuse_enabled(&self) -> bool {
        !self.reuse_timeout.is_zero()
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var(ENV_REUSE_TIMEOUT) {
            match value.trim().parse::<u64>() {
                Ok(secs) => self.reuse_timeout = Duration::from_secs(secs),
                Err(_) => tracing::warn!("Ignoring {ENV_REUSE_TIMEOUT}={value}: not a number"),
            }
        }

        if let Ok(value) = std::env::var(ENV_COLORS) {
            self.colors = !matches!(value.trim(), "0" | "false" | "no" | "off");
        }
    }
}

/// Serde helper for Duration as seconds (u64)
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
