//! Configuration management for the policy watcher.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support (`CONFIG_PATH`)
//! - Environment variable overrides (`WATCHER__` prefix)
//! - Component-wise validation
//!
//! Everything here is read once when a [`crate::Watcher`] is built and is
//! immutable afterwards.
mod channel;
mod codec;
mod connection;
mod limits;
pub use channel::*;
pub use codec::*;
pub use connection::*;
pub use limits::*;


use std::env;
use std::fmt::Debug;
use std::time::Duration;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Main configuration container for a watcher instance
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct WatcherConfig {
    /// Backing store connection parameters
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Notification channel and dispatch behaviour
    #[serde(default)]
    pub channel: ChannelConfig,
    /// Size thresholds driving the send tiers
    #[serde(default)]
    pub limits: PayloadLimits,
    /// Compression parameters
    #[serde(default)]
    pub codec: CodecConfig,
    /// Upper bound on how long `close()` waits for the listener task
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

impl Debug for WatcherConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        // The connection url may carry credentials.
        f.debug_struct("WatcherConfig")
            .field("channel", &self.channel)
            .field("limits", &self.limits)
            .field("codec", &self.codec)
            .field("shutdown_timeout_ms", &self.shutdown_timeout_ms)
            .finish()
    }
}

impl WatcherConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `WATCHER__` prefix (highest priority)
    ///
    /// # Note
    /// Callers MUST call `validate()` before handing the configuration to a watcher.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("WATCHER__CHANNEL__NAME", "casbin_rules");
    /// let cfg = WatcherConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns validated instance.
    ///
    /// # Errors
    /// Returns validation errors from any subsystem:
    /// - Empty connection url
    /// - Channel names PostgreSQL would reject or truncate
    /// - Inconsistent size thresholds
    /// - Out-of-range compression level
    pub fn validate(self) -> Result<Self> {
        self.connection.validate()?;
        self.channel.validate()?;
        self.limits.validate()?;
        self.codec.validate()?;
        Ok(self)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("WATCHER")
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}

fn default_shutdown_timeout_ms() -> u64 {
    3000
}
