use std::fmt::Debug;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Serialize, Deserialize, Clone)]
pub struct ConnectionConfig {
    /// PostgreSQL connection string for the backing store
    /// Default: "postgres://localhost:5432/casbin"
    #[serde(default = "default_url")]
    pub url: String,

    /// Pool size used for publishing and full reloads. The listener holds
    /// one extra dedicated connection on top of this.
    /// Default: 4
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Timeout for acquiring a connection (unit: milliseconds)
    /// Default: 5000
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Debug for ConnectionConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("max_connections", &self.max_connections)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .finish()
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            max_connections: default_max_connections(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl ConnectionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "connection url cannot be empty".into(),
            )));
        }

        if self.max_connections == 0 {
            return Err(Error::Config(ConfigError::Message(
                "max_connections must be at least 1".into(),
            )));
        }

        if self.connect_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "connect_timeout_ms must be > 0".into(),
            )));
        }

        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn default_url() -> String {
    "postgres://localhost:5432/casbin".to_string()
}
fn default_max_connections() -> u32 {
    4
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
