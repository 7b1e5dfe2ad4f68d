use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_CHANNEL;
use crate::constants::MAX_CHANNEL_NAME_LEN;
use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChannelConfig {
    /// Notification channel shared by every replica
    /// Default: "casbin_channel"
    #[serde(default = "default_channel_name")]
    pub name: String,

    /// Logs every sent and received notification at info level
    /// Default: false
    #[serde(default)]
    pub verbose: bool,

    /// Dispatches notifications this replica sent itself
    /// Default: false (own notifications are discarded)
    #[serde(default)]
    pub notify_self: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: default_channel_name(),
            verbose: false,
            notify_self: false,
        }
    }
}

impl ChannelConfig {
    /// Channel names travel unquoted through `pg_notify`, so restrict them to
    /// plain identifiers PostgreSQL will not fold or truncate.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "channel name cannot be empty".into(),
            )));
        }

        if self.name.len() > MAX_CHANNEL_NAME_LEN {
            return Err(Error::Config(ConfigError::Message(format!(
                "channel name exceeds {} bytes: {}",
                MAX_CHANNEL_NAME_LEN, self.name
            ))));
        }

        if !self.name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::Config(ConfigError::Message(format!(
                "channel name must be ASCII alphanumeric or '_': {}",
                self.name
            ))));
        }

        Ok(())
    }
}

fn default_channel_name() -> String {
    DEFAULT_CHANNEL.to_string()
}
