use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_ASSUMED_COMPRESSION_RATIO;
use crate::constants::DEFAULT_SEND_LIMIT_BYTES;
use crate::Error;
use crate::Result;

/// Size thresholds for the publisher's send tiers.
///
/// These are tuning knobs, not protocol rules. Whatever the values, the
/// publisher tries raw, then compressed, then falls back to a full reload, and
/// skips compression outright for payloads that cannot possibly fit.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct PayloadLimits {
    /// Largest serialized notification the transport accepts, exclusive
    /// Default: 8000 (PostgreSQL NOTIFY payload limit)
    #[serde(default = "default_send_limit_bytes")]
    pub send_limit_bytes: usize,

    /// Best-case compressed/raw size ratio assumed for rule payloads
    /// Default: 0.05
    #[serde(default = "default_assumed_compression_ratio")]
    pub assumed_compression_ratio: f64,

    /// Raw size above which compression is not attempted.
    /// 0 derives it as `send_limit_bytes / assumed_compression_ratio`.
    /// Default: 0 (derived, 160000 with the other defaults)
    #[serde(default)]
    pub short_circuit_bytes: usize,
}

impl Default for PayloadLimits {
    fn default() -> Self {
        Self {
            send_limit_bytes: default_send_limit_bytes(),
            assumed_compression_ratio: default_assumed_compression_ratio(),
            short_circuit_bytes: 0,
        }
    }
}

impl PayloadLimits {
    pub fn validate(&self) -> Result<()> {
        if self.send_limit_bytes == 0 {
            return Err(Error::Config(ConfigError::Message(
                "send_limit_bytes must be > 0".into(),
            )));
        }

        if !(self.assumed_compression_ratio > 0.0 && self.assumed_compression_ratio <= 1.0) {
            return Err(Error::Config(ConfigError::Message(format!(
                "assumed_compression_ratio must be in (0, 1], got {}",
                self.assumed_compression_ratio
            ))));
        }

        if self.short_circuit_bytes != 0 && self.short_circuit_bytes < self.send_limit_bytes {
            return Err(Error::Config(ConfigError::Message(format!(
                "short_circuit_bytes ({}) must not be below send_limit_bytes ({})",
                self.short_circuit_bytes, self.send_limit_bytes
            ))));
        }

        Ok(())
    }

    /// Raw size above which the publisher goes straight to a full reload.
    pub fn effective_short_circuit_bytes(&self) -> usize {
        if self.short_circuit_bytes != 0 {
            return self.short_circuit_bytes;
        }
        (self.send_limit_bytes as f64 / self.assumed_compression_ratio).round() as usize
    }
}

fn default_send_limit_bytes() -> usize {
    DEFAULT_SEND_LIMIT_BYTES
}
fn default_assumed_compression_ratio() -> f64 {
    DEFAULT_ASSUMED_COMPRESSION_RATIO
}
