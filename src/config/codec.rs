use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_MAX_DECOMPRESSED_BYTES;
use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    /// Deflate level, 0 (store) to 9 (best)
    /// Default: 9
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,

    /// Inflated payloads larger than this are rejected as corrupt
    /// Default: 16 MiB
    #[serde(default = "default_max_decompressed_bytes")]
    pub max_decompressed_bytes: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            compression_level: default_compression_level(),
            max_decompressed_bytes: default_max_decompressed_bytes(),
        }
    }
}

impl CodecConfig {
    pub fn validate(&self) -> Result<()> {
        if self.compression_level > 9 {
            return Err(Error::Config(ConfigError::Message(format!(
                "compression_level must be between 0 and 9, got {}",
                self.compression_level
            ))));
        }

        if self.max_decompressed_bytes == 0 {
            return Err(Error::Config(ConfigError::Message(
                "max_decompressed_bytes must be > 0".into(),
            )));
        }

        Ok(())
    }
}

fn default_compression_level() -> u32 {
    9
}
fn default_max_decompressed_bytes() -> usize {
    DEFAULT_MAX_DECOMPRESSED_BYTES
}
