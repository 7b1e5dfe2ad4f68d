//! Compression for oversized notifications.
//!
//! The publisher compresses serialized messages that exceed the raw send limit
//! and embeds them, base64 encoded, in a compressed envelope. The listener
//! reverses both steps. Raw deflate (no zlib header) keeps payloads
//! byte-compatible with Go's `compress/flate`.
mod deflate;
pub use deflate::*;


use base64::engine::general_purpose::STANDARD;
use base64::Engine;
#[cfg(test)]
use mockall::automock;

use crate::CodecError;

/// Byte-level compression used by the publisher and listener.
#[cfg_attr(test, automock)]
pub trait PayloadCodec: Send + Sync + 'static {
    /// Fails with [`CodecError::Unavailable`] only when the encoder could not
    /// be set up, letting callers degrade instead of dropping the mutation.
    fn compress(
        &self,
        raw: &[u8],
    ) -> Result<Vec<u8>, CodecError>;

    fn decompress(
        &self,
        data: &[u8],
    ) -> Result<Vec<u8>, CodecError>;
}

/// Text-safe form of compressed bytes, as carried in `Message::payload`.
pub fn encode_text(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode_text(text: &str) -> Result<Vec<u8>, CodecError> {
    Ok(STANDARD.decode(text)?)
}
