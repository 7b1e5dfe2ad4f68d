//! Policy Watcher Error Hierarchy
//!
//! Errors are grouped by the path they occur on. Publish-path errors
//! (`Transport`, `Codec` while encoding) are returned to the caller and only
//! affect propagation latency, since the local mutation has already committed.
//! Receive-path errors (`Codec`, `Protocol`, `Apply`) are terminal for a single
//! notification: the listener logs them and keeps going.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Channel connect/subscribe/publish/receive failures
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Compression or text-wrapping failures
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Undecodable or invalid wire messages
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Local replay of a remote diff failed
    #[error(transparent)]
    Apply(#[from] ApplyError),

    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Serialization of an outgoing message failed
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Backing store unreachable
    #[error("Failed to connect to backing store: {0}")]
    Connect(String),

    /// LISTEN on the channel failed
    #[error("Failed to subscribe to channel {channel}: {reason}")]
    Subscribe { channel: String, reason: String },

    /// NOTIFY on the channel failed
    #[error("Failed to publish {size} bytes on channel {channel}: {reason}")]
    Publish {
        channel: String,
        size: usize,
        reason: String,
    },

    /// Waiting for the next notification failed
    #[error("Failed to receive notification: {0}")]
    Receive(String),

    /// Payload exceeds what the transport accepts in a single notification
    #[error("Payload of {size} bytes exceeds transport limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Channel or subscription already shut down
    #[error("Transport closed")]
    Closed,

    /// Background listener task panicked or was aborted
    #[error("Listener task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),

    /// Listener did not stop within the configured shutdown timeout
    #[error("Listener did not stop within {0:?}")]
    ShutdownTimeout(std::time::Duration),
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The shared encoder/decoder could not be initialized
    #[error("Codec unavailable: {0}")]
    Unavailable(String),

    /// Input is not a valid deflate stream
    #[error("Corrupt compressed payload: {0}")]
    Corrupt(String),

    /// Inflated output exceeds the configured ceiling
    #[error("Decompressed payload exceeds {limit} bytes")]
    TooLarge { limit: usize },

    /// Text wrapping of the compressed bytes is invalid
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Payload is not a JSON message object
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// Method name not recognized by this replica
    #[error("Unknown update type: {0}")]
    UnknownOperation(String),

    /// A field required by the method is absent
    #[error("{method} message is missing required field `{field}`")]
    MissingField {
        method: &'static str,
        field: &'static str,
    },

    /// Compressed flag and payload disagree, or old/new rule lists are unpaired
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// The local policy model rejected the mutation
    #[error("Policy model error: {0}")]
    Model(String),

    /// Reloading from the backing store failed
    #[error("Policy reload failed: {0}")]
    Reload(String),
}

