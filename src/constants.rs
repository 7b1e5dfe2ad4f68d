// -
// Wire limits

/// PostgreSQL rejects NOTIFY payloads of 8000 bytes or more.
pub const DEFAULT_SEND_LIMIT_BYTES: usize = 8000;

/// Best-case deflate ratio observed on serialized rule sets.
pub const DEFAULT_ASSUMED_COMPRESSION_RATIO: f64 = 0.05;

/// Above this size compression cannot get under the send limit, even at the
/// assumed ratio.
pub const DEFAULT_SHORT_CIRCUIT_BYTES: usize = 160_000;

/// Ceiling for an inflated payload on the receive side.
pub const DEFAULT_MAX_DECOMPRESSED_BYTES: usize = 16 * 1024 * 1024;

// -
// Channel

/// Channel name shared with the Go replicas.
pub const DEFAULT_CHANNEL: &str = "casbin_channel";

/// PostgreSQL identifiers are truncated past 63 bytes.
pub const MAX_CHANNEL_NAME_LEN: usize = 63;

/// Length of the per-process identity generated at watcher construction.
pub const LOCAL_ID_LEN: usize = 21;
