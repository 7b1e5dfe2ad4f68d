use std::fmt;

use crate::UpdateType;

/// How a message ended up on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendTier {
    /// Serialized message sent verbatim
    Raw,
    /// Compressed envelope sent
    Compressed,
    /// Too large to try compressing, full reload sent instead
    ShortCircuit,
    /// Compression unavailable or insufficient, full reload sent instead
    Fallback,
}

impl SendTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendTier::Raw => "raw",
            SendTier::Compressed => "compressed",
            SendTier::ShortCircuit => "short_circuit",
            SendTier::Fallback => "fallback",
        }
    }

    /// Whether receivers will reload instead of replaying the diff.
    pub fn is_reload(&self) -> bool {
        matches!(self, SendTier::ShortCircuit | SendTier::Fallback)
    }
}

impl fmt::Display for SendTier {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    pub tier: SendTier,
    /// Method of the message the caller asked to send
    pub method: UpdateType,
    /// Serialized size of that message
    pub raw_bytes: usize,
    /// Size of what was actually published
    pub sent_bytes: usize,
}

impl SendReport {
    pub(crate) fn new(
        tier: SendTier,
        method: UpdateType,
        raw_bytes: usize,
        sent_bytes: usize,
    ) -> Self {
        Self {
            tier,
            method,
            raw_bytes,
            sent_bytes,
        }
    }
}
