//! Receive side: one subscription, one loop, one callback.
//!
//! ```text
//! subscription.recv() ─▶ decode ─▶ compressed? ─▶ base64 + inflate ─▶ decode inner
//!                                      │
//!                                      ▼
//!                       own id and !notify_self? ── yes ─▶ skip
//!                                      │ no
//!                                      ▼
//!                            callback(raw inner message)
//! ```
//!
//! A bad notification costs exactly one warning and is dropped; the loop only
//! ends on cancellation (clean, `Ok`) or when the subscription itself fails
//! (`Err`, surfaced through `Watcher::close`).
mod stats;
pub use stats::*;


use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::codec::decode_text;
use crate::codec::PayloadCodec;
use crate::metrics::NOTIFICATIONS_DROPPED;
use crate::metrics::NOTIFICATIONS_RECEIVED;
use crate::ChannelConfig;
use crate::Error;
use crate::Message;
use crate::ProtocolError;
use crate::Subscription;
use crate::TransportError;

/// Receives the raw JSON of each remote update. Installed by the policy
/// engine, typically [`crate::DiffApplier::into_callback`].
pub type UpdateCallback = Arc<dyn Fn(String) -> BoxFuture<'static, ()> + Send + Sync>;

pub(crate) type CallbackSlot = Arc<RwLock<Option<UpdateCallback>>>;

/// What happened to one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Dispatched,
    /// Sent by this replica and `notify_self` is off
    Filtered,
    /// Decoded fine but nobody is listening yet
    NoCallback,
    Dropped,
}

impl Delivery {
    fn as_str(&self) -> &'static str {
        match self {
            Delivery::Dispatched => "dispatched",
            Delivery::Filtered => "filtered",
            Delivery::NoCallback => "no_callback",
            Delivery::Dropped => "dropped",
        }
    }
}

pub struct Listener {
    local_id: String,
    channel: ChannelConfig,
    codec: Arc<dyn PayloadCodec>,
    callback: CallbackSlot,
    stats: Arc<ListenerStats>,
}

impl Listener {
    pub(crate) fn new(
        local_id: String,
        channel: ChannelConfig,
        codec: Arc<dyn PayloadCodec>,
        callback: CallbackSlot,
        stats: Arc<ListenerStats>,
    ) -> Self {
        Self {
            local_id,
            channel,
            codec,
            callback,
            stats,
        }
    }

    /// Runs until `token` is cancelled or the subscription fails.
    pub async fn run(
        self,
        mut subscription: Box<dyn Subscription>,
        token: CancellationToken,
    ) -> Result<(), TransportError> {
        debug!(channel = %self.channel.name, local_id = %self.local_id, "listener started");

        loop {
            let raw = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    info!(channel = %self.channel.name, "listener stopped");
                    return Ok(());
                }
                next = subscription.recv() => match next {
                    Ok(raw) => raw,
                    Err(e) => {
                        error!(channel = %self.channel.name, "listener failed: {}", e);
                        return Err(e);
                    }
                },
            };

            self.handle(&raw).await;
        }
    }

    /// Decodes, filters and dispatches a single notification.
    pub async fn handle(
        &self,
        raw: &str,
    ) -> Delivery {
        self.stats.record_received();
        if self.channel.verbose {
            info!(
                channel = %self.channel.name,
                local_id = %self.local_id,
                size = raw.len(),
                "received notification: {}", preview(raw)
            );
        }

        let delivery = self.deliver(raw).await;
        NOTIFICATIONS_RECEIVED.with_label_values(&[delivery.as_str()]).inc();
        delivery
    }

    async fn deliver(
        &self,
        raw: &str,
    ) -> Delivery {
        let (message, wire) = match self.unwrap(raw) {
            Ok(decoded) => decoded,
            Err(e) => {
                NOTIFICATIONS_DROPPED.with_label_values(&[drop_reason(&e)]).inc();
                self.stats.record_dropped();
                warn!(size = raw.len(), "dropping malformed notification: {}: {}", e, preview(raw));
                return Delivery::Dropped;
            }
        };

        if message.id == self.local_id && !self.channel.notify_self {
            self.stats.record_filtered();
            return Delivery::Filtered;
        }

        // Clone out of the lock so a slow callback never blocks registration.
        let callback = self.callback.read().clone();
        let Some(callback) = callback else {
            debug!(method = %message.method, "no update callback registered, dropping notification");
            self.stats.record_dropped();
            return Delivery::NoCallback;
        };

        if AssertUnwindSafe(callback(wire)).catch_unwind().await.is_err() {
            NOTIFICATIONS_DROPPED.with_label_values(&["callback_panic"]).inc();
            self.stats.record_dropped();
            error!(method = %message.method, sender = %message.id, "update callback panicked");
            return Delivery::Dropped;
        }

        self.stats.record_dispatched();
        Delivery::Dispatched
    }

    /// Returns the direct message and its raw JSON, inflating compressed envelopes.
    fn unwrap(
        &self,
        raw: &str,
    ) -> Result<(Message, String), Error> {
        let outer = Message::decode(raw)?;
        if !outer.compressed {
            return Ok((outer, raw.to_string()));
        }

        let text = outer.payload.as_deref().unwrap_or_default();
        let bytes = self.codec.decompress(&decode_text(text)?)?;
        let inner = Message::decode_slice(&bytes)?;

        if inner.compressed {
            return Err(ProtocolError::InvalidEnvelope("nested compressed envelope".into()).into());
        }
        if inner.method != outer.method || inner.id != outer.id {
            return Err(ProtocolError::InvalidEnvelope(format!(
                "envelope {}/{} wraps {}/{}",
                outer.method, outer.id, inner.method, inner.id
            ))
            .into());
        }

        let wire = String::from_utf8(bytes).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        Ok((inner, wire))
    }
}

fn drop_reason(e: &Error) -> &'static str {
    match e {
        Error::Codec(_) => "codec",
        _ => "protocol",
    }
}

fn preview(raw: &str) -> String {
    const MAX: usize = 256;
    if raw.len() <= MAX {
        return raw.to_string();
    }
    let mut cut = MAX;
    while !raw.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}... ({} bytes)", &raw[..cut], raw.len())
}
