//! Size-tiered send path.
//!
//! A serialized message is sent the cheapest way the transport accepts:
//!
//! ```text
//!   raw < send_limit ───────────────────────────────▶ Raw
//!   raw > short_circuit ────────────────────────────▶ ShortCircuit (FullReload)
//!   otherwise ── deflate + base64 ──┬─ envelope < send_limit ─▶ Compressed
//!                                   ├─ envelope too big ──────▶ Fallback (FullReload)
//!                                   └─ codec unavailable ─────▶ Fallback (FullReload)
//! ```
//!
//! The mutation is never dropped silently: when a diff cannot be shipped, the
//! other replicas are told to reload everything instead.
mod send_report;
pub use send_report::*;


use std::sync::Arc;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::codec::encode_text;
use crate::codec::PayloadCodec;
use crate::metrics::NOTIFICATIONS_SENT;
use crate::metrics::PAYLOAD_SIZE_IN_BYTES;
use crate::metrics::PUBLISH_FAILURES;
use crate::Message;
use crate::NotificationTransport;
use crate::PayloadLimits;
use crate::Result;

pub struct Publisher {
    local_id: String,
    channel: String,
    limits: PayloadLimits,
    verbose: bool,
    codec: Arc<dyn PayloadCodec>,
    transport: Arc<dyn NotificationTransport>,
}

impl Publisher {
    pub fn new(
        local_id: String,
        channel: String,
        limits: PayloadLimits,
        verbose: bool,
        codec: Arc<dyn PayloadCodec>,
        transport: Arc<dyn NotificationTransport>,
    ) -> Self {
        Self {
            local_id,
            channel,
            limits,
            verbose,
            codec,
            transport,
        }
    }

    /// Picks a tier for `message` and publishes it.
    ///
    /// Transport failures are returned to the caller. The local mutation has
    /// already been applied, so a failure only leaves other replicas stale
    /// until their next full reload.
    pub async fn publish(
        &self,
        message: &Message,
    ) -> Result<SendReport> {
        let (payload, report) = self.prepare(message).await?;

        if let Err(e) = self.transport.publish(&self.channel, &payload).await {
            PUBLISH_FAILURES.with_label_values(&[message.method.as_str()]).inc();
            warn!(
                method = %message.method,
                tier = %report.tier,
                size = report.sent_bytes,
                "failed to publish policy update: {}", e
            );
            return Err(e.into());
        }

        NOTIFICATIONS_SENT.with_label_values(&[report.tier.as_str()]).inc();
        PAYLOAD_SIZE_IN_BYTES
            .with_label_values(&[report.tier.as_str()])
            .observe(report.sent_bytes as f64);

        if self.verbose {
            info!(
                method = %message.method,
                tier = %report.tier,
                raw_bytes = report.raw_bytes,
                sent_bytes = report.sent_bytes,
                channel = %self.channel,
                "sent policy update"
            );
        }
        Ok(report)
    }

    /// Serializes `message` and selects the payload actually sent.
    pub async fn prepare(
        &self,
        message: &Message,
    ) -> Result<(String, SendReport)> {
        let raw = message.encode()?;
        let raw_bytes = raw.len();
        let send_limit = self.limits.send_limit_bytes;

        if raw_bytes < send_limit {
            return Ok((raw, SendReport::new(SendTier::Raw, message.method, raw_bytes, raw_bytes)));
        }

        if raw_bytes > self.limits.effective_short_circuit_bytes() {
            debug!(
                method = %message.method,
                raw_bytes,
                "update too large to compress under the limit, requesting full reload"
            );
            return self.full_reload(message, raw_bytes, SendTier::ShortCircuit);
        }

        // Deflate at best level is CPU bound; keep it off the async workers.
        let codec = self.codec.clone();
        let compressed = tokio::task::spawn_blocking(move || codec.compress(raw.as_bytes())).await;

        let bytes = match compressed {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                warn!(method = %message.method, raw_bytes, "compression failed, requesting full reload: {}", e);
                return self.full_reload(message, raw_bytes, SendTier::Fallback);
            }
            Err(e) => {
                warn!(method = %message.method, raw_bytes, "compression task failed, requesting full reload: {}", e);
                return self.full_reload(message, raw_bytes, SendTier::Fallback);
            }
        };

        let envelope = Message::compressed_envelope(message, encode_text(&bytes)).encode()?;
        if envelope.len() < send_limit {
            let sent_bytes = envelope.len();
            return Ok((
                envelope,
                SendReport::new(SendTier::Compressed, message.method, raw_bytes, sent_bytes),
            ));
        }

        debug!(
            method = %message.method,
            raw_bytes,
            compressed_bytes = envelope.len(),
            "compressed update still over the limit, requesting full reload"
        );
        self.full_reload(message, raw_bytes, SendTier::Fallback)
    }

    fn full_reload(
        &self,
        original: &Message,
        raw_bytes: usize,
        tier: SendTier,
    ) -> Result<(String, SendReport)> {
        let payload = Message::full_reload(&self.local_id).encode()?;
        let sent_bytes = payload.len();
        Ok((payload, SendReport::new(tier, original.method, raw_bytes, sent_bytes)))
    }
}
