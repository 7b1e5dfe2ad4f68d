use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::warn;

use super::NotificationTransport;
use super::Subscription;
use crate::constants::DEFAULT_SEND_LIMIT_BYTES;
use crate::TransportError;

const BUS_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
enum Frame {
    Notify { channel: String, payload: String },
    Sever,
}

/// In-process broadcast bus mirroring PostgreSQL NOTIFY semantics: per
/// channel fan-out, sender receives its own notifications, payloads at or over
/// the limit are refused.
#[derive(Clone)]
pub struct MemoryTransport {
    inner: Arc<MemoryTransportInner>,
}

struct MemoryTransportInner {
    tx: broadcast::Sender<Frame>,
    payload_limit: usize,
    refuse_publish: AtomicBool,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::with_payload_limit(DEFAULT_SEND_LIMIT_BYTES)
    }

    pub fn with_payload_limit(payload_limit: usize) -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            inner: Arc::new(MemoryTransportInner {
                tx,
                payload_limit,
                refuse_publish: AtomicBool::new(false),
            }),
        }
    }

    /// Simulates an unreachable backing store for publishers.
    pub fn refuse_publish(
        &self,
        refuse: bool,
    ) {
        self.inner.refuse_publish.store(refuse, Ordering::SeqCst);
    }

    /// Simulates a lost connection: every live subscription fails on its
    /// next receive.
    pub fn sever_subscriptions(&self) {
        let _ = self.inner.tx.send(Frame::Sever);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.tx.receiver_count()
    }
}

#[async_trait]
impl NotificationTransport for MemoryTransport {
    async fn publish(
        &self,
        channel: &str,
        payload: &str,
    ) -> Result<(), TransportError> {
        if self.inner.refuse_publish.load(Ordering::SeqCst) {
            return Err(TransportError::Publish {
                channel: channel.to_string(),
                size: payload.len(),
                reason: "publishing disabled".into(),
            });
        }

        if payload.len() >= self.inner.payload_limit {
            return Err(TransportError::PayloadTooLarge {
                size: payload.len(),
                limit: self.inner.payload_limit,
            });
        }

        // No receivers is not an error, NOTIFY on an idle channel succeeds too.
        let _ = self.inner.tx.send(Frame::Notify {
            channel: channel.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }

    async fn subscribe(
        &self,
        channel: &str,
    ) -> Result<Box<dyn Subscription>, TransportError> {
        Ok(Box::new(MemorySubscription {
            channel: channel.to_string(),
            rx: self.inner.tx.subscribe(),
        }))
    }
}

pub struct MemorySubscription {
    channel: String,
    rx: broadcast::Receiver<Frame>,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn recv(&mut self) -> Result<String, TransportError> {
        loop {
            match self.rx.recv().await {
                Ok(Frame::Notify { channel, payload }) if channel == self.channel => {
                    return Ok(payload);
                }
                Ok(Frame::Notify { .. }) => continue,
                Ok(Frame::Sever) => {
                    return Err(TransportError::Receive("connection severed".into()));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, channel = %self.channel, "subscriber lagged, notifications lost");
                }
                Err(broadcast::error::RecvError::Closed) => return Err(TransportError::Closed),
            }
        }
    }
}
