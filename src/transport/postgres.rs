use async_trait::async_trait;
use sqlx::postgres::PgListener;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::NotificationTransport;
use super::Subscription;
use crate::ConnectionConfig;
use crate::TransportError;

/// `NOTIFY` through the shared pool, `LISTEN` on a dedicated connection per
/// subscription.
#[derive(Clone, Debug)]
pub struct PgTransport {
    pool: PgPool,
}

impl PgTransport {
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, TransportError> {
        // Avoid logging `config.url`, it may contain credentials.
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout())
            .connect(&config.url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        info!(max_connections = config.max_connections, "connected to policy store");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Pool shared with callers that also need the backing store, e.g. the
    /// policy loader used for full reloads.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl NotificationTransport for PgTransport {
    async fn publish(
        &self,
        channel: &str,
        payload: &str,
    ) -> Result<(), TransportError> {
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(channel)
            .bind(payload)
            .execute(&self.pool)
            .await
            .map_err(|e| TransportError::Publish {
                channel: channel.to_string(),
                size: payload.len(),
                reason: e.to_string(),
            })?;

        debug!(channel, size = payload.len(), "pg_notify sent");
        Ok(())
    }

    async fn subscribe(
        &self,
        channel: &str,
    ) -> Result<Box<dyn Subscription>, TransportError> {
        let subscribe_err = |e: sqlx::Error| TransportError::Subscribe {
            channel: channel.to_string(),
            reason: e.to_string(),
        };

        let mut listener = PgListener::connect_with(&self.pool).await.map_err(subscribe_err)?;
        listener.listen(channel).await.map_err(subscribe_err)?;

        info!(channel, "listening for policy notifications");
        Ok(Box::new(PgSubscription { listener }))
    }
}

pub struct PgSubscription {
    listener: PgListener,
}

#[async_trait]
impl Subscription for PgSubscription {
    async fn recv(&mut self) -> Result<String, TransportError> {
        let next = self
            .listener
            .try_recv()
            .await
            .map_err(|e| TransportError::Receive(e.to_string()))?;
        payload_or_lost(next.map(|n| n.payload().to_string()))
    }
}

/// `PgListener` reports a dropped connection as `None` and reconnects on the
/// next call, losing whatever was sent in between. The gap is not repairable
/// from here, so it ends the subscription.
pub(crate) fn payload_or_lost(next: Option<String>) -> Result<String, TransportError> {
    next.ok_or_else(|| {
        warn!("LISTEN connection lost, notifications sent meanwhile are gone");
        TransportError::Receive("listen connection lost".into())
    })
}
