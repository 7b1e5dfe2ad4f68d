//! Publish/subscribe channel the replicas share.
//!
//! Production deployments use PostgreSQL `LISTEN`/`NOTIFY` ([`PgTransport`]):
//! every replica already talks to the policy database, so the channel costs no
//! extra infrastructure. Each notification carries one text payload, which is
//! where the 8000-byte send limit comes from.
//!
//! [`MemoryTransport`] is an in-process bus with the same contract, used by
//! tests and by single-process setups running several enforcers.
mod memory;
mod postgres;
pub use memory::*;
pub use postgres::*;


use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::TransportError;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait NotificationTransport: Send + Sync + 'static {
    /// Sends one notification to every subscriber of `channel`, the sender
    /// included.
    async fn publish(
        &self,
        channel: &str,
        payload: &str,
    ) -> Result<(), TransportError>;

    /// Opens a dedicated subscription. Only notifications published after
    /// this returns are guaranteed to be delivered.
    async fn subscribe(
        &self,
        channel: &str,
    ) -> Result<Box<dyn Subscription>, TransportError>;
}

#[async_trait]
pub trait Subscription: Send + 'static {
    /// Waits for the next notification payload.
    ///
    /// Cancel-safe: dropping the returned future loses no notification.
    /// An error means the subscription is unusable.
    async fn recv(&mut self) -> Result<String, TransportError>;
}
