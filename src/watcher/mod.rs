//! Public façade tying the publisher and listener to one channel.
//!
//! A [`Watcher`] owns a unique local identity, one subscription served by a
//! background listener task, and a publisher. The host policy engine calls
//! the `update_*` methods after each local mutation and installs a callback
//! (usually a [`crate::DiffApplier`]) to replay remote ones.

use std::sync::Arc;

use nanoid::nanoid;
use parking_lot::Mutex;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;

use crate::codec::DeflateCodec;
use crate::codec::PayloadCodec;
use crate::constants::LOCAL_ID_LEN;
use crate::CallbackSlot;
use crate::Listener;
use crate::ListenerStats;
use crate::Message;
use crate::NotificationTransport;
use crate::PgTransport;
use crate::Publisher;
use crate::Result;
use crate::Rule;
use crate::SendReport;
use crate::StatsSnapshot;
use crate::TransportError;
use crate::UpdateCallback;
use crate::WatcherConfig;

pub struct Watcher {
    config: WatcherConfig,
    local_id: String,
    publisher: Publisher,
    callback: CallbackSlot,
    stats: Arc<ListenerStats>,
    token: CancellationToken,
    listener: Mutex<Option<JoinHandle<std::result::Result<(), TransportError>>>>,
}

impl Watcher {
    /// Connects to PostgreSQL and starts listening on the configured channel.
    pub async fn connect(config: WatcherConfig) -> Result<Self> {
        let transport = PgTransport::connect(&config.connection).await?;
        Self::new(config, Arc::new(transport)).await
    }

    /// Starts a watcher over an existing transport. Fails if the
    /// configuration is invalid or the channel cannot be subscribed.
    pub async fn new(
        config: WatcherConfig,
        transport: Arc<dyn NotificationTransport>,
    ) -> Result<Self> {
        let codec = DeflateCodec::for_config(config.codec);
        Self::new_with_codec(config, transport, codec).await
    }

    pub async fn new_with_codec(
        config: WatcherConfig,
        transport: Arc<dyn NotificationTransport>,
        codec: Arc<dyn PayloadCodec>,
    ) -> Result<Self> {
        let config = config.validate()?;
        let local_id = nanoid!(LOCAL_ID_LEN);

        // Subscribe before returning so no update published afterwards is missed.
        let subscription = transport.subscribe(&config.channel.name).await?;

        let callback: CallbackSlot = Arc::new(RwLock::new(None));
        let stats = Arc::new(ListenerStats::default());
        let token = CancellationToken::new();

        let listener = Listener::new(
            local_id.clone(),
            config.channel.clone(),
            codec.clone(),
            callback.clone(),
            stats.clone(),
        );
        let handle = tokio::spawn(listener.run(subscription, token.clone()));

        let publisher = Publisher::new(
            local_id.clone(),
            config.channel.name.clone(),
            config.limits,
            config.channel.verbose,
            codec,
            transport,
        );

        info!(channel = %config.channel.name, %local_id, "policy watcher started");

        Ok(Self {
            config,
            local_id,
            publisher,
            callback,
            stats,
            token,
            listener: Mutex::new(Some(handle)),
        })
    }

    /// Installs the callback receiving remote updates, replacing any previous
    /// one. Notifications arriving before a callback is set are dropped.
    pub fn set_update_callback(
        &self,
        callback: UpdateCallback,
    ) {
        *self.callback.write() = Some(callback);
    }

    /// Identity stamped on every message this watcher sends.
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Asks every replica to reload its whole policy.
    pub async fn update(&self) -> Result<SendReport> {
        self.send(Message::full_reload(&self.local_id)).await
    }

    pub async fn update_for_add_policy(
        &self,
        sec: &str,
        ptype: &str,
        rule: Rule,
    ) -> Result<SendReport> {
        self.send(Message::add_one(&self.local_id, sec, ptype, rule)).await
    }

    pub async fn update_for_remove_policy(
        &self,
        sec: &str,
        ptype: &str,
        rule: Rule,
    ) -> Result<SendReport> {
        self.send(Message::remove_one(&self.local_id, sec, ptype, rule)).await
    }

    pub async fn update_for_remove_filtered_policy(
        &self,
        sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: Vec<String>,
    ) -> Result<SendReport> {
        let message =
            Message::remove_filtered(&self.local_id, sec, ptype, field_index, field_values)?;
        self.send(message).await
    }

    pub async fn update_for_add_policies(
        &self,
        sec: &str,
        ptype: &str,
        rules: Vec<Rule>,
    ) -> Result<SendReport> {
        self.send(Message::add_many(&self.local_id, sec, ptype, rules)?).await
    }

    pub async fn update_for_remove_policies(
        &self,
        sec: &str,
        ptype: &str,
        rules: Vec<Rule>,
    ) -> Result<SendReport> {
        self.send(Message::remove_many(&self.local_id, sec, ptype, rules)?).await
    }

    pub async fn update_for_update_policy(
        &self,
        sec: &str,
        ptype: &str,
        old_rule: Rule,
        new_rule: Rule,
    ) -> Result<SendReport> {
        self.send(Message::update_one(&self.local_id, sec, ptype, old_rule, new_rule))
            .await
    }

    /// Fails without sending when the rule lists differ in length.
    pub async fn update_for_update_policies(
        &self,
        sec: &str,
        ptype: &str,
        old_rules: Vec<Rule>,
        new_rules: Vec<Rule>,
    ) -> Result<SendReport> {
        let message = Message::update_many(&self.local_id, sec, ptype, old_rules, new_rules)?;
        self.send(message).await
    }

    pub async fn update_for_save_policy(&self) -> Result<SendReport> {
        self.send(Message::save_all(&self.local_id)).await
    }

    pub async fn update_for_load_policy(&self) -> Result<SendReport> {
        self.send(Message::load_all(&self.local_id)).await
    }

    async fn send(
        &self,
        message: Message,
    ) -> Result<SendReport> {
        if self.token.is_cancelled() {
            return Err(TransportError::Closed.into());
        }
        self.publisher.publish(&message).await
    }

    /// Stops the listener and waits for it, at most `shutdown_timeout_ms`.
    ///
    /// Returns the error that ended the listener, if it failed before being
    /// cancelled. Calling `close` again is a no-op.
    pub async fn close(&self) -> std::result::Result<(), TransportError> {
        self.token.cancel();

        let Some(mut handle) = self.listener.lock().take() else {
            return Ok(());
        };

        let timeout = self.config.shutdown_timeout();
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(result)) => {
                info!(channel = %self.config.channel.name, "policy watcher closed");
                result
            }
            Ok(Err(e)) => Err(TransportError::TaskFailed(e)),
            Err(_) => {
                warn!(?timeout, "listener did not stop in time, aborting");
                handle.abort();
                Err(TransportError::ShutdownTimeout(timeout))
            }
        }
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
