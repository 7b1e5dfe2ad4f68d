//! Replays remote diffs against the local policy model.
#[cfg(test)]
mod applier_test;

use std::sync::Arc;

use futures::FutureExt;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::metrics::APPLY_RESULTS;
use crate::ApplyError;
use crate::Message;
use crate::PolicyModel;
use crate::UpdateCallback;
use crate::UpdateType;

pub struct DiffApplier<M: PolicyModel + ?Sized> {
    model: Arc<M>,
}

impl<M: PolicyModel + ?Sized> Clone for DiffApplier<M> {
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
        }
    }
}

impl<M: PolicyModel + ?Sized> DiffApplier<M> {
    pub fn new(model: Arc<M>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &Arc<M> {
        &self.model
    }

    /// Replays one direct message. `Ok(false)` means the model was already in
    /// the target state.
    pub async fn apply(
        &self,
        message: &Message,
    ) -> Result<bool, ApplyError> {
        if message.compressed {
            return Err(ApplyError::Model(
                "compressed envelope must be inflated before applying".into(),
            ));
        }

        let (sec, ptype) = (message.sec.as_str(), message.ptype.as_str());
        match message.method {
            UpdateType::FullReload | UpdateType::SaveAll | UpdateType::LoadAll => {
                self.model.reload().await?;
                Ok(true)
            }
            UpdateType::AddOne | UpdateType::AddMany => {
                self.model.add_rules(sec, ptype, &message.new_rules).await
            }
            UpdateType::RemoveOne | UpdateType::RemoveMany => {
                self.model.remove_rules(sec, ptype, &message.new_rules).await
            }
            UpdateType::UpdateOne | UpdateType::UpdateMany => {
                self.model
                    .update_rules(sec, ptype, &message.old_rules, &message.new_rules)
                    .await
            }
            UpdateType::RemoveFiltered => {
                self.model
                    .remove_filtered_rules(
                        sec,
                        ptype,
                        message.field_index.unwrap_or_default(),
                        &message.field_values,
                    )
                    .await
            }
        }
    }

    /// Decodes and applies a raw notification. Failures are logged, never
    /// returned: the next full reload repairs whatever was missed.
    pub async fn handle(
        &self,
        raw: &str,
    ) {
        let message = match Message::decode(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!("ignoring undecodable policy update: {}: {}", e, raw);
                return;
            }
        };

        let method = message.method.as_str();
        match self.apply(&message).await {
            Ok(true) => {
                APPLY_RESULTS.with_label_values(&[method, "applied"]).inc();
                if message.method.is_reload() {
                    info!(method, sender = %message.id, "reloaded policy");
                } else {
                    debug!(method, sender = %message.id, rules = message.rule_count(), "applied policy update");
                }
            }
            Ok(false) => {
                APPLY_RESULTS.with_label_values(&[method, "no_effect"]).inc();
                info!(method, sender = %message.id, "policy update had no effect: {}", raw);
            }
            Err(e) => {
                APPLY_RESULTS.with_label_values(&[method, "failed"]).inc();
                error!(method, sender = %message.id, "failed to apply policy update: {}: {}", e, raw);
            }
        }
    }

    /// Callback to install with `Watcher::set_update_callback`.
    pub fn into_callback(self) -> UpdateCallback {
        let applier = Arc::new(self);
        Arc::new(move |raw: String| {
            let applier = applier.clone();
            async move { applier.handle(&raw).await }.boxed()
        })
    }
}
