//! # policy-watcher
//!
//! Keeps replicated Casbin-style authorization models in sync over
//! PostgreSQL `LISTEN`/`NOTIFY`.
//!
//! Each replica runs a [`Watcher`]. After mutating its local policy it
//! announces the change with one of the `update_*` methods; every other
//! replica receives it and replays it through a [`DiffApplier`] against its
//! own [`PolicyModel`]. Announcements too large for a single notification are
//! compressed, or degraded to a full reload request when even that does not
//! fit.
//!
//! ```ignore
//! let config = WatcherConfig::new()?.validate()?;
//! let transport = PgTransport::connect(&config.connection).await?;
//! let loader = PgPolicyLoader::new(transport.pool().clone());
//!
//! let policy = Arc::new(MemoryPolicy::with_loader(Arc::new(loader)));
//! policy.reload().await?;
//! let watcher = Watcher::new(config, Arc::new(transport)).await?;
//! watcher.set_update_callback(DiffApplier::new(policy.clone()).into_callback());
//!
//! policy.add_rules("p", "p", &[rule.clone()]).await?;
//! watcher.update_for_add_policy("p", "p", rule).await?;
//! ```

mod applier;
pub mod codec;
mod config;
pub mod constants;
mod errors;
mod listener;
mod message;
pub mod metrics;
mod policy;
mod publisher;
mod transport;
mod watcher;

pub use applier::*;
pub use config::*;
pub use errors::*;
pub use listener::*;
pub use message::*;
pub use policy::*;
pub use publisher::*;
pub use transport::*;
pub use watcher::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
