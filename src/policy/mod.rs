//! The local authorization model the watcher keeps in sync.
//!
//! [`PolicyModel`] is the narrow capability the diff applier needs from a
//! policy engine. [`MemoryPolicy`] is a complete in-memory implementation,
//! reloadable from any [`PolicyLoader`] such as [`PgPolicyLoader`].
mod memory;
mod postgres;
pub use memory::*;
pub use postgres::*;


use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::ApplyError;
use crate::Rule;

/// Mutations a replica can replay from a remote diff.
///
/// Every mutation returns `Ok(false)` when it changed nothing, e.g. adding a
/// rule that is already present.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PolicyModel: Send + Sync + 'static {
    async fn add_rules(
        &self,
        sec: &str,
        ptype: &str,
        rules: &[Rule],
    ) -> Result<bool, ApplyError>;

    async fn remove_rules(
        &self,
        sec: &str,
        ptype: &str,
        rules: &[Rule],
    ) -> Result<bool, ApplyError>;

    /// Removes every rule whose fields starting at `field_index` match
    /// `field_values`. An empty value matches anything.
    async fn remove_filtered_rules(
        &self,
        sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: &[String],
    ) -> Result<bool, ApplyError>;

    /// Replaces `old_rules[i]` with `new_rules[i]` pairwise.
    async fn update_rules(
        &self,
        sec: &str,
        ptype: &str,
        old_rules: &[Rule],
        new_rules: &[Rule],
    ) -> Result<bool, ApplyError>;

    /// Discards local state and reloads everything from the backing store.
    async fn reload(&self) -> Result<(), ApplyError>;
}

/// One stored rule as persisted by the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyLine {
    /// e.g. `p`, `g`, `g2`
    pub ptype: String,
    pub rule: Rule,
}

impl PolicyLine {
    pub fn new(
        ptype: impl Into<String>,
        rule: Rule,
    ) -> Self {
        Self {
            ptype: ptype.into(),
            rule,
        }
    }

    /// Section the rule belongs to, derived from the first character of its
    /// policy type.
    pub fn sec(&self) -> &str {
        self.ptype.get(..1).unwrap_or_default()
    }
}

/// Source of truth a replica reloads from.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PolicyLoader: Send + Sync + 'static {
    async fn load_rules(&self) -> Result<Vec<PolicyLine>, ApplyError>;
}
