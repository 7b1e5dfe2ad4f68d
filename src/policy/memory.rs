use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::PolicyLine;
use super::PolicyLoader;
use super::PolicyModel;
use crate::ApplyError;
use crate::Rule;

type RuleKey = (String, String);

/// In-memory rule store keyed by `(sec, ptype)`.
///
/// Rules keep insertion order within a key and are never duplicated, so
/// replaying the same diff twice is harmless.
#[derive(Default)]
pub struct MemoryPolicy {
    rules: RwLock<BTreeMap<RuleKey, Vec<Rule>>>,
    loader: Option<Arc<dyn PolicyLoader>>,
}

impl MemoryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loader(loader: Arc<dyn PolicyLoader>) -> Self {
        Self {
            rules: RwLock::new(BTreeMap::new()),
            loader: Some(loader),
        }
    }

    pub fn rules(
        &self,
        sec: &str,
        ptype: &str,
    ) -> Vec<Rule> {
        self.rules
            .read()
            .get(&key(sec, ptype))
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_rule(
        &self,
        sec: &str,
        ptype: &str,
        rule: &[String],
    ) -> bool {
        self.rules
            .read()
            .get(&key(sec, ptype))
            .is_some_and(|rules| rules.iter().any(|r| r.as_slice() == rule))
    }

    /// Total number of rules across every section and policy type.
    pub fn len(&self) -> usize {
        self.rules.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces the whole rule set.
    pub fn replace_all(
        &self,
        lines: Vec<PolicyLine>,
    ) {
        let mut rules: BTreeMap<RuleKey, Vec<Rule>> = BTreeMap::new();
        for line in lines {
            let bucket = rules.entry(key(line.sec(), &line.ptype)).or_default();
            if !bucket.contains(&line.rule) {
                bucket.push(line.rule);
            }
        }
        *self.rules.write() = rules;
    }

    /// Every stored rule, ordered by section and policy type.
    pub fn lines(&self) -> Vec<PolicyLine> {
        self.rules
            .read()
            .iter()
            .flat_map(|((_, ptype), rules)| {
                rules.iter().map(move |rule| PolicyLine::new(ptype.clone(), rule.clone()))
            })
            .collect()
    }
}

#[async_trait]
impl PolicyModel for MemoryPolicy {
    async fn add_rules(
        &self,
        sec: &str,
        ptype: &str,
        rules: &[Rule],
    ) -> Result<bool, ApplyError> {
        let mut guard = self.rules.write();
        let bucket = guard.entry(key(sec, ptype)).or_default();

        let mut changed = false;
        for rule in rules {
            if !bucket.contains(rule) {
                bucket.push(rule.clone());
                changed = true;
            }
        }
        Ok(changed)
    }

    async fn remove_rules(
        &self,
        sec: &str,
        ptype: &str,
        rules: &[Rule],
    ) -> Result<bool, ApplyError> {
        let mut guard = self.rules.write();
        let Some(bucket) = guard.get_mut(&key(sec, ptype)) else {
            return Ok(false);
        };

        let before = bucket.len();
        bucket.retain(|r| !rules.contains(r));
        Ok(bucket.len() != before)
    }

    async fn remove_filtered_rules(
        &self,
        sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: &[String],
    ) -> Result<bool, ApplyError> {
        if field_values.iter().all(String::is_empty) {
            return Err(ApplyError::Model(
                "filtered removal needs at least one non-empty field value".into(),
            ));
        }

        let mut guard = self.rules.write();
        let Some(bucket) = guard.get_mut(&key(sec, ptype)) else {
            return Ok(false);
        };

        let before = bucket.len();
        bucket.retain(|r| !matches_filter(r, field_index, field_values));
        Ok(bucket.len() != before)
    }

    async fn update_rules(
        &self,
        sec: &str,
        ptype: &str,
        old_rules: &[Rule],
        new_rules: &[Rule],
    ) -> Result<bool, ApplyError> {
        if old_rules.len() != new_rules.len() {
            return Err(ApplyError::Model(format!(
                "cannot pair {} old rules with {} new rules",
                old_rules.len(),
                new_rules.len()
            )));
        }

        let mut guard = self.rules.write();
        let Some(bucket) = guard.get_mut(&key(sec, ptype)) else {
            return Ok(false);
        };

        let mut changed = false;
        for (old, new) in old_rules.iter().zip(new_rules) {
            if old == new {
                continue;
            }
            let Some(pos) = bucket.iter().position(|r| r == old) else {
                continue;
            };
            // The sender no longer holds `old` either way.
            if bucket.contains(new) {
                bucket.remove(pos);
            } else {
                bucket[pos] = new.clone();
            }
            changed = true;
        }
        Ok(changed)
    }

    async fn reload(&self) -> Result<(), ApplyError> {
        let Some(loader) = &self.loader else {
            return Err(ApplyError::Reload("no policy loader configured".into()));
        };

        let lines = loader.load_rules().await?;
        debug!(rules = lines.len(), "reloaded policy");
        self.replace_all(lines);
        Ok(())
    }
}

/// A replica can act as the source of truth for others.
#[async_trait]
impl PolicyLoader for MemoryPolicy {
    async fn load_rules(&self) -> Result<Vec<PolicyLine>, ApplyError> {
        Ok(self.lines())
    }
}

fn key(
    sec: &str,
    ptype: &str,
) -> RuleKey {
    (sec.to_string(), ptype.to_string())
}

fn matches_filter(
    rule: &[String],
    field_index: usize,
    field_values: &[String],
) -> bool {
    field_values.iter().enumerate().all(|(i, value)| {
        value.is_empty()
            || field_index
                .checked_add(i)
                .and_then(|j| rule.get(j))
                .is_some_and(|field| field == value)
    })
}
