use std::sync::Arc;
use std::time::Duration;

use policy_watcher::ChannelConfig;
use policy_watcher::DiffApplier;
use policy_watcher::MemoryPolicy;
use policy_watcher::MemoryTransport;
use policy_watcher::PolicyLine;
use policy_watcher::PolicyModel;
use policy_watcher::Rule;
use policy_watcher::SendReport;
use policy_watcher::Watcher;
use policy_watcher::WatcherConfig;

pub const CHANNEL: &str = "casbin_channel";

pub const WAIT_FOR_CONVERGENCE: Duration = Duration::from_secs(3);

pub fn rule(parts: &[&str]) -> Rule {
    parts.iter().map(|s| s.to_string()).collect()
}

pub fn watcher_config() -> WatcherConfig {
    WatcherConfig {
        channel: ChannelConfig {
            name: CHANNEL.to_string(),
            verbose: true,
            notify_self: false,
        },
        shutdown_timeout_ms: 1000,
        ..Default::default()
    }
}

/// Shared policy table every replica persists to and reloads from.
pub fn database(lines: Vec<PolicyLine>) -> Arc<MemoryPolicy> {
    let db = MemoryPolicy::new();
    db.replace_all(lines);
    Arc::new(db)
}

/// One enforcer process: a local policy copy kept in sync by a watcher.
pub struct Replica {
    pub watcher: Watcher,
    pub policy: Arc<MemoryPolicy>,
    db: Arc<MemoryPolicy>,
}

impl Replica {
    pub async fn start(
        transport: &MemoryTransport,
        db: &Arc<MemoryPolicy>,
    ) -> Self {
        let policy = Arc::new(MemoryPolicy::with_loader(db.clone()));
        policy.reload().await.expect("initial load");

        let watcher = Watcher::new(watcher_config(), Arc::new(transport.clone()))
            .await
            .expect("watcher starts");
        watcher.set_update_callback(DiffApplier::new(policy.clone()).into_callback());

        Self {
            watcher,
            policy,
            db: db.clone(),
        }
    }

    /// Persists and applies locally, then announces, the way a host enforcer
    /// with auto-save does.
    pub async fn add_policies(
        &self,
        sec: &str,
        ptype: &str,
        rules: Vec<Rule>,
    ) -> SendReport {
        self.db.add_rules(sec, ptype, &rules).await.unwrap();
        self.policy.add_rules(sec, ptype, &rules).await.unwrap();
        self.watcher.update_for_add_policies(sec, ptype, rules).await.unwrap()
    }

    pub async fn add_policy(
        &self,
        sec: &str,
        ptype: &str,
        rule: Rule,
    ) -> SendReport {
        self.db.add_rules(sec, ptype, &[rule.clone()]).await.unwrap();
        self.policy.add_rules(sec, ptype, &[rule.clone()]).await.unwrap();
        self.watcher.update_for_add_policy(sec, ptype, rule).await.unwrap()
    }

    pub async fn remove_policy(
        &self,
        sec: &str,
        ptype: &str,
        rule: Rule,
    ) -> SendReport {
        self.db.remove_rules(sec, ptype, &[rule.clone()]).await.unwrap();
        self.policy.remove_rules(sec, ptype, &[rule.clone()]).await.unwrap();
        self.watcher.update_for_remove_policy(sec, ptype, rule).await.unwrap()
    }

    pub async fn update_policy(
        &self,
        sec: &str,
        ptype: &str,
        old: Rule,
        new: Rule,
    ) -> SendReport {
        let (olds, news) = (vec![old.clone()], vec![new.clone()]);
        self.db.update_rules(sec, ptype, &olds, &news).await.unwrap();
        self.policy.update_rules(sec, ptype, &olds, &news).await.unwrap();
        self.watcher.update_for_update_policy(sec, ptype, old, new).await.unwrap()
    }

    pub async fn remove_filtered_policy(
        &self,
        sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: Vec<String>,
    ) -> SendReport {
        self.db
            .remove_filtered_rules(sec, ptype, field_index, &field_values)
            .await
            .unwrap();
        self.policy
            .remove_filtered_rules(sec, ptype, field_index, &field_values)
            .await
            .unwrap();
        self.watcher
            .update_for_remove_filtered_policy(sec, ptype, field_index, field_values)
            .await
            .unwrap()
    }

    pub async fn shutdown(self) {
        self.watcher.close().await.expect("listener stops cleanly");
    }
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT_FOR_CONVERGENCE, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Rule set as an ordered list; replicas may hold rules in different orders
/// when announcements interleave.
pub fn snapshot(policy: &MemoryPolicy) -> Vec<(String, Rule)> {
    let mut lines: Vec<_> = policy.lines().into_iter().map(|l| (l.ptype, l.rule)).collect();
    lines.sort();
    lines
}

/// Polls until every replica holds the same rules as `expected`.
pub async fn wait_for_convergence(
    replicas: &[&Replica],
    expected: &MemoryPolicy,
) {
    let want = snapshot(expected);
    let converged = tokio::time::timeout(WAIT_FOR_CONVERGENCE, async {
        while !replicas.iter().all(|r| snapshot(&r.policy) == want) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    if converged.is_err() {
        for (i, replica) in replicas.iter().enumerate() {
            eprintln!("replica {} holds {:?}", i, snapshot(&replica.policy));
        }
        panic!("replicas did not converge on {:?}", want);
    }
}
