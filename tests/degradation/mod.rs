use std::time::Duration;

use nanoid::nanoid;
use policy_watcher::MemoryTransport;
use policy_watcher::NotificationTransport;
use policy_watcher::PolicyModel;
use policy_watcher::Rule;
use policy_watcher::SendTier;

use crate::common::database;
use crate::common::rule;
use crate::common::wait_for_convergence;
use crate::common::Replica;
use crate::common::CHANNEL;
use crate::enable_logger;

/// Rules whose serialized form compresses well.
fn repetitive_rules(count: usize) -> Vec<Rule> {
    (0..count)
        .map(|i| rule(&[format!("user{i}").as_str(), "shared/resource/path", "read"]))
        .collect()
}

/// Rules dominated by random identifiers, which deflate barely shrinks.
fn random_rules(count: usize) -> Vec<Rule> {
    (0..count).map(|_| rule(&[nanoid!(40).as_str(), "data", "read"])).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn large_compressible_update_is_replayed_as_a_diff() {
    enable_logger();
    let transport = MemoryTransport::new();
    let db = database(vec![]);
    let a = Replica::start(&transport, &db).await;
    let b = Replica::start(&transport, &db).await;

    let report = a.add_policies("p", "p", repetitive_rules(600)).await;

    assert_eq!(report.tier, SendTier::Compressed);
    assert!(report.raw_bytes >= 8000);
    assert!(report.sent_bytes < 8000);
    wait_for_convergence(&[&a, &b], &db).await;

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn incompressible_update_falls_back_to_full_reload() {
    enable_logger();
    let transport = MemoryTransport::new();
    let db = database(vec![]);
    let a = Replica::start(&transport, &db).await;
    let b = Replica::start(&transport, &db).await;

    let report = a.add_policies("p", "p", random_rules(300)).await;

    assert_eq!(report.tier, SendTier::Fallback);
    wait_for_convergence(&[&a, &b], &db).await;
    assert_eq!(b.policy.len(), 300);

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn oversized_update_short_circuits_to_full_reload() {
    enable_logger();
    let transport = MemoryTransport::new();
    let db = database(vec![]);
    let a = Replica::start(&transport, &db).await;
    let b = Replica::start(&transport, &db).await;

    let report = a.add_policies("p", "p", repetitive_rules(5000)).await;

    assert_eq!(report.tier, SendTier::ShortCircuit);
    assert!(report.raw_bytes > 160_000);
    wait_for_convergence(&[&a, &b], &db).await;

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn go_sender_notifications_are_understood() {
    enable_logger();
    let transport = MemoryTransport::new();
    let db = database(vec![]);
    let b = Replica::start(&transport, &db).await;

    // Written the way the Go watcher encodes them: field_index 0 is omitted.
    db.add_rules("p", "p", &[rule(&["alice", "data1", "read"]), rule(&["bob", "data1", "read"])])
        .await
        .unwrap();
    transport
        .publish(
            CHANNEL,
            r#"{"method":"UpdateForAddPolicies","id":"go-replica","sec":"p","ptype":"p","new_rules":[["alice","data1","read"],["bob","data1","read"]]}"#,
        )
        .await
        .unwrap();
    wait_for_convergence(&[&b], &db).await;

    db.remove_filtered_rules("p", "p", 0, &["alice".to_string()]).await.unwrap();
    transport
        .publish(
            CHANNEL,
            r#"{"method":"UpdateForRemoveFilteredPolicy","id":"go-replica","sec":"p","ptype":"p","field_values":["alice"]}"#,
        )
        .await
        .unwrap();
    wait_for_convergence(&[&b], &db).await;

    b.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn garbage_on_the_channel_does_not_stop_replication() {
    enable_logger();
    let transport = MemoryTransport::new();
    let db = database(vec![]);
    let a = Replica::start(&transport, &db).await;
    let b = Replica::start(&transport, &db).await;

    transport.publish(CHANNEL, "not a policy update").await.unwrap();
    transport
        .publish(CHANNEL, r#"{"method":"UpdateForRewrite","id":"x"}"#)
        .await
        .unwrap();
    a.add_policy("p", "p", rule(&["alice", "data1", "read"])).await;

    wait_for_convergence(&[&a, &b], &db).await;
    assert_eq!(b.watcher.stats().dropped, 2);

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lost_connection_surfaces_on_close() {
    enable_logger();
    let transport = MemoryTransport::new();
    let db = database(vec![]);
    let a = Replica::start(&transport, &db).await;

    transport.sever_subscriptions();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(a.watcher.close().await.is_err());
}
