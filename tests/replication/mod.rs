use policy_watcher::MemoryTransport;
use policy_watcher::PolicyLine;
use policy_watcher::SendTier;

use crate::common::database;
use crate::common::rule;
use crate::common::wait_for_convergence;
use crate::common::wait_until;
use crate::common::Replica;
use crate::enable_logger;

fn seed() -> Vec<PolicyLine> {
    vec![
        PolicyLine::new("p", rule(&["alice", "data1", "read"])),
        PolicyLine::new("p", rule(&["bob", "data2", "write"])),
        PolicyLine::new("g", rule(&["alice", "admin"])),
    ]
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn every_mutation_kind_reaches_all_replicas() {
    enable_logger();
    let transport = MemoryTransport::new();
    let db = database(seed());
    let a = Replica::start(&transport, &db).await;
    let b = Replica::start(&transport, &db).await;
    let c = Replica::start(&transport, &db).await;

    let report = a.add_policy("p", "p", rule(&["carol", "data3", "read"])).await;
    assert_eq!(report.tier, SendTier::Raw);
    wait_for_convergence(&[&a, &b, &c], &db).await;

    b.update_policy(
        "p",
        "p",
        rule(&["bob", "data2", "write"]),
        rule(&["bob", "data2", "read"]),
    )
    .await;
    wait_for_convergence(&[&a, &b, &c], &db).await;

    c.remove_policy("g", "g", rule(&["alice", "admin"])).await;
    wait_for_convergence(&[&a, &b, &c], &db).await;

    a.add_policies(
        "p",
        "p",
        vec![rule(&["dave", "data4", "read"]), rule(&["dave", "data5", "read"])],
    )
    .await;
    wait_for_convergence(&[&a, &b, &c], &db).await;

    b.remove_filtered_policy("p", "p", 0, vec!["dave".to_string()]).await;
    wait_for_convergence(&[&a, &b, &c], &db).await;
    assert!(!c.policy.has_rule("p", "p", &rule(&["dave", "data4", "read"])));

    for replica in [a, b, c] {
        replica.shutdown().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn interleaved_announcements_converge() {
    enable_logger();
    let transport = MemoryTransport::new();
    let db = database(seed());
    let a = Replica::start(&transport, &db).await;
    let b = Replica::start(&transport, &db).await;

    let (first, second) = tokio::join!(
        a.add_policy("p", "p", rule(&["erin", "data6", "read"])),
        b.add_policy("p", "p", rule(&["frank", "data7", "read"])),
    );
    assert_eq!(first.tier, SendTier::Raw);
    assert_eq!(second.tier, SendTier::Raw);

    wait_for_convergence(&[&a, &b], &db).await;

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn replicas_ignore_their_own_announcements() {
    enable_logger();
    let transport = MemoryTransport::new();
    let db = database(seed());
    let a = Replica::start(&transport, &db).await;
    let b = Replica::start(&transport, &db).await;

    a.add_policy("p", "p", rule(&["gina", "data8", "read"])).await;
    wait_for_convergence(&[&a, &b], &db).await;
    wait_until(|| a.watcher.stats().filtered == 1).await;

    let stats = a.watcher.stats();
    assert_eq!(stats.dispatched, 0);
    assert_eq!(b.watcher.stats().dispatched, 1);

    a.shutdown().await;
    b.shutdown().await;
}
