use std::sync::Arc;

use tracing_test::traced_test;

use super::*;
use crate::policy::MockPolicyModel;
use crate::test_utils::rule;
use crate::MemoryPolicy;

const SENDER: &str = "replica-b";

fn applier(model: MockPolicyModel) -> DiffApplier<MockPolicyModel> {
    DiffApplier::new(Arc::new(model))
}

#[tokio::test]
async fn add_one_adds_the_rule() {
    let mut model = MockPolicyModel::new();
    model.expect_add_rules().times(1).returning(|sec, ptype, rules| {
        assert_eq!(sec, "p");
        assert_eq!(ptype, "p");
        assert_eq!(rules.to_vec(), vec![rule(&["alice", "data1", "read"])]);
        Ok(true)
    });

    let message = Message::add_one(SENDER, "p", "p", rule(&["alice", "data1", "read"]));
    assert!(applier(model).apply(&message).await.unwrap());
}

#[tokio::test]
async fn remove_many_removes_every_rule() {
    let mut model = MockPolicyModel::new();
    model.expect_remove_rules().times(1).returning(|sec, ptype, rules| {
        assert_eq!(sec, "g");
        assert_eq!(ptype, "g2");
        assert_eq!(rules.len(), 2);
        Ok(true)
    });

    let message = Message::remove_many(
        SENDER,
        "g",
        "g2",
        vec![rule(&["alice", "admin"]), rule(&["bob", "admin"])],
    )
    .unwrap();
    assert!(applier(model).apply(&message).await.unwrap());
}

#[tokio::test]
async fn update_many_passes_rule_pairs() {
    let mut model = MockPolicyModel::new();
    model.expect_update_rules().times(1).returning(|_, _, old, new| {
        assert_eq!(old.to_vec(), vec![rule(&["alice", "data1", "read"])]);
        assert_eq!(new.to_vec(), vec![rule(&["alice", "data2", "read"])]);
        Ok(true)
    });

    let message = Message::update_many(
        SENDER,
        "p",
        "p",
        vec![rule(&["alice", "data1", "read"])],
        vec![rule(&["alice", "data2", "read"])],
    )
    .unwrap();
    assert!(applier(model).apply(&message).await.unwrap());
}

#[tokio::test]
async fn filtered_removal_from_a_go_sender_defaults_to_index_zero() {
    let mut model = MockPolicyModel::new();
    model
        .expect_remove_filtered_rules()
        .times(1)
        .returning(|_, _, index, values| {
            assert_eq!(index, 0);
            assert_eq!(values.to_vec(), vec!["alice".to_string()]);
            Ok(false)
        });

    let raw = r#"{"method":"UpdateForRemoveFilteredPolicy","id":"replica-b","sec":"p","ptype":"p","field_values":["alice"]}"#;
    let message = Message::decode(raw).unwrap();

    assert!(!applier(model).apply(&message).await.unwrap());
}

#[tokio::test]
async fn reload_kinds_trigger_a_reload() {
    let mut model = MockPolicyModel::new();
    model.expect_reload().times(3).returning(|| Ok(()));
    let applier = applier(model);

    for message in [
        Message::full_reload(SENDER),
        Message::save_all(SENDER),
        Message::load_all(SENDER),
    ] {
        assert!(applier.apply(&message).await.unwrap());
    }
}

#[tokio::test]
async fn compressed_envelope_is_not_applied() {
    let model = MockPolicyModel::new();
    let inner = Message::add_one(SENDER, "p", "p", rule(&["a"]));
    let envelope = Message::compressed_envelope(&inner, "AAAA".into());

    let result = applier(model).apply(&envelope).await;

    assert!(matches!(result, Err(ApplyError::Model(_))));
}

#[tokio::test]
#[traced_test]
async fn handle_logs_no_effect_updates() {
    let mut model = MockPolicyModel::new();
    model.expect_add_rules().times(1).returning(|_, _, _| Ok(false));
    let raw = Message::add_one(SENDER, "p", "p", rule(&["alice", "data1", "read"]))
        .encode()
        .unwrap();

    applier(model).handle(&raw).await;

    assert!(logs_contain("policy update had no effect"));
}

#[tokio::test]
#[traced_test]
async fn handle_logs_failures_with_the_full_message() {
    let mut model = MockPolicyModel::new();
    model
        .expect_remove_rules()
        .times(1)
        .returning(|_, _, _| Err(ApplyError::Model("adapter rejected rule".into())));
    let raw = Message::remove_one(SENDER, "p", "p", rule(&["mallory", "vault", "open"]))
        .encode()
        .unwrap();

    applier(model).handle(&raw).await;

    assert!(logs_contain("failed to apply policy update"));
    assert!(logs_contain("adapter rejected rule"));
    assert!(logs_contain("mallory"));
}

#[tokio::test]
#[traced_test]
async fn handle_ignores_undecodable_input() {
    let model = MockPolicyModel::new();

    applier(model).handle("{\"method\":\"UpdateForAddPolicy\"}").await;

    assert!(logs_contain("ignoring undecodable policy update"));
}

#[tokio::test]
async fn callback_replays_into_the_model() {
    let policy = Arc::new(MemoryPolicy::new());
    let callback = DiffApplier::new(policy.clone()).into_callback();

    let add = Message::add_many(
        SENDER,
        "p",
        "p",
        vec![rule(&["alice", "data1", "read"]), rule(&["bob", "data2", "write"])],
    )
    .unwrap();
    callback(add.encode().unwrap()).await;
    let remove = Message::remove_one(SENDER, "p", "p", rule(&["alice", "data1", "read"]));
    callback(remove.encode().unwrap()).await;

    assert_eq!(policy.rules("p", "p"), vec![rule(&["bob", "data2", "write"])]);
}

#[tokio::test]
async fn applier_works_over_a_trait_object() {
    let policy = Arc::new(MemoryPolicy::new());
    let model: Arc<dyn PolicyModel> = policy.clone();
    let applier = DiffApplier::new(model);

    let changed = applier
        .apply(&Message::add_one(SENDER, "g", "g", rule(&["alice", "admin"])))
        .await
        .unwrap();

    assert!(changed);
    assert!(policy.has_rule("g", "g", &rule(&["alice", "admin"])));
}

#[tokio::test]
async fn out_of_range_filter_index_from_the_wire_removes_nothing() {
    let policy = Arc::new(MemoryPolicy::new());
    policy
        .add_rules("p", "p", &[rule(&["alice", "data1", "read"])])
        .await
        .unwrap();

    let raw = format!(
        r#"{{"method":"UpdateForRemoveFilteredPolicy","id":"{SENDER}","sec":"p","ptype":"p","field_index":{},"field_values":["","alice"]}}"#,
        usize::MAX
    );
    let message = Message::decode(&raw).unwrap();

    let changed = DiffApplier::new(policy.clone()).apply(&message).await.unwrap();

    assert!(!changed);
    assert_eq!(policy.len(), 1);
}
