use serde_json::json;
use statemachine_lambda::adapters::object_store::LocalBlobStore;
use statemachine_lambda::adapters::state_store::StateManager;

#[test]
fn local_state_lifecycle() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let store = LocalBlobStore::new(dir.path()).expect("local store should open");
    let states = StateManager::new(Box::new(store), "");

    assert!(!states.has_state("payment123").expect("has should succeed"));

    states
        .save_state("payment123", &json!({"status": "pending", "amount": 100}))
        .expect("save should succeed");
    assert!(dir.path().join("payment123.json").is_file());

    let updated = states
        .update_state("payment123", &json!({"status": "completed"}))
        .expect("update should succeed");
    assert_eq!(updated, json!({"status": "completed", "amount": 100}));

    let on_disk: serde_json::Value = serde_json::from_slice(
        &std::fs::read(dir.path().join("payment123.json")).expect("state file should exist"),
    )
    .expect("state file should be json");
    assert_eq!(on_disk, updated);

    states.delete_state("payment123").expect("delete should succeed");
    states.delete_state("payment123").expect("second delete is a no-op");
    assert_eq!(states.load_state("payment123").expect("load should succeed"), None);
    assert!(states.list_states().expect("list should succeed").is_empty());
}
