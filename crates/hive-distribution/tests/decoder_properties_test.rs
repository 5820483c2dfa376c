use hive_distribution::decoder::{decode_state, encode_state, AccountState};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::BTreeMap;

fn arbitrary_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        prop::collection::btree_map("[1-9A-HJ-NP-Za-km-z]{8,44}", -1000i64..1000, 0..6)
            .prop_map(|m| Value::String(serde_json::to_string(&m).unwrap_or_default())),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-z ]{0,20}".prop_map(Value::String),
    ]
}

fn arbitrary_state() -> impl Strategy<Value = AccountState> {
    prop::collection::btree_map(
        any::<u64>(),
        prop::collection::btree_map("[a-zA-Z0-9_-]{1,32}", arbitrary_leaf(), 0..4),
        0..5,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: compress + encode then decode reproduces the nested map exactly
    #[test]
    fn prop_state_round_trip(state in arbitrary_state()) {
        let blob = encode_state(&state).unwrap();
        let decoded = decode_state(&blob).unwrap();
        prop_assert_eq!(decoded, state);
    }

    /// Property: arbitrary bytes never panic the decoder
    #[test]
    fn prop_garbage_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode_state(&bytes);
        let _ = hive_distribution::decode_distribution(&bytes, 1, "task");
    }
}

#[test]
fn test_epoch_keys_are_exact() {
    let mut tasks = BTreeMap::new();
    tasks.insert("task-1".to_string(), json!("{}"));
    let mut state = AccountState::new();
    state.insert(u64::MAX, tasks.clone());
    state.insert(0, tasks);

    let decoded = decode_state(&encode_state(&state).unwrap()).unwrap();
    assert!(decoded.contains_key(&u64::MAX));
    assert!(decoded.contains_key(&0));
}
