//! Property-based tests for the store and change detector.

use proptest::prelude::*;
use serde_json::{Value, json};
use warden_store::{FactStore, FileKv, MemoryKv};

// Strategy for flag-like identifiers.
fn flag_name() -> impl Strategy<Value = String> {
    "-[a-z][a-z.-]{0,20}".prop_map(|s| s.to_string())
}

// Strategy for arbitrary JSON-ish fact values (scalars and flat lists).
fn fact_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(|n| json!(n)),
        "[a-z0-9:/.]{0,30}".prop_map(|s| json!(s)),
        prop::collection::vec("[a-z0-9:]{1,10}", 0..6).prop_map(|v| json!(v)),
    ]
}

proptest! {
    // A change report is always followed by a no-change report for the
    // same value: the detector records what it observed.
    #[test]
    fn changed_then_unchanged(key in "[a-z_.]{1,20}", value in fact_value()) {
        let mut facts = FactStore::new(Box::new(MemoryKv::new()));
        facts.changed(&key, &value).unwrap();
        prop_assert!(!facts.changed(&key, &value).unwrap());
    }

    // Runtime-argument fingerprinting is insensitive to insertion order
    // because args_list() sorts before comparison.
    #[test]
    fn args_list_insensitive_to_insertion_order(
        args in prop::collection::btree_map(flag_name(), "[a-z0-9/]{1,12}", 1..6),
    ) {
        let mut forward = FactStore::new(Box::new(MemoryKv::new()));
        for (flag, value) in &args {
            forward.set_runtime_arg(flag, Some(value)).unwrap();
        }

        let mut reverse = FactStore::new(Box::new(MemoryKv::new()));
        for (flag, value) in args.iter().rev() {
            reverse.set_runtime_arg(flag, Some(value)).unwrap();
        }

        let canonical = forward.args_list().unwrap();
        prop_assert_eq!(canonical.clone(), reverse.args_list().unwrap());

        let mut facts = FactStore::new(Box::new(MemoryKv::new()));
        facts.changed("args", &json!(canonical)).unwrap();
        prop_assert!(!facts.changed("args", &json!(reverse.args_list().unwrap())).unwrap());
    }

    // Everything written through the file backend survives a reopen.
    #[test]
    fn file_kv_reopen_preserves_facts(
        entries in prop::collection::btree_map("[a-z_]{1,12}", fact_value(), 0..8),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        {
            let mut facts = FactStore::new(Box::new(FileKv::open(&path).unwrap()));
            for (key, value) in &entries {
                facts.set(key, value).unwrap();
            }
        }

        let facts = FactStore::new(Box::new(FileKv::open(&path).unwrap()));
        for (key, value) in &entries {
            let stored = facts.get::<Value>(key).unwrap();
            prop_assert_eq!(stored.as_ref(), Some(value));
        }
    }
}
