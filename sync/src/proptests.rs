use crate::diff::diff;
use proptest::prelude::*;
use rc_core::{Change, ChangeType, ConfigValue};
use std::collections::HashMap;

fn value() -> impl Strategy<Value = ConfigValue> {
    let leaf = prop_oneof![
        any::<bool>().prop_map(ConfigValue::Bool),
        (-5i64..5).prop_map(ConfigValue::Int),
        "[ab]{0,2}".prop_map(ConfigValue::String),
    ];
    prop_oneof![
        leaf.clone(),
        prop::collection::vec(leaf, 0..3).prop_map(ConfigValue::Seq),
    ]
}

fn mapping() -> impl Strategy<Value = HashMap<String, ConfigValue>> {
    prop::collection::hash_map("[a-f]{1,2}", value(), 0..12)
}

proptest! {
    #[test]
    fn test_diff_classifies_every_key(old in mapping(), new in mapping()) {
        let changes = diff(&old, &new);

        let only_old = old.keys().filter(|k| !new.contains_key(*k)).count();
        let only_new = new.keys().filter(|k| !old.contains_key(*k)).count();
        let modified = old.iter().filter(|(k, v)| new.get(*k).is_some_and(|n| n != *v)).count();
        prop_assert_eq!(changes.len(), only_old + only_new + modified);

        for (key, change) in &changes {
            match change.change_type() {
                ChangeType::Add => {
                    prop_assert!(!old.contains_key(key));
                    prop_assert_eq!(Some(&new[key]), change.new_value());
                }
                ChangeType::Delete => {
                    prop_assert!(!new.contains_key(key));
                    prop_assert_eq!(Some(&old[key]), change.old_value());
                }
                ChangeType::Modify => {
                    prop_assert_ne!(&old[key], &new[key]);
                    prop_assert_eq!(Some(&old[key]), change.old_value());
                    prop_assert_eq!(Some(&new[key]), change.new_value());
                }
            }
        }
    }

    #[test]
    fn test_diff_with_itself_is_empty(map in mapping()) {
        prop_assert!(diff(&map, &map).is_empty());
    }

    #[test]
    fn test_applying_diff_reaches_new(old in mapping(), new in mapping()) {
        let mut state = old.clone();
        for (key, change) in diff(&old, &new) {
            match change {
                Change::Add { new_value } | Change::Modify { new_value, .. } => {
                    state.insert(key, new_value);
                }
                Change::Delete { .. } => {
                    state.remove(&key);
                }
            }
        }
        prop_assert_eq!(state, new);
    }
}
