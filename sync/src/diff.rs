//! Change computation between two flat namespace mappings.

use rc_core::{Change, ConfigValue};
use std::collections::HashMap;

/// Compares `old` against `new` and returns one `Change` per differing key.
///
/// Keys only in `old` become `Delete`, keys only in `new` become `Add`, keys
/// in both with structurally different values become `Modify`. Equal values
/// produce nothing. Runs in `O(|old| + |new|)`.
pub fn diff(
    old: &HashMap<String, ConfigValue>,
    new: &HashMap<String, ConfigValue>
) -> HashMap<String, Change> {
    let mut changes = HashMap::new();

    for (key, old_value) in old {
        if !new.contains_key(key) {
            changes.insert(
                key.clone(),
                Change::Delete {
                    old_value: old_value.clone()
                }
            );
        }
    }

    for (key, new_value) in new {
        match old.get(key) {
            None => {
                changes.insert(
                    key.clone(),
                    Change::Add {
                        new_value: new_value.clone()
                    }
                );
            }
            Some(old_value) if old_value != new_value => {
                changes.insert(
                    key.clone(),
                    Change::Modify {
                        old_value: old_value.clone(),
                        new_value: new_value.clone()
                    }
                );
            }
            Some(_) => {}
        }
    }

    changes
}
