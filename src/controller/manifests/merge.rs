//! # JSON Merging
//!
//! Overlay patches use merge semantics close to Kubernetes strategic merge:
//! objects merge key by key, `null` deletes a key, and lists whose entries
//! all carry a `name` merge entry by entry (`$patch: delete` removes one).
//! Any other list is replaced wholesale.

use serde_json::{Map, Value};

const PATCH_DIRECTIVE: &str = "$patch";

/// Merge `patch` into `target` in place
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_fields) = patch else {
        *target = patch.clone();
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(target_fields) = target else {
        return;
    };

    for (key, value) in patch_fields {
        if key == PATCH_DIRECTIVE {
            continue;
        }
        match value {
            Value::Null => {
                target_fields.remove(key);
            }
            Value::Array(patch_items) if is_named_list(patch_items) => {
                match target_fields.get_mut(key) {
                    Some(Value::Array(existing)) if is_named_list(existing) => {
                        merge_named_list(existing, patch_items);
                    }
                    _ => {
                        target_fields.insert(key.clone(), Value::Array(without_deletes(patch_items)));
                    }
                }
            }
            _ => {
                let entry = target_fields.entry(key.clone()).or_insert(Value::Null);
                merge_patch(entry, value);
            }
        }
    }
}

/// Whether every field of `desired` is present with an equal value in `live`
///
/// Objects compare recursively, so extra fields in `live` (status, defaults,
/// fields owned by other managers) do not count as drift. Lists whose entries
/// all carry a `uid` or a `name` are matched entry by entry on that key and
/// may hold extra live entries; any other list compares position by position.
#[must_use]
pub fn is_subset(desired: &Value, live: &Value) -> bool {
    match (desired, live) {
        (Value::Object(desired), Value::Object(live)) => desired.iter().all(|(key, value)| {
            live.get(key)
                .is_some_and(|live_value| is_subset(value, live_value))
        }),
        (Value::Array(desired), Value::Array(live)) => match list_key(desired) {
            Some(key) => desired.iter().all(|item| {
                live.iter()
                    .any(|candidate| candidate.get(key) == item.get(key) && is_subset(item, candidate))
            }),
            None => {
                desired.len() == live.len()
                    && desired.iter().zip(live).all(|(d, l)| is_subset(d, l))
            }
        },
        _ => desired == live,
    }
}

/// Identity field shared by every entry of a list, if any
fn list_key(items: &[Value]) -> Option<&'static str> {
    if items.is_empty() {
        return None;
    }
    ["uid", "name"]
        .into_iter()
        .find(|key| items.iter().all(|item| item.get(key).is_some_and(Value::is_string)))
}

fn item_name(item: &Value) -> Option<&str> {
    item.get("name").and_then(Value::as_str)
}

fn is_delete(item: &Value) -> bool {
    item.get(PATCH_DIRECTIVE).and_then(Value::as_str) == Some("delete")
}

fn is_named_list(items: &[Value]) -> bool {
    !items.is_empty() && items.iter().all(|item| item_name(item).is_some())
}

fn without_deletes(items: &[Value]) -> Vec<Value> {
    items.iter().filter(|item| !is_delete(item)).cloned().collect()
}

fn merge_named_list(target: &mut Vec<Value>, patch: &[Value]) {
    for item in patch {
        let Some(name) = item_name(item) else {
            continue;
        };
        let position = target.iter().position(|t| item_name(t) == Some(name));
        match (position, is_delete(item)) {
            (Some(index), true) => {
                target.remove(index);
            }
            (Some(index), false) => merge_patch(&mut target[index], item),
            (None, true) => {}
            (None, false) => target.push(item.clone()),
        }
    }
}
