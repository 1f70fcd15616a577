//! Dot-path projection of the answer tree.
//!
//! Answer-shaped nodes stop the walk and contribute their `value`. Objects
//! recurse with `.`-joined keys. Arrays are recorded whole and, when their
//! elements are plain objects, also walked with `path[index]` suffixes.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::answer::Answer;

/// Flattened `key -> value` view shared by the evaluator and validator.
pub type FlatState = BTreeMap<String, Value>;

pub fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Flattens a raw JSON node found at `prefix` into `out`.
pub fn flatten_value(prefix: &str, value: &Value, out: &mut FlatState) {
    if let Some(answer) = Answer::from_json(value) {
        out.insert(prefix.to_string(), answer.value);
        return;
    }
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_value(&join(prefix, key), child, out);
            }
        }
        Value::Array(items) => {
            out.insert(prefix.to_string(), value.clone());
            for (index, item) in items.iter().enumerate() {
                if item.is_object() && !Answer::is_answer_shaped(item) {
                    flatten_value(&format!("{prefix}[{index}]"), item, out);
                }
            }
        }
        other => {
            out.insert(prefix.to_string(), other.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn answers_stop_descent() {
        let mut out = FlatState::new();
        flatten_value(
            "job",
            &json!({ "address": { "value": "1 Main St", "status": "answered" } }),
            &mut out,
        );
        assert_eq!(out.get("job.address"), Some(&json!("1 Main St")));
        assert!(!out.contains_key("job.address.value"));
    }

    #[test]
    fn object_arrays_are_indexed() {
        let mut out = FlatState::new();
        flatten_value(
            "rooms",
            &json!([{ "room_name": "Kitchen", "gpo_count": 4 }, "loose"]),
            &mut out,
        );
        assert!(out.get("rooms").is_some_and(Value::is_array));
        assert_eq!(out.get("rooms[0].gpo_count"), Some(&json!(4)));
        assert!(!out.contains_key("rooms[1]"));
    }
}
