use std::collections::BTreeMap;

use serde_json::Value;

use super::DiffOutcome;
use crate::core::errors::WcError;

/// Structural diff for JSON (or YAML, which is a JSON superset) payloads
/// (§4.4 `deepdiff`). Reports added/removed/changed keys by path rather than
/// a line-oriented text diff, which is noisy for reordered or reformatted
/// structured data.
pub fn diff(old_data: &[u8], new_data: &[u8], _args: &BTreeMap<String, serde_yaml::Value>) -> Result<DiffOutcome, WcError> {
    let old_value = parse(&String::from_utf8_lossy(old_data))?;
    let new_value = parse(&String::from_utf8_lossy(new_data))?;

    let mut changes = Vec::new();
    walk("$", &old_value, &new_value, &mut changes);

    if changes.is_empty() {
        return Ok(DiffOutcome::NoReport);
    }

    Ok(DiffOutcome::Diff(changes.join("\n")))
}

fn parse(data: &str) -> Result<Value, WcError> {
    if let Ok(v) = serde_json::from_str::<Value>(data) {
        return Ok(v);
    }
    serde_yaml::from_str::<Value>(data)
        .map_err(|e| WcError::MalformedJob(0, format!("deepdiff requires JSON or YAML input: {e}")))
}

fn walk(path: &str, old: &Value, new: &Value, changes: &mut Vec<String>) {
    if old == new {
        return;
    }
    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            for (key, old_child) in old_map {
                let child_path = format!("{path}.{key}");
                match new_map.get(key) {
                    Some(new_child) => walk(&child_path, old_child, new_child, changes),
                    None => changes.push(format!("item removed: {child_path} (was {old_child})")),
                }
            }
            for (key, new_child) in new_map {
                if !old_map.contains_key(key) {
                    changes.push(format!("item added: {path}.{key} -> {new_child}"));
                }
            }
        }
        (Value::Array(old_arr), Value::Array(new_arr)) => {
            let max = old_arr.len().max(new_arr.len());
            for i in 0..max {
                let child_path = format!("{path}[{i}]");
                match (old_arr.get(i), new_arr.get(i)) {
                    (Some(o), Some(n)) => walk(&child_path, o, n, changes),
                    (Some(o), None) => changes.push(format!("item removed: {child_path} (was {o})")),
                    (None, Some(n)) => changes.push(format!("item added: {child_path} -> {n}")),
                    (None, None) => {}
                }
            }
        }
        _ => changes.push(format!("value changed: {path}: {old} -> {new}")),
    }
}
