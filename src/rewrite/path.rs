//! Dotted-path writes into a [`serde_json::Value`].
//!
//! [`set_path`] walks a path of object keys, creating missing
//! intermediate objects, and stores the value at the last key. Walking
//! through anything that is not an object is an error; nothing is
//! written in that case.

use serde_json::{Map, Value};

/// Set `value` at `path` inside `root`, creating missing objects on the way.
///
/// Returns a human-readable reason when a segment (or the root) exists but
/// is not an object.
pub fn set_path(root: &mut Value, path: &[&str], value: Value) -> Result<(), String> {
    let Some((last, parents)) = path.split_last() else {
        return Err("empty path".into());
    };

    let mut current = as_object(root, "event")?;
    for segment in parents {
        let child = current
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        current = as_object(child, segment)?;
    }

    current.insert((*last).to_string(), value);
    Ok(())
}

fn as_object<'a>(value: &'a mut Value, name: &str) -> Result<&'a mut Map<String, Value>, String> {
    let kind = kind_of(value);
    value
        .as_object_mut()
        .ok_or_else(|| format!("'{name}' is {kind}, not an object"))
}

/// Article-prefixed JSON type name for error messages.
#[must_use]
pub const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn overwrites_existing_value() {
        let mut event = json!({"properties": {"token": "old", "x": 1}});
        set_path(&mut event, &["properties", "token"], json!("new")).unwrap();
        assert_eq!(event, json!({"properties": {"token": "new", "x": 1}}));
    }

    #[test]
    fn creates_missing_leaf() {
        let mut event = json!({"properties": {}});
        set_path(&mut event, &["properties", "token"], json!("k")).unwrap();
        assert_eq!(event, json!({"properties": {"token": "k"}}));
    }

    #[test]
    fn creates_missing_intermediate_objects() {
        let mut event = json!({});
        set_path(&mut event, &["a", "b", "c"], json!(true)).unwrap();
        assert_eq!(event, json!({"a": {"b": {"c": true}}}));
    }

    #[test]
    fn rejects_non_object_parent() {
        let mut event = json!({"properties": "nope"});
        let err = set_path(&mut event, &["properties", "token"], json!("k")).unwrap_err();
        assert_eq!(err, "'properties' is a string, not an object");
        assert_eq!(event, json!({"properties": "nope"}));
    }

    #[test]
    fn rejects_non_object_root() {
        let mut event = json!([1, 2]);
        let err = set_path(&mut event, &["token"], json!("k")).unwrap_err();
        assert!(err.contains("an array"));
    }

    #[test]
    fn rejects_empty_path() {
        let mut event = json!({});
        assert!(set_path(&mut event, &[], json!(1)).is_err());
    }
}
