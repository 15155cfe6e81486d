//! Recursive merging of option trees.
//!
//! Options arrive as JSON-shaped values (from a `tss.toml` file, from a
//! caller, or from CLI overrides) and are laid over the defaults. Objects
//! merge key by key; any other value replaces what was there, so arrays are
//! swapped wholesale rather than concatenated.

use serde_json::Value;

/// Merge `overlay` into `base`.
///
/// For a key present in both, two objects are merged recursively and every
/// other combination lets the overlay win. Keys only present in `base` are
/// kept. `null` in the overlay is treated like any other value and replaces.
pub fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Human-readable name of a JSON value's type, for error messages.
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_overlay_scalar_replaces() {
        let mut base = json!({"port": 8978, "host": "localhost"});
        merge_values(&mut base, json!({"port": 3000}));
        assert_eq!(base, json!({"port": 3000, "host": "localhost"}));
    }

    #[test]
    fn test_nested_objects_merge() {
        let mut base = json!({"live_reload": {"enable": true, "port": 9572}});
        merge_values(&mut base, json!({"live_reload": {"port": 35729}}));
        assert_eq!(base, json!({"live_reload": {"enable": true, "port": 35729}}));
    }

    #[test]
    fn test_arrays_replace_instead_of_concatenating() {
        let mut base = json!({"live_reload": {"ignore": ["node_modules"]}});
        merge_values(&mut base, json!({"live_reload": {"ignore": ["vendor", "target"]}}));
        assert_eq!(
            base,
            json!({"live_reload": {"ignore": ["vendor", "target"]}})
        );
    }

    #[test]
    fn test_object_over_scalar_replaces() {
        let mut base = json!({"open": "/"});
        merge_values(&mut base, json!({"open": {"path": "/docs"}}));
        assert_eq!(base, json!({"open": {"path": "/docs"}}));
    }

    #[test]
    fn test_scalar_over_object_replaces() {
        let mut base = json!({"live_reload": {"enable": true}});
        merge_values(&mut base, json!({"live_reload": false}));
        assert_eq!(base, json!({"live_reload": false}));
    }

    #[test]
    fn test_new_keys_are_added() {
        let mut base = json!({"host": "localhost"});
        merge_values(&mut base, json!({"extra": 1}));
        assert_eq!(base, json!({"host": "localhost", "extra": 1}));
    }

    #[test]
    fn test_empty_overlay_keeps_base() {
        let mut base = json!({"host": "localhost", "live_reload": {"port": 9572}});
        let before = base.clone();
        merge_values(&mut base, json!({}));
        assert_eq!(base, before);
    }

    #[test]
    fn test_kind_name() {
        assert_eq!(kind_name(&json!([1])), "array");
        assert_eq!(kind_name(&json!("x")), "string");
        assert_eq!(kind_name(&json!(null)), "null");
    }
}
