//! Deep-merge layering: `defaults < file < env < cli`, each layer a plain
//! `serde_json::Value` merged object-recursively into the next.

use serde_json::{Map, Value};

pub fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Recursively merges `overlay` onto `base`. Nulls in `overlay` are ignored
/// rather than clobbering an existing value, so a layer that is silent about
/// a key never erases a lower layer's setting.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    if overlay.is_null() {
        return;
    }
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                if value.is_null() {
                    continue;
                }
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value.clone();
        }
    }
}

pub fn merge_all(layers: &[Value]) -> Value {
    let mut merged = empty_object();
    for layer in layers {
        deep_merge(&mut merged, layer);
    }
    merged
}
