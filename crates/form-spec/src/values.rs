use serde_json::{Map, Value};

use crate::spec::form::FormConfig;
use crate::tree::{SEPARATOR, flatten, qualify};

/// Current values keyed by flattened field id.
pub type FormValues = Map<String, Value>;

/// Looks up a value, treating `null` the same as a missing key.
pub fn present<'a>(values: &'a FormValues, id: &str) -> Option<&'a Value> {
    values.get(id).filter(|value| !value.is_null())
}

/// `null`, the empty string and the empty array carry no answer.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Flattens nested group mappings (`{"vehicle": {"year": 2000}}`) into
/// `vehicle.year` keys. Non-object input yields no values.
pub fn flatten_values(value: &Value) -> FormValues {
    let mut out = FormValues::new();
    if let Value::Object(map) = value {
        flatten_map(map, "", &mut out);
    }
    out
}

fn flatten_map(map: &Map<String, Value>, prefix: &str, out: &mut FormValues) {
    for (key, value) in map {
        let id = qualify(prefix, key);
        match value {
            Value::Object(nested) => flatten_map(nested, &id, out),
            other => {
                out.insert(id, other.clone());
            }
        }
    }
}

/// Inverse of [`flatten_values`], for presentation.
pub fn nest_values(values: &FormValues) -> Value {
    let mut root = Map::new();
    for (id, value) in values {
        let mut segments = id.split(SEPARATOR).peekable();
        let mut cursor = &mut root;
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                cursor.insert(segment.to_string(), value.clone());
                break;
            }
            let slot = cursor
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            cursor = match slot {
                Value::Object(map) => map,
                _ => break,
            };
        }
    }
    Value::Object(root)
}

/// Values a fresh session starts with: exactly the leaves declaring a default.
pub fn initial_values(form: &FormConfig) -> FormValues {
    flatten(form.top_level_fields())
        .into_iter()
        .filter_map(|flat| {
            flat.field
                .base()
                .default_value
                .clone()
                .map(|value| (flat.id, value))
        })
        .collect()
}

pub fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(num) => num.to_string(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(value_to_display)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}
