use crate::schema::ValidationSchema;
use crate::values::{FormValues, is_empty_value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub answered: usize,
    pub total: usize,
}

fn is_answered(values: &FormValues, id: &str) -> bool {
    values.get(id).is_some_and(|value| !is_empty_value(value))
}

/// Counts visible fields and how many of them hold a value.
pub fn progress(schema: &ValidationSchema, values: &FormValues) -> Progress {
    let visible = schema.rules().iter().filter(|rule| rule.visible);
    let mut progress = Progress::default();
    for rule in visible {
        progress.total += 1;
        if is_answered(values, &rule.id) {
            progress.answered += 1;
        }
    }
    progress
}

/// First visible field still waiting for input, in declaration order.
pub fn next_field<'s>(schema: &'s ValidationSchema, values: &FormValues) -> Option<&'s str> {
    schema
        .rules()
        .iter()
        .find(|rule| rule.visible && !is_answered(values, &rule.id))
        .map(|rule| rule.id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::generate;
    use crate::spec::field::Field;
    use crate::values::flatten_values;
    use serde_json::json;

    #[test]
    fn counts_only_visible_fields() {
        let fields: Vec<Field> = serde_json::from_value(json!([
            { "id": "owns", "type": "radio", "label": "Owns", "options": ["yes", "no"] },
            { "id": "make", "type": "text", "label": "Make",
              "visibility": { "dependsOn": "owns", "condition": "equals", "value": "yes" } },
            { "id": "notes", "type": "textarea", "label": "Notes" }
        ]))
        .unwrap();

        let values = flatten_values(&json!({ "owns": "no" }));
        let schema = generate(&fields, &values);
        assert_eq!(progress(&schema, &values), Progress { answered: 1, total: 2 });
        assert_eq!(next_field(&schema, &values), Some("notes"));

        let values = flatten_values(&json!({ "owns": "yes" }));
        let schema = generate(&fields, &values);
        assert_eq!(next_field(&schema, &values), Some("make"));
    }
}
