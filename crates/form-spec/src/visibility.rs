use std::cmp::Ordering;

use serde_json::Value;

use crate::spec::field::{Condition, Field, VisibilityCondition};
use crate::spec::form::FormConfig;
use crate::tree::{FlatField, flatten};
use crate::values::{FormValues, present, value_to_display};

pub type VisibilityMap = std::collections::BTreeMap<String, bool>;

/// Decides whether a field is shown for the given values.
///
/// Every condition must hold. A field whose dependency has not been answered
/// yet is hidden, whatever the condition. Unrecognised condition kinds leave
/// the field visible.
pub fn is_visible(field: &Field, values: &FormValues) -> bool {
    field
        .conditions()
        .all(|condition| condition_holds(condition, values))
}

/// Like [`is_visible`], but also honours the conditions of enclosing groups.
pub fn is_leaf_visible(flat: &FlatField<'_>, values: &FormValues) -> bool {
    flat.conditions()
        .all(|condition| condition_holds(condition, values))
}

pub fn condition_holds(condition: &VisibilityCondition, values: &FormValues) -> bool {
    let Some(actual) = present(values, &condition.depends_on) else {
        return false;
    };
    let expected = &condition.value;
    match condition.condition {
        Condition::Equals => actual == expected,
        Condition::NotEquals => actual != expected,
        Condition::Contains => contains(actual, expected),
        Condition::GreaterThan => compare(actual, expected) == Some(Ordering::Greater),
        Condition::LessThan => compare(actual, expected) == Some(Ordering::Less),
        Condition::Unknown => true,
    }
}

fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::Array(items) => items.contains(expected),
        other => value_to_display(other).contains(&value_to_display(expected)),
    }
}

fn compare(actual: &Value, expected: &Value) -> Option<Ordering> {
    as_number(actual)?.partial_cmp(&as_number(expected)?)
}

pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(num) => num.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|num| num.is_finite()),
        _ => None,
    }
}

/// Visibility of every leaf in the form, keyed by flattened id.
pub fn resolve_visibility(form: &FormConfig, values: &FormValues) -> VisibilityMap {
    flatten(form.top_level_fields())
        .iter()
        .map(|flat| (flat.id.clone(), is_leaf_visible(flat, values)))
        .collect()
}
