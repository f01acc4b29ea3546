use std::sync::LazyLock;

use handlebars::{Handlebars, no_escape};
use serde_json::{Map, Value};

/// Default message templates, keyed by validation error code.
const DEFAULT_TEMPLATES: &[(&str, &str)] = &[
    ("required", "{{label}} is required"),
    ("type_mismatch", "{{label}} has an unexpected value type"),
    ("not_a_number", "{{label}} must be a valid number"),
    ("min", "{{label}} must be at least {{min}}"),
    ("max", "{{label}} must be at most {{max}}"),
    ("pattern_mismatch", "{{label}} has an invalid format"),
    ("invalid_date", "{{label}} must be a date in YYYY-MM-DD format"),
    ("invalid_option", "{{label}} must be one of the available options"),
    ("unknown_field", "{{label}} is not part of this form"),
];

static MESSAGES: LazyLock<Handlebars<'static>> = LazyLock::new(|| {
    let mut registry = Handlebars::new();
    registry.register_escape_fn(no_escape);
    for (code, template) in DEFAULT_TEMPLATES {
        if let Err(err) = registry.register_template_string(code, template) {
            tracing::warn!(code, error = %err, "skipping invalid message template");
        }
    }
    registry
});

/// Renders the message for `code`. A field-supplied template replaces the
/// default one and sees the same data (`label`, `min`, `max`, `value`, ...).
pub fn render_message(code: &str, custom: Option<&str>, data: &Map<String, Value>) -> String {
    let rendered = match custom {
        Some(template) => MESSAGES.render_template(template, data),
        None => MESSAGES.render(code, data),
    };
    rendered.unwrap_or_else(|err| {
        tracing::warn!(code, error = %err, "message template failed to render");
        custom.map(str::to_string).unwrap_or_else(|| code.to_string())
    })
}

/// Bounds print without a trailing `.0` when they are whole numbers.
pub fn number_value(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() < 9.0e15 {
        Value::from(number as i64)
    } else {
        serde_json::Number::from_f64(number)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}
