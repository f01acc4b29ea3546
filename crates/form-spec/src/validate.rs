use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::messages::{number_value, render_message};
use crate::schema::{FieldRule, ValidationSchema, Validator, generate};
use crate::spec::field::FieldOption;
use crate::spec::form::FormConfig;
use crate::tree::SEPARATOR;
use crate::values::{FormValues, is_empty_value};
use crate::visibility::as_number;

/// A per-field validation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationError {
    pub field_id: String,
    pub path: String,
    pub message: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub missing_required: Vec<String>,
    pub unknown_fields: Vec<String>,
}

impl ValidationResult {
    pub fn error_for(&self, field_id: &str) -> Option<&ValidationError> {
        self.errors.iter().find(|error| error.field_id == field_id)
    }
}

/// Generates the schema for the current values and validates them with it.
pub fn validate(form: &FormConfig, values: &FormValues) -> ValidationResult {
    generate(form.top_level_fields(), values).validate(values)
}

struct Violation {
    code: &'static str,
    data: Map<String, Value>,
}

impl Violation {
    fn new(code: &'static str) -> Self {
        Self {
            code,
            data: Map::new(),
        }
    }

    fn with(mut self, key: &str, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

impl ValidationSchema {
    pub fn validate(&self, values: &FormValues) -> ValidationResult {
        self.run(values).0
    }

    /// Applies the schema: on success returns the visible, non-empty values
    /// in their validated form (numbers coerced from text). Hidden fields are
    /// neither validated nor emitted.
    pub fn apply(&self, values: &FormValues) -> Result<FormValues, ValidationResult> {
        let (result, cleaned) = self.run(values);
        if result.valid {
            Ok(cleaned)
        } else {
            Err(result)
        }
    }

    fn run(&self, values: &FormValues) -> (ValidationResult, FormValues) {
        let mut errors = Vec::new();
        let mut missing_required = Vec::new();
        let mut cleaned = FormValues::new();

        for rule in self.rules() {
            if !rule.visible {
                continue;
            }
            match values.get(&rule.id).filter(|value| !is_empty_value(value)) {
                None => {
                    if rule.required {
                        missing_required.push(rule.id.clone());
                        errors.push(field_error(rule, Violation::new("required")));
                    }
                }
                Some(value) => match check_value(&rule.validator, value) {
                    Ok(clean) => {
                        cleaned.insert(rule.id.clone(), clean);
                    }
                    Err(violation) => errors.push(field_error(rule, violation)),
                },
            }
        }

        let unknown_fields: Vec<String> = values
            .keys()
            .filter(|key| self.rule(key).is_none())
            .cloned()
            .collect();

        let result = ValidationResult {
            valid: errors.is_empty() && missing_required.is_empty() && unknown_fields.is_empty(),
            errors,
            missing_required,
            unknown_fields,
        };
        (result, cleaned)
    }
}

fn check_value(validator: &Validator, value: &Value) -> Result<Value, Violation> {
    match validator {
        Validator::Text { pattern } => {
            let text = value.as_str().ok_or_else(|| Violation::new("type_mismatch"))?;
            if let Some(pattern) = pattern
                && !pattern.is_match(text)
            {
                return Err(Violation::new("pattern_mismatch")
                    .with("pattern", Value::String(pattern.as_str().into())));
            }
            Ok(value.clone())
        }
        Validator::Number { min, max } => {
            let number = as_number(value).ok_or_else(|| Violation::new("not_a_number"))?;
            if let Some(min) = min
                && number < *min
            {
                return Err(Violation::new("min").with("min", number_value(*min)));
            }
            if let Some(max) = max
                && number > *max
            {
                return Err(Violation::new("max").with("max", number_value(*max)));
            }
            Ok(number_value(number))
        }
        Validator::Date => {
            let text = value.as_str().ok_or_else(|| Violation::new("type_mismatch"))?;
            if is_calendar_date(text) {
                Ok(value.clone())
            } else {
                Err(Violation::new("invalid_date"))
            }
        }
        Validator::Choice { options } => {
            let text = value.as_str().ok_or_else(|| Violation::new("type_mismatch"))?;
            match options {
                Some(options) if !offers(options, text) => Err(Violation::new("invalid_option")),
                _ => Ok(value.clone()),
            }
        }
        Validator::MultiChoice { options } => {
            let items = value.as_array().ok_or_else(|| Violation::new("type_mismatch"))?;
            for item in items {
                let text = item.as_str().ok_or_else(|| Violation::new("type_mismatch"))?;
                if let Some(options) = options
                    && !offers(options, text)
                {
                    return Err(Violation::new("invalid_option"));
                }
            }
            Ok(value.clone())
        }
    }
}

fn offers(options: &[FieldOption], value: &str) -> bool {
    options.iter().any(|option| option.value() == value)
}

/// `YYYY-MM-DD` naming a real calendar day.
fn is_calendar_date(text: &str) -> bool {
    let shaped = text.len() == 10
        && text.bytes().enumerate().all(|(index, byte)| match index {
            4 | 7 => byte == b'-',
            _ => byte.is_ascii_digit(),
        });
    shaped && NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
}

fn field_error(rule: &FieldRule, violation: Violation) -> ValidationError {
    let Violation { code, mut data } = violation;
    data.insert("label".into(), Value::String(rule.label.clone()));
    if let Validator::Number { min, max } = &rule.validator {
        if let Some(min) = min {
            data.entry("min").or_insert_with(|| number_value(*min));
        }
        if let Some(max) = max {
            data.entry("max").or_insert_with(|| number_value(*max));
        }
    }
    // Custom messages only describe constraint violations, not missing input.
    let custom = match code {
        "min" | "max" | "pattern_mismatch" => rule.message.as_deref(),
        _ => None,
    };
    ValidationError {
        field_id: rule.id.clone(),
        path: pointer(&rule.id),
        message: render_message(code, custom, &data),
        code: code.to_string(),
    }
}

fn pointer(id: &str) -> String {
    id.split(SEPARATOR)
        .map(|segment| format!("/{segment}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::flatten_values;
    use serde_json::json;

    fn form(fields: Value) -> FormConfig {
        serde_json::from_value(json!({ "formId": "f", "title": "F", "fields": fields }))
            .expect("form")
    }

    #[test]
    fn number_is_coerced_from_text() {
        let form = form(json!([
            { "id": "age", "type": "number", "label": "Age", "required": true,
              "validation": { "min": 18, "max": 100 } }
        ]));
        let schema = generate(form.top_level_fields(), &FormValues::new());
        let cleaned = schema
            .apply(&flatten_values(&json!({ "age": "42" })))
            .expect("valid");
        assert_eq!(cleaned["age"], json!(42));

        let result = schema.validate(&flatten_values(&json!({ "age": "abc" })));
        assert_eq!(result.errors[0].code, "not_a_number");
        assert_eq!(result.errors[0].message, "Age must be a valid number");
    }

    #[test]
    fn bounds_report_min_and_max() {
        let form = form(json!([
            { "id": "age", "type": "number", "label": "Age",
              "validation": { "min": 18, "max": 100, "message": "Age must be between {{min}} and {{max}}" } }
        ]));
        let low = validate(&form, &flatten_values(&json!({ "age": 12 })));
        assert_eq!(low.errors[0].code, "min");
        assert_eq!(low.errors[0].message, "Age must be between 18 and 100");
        let high = validate(&form, &flatten_values(&json!({ "age": 101 })));
        assert_eq!(high.errors[0].code, "max");
    }

    #[test]
    fn text_pattern_is_enforced() {
        let form = form(json!([
            { "id": "zip", "type": "text", "label": "Zip", "validation": { "pattern": "^\\d{5}$" } }
        ]));
        assert!(validate(&form, &flatten_values(&json!({ "zip": "12345" }))).valid);
        let result = validate(&form, &flatten_values(&json!({ "zip": "12a45" })));
        assert_eq!(result.errors[0].code, "pattern_mismatch");
        assert_eq!(result.errors[0].message, "Zip has an invalid format");
    }

    #[test]
    fn dates_must_be_real_calendar_days() {
        let form = form(json!([{ "id": "dob", "type": "date", "label": "Birth date" }]));
        assert!(validate(&form, &flatten_values(&json!({ "dob": "1990-02-28" }))).valid);
        for bad in ["1990-02-30", "1990/02/28", "90-02-28", "1990-2-28"] {
            let result = validate(&form, &flatten_values(&json!({ "dob": bad })));
            assert_eq!(result.errors[0].code, "invalid_date", "{bad}");
        }
    }

    #[test]
    fn choices_must_come_from_options() {
        let form = form(json!([
            { "id": "cover", "type": "checkbox", "label": "Cover", "required": true,
              "options": [ { "label": "Fire", "value": "fire" }, { "label": "Flood", "value": "flood" } ] },
            { "id": "plan", "type": "radio", "label": "Plan", "options": ["basic", "premium"] }
        ]));
        assert!(validate(&form, &flatten_values(&json!({ "cover": ["fire"], "plan": "basic" }))).valid);

        let result = validate(&form, &flatten_values(&json!({ "cover": ["theft"], "plan": "gold" })));
        let codes: Vec<_> = result.errors.iter().map(|error| error.code.as_str()).collect();
        assert_eq!(codes, vec!["invalid_option", "invalid_option"]);

        let empty = validate(&form, &flatten_values(&json!({ "cover": [] })));
        assert_eq!(empty.missing_required, vec!["cover"]);
    }

    #[test]
    fn nested_fields_report_pointer_paths() {
        let form = form(json!([
            { "id": "vehicle", "type": "group", "label": "Vehicle", "fields": [
                { "id": "make", "type": "text", "label": "Make", "required": true }
            ] }
        ]));
        let result = validate(&form, &FormValues::new());
        assert_eq!(result.missing_required, vec!["vehicle.make"]);
        assert_eq!(result.errors[0].path, "/vehicle/make");
        assert_eq!(result.errors[0].message, "Make is required");
    }

    #[test]
    fn unknown_fields_invalidate() {
        let form = form(json!([{ "id": "name", "type": "text", "label": "Name" }]));
        let result = validate(&form, &flatten_values(&json!({ "name": "Ada", "extra": 1 })));
        assert!(!result.valid);
        assert_eq!(result.unknown_fields, vec!["extra"]);
    }

    #[test]
    fn hidden_values_are_skipped_and_dropped() {
        let form = form(json!([
            { "id": "has-security", "type": "radio", "label": "Security?", "options": ["yes", "no"] },
            { "id": "security-type", "type": "text", "label": "Type", "required": true,
              "validation": { "pattern": "^[a-z]+$" },
              "visibility": { "dependsOn": "has-security", "condition": "equals", "value": "yes" } }
        ]));
        let values = flatten_values(&json!({ "has-security": "no", "security-type": "ALARM" }));
        let schema = generate(form.top_level_fields(), &values);
        let cleaned = schema.apply(&values).expect("hidden field is not validated");
        assert!(!cleaned.contains_key("security-type"));
        assert_eq!(cleaned["has-security"], "no");
    }
}
