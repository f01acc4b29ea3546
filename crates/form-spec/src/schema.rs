use std::collections::BTreeMap;

use chrono::{Local, NaiveDate};
use regex::Regex;
use serde_json::{Map, Value};

use crate::messages::number_value;
use crate::spec::field::{
    ChoiceField, DateField, Field, FieldKind, FieldOption, NumberField, OptionSource, SelectField,
    TextField,
};
use crate::tree::{FlatField, flatten};
use crate::values::FormValues;
use crate::visibility::is_leaf_visible;

/// Resolved dynamic option lists, keyed by flattened field id.
pub type OptionSets = BTreeMap<String, Vec<FieldOption>>;

/// Compiled pattern; two patterns are equal when their sources are.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// Base validator chosen by field kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Validator {
    Text { pattern: Option<Pattern> },
    Number { min: Option<f64>, max: Option<f64> },
    Date,
    /// `options` is `None` while a dynamic list has not been resolved.
    Choice { options: Option<Vec<FieldOption>> },
    MultiChoice { options: Option<Vec<FieldOption>> },
}

/// Validation rule for one flattened leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub id: String,
    pub label: String,
    pub kind: FieldKind,
    pub placeholder: Option<String>,
    pub validator: Validator,
    /// Declared requiredness, independent of visibility.
    pub declared_required: bool,
    /// Effective requiredness: declared and currently visible.
    pub required: bool,
    pub visible: bool,
    pub message: Option<String>,
}

/// Validation rules derived from a field tree and one values snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationSchema {
    rules: Vec<FieldRule>,
}

impl ValidationSchema {
    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    pub fn rule(&self, id: &str) -> Option<&FieldRule> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.rules
            .iter()
            .filter(|rule| rule.required)
            .map(|rule| rule.id.as_str())
    }

    /// JSON Schema view of the rules; hidden fields stay listed but are never
    /// required.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for rule in &self.rules {
            properties.insert(rule.id.clone(), rule_schema(rule));
            if rule.required {
                required.push(Value::String(rule.id.clone()));
            }
        }

        let mut root = Map::new();
        root.insert("type".into(), Value::String("object".into()));
        root.insert("properties".into(), Value::Object(properties));
        if !required.is_empty() {
            root.insert("required".into(), Value::Array(required));
        }
        Value::Object(root)
    }
}

/// Builds a [`ValidationSchema`]; the builder pins the calendar date and the
/// resolved dynamic options so generation stays a pure function of its inputs.
#[derive(Debug, Clone)]
pub struct SchemaBuilder<'a> {
    today: NaiveDate,
    options: Option<&'a OptionSets>,
}

impl Default for SchemaBuilder<'_> {
    fn default() -> Self {
        Self {
            today: Local::now().date_naive(),
            options: None,
        }
    }
}

impl<'a> SchemaBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn with_options(mut self, options: &'a OptionSets) -> Self {
        self.options = Some(options);
        self
    }

    pub fn build<'f>(
        &self,
        fields: impl IntoIterator<Item = &'f Field>,
        values: &FormValues,
    ) -> ValidationSchema {
        let rules = flatten(fields)
            .iter()
            .filter_map(|flat| self.rule_for(flat, values))
            .collect::<Vec<_>>();
        tracing::debug!(rules = rules.len(), "generated validation schema");
        ValidationSchema { rules }
    }

    fn rule_for(&self, flat: &FlatField<'_>, values: &FormValues) -> Option<FieldRule> {
        let validator = self.base_validator(flat)?;
        let visible = is_leaf_visible(flat, values);
        let declared_required = flat.field.required();
        Some(FieldRule {
            id: flat.id.clone(),
            label: flat.field.label().to_string(),
            kind: flat.field.kind(),
            placeholder: flat.field.placeholder().map(str::to_string),
            validator,
            declared_required,
            required: declared_required && visible,
            visible,
            message: custom_message(flat.field),
        })
    }

    /// Exhaustive over field kinds; groups have no validator of their own.
    fn base_validator(&self, flat: &FlatField<'_>) -> Option<Validator> {
        match flat.field {
            Field::Text(text) | Field::Textarea(text) => Some(self.text(flat, text)),
            Field::Number(number) => Some(self.number(number)),
            Field::Date(date) => Some(self.date(date)),
            Field::Select(select) => Some(self.select(flat, select)),
            Field::Radio(choice) => Some(self.radio(choice)),
            Field::Checkbox(choice) => Some(self.checkbox(choice)),
            Field::Group(_) => None,
        }
    }

    fn text(&self, flat: &FlatField<'_>, field: &TextField) -> Validator {
        let pattern = field
            .validation
            .as_ref()
            .and_then(|rules| rules.pattern.as_deref())
            .and_then(|source| match Regex::new(source) {
                Ok(regex) => Some(Pattern(regex)),
                Err(err) => {
                    tracing::warn!(field = %flat.id, error = %err, "ignoring invalid pattern");
                    None
                }
            });
        Validator::Text { pattern }
    }

    fn number(&self, field: &NumberField) -> Validator {
        let rules = field.validation.as_ref();
        Validator::Number {
            min: rules
                .and_then(|rules| rules.min)
                .map(|bound| bound.resolve(self.today)),
            max: rules
                .and_then(|rules| rules.max)
                .map(|bound| bound.resolve(self.today)),
        }
    }

    fn date(&self, _field: &DateField) -> Validator {
        Validator::Date
    }

    fn select(&self, flat: &FlatField<'_>, field: &SelectField) -> Validator {
        let options = match flat.field.option_source() {
            Some(OptionSource::Dynamic(_)) => self
                .options
                .and_then(|sets| sets.get(&flat.id))
                .cloned(),
            _ => Some(field.options.clone()),
        };
        Validator::Choice { options }
    }

    fn radio(&self, field: &ChoiceField) -> Validator {
        Validator::Choice {
            options: Some(field.options.clone()),
        }
    }

    fn checkbox(&self, field: &ChoiceField) -> Validator {
        Validator::MultiChoice {
            options: Some(field.options.clone()),
        }
    }
}

/// Derives the schema for `values` with today's date and no resolved options.
pub fn generate<'f>(
    fields: impl IntoIterator<Item = &'f Field>,
    values: &FormValues,
) -> ValidationSchema {
    SchemaBuilder::new().build(fields, values)
}

fn custom_message(field: &Field) -> Option<String> {
    match field {
        Field::Text(text) | Field::Textarea(text) => {
            text.validation.as_ref().and_then(|rules| rules.message.clone())
        }
        Field::Number(number) => number
            .validation
            .as_ref()
            .and_then(|rules| rules.message.clone()),
        _ => None,
    }
}

fn rule_schema(rule: &FieldRule) -> Value {
    let mut schema = Map::new();
    schema.insert("title".into(), Value::String(rule.label.clone()));
    match &rule.validator {
        Validator::Text { pattern } => {
            schema.insert("type".into(), Value::String("string".into()));
            if let Some(pattern) = pattern {
                schema.insert("pattern".into(), Value::String(pattern.as_str().into()));
            }
        }
        Validator::Number { min, max } => {
            // Raw input may still be the text the user typed.
            schema.insert("type".into(), serde_json::json!(["number", "string"]));
            if let Some(min) = min {
                schema.insert("minimum".into(), number_value(*min));
            }
            if let Some(max) = max {
                schema.insert("maximum".into(), number_value(*max));
            }
        }
        Validator::Date => {
            schema.insert("type".into(), Value::String("string".into()));
            schema.insert("format".into(), Value::String("date".into()));
        }
        Validator::Choice { options } => {
            schema.insert("type".into(), Value::String("string".into()));
            if let Some(options) = options {
                schema.insert("enum".into(), option_values(options));
            }
        }
        Validator::MultiChoice { options } => {
            schema.insert("type".into(), Value::String("array".into()));
            let mut items = Map::new();
            items.insert("type".into(), Value::String("string".into()));
            if let Some(options) = options {
                items.insert("enum".into(), option_values(options));
            }
            schema.insert("items".into(), Value::Object(items));
            if rule.required {
                schema.insert("minItems".into(), Value::from(1));
            }
        }
    }
    if !rule.visible {
        schema.insert("x-hidden".into(), Value::Bool(true));
    }
    Value::Object(schema)
}

fn option_values(options: &[FieldOption]) -> Value {
    Value::Array(
        options
            .iter()
            .map(|option| Value::String(option.value().to_string()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::flatten_values;
    use serde_json::json;

    fn fields(value: Value) -> Vec<Field> {
        serde_json::from_value(value).expect("fields")
    }

    fn health() -> Vec<Field> {
        fields(json!([
            { "id": "gender", "type": "radio", "label": "Gender", "required": true, "options": ["male", "female"] },
            {
                "id": "pregnancy",
                "type": "radio",
                "label": "Pregnant?",
                "required": true,
                "options": ["yes", "no"],
                "visibility": { "dependsOn": "gender", "condition": "equals", "value": "female" }
            }
        ]))
    }

    #[test]
    fn requiredness_follows_visibility() {
        let fields = health();
        let male = generate(&fields, &flatten_values(&json!({ "gender": "male" })));
        let rule = male.rule("pregnancy").expect("rule");
        assert!(rule.declared_required);
        assert!(!rule.visible);
        assert!(!rule.required);

        let female = generate(&fields, &flatten_values(&json!({ "gender": "female" })));
        assert!(female.rule("pregnancy").expect("rule").required);
        assert_ne!(male, female);
    }

    #[test]
    fn picks_validator_by_kind() {
        let fields = fields(json!([
            { "id": "t", "type": "text", "label": "T", "validation": { "pattern": "^[A-Z]+$" } },
            { "id": "n", "type": "number", "label": "N", "validation": { "min": 1, "max": "current_year" } },
            { "id": "d", "type": "date", "label": "D" },
            { "id": "c", "type": "checkbox", "label": "C", "options": ["a", "b"] },
            {
                "id": "s", "type": "select", "label": "S",
                "dynamicOptions": { "dependsOn": "t", "endpoint": "api/options" }
            }
        ]));
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).expect("date");
        let schema = SchemaBuilder::new()
            .with_today(today)
            .build(&fields, &FormValues::new());

        assert!(matches!(
            &schema.rule("t").unwrap().validator,
            Validator::Text { pattern: Some(p) } if p.as_str() == "^[A-Z]+$"
        ));
        assert_eq!(
            schema.rule("n").unwrap().validator,
            Validator::Number { min: Some(1.0), max: Some(2026.0) }
        );
        assert_eq!(schema.rule("d").unwrap().validator, Validator::Date);
        assert!(matches!(
            schema.rule("c").unwrap().validator,
            Validator::MultiChoice { options: Some(_) }
        ));
        assert_eq!(
            schema.rule("s").unwrap().validator,
            Validator::Choice { options: None }
        );
    }

    #[test]
    fn resolved_options_constrain_dynamic_selects() {
        let fields = fields(json!([
            { "id": "country", "type": "text", "label": "Country" },
            {
                "id": "state", "type": "select", "label": "State",
                "dynamicOptions": { "dependsOn": "country", "endpoint": "api/states" }
            }
        ]));
        let sets = OptionSets::from([("state".to_string(), vec![FieldOption::from("CA")])]);
        let schema = SchemaBuilder::new()
            .with_options(&sets)
            .build(&fields, &FormValues::new());
        assert_eq!(
            schema.rule("state").unwrap().validator,
            Validator::Choice { options: Some(vec![FieldOption::from("CA")]) }
        );
    }

    #[test]
    fn json_schema_lists_hidden_fields_as_optional() {
        let fields = health();
        let schema = generate(&fields, &flatten_values(&json!({ "gender": "male" })));
        let json = schema.to_json_schema();
        let props = json["properties"].as_object().expect("properties");
        assert!(props.contains_key("pregnancy"));
        assert_eq!(props["pregnancy"]["x-hidden"], true);
        let required = json["required"].as_array().expect("required");
        assert!(required.iter().any(|id| id == "gender"));
        assert!(!required.iter().any(|id| id == "pregnancy"));
    }
}
