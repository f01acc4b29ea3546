use chrono::{Datelike, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of field kinds understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Textarea,
    Number,
    Date,
    Select,
    Radio,
    Checkbox,
    Group,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Textarea => "textarea",
            FieldKind::Number => "number",
            FieldKind::Date => "date",
            FieldKind::Select => "select",
            FieldKind::Radio => "radio",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Group => "group",
        }
    }
}

/// A single data-described form field, tagged by its `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Field {
    Text(TextField),
    Textarea(TextField),
    Number(NumberField),
    Date(DateField),
    Select(SelectField),
    Radio(ChoiceField),
    Checkbox(ChoiceField),
    Group(GroupField),
}

/// Attributes shared by every field kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldBase {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<VisibilityCondition>,
    /// Further conditions; the field shows only when all of them hold.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<VisibilityCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TextField {
    #[serde(flatten)]
    pub base: FieldBase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<TextRules>,
}

/// Format rules for free-text input.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct TextRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NumberField {
    #[serde(flatten)]
    pub base: FieldBase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<NumericRules>,
}

/// Inclusive numeric bounds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct NumericRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<NumericBound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<NumericBound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A bound is either a literal or resolved against the calendar when the
/// schema is generated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum NumericBound {
    Fixed(f64),
    Relative(RelativeBound),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum RelativeBound {
    #[serde(rename = "current_year", alias = "currentYear")]
    CurrentYear,
}

impl NumericBound {
    pub fn resolve(&self, today: NaiveDate) -> f64 {
        match self {
            NumericBound::Fixed(value) => *value,
            NumericBound::Relative(RelativeBound::CurrentYear) => f64::from(today.year()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DateField {
    #[serde(flatten)]
    pub base: FieldBase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectField {
    #[serde(flatten)]
    pub base: FieldBase,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_options: Option<DynamicOptions>,
}

/// Radio and checkbox fields always carry a static option list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChoiceField {
    #[serde(flatten)]
    pub base: FieldBase,
    #[serde(default)]
    pub options: Vec<FieldOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GroupField {
    #[serde(flatten)]
    pub base: FieldBase,
    pub fields: Vec<Field>,
}

/// Option entry; a bare string uses the same text for label and value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum FieldOption {
    Plain(String),
    Labeled { label: String, value: String },
}

impl FieldOption {
    pub fn labeled(label: impl Into<String>, value: impl Into<String>) -> Self {
        FieldOption::Labeled {
            label: label.into(),
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        match self {
            FieldOption::Plain(value) => value,
            FieldOption::Labeled { value, .. } => value,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            FieldOption::Plain(value) => value,
            FieldOption::Labeled { label, .. } => label,
        }
    }
}

impl From<&str> for FieldOption {
    fn from(value: &str) -> Self {
        FieldOption::Plain(value.to_string())
    }
}

/// Describes a remote lookup keyed by another field's value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DynamicOptions {
    pub depends_on: String,
    pub endpoint: String,
    #[serde(default)]
    pub method: FetchMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum FetchMethod {
    #[default]
    #[serde(alias = "get")]
    Get,
    #[serde(alias = "post")]
    Post,
}

/// Makes a field's display contingent on another field's current value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityCondition {
    #[serde(alias = "field")]
    pub depends_on: String,
    #[serde(alias = "operator")]
    pub condition: Condition,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Condition {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    /// Any condition name this build does not recognise.
    #[serde(other)]
    Unknown,
}

/// Where a choice field takes its options from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptionSource<'a> {
    Static(&'a [FieldOption]),
    Dynamic(&'a DynamicOptions),
}

impl Field {
    pub fn base(&self) -> &FieldBase {
        match self {
            Field::Text(field) | Field::Textarea(field) => &field.base,
            Field::Number(field) => &field.base,
            Field::Date(field) => &field.base,
            Field::Select(field) => &field.base,
            Field::Radio(field) | Field::Checkbox(field) => &field.base,
            Field::Group(field) => &field.base,
        }
    }

    pub fn id(&self) -> &str {
        &self.base().id
    }

    pub fn label(&self) -> &str {
        &self.base().label
    }

    pub fn required(&self) -> bool {
        self.base().required
    }

    pub fn placeholder(&self) -> Option<&str> {
        self.base().placeholder.as_deref()
    }

    /// Every condition gating this field itself, `visibility` first.
    pub fn conditions(&self) -> impl Iterator<Item = &VisibilityCondition> {
        let base = self.base();
        base.visibility.iter().chain(&base.conditions)
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Field::Text(_) => FieldKind::Text,
            Field::Textarea(_) => FieldKind::Textarea,
            Field::Number(_) => FieldKind::Number,
            Field::Date(_) => FieldKind::Date,
            Field::Select(_) => FieldKind::Select,
            Field::Radio(_) => FieldKind::Radio,
            Field::Checkbox(_) => FieldKind::Checkbox,
            Field::Group(_) => FieldKind::Group,
        }
    }

    /// Child fields of a group; `None` for every leaf kind.
    pub fn children(&self) -> Option<&[Field]> {
        match self {
            Field::Group(group) => Some(&group.fields),
            _ => None,
        }
    }

    pub fn option_source(&self) -> Option<OptionSource<'_>> {
        match self {
            Field::Select(select) => Some(match &select.dynamic_options {
                Some(dynamic) => OptionSource::Dynamic(dynamic),
                None => OptionSource::Static(&select.options),
            }),
            Field::Radio(choice) | Field::Checkbox(choice) => {
                Some(OptionSource::Static(&choice.options))
            }
            _ => None,
        }
    }

    pub fn dynamic_options(&self) -> Option<&DynamicOptions> {
        match self {
            Field::Select(select) => select.dynamic_options.as_ref(),
            _ => None,
        }
    }
}
