use std::collections::BTreeSet;

use serde_json::{Map, Value, json};

use crate::derive::Derivation;
use crate::progress::{Progress, next_field, progress};
use crate::schema::{FieldRule, Validator};
use crate::spec::field::{FieldKind, FieldOption};
use crate::spec::form::FormConfig;
use crate::validate::ValidationResult;
use crate::values::{FormValues, value_to_display};

/// Status labels returned by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// More input is required.
    NeedInput,
    /// All visible fields are filled.
    Complete,
    /// The last submission attempt reported errors.
    Error,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::NeedInput => "need_input",
            RenderStatus::Complete => "complete",
            RenderStatus::Error => "error",
        }
    }
}

/// Describes a single field for render outputs.
#[derive(Debug, Clone)]
pub struct RenderField {
    pub id: String,
    pub label: String,
    pub kind: FieldKind,
    pub placeholder: Option<String>,
    pub required: bool,
    pub visible: bool,
    /// Options are being fetched; the input should be disabled.
    pub busy: bool,
    pub current_value: Option<Value>,
    pub options: Option<Vec<FieldOption>>,
    pub error: Option<String>,
}

/// Collected payload used by both text and JSON renderers.
#[derive(Debug, Clone)]
pub struct RenderPayload {
    pub form_id: String,
    pub form_title: String,
    pub status: RenderStatus,
    pub next_field_id: Option<String>,
    pub progress: Progress,
    pub help: Option<String>,
    pub fields: Vec<RenderField>,
    pub schema: Value,
}

impl RenderPayload {
    /// Flags fields whose option lists are still being resolved.
    pub fn mark_busy(&mut self, busy: &BTreeSet<String>) {
        for field in &mut self.fields {
            field.busy = busy.contains(&field.id);
        }
    }

    /// Attaches per-field error messages from a failed validation.
    pub fn annotate(&mut self, result: &ValidationResult) {
        for field in &mut self.fields {
            field.error = result
                .error_for(&field.id)
                .map(|error| error.message.clone());
        }
        if !result.valid {
            self.status = RenderStatus::Error;
        }
    }

    pub fn field(&self, id: &str) -> Option<&RenderField> {
        self.fields.iter().find(|field| field.id == id)
    }
}

/// Build the renderer payload from the form, the current values and their
/// derivation.
pub fn build_render_payload(
    form: &FormConfig,
    values: &FormValues,
    derivation: &Derivation,
) -> RenderPayload {
    let schema = &derivation.schema;
    let next_field_id = next_field(schema, values).map(str::to_string);
    let status = if next_field_id.is_some() {
        RenderStatus::NeedInput
    } else {
        RenderStatus::Complete
    };

    let fields = schema
        .rules()
        .iter()
        .map(|rule| RenderField {
            id: rule.id.clone(),
            label: rule.label.clone(),
            kind: rule.kind,
            placeholder: rule.placeholder.clone(),
            required: rule.required,
            visible: rule.visible,
            busy: false,
            current_value: values.get(&rule.id).cloned(),
            options: rule_options(rule),
            error: None,
        })
        .collect();

    RenderPayload {
        form_id: form.id.clone(),
        form_title: form.title.clone(),
        status,
        next_field_id,
        progress: progress(schema, values),
        help: form.description.clone(),
        fields,
        schema: schema.to_json_schema(),
    }
}

fn rule_options(rule: &FieldRule) -> Option<Vec<FieldOption>> {
    match &rule.validator {
        Validator::Choice { options } | Validator::MultiChoice { options } => options.clone(),
        _ => None,
    }
}

/// Render the payload as a structured JSON-friendly value.
pub fn render_json_ui(payload: &RenderPayload) -> Value {
    let fields = payload
        .fields
        .iter()
        .map(|field| {
            let mut map = Map::new();
            map.insert("id".into(), Value::String(field.id.clone()));
            map.insert("label".into(), Value::String(field.label.clone()));
            map.insert("type".into(), Value::String(field.kind.as_str().into()));
            if let Some(placeholder) = &field.placeholder {
                map.insert("placeholder".into(), Value::String(placeholder.clone()));
            }
            map.insert("required".into(), Value::Bool(field.required));
            map.insert("visible".into(), Value::Bool(field.visible));
            map.insert("busy".into(), Value::Bool(field.busy));
            if let Some(current_value) = &field.current_value {
                map.insert("current_value".into(), current_value.clone());
            }
            if let Some(options) = &field.options {
                map.insert(
                    "options".into(),
                    Value::Array(
                        options
                            .iter()
                            .map(|option| json!({ "label": option.label(), "value": option.value() }))
                            .collect(),
                    ),
                );
            }
            if let Some(error) = &field.error {
                map.insert("error".into(), Value::String(error.clone()));
            }
            Value::Object(map)
        })
        .collect::<Vec<_>>();

    json!({
        "form_id": payload.form_id,
        "form_title": payload.form_title,
        "status": payload.status.as_str(),
        "next_field_id": payload.next_field_id,
        "progress": {
            "answered": payload.progress.answered,
            "total": payload.progress.total,
        },
        "help": payload.help,
        "fields": fields,
        "schema": payload.schema,
    })
}

/// Render the payload as human-friendly text.
pub fn render_text(payload: &RenderPayload) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Form: {} ({})", payload.form_title, payload.form_id));
    lines.push(format!(
        "Status: {} ({}/{})",
        payload.status.as_str(),
        payload.progress.answered,
        payload.progress.total
    ));
    if let Some(help) = &payload.help {
        lines.push(format!("Help: {}", help));
    }

    match &payload.next_field_id {
        Some(next) => lines.push(format!("Next field: {}", next)),
        None => lines.push("All visible fields are filled.".to_string()),
    }

    lines.push("Visible fields:".to_string());
    for field in payload.fields.iter().filter(|field| field.visible) {
        let mut entry = format!(" - {} ({})", field.id, field.label);
        if field.required {
            entry.push_str(" [required]");
        }
        if field.busy {
            entry.push_str(" [loading options]");
        }
        if let Some(current_value) = &field.current_value {
            entry.push_str(&format!(" = {}", value_to_display(current_value)));
        }
        lines.push(entry);
        if let Some(error) = &field.error {
            lines.push(format!("   ! {}", error));
        }
    }

    lines.join("\n")
}
