use serde_json::Value;

use form_session::SubmissionRecord;
use form_spec::messages::number_value;
use form_spec::{FieldKind, FieldOption, Progress, RenderField, RenderPayload, RenderStatus};

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: field prompts only.
    Clean,
    /// Verbose output: status, visible fields, error details, help text.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints prompts and progress while a form is being filled.
pub struct WizardPresenter {
    verbosity: Verbosity,
    header_printed: bool,
    show_values_json: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity, show_values_json: bool) -> Self {
        Self {
            verbosity,
            header_printed: false,
            show_values_json,
        }
    }

    pub fn show_header(&mut self, payload: &RenderPayload) {
        if self.header_printed {
            return;
        }
        println!("Form: {}", payload.form_title);
        if self.verbosity.is_verbose()
            && let Some(help) = &payload.help
        {
            println!("Help: {}", help);
        }
        self.header_printed = true;
    }

    pub fn show_status(&self, payload: &RenderPayload) {
        if self.verbosity.is_verbose() {
            println!(
                "Status: {} ({}/{})",
                payload.status.as_str(),
                payload.progress.answered,
                payload.progress.total
            );
            self.print_visible_fields(payload);
        } else if payload.status == RenderStatus::NeedInput && payload.progress.total == 0 {
            println!("No visible fields are available; check the visibility conditions.");
        }
    }

    fn print_visible_fields(&self, payload: &RenderPayload) {
        println!("Visible fields:");
        for field in payload.fields.iter().filter(|field| field.visible) {
            let mut entry = format!(" - {} ({})", field.id, field.label);
            if field.required {
                entry.push_str(" [required]");
            }
            println!("{}", entry);
        }
    }

    pub fn show_prompt(&self, prompt: &PromptContext) {
        let mut line = if prompt.total > 0 {
            format!("{}/{} {}", prompt.index, prompt.total, prompt.label)
        } else {
            format!("{} {}", prompt.index, prompt.label)
        };
        if prompt.required {
            line.push_str(" *");
        }
        if let Some(hint) = &prompt.hint {
            line.push(' ');
            line.push_str(hint);
        }
        println!("{}", line);
        if let Some(error) = &prompt.error {
            println!("  ! {}", error);
        }
        if self.verbosity.is_verbose() && !prompt.choices.is_empty() {
            println!("Choices: {}", prompt.choices.join(", "));
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if let Some(debug) = &error.debug_message {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_completion(&self, record: &SubmissionRecord) {
        println!("Submitted ✅ (id {})", record.id);
        if self.show_values_json {
            match serde_json::to_string_pretty(record) {
                Ok(pretty) => println!("{}", pretty),
                Err(err) => eprintln!("Failed to serialize the submission: {}", err),
            }
        }
    }
}

/// Context used to format a single prompt.
pub struct PromptContext {
    pub index: usize,
    pub total: usize,
    pub label: String,
    pub required: bool,
    pub hint: Option<String>,
    pub choices: Vec<String>,
    pub error: Option<String>,
}

impl PromptContext {
    pub fn new(field: &RenderField, progress: &Progress) -> Self {
        let choices = field
            .options
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|option| option.value().to_string())
            .collect::<Vec<_>>();
        Self {
            index: (progress.answered + 1).max(1),
            total: progress.total,
            label: field.label.clone(),
            required: field.required,
            hint: hint(field.kind, &choices).or_else(|| {
                field
                    .placeholder
                    .as_ref()
                    .map(|placeholder| format!("(e.g. {placeholder})"))
            }),
            choices,
            error: field.error.clone(),
        }
    }
}

fn hint(kind: FieldKind, choices: &[String]) -> Option<String> {
    match kind {
        FieldKind::Number => Some("(number)".to_string()),
        FieldKind::Date => Some("(YYYY-MM-DD)".to_string()),
        FieldKind::Select | FieldKind::Radio if !choices.is_empty() => {
            Some(format!("({})", choices.join("/")))
        }
        FieldKind::Checkbox if !choices.is_empty() => {
            Some(format!("(comma separated: {})", choices.join(", ")))
        }
        FieldKind::Select | FieldKind::Radio | FieldKind::Checkbox => {
            Some("(no options available)".to_string())
        }
        _ => None,
    }
}

/// Error produced when parsing answers from the user.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}

/// Turns a typed line into a field value. `None` leaves an optional field
/// unanswered.
pub fn parse_answer(field: &RenderField, raw: &str) -> Result<Option<Value>, AnswerParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        if field.required {
            return Err(AnswerParseError::new("This field requires an answer.", None));
        }
        return Ok(None);
    }

    let options = field.options.as_deref().unwrap_or_default();
    let value = match field.kind {
        FieldKind::Number => parse_number(raw)?,
        FieldKind::Select | FieldKind::Radio => parse_choice(options, raw)?,
        FieldKind::Checkbox => parse_choices(options, raw)?,
        FieldKind::Text | FieldKind::Textarea | FieldKind::Date | FieldKind::Group => {
            Value::String(raw.to_string())
        }
    };
    Ok(Some(value))
}

fn parse_number(raw: &str) -> Result<Value, AnswerParseError> {
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(number_value)
        .ok_or_else(|| {
            AnswerParseError::new("Please enter a number.", Some("expected number".to_string()))
        })
}

fn parse_choice(options: &[FieldOption], raw: &str) -> Result<Value, AnswerParseError> {
    if options.is_empty() {
        return Err(AnswerParseError::new(
            "No options are available for this field.",
            None,
        ));
    }
    options
        .iter()
        .find(|option| {
            option.value().eq_ignore_ascii_case(raw) || option.label().eq_ignore_ascii_case(raw)
        })
        .map(|option| Value::String(option.value().to_string()))
        .ok_or_else(|| {
            let allowed = options
                .iter()
                .map(FieldOption::value)
                .collect::<Vec<_>>()
                .join(", ");
            AnswerParseError::new(
                format!("Choose one of: {}.", allowed),
                Some(format!("allowed values: {}", allowed)),
            )
        })
}

fn parse_choices(options: &[FieldOption], raw: &str) -> Result<Value, AnswerParseError> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| parse_choice(options, item))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(kind: FieldKind, required: bool, options: Option<Vec<FieldOption>>) -> RenderField {
        RenderField {
            id: "field".into(),
            label: "Field".into(),
            kind,
            placeholder: None,
            required,
            visible: true,
            busy: false,
            current_value: None,
            options,
            error: None,
        }
    }

    #[test]
    fn numbers_become_json_numbers() {
        let age = field(FieldKind::Number, true, None);
        assert_eq!(parse_answer(&age, "42").unwrap(), Some(json!(42)));
        assert_eq!(parse_answer(&age, "1.5").unwrap(), Some(json!(1.5)));
        assert!(parse_answer(&age, "forty").is_err());
    }

    #[test]
    fn choices_match_values_or_labels() {
        let gender = field(
            FieldKind::Radio,
            true,
            Some(vec![
                FieldOption::labeled("Male", "male"),
                FieldOption::labeled("Female", "female"),
            ]),
        );
        assert_eq!(parse_answer(&gender, "Female").unwrap(), Some(json!("female")));
        assert_eq!(parse_answer(&gender, "male").unwrap(), Some(json!("male")));
        assert!(parse_answer(&gender, "unknown").is_err());
    }

    #[test]
    fn checkbox_answers_are_comma_separated() {
        let conditions = field(
            FieldKind::Checkbox,
            false,
            Some(vec![FieldOption::from("diabetes"), FieldOption::from("asthma")]),
        );
        assert_eq!(
            parse_answer(&conditions, "asthma, diabetes").unwrap(),
            Some(json!(["asthma", "diabetes"]))
        );
    }

    #[test]
    fn blank_answers_skip_optional_fields_only() {
        assert_eq!(
            parse_answer(&field(FieldKind::Text, false, None), "  ").unwrap(),
            None
        );
        assert!(parse_answer(&field(FieldKind::Text, true, None), "").is_err());
    }

    #[test]
    fn selects_without_options_cannot_be_answered() {
        let city = field(FieldKind::Select, true, Some(Vec::new()));
        assert!(parse_answer(&city, "Paris").is_err());
    }
}
