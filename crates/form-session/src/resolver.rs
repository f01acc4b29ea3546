use serde_json::Value;

use form_spec::values::{is_empty_value, present};
use form_spec::{DynamicOptions, Field, FieldOption, FormValues, OptionSource};

use crate::error::LookupError;
use crate::lookup::{LookupRequest, OptionLookup};

/// The dependency value a dynamic select is resolved against, if answered.
pub fn dependency_token(descriptor: &DynamicOptions, values: &FormValues) -> Option<Value> {
    present(values, &descriptor.depends_on)
        .filter(|value| !is_empty_value(value))
        .cloned()
}

/// Options for a choice field under the given values.
///
/// Static lists come back unchanged. A dynamic select with an unanswered
/// dependency yields no options without calling `lookup`; lookup failures are
/// logged and also yield no options.
pub async fn resolve_options(
    field: &Field,
    values: &FormValues,
    lookup: &dyn OptionLookup,
) -> Vec<FieldOption> {
    let descriptor = match field.option_source() {
        None => return Vec::new(),
        Some(OptionSource::Static(options)) => return options.to_vec(),
        Some(OptionSource::Dynamic(descriptor)) => descriptor,
    };
    let Some(token) = dependency_token(descriptor, values) else {
        return Vec::new();
    };
    let request = LookupRequest::new(descriptor, token);
    match lookup.lookup(&request).await {
        Ok(options) => options,
        Err(err) => {
            tracing::warn!(
                field = field.id(),
                endpoint = %request.endpoint,
                error = %err,
                "option lookup failed; showing no options"
            );
            Vec::new()
        }
    }
}

/// Option list of one dynamic select inside a session.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OptionState {
    /// Nothing requested: the dependency is unanswered or the field hidden.
    #[default]
    Idle,
    /// A lookup for `token` is in flight; the input should be disabled.
    Pending { token: Value, generation: u64 },
    Ready {
        token: Value,
        options: Vec<FieldOption>,
    },
    /// The lookup for `token` failed; the field offers no options.
    Failed { token: Value, error: String },
}

impl OptionState {
    /// Dependency value this state was produced for.
    pub fn token(&self) -> Option<&Value> {
        match self {
            OptionState::Idle => None,
            OptionState::Pending { token, .. }
            | OptionState::Ready { token, .. }
            | OptionState::Failed { token, .. } => Some(token),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, OptionState::Pending { .. })
    }

    pub fn options(&self) -> &[FieldOption] {
        match self {
            OptionState::Ready { options, .. } => options,
            _ => &[],
        }
    }
}

/// A queued lookup, detached from the session so it can run on any task.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionTask {
    pub field_id: String,
    pub token: Value,
    pub generation: u64,
    pub request: LookupRequest,
}

impl ResolutionTask {
    pub async fn run(self, lookup: &dyn OptionLookup) -> ResolutionOutcome {
        tracing::debug!(
            field = %self.field_id,
            endpoint = %self.request.endpoint,
            value = %self.request.value_text(),
            "resolving options"
        );
        let result = lookup.lookup(&self.request).await;
        ResolutionOutcome {
            field_id: self.field_id,
            token: self.token,
            generation: self.generation,
            result,
        }
    }
}

/// A finished lookup, to be handed back to the session that queued it.
#[derive(Debug)]
pub struct ResolutionOutcome {
    pub field_id: String,
    pub token: Value,
    pub generation: u64,
    pub result: Result<Vec<FieldOption>, LookupError>,
}
