use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use form_spec::values::value_to_display;
use form_spec::{DynamicOptions, FetchMethod, FieldOption};

use crate::error::LookupError;

/// One dependent-option lookup: which endpoint to ask and the dependency
/// value that parameterizes it.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupRequest {
    pub endpoint: String,
    pub method: FetchMethod,
    pub depends_on: String,
    pub value: Value,
}

impl LookupRequest {
    pub fn new(descriptor: &DynamicOptions, value: Value) -> Self {
        Self {
            endpoint: descriptor.endpoint.clone(),
            method: descriptor.method,
            depends_on: descriptor.depends_on.clone(),
            value,
        }
    }

    /// The dependency value as sent on the wire.
    pub fn value_text(&self) -> String {
        value_to_display(&self.value)
    }
}

/// Fetches the options of a dependent select. An empty list is a successful
/// answer; failures are reported as [`LookupError`].
#[async_trait]
pub trait OptionLookup: Send + Sync {
    async fn lookup(&self, request: &LookupRequest) -> Result<Vec<FieldOption>, LookupError>;
}

/// Accepts an array of options, or an object holding exactly one such array
/// (`{"states": [...]}`).
pub fn parse_options(payload: Value) -> Result<Vec<FieldOption>, LookupError> {
    let items = match payload {
        Value::Array(items) => items,
        Value::Object(map) => {
            let mut arrays = map.into_iter().filter_map(|(_, value)| match value {
                Value::Array(items) => Some(items),
                _ => None,
            });
            match (arrays.next(), arrays.next()) {
                (Some(items), None) => items,
                _ => {
                    return Err(LookupError::MalformedPayload(
                        "expected an object holding one option array".into(),
                    ));
                }
            }
        }
        other => {
            return Err(LookupError::MalformedPayload(format!(
                "expected an option array, got {other}"
            )));
        }
    };
    items.into_iter().map(parse_option).collect()
}

fn parse_option(item: Value) -> Result<FieldOption, LookupError> {
    match item {
        Value::Number(num) => Ok(FieldOption::Plain(num.to_string())),
        other => serde_json::from_value(other)
            .map_err(|err| LookupError::MalformedPayload(err.to_string())),
    }
}

/// Answers lookups from a fixed table keyed by endpoint, then dependency
/// value. Unknown keys resolve to no options.
#[derive(Debug, Clone, Default)]
pub struct StaticOptionLookup {
    table: BTreeMap<String, BTreeMap<String, Vec<FieldOption>>>,
}

impl StaticOptionLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `{"<endpoint>": {"<value>": [options...]}}`.
    pub fn from_json(json: &str) -> Result<Self, LookupError> {
        let table = serde_json::from_str(json)
            .map_err(|err| LookupError::MalformedPayload(err.to_string()))?;
        Ok(Self { table })
    }

    pub fn with(
        mut self,
        endpoint: impl Into<String>,
        value: impl Into<String>,
        options: Vec<FieldOption>,
    ) -> Self {
        self.table
            .entry(endpoint.into())
            .or_default()
            .insert(value.into(), options);
        self
    }
}

#[async_trait]
impl OptionLookup for StaticOptionLookup {
    async fn lookup(&self, request: &LookupRequest) -> Result<Vec<FieldOption>, LookupError> {
        Ok(self
            .table
            .get(&request.endpoint)
            .and_then(|by_value| by_value.get(&request.value_text()))
            .cloned()
            .unwrap_or_default())
    }
}
