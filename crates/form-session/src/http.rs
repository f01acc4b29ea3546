use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use form_spec::values::nest_values;
use form_spec::{FetchMethod, FieldOption, FormConfig, FormValues};

use crate::error::{LookupError, SinkError, SourceError};
use crate::lookup::{LookupRequest, OptionLookup, parse_options};
use crate::sink::SubmissionSink;
use crate::source::{ConfigSource, parse_forms};

/// Where the HTTP collaborators live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub forms_endpoint: String,
    pub submit_endpoint: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/".into(),
            timeout_secs: 10,
            forms_endpoint: "api/insurance/forms".into(),
            submit_endpoint: "api/insurance/forms/submit".into(),
        }
    }
}

/// One `reqwest` client serving as configuration source, option lookup and
/// submission sink. Endpoints are resolved against the base URL.
#[derive(Debug, Clone)]
pub struct HttpClient {
    settings: HttpSettings,
    http: Client,
}

impl HttpClient {
    pub fn new(settings: HttpSettings) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self { settings, http })
    }

    pub fn settings(&self) -> &HttpSettings {
        &self.settings
    }

    /// Joins `endpoint` onto the base URL; the base always acts as a directory.
    pub fn url(&self, endpoint: &str) -> Option<Url> {
        let mut base = self.settings.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        Url::parse(&base)
            .and_then(|base| base.join(endpoint.trim_start_matches('/')))
            .ok()
    }
}

fn status_error(response: &Response) -> Option<u16> {
    let status = response.status();
    (!status.is_success()).then_some(status.as_u16())
}

#[async_trait]
impl ConfigSource for HttpClient {
    async fn load_forms(&self) -> Result<Vec<FormConfig>, SourceError> {
        let endpoint = &self.settings.forms_endpoint;
        let url = self
            .url(endpoint)
            .ok_or_else(|| SourceError::InvalidEndpoint(endpoint.clone()))?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(SourceError::Transport)?;
        if let Some(status) = status_error(&response) {
            return Err(SourceError::Status(status));
        }
        let body = response.text().await.map_err(SourceError::Transport)?;
        let forms = parse_forms(&body)?;
        tracing::info!(forms = forms.len(), "fetched form configuration");
        Ok(forms)
    }
}

#[async_trait]
impl OptionLookup for HttpClient {
    async fn lookup(&self, request: &LookupRequest) -> Result<Vec<FieldOption>, LookupError> {
        let mut url = self
            .url(&request.endpoint)
            .ok_or_else(|| LookupError::InvalidEndpoint(request.endpoint.clone()))?;
        let builder = match request.method {
            FetchMethod::Get => {
                url.query_pairs_mut()
                    .append_pair(&request.depends_on, &request.value_text());
                self.http.get(url)
            }
            FetchMethod::Post => {
                let mut body = Map::new();
                body.insert(request.depends_on.clone(), request.value.clone());
                self.http.post(url).json(&Value::Object(body))
            }
        };
        let response = builder.send().await.map_err(LookupError::Transport)?;
        if let Some(status) = status_error(&response) {
            return Err(LookupError::Status(status));
        }
        let payload: Value = response
            .json()
            .await
            .map_err(|err| LookupError::MalformedPayload(err.to_string()))?;
        parse_options(payload)
    }
}

#[async_trait]
impl SubmissionSink for HttpClient {
    async fn submit(&self, form_id: &str, values: &FormValues) -> Result<String, SinkError> {
        let endpoint = &self.settings.submit_endpoint;
        let url = self
            .url(endpoint)
            .ok_or_else(|| SinkError::InvalidEndpoint(endpoint.clone()))?;
        let response = self
            .http
            .post(url)
            .json(&json!({ "formId": form_id, "data": nest_values(values) }))
            .send()
            .await
            .map_err(SinkError::Transport)?;
        if let Some(status) = status_error(&response) {
            return Err(SinkError::Status(status));
        }
        let payload: Value = response
            .json()
            .await
            .map_err(|err| SinkError::MalformedResponse(err.to_string()))?;
        submission_id(&payload)
    }
}

fn submission_id(payload: &Value) -> Result<String, SinkError> {
    match payload.get("id") {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(SinkError::MalformedResponse(
            "response carries no submission id".into(),
        )),
    }
}
