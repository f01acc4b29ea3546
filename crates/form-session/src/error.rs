use std::path::PathBuf;

use thiserror::Error;

use form_spec::SpecError;

/// Failures of a configuration source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read form configuration from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse form configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("configuration request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("configuration service answered with status {0}")]
    Status(u16),
    #[error("invalid configuration endpoint '{0}'")]
    InvalidEndpoint(String),
}

/// Failures of an option lookup. The resolver logs these and reports an empty
/// option list instead of raising them.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("option lookup failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("option lookup answered with status {0}")]
    Status(u16),
    #[error("option lookup returned an unexpected payload: {0}")]
    MalformedPayload(String),
    #[error("invalid option endpoint '{0}'")]
    InvalidEndpoint(String),
}

/// Failures of a submission sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("submission request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("submission service answered with status {0}")]
    Status(u16),
    #[error("submission service returned an unexpected payload: {0}")]
    MalformedResponse(String),
    #[error("invalid submission endpoint '{0}'")]
    InvalidEndpoint(String),
    #[error("submission rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to load form configuration: {0}")]
    ConfigurationLoad(#[from] SourceError),
    #[error("form '{0}' is not available")]
    FormNotFound(String),
    #[error("form configuration is invalid: {0}")]
    InvalidConfig(#[from] SpecError),
    #[error("field '{0}' is not part of this form")]
    UnknownField(String),
    #[error("session is {0}; the operation needs a ready session")]
    NotReady(&'static str),
    #[error("submission failed: {0}")]
    Submission(#[from] SinkError),
}
