use std::path::{Path, PathBuf};

use async_trait::async_trait;

use form_spec::{FormCatalog, FormConfig};

use crate::error::SourceError;

/// Supplies the ordered list of form configurations.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn load_forms(&self) -> Result<Vec<FormConfig>, SourceError>;
}

/// Parses a configuration document holding one form or a list of forms.
pub fn parse_forms(json: &str) -> Result<Vec<FormConfig>, SourceError> {
    let catalog: FormCatalog = serde_json::from_str(json)?;
    Ok(catalog.into_forms())
}

/// Forms already in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigSource {
    forms: Vec<FormConfig>,
}

impl StaticConfigSource {
    pub fn new(forms: Vec<FormConfig>) -> Self {
        Self { forms }
    }

    pub fn from_json(json: &str) -> Result<Self, SourceError> {
        parse_forms(json).map(Self::new)
    }
}

#[async_trait]
impl ConfigSource for StaticConfigSource {
    async fn load_forms(&self) -> Result<Vec<FormConfig>, SourceError> {
        Ok(self.forms.clone())
    }
}

/// Reads the configuration document from disk on every load.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn load_forms(&self) -> Result<Vec<FormConfig>, SourceError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })?;
        let forms = parse_forms(&contents)?;
        tracing::debug!(path = %self.path.display(), forms = forms.len(), "loaded form configuration");
        Ok(forms)
    }
}
