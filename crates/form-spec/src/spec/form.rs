use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::field::Field;

/// Named grouping of top-level fields. Section ids never prefix field ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormSection {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// Top-level form definition, immutable for the lifetime of an editing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormConfig {
    #[serde(rename = "formId", alias = "id")]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<FormSection>,
}

impl FormConfig {
    /// Top-level fields in display order: loose fields first, then each section.
    pub fn top_level_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields
            .iter()
            .chain(self.sections.iter().flat_map(|section| section.fields.iter()))
    }
}

/// A configuration document holds either one form or an ordered list of forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum FormCatalog {
    Many(Vec<FormConfig>),
    One(Box<FormConfig>),
}

impl FormCatalog {
    pub fn into_forms(self) -> Vec<FormConfig> {
        match self {
            FormCatalog::Many(forms) => forms,
            FormCatalog::One(form) => vec![*form],
        }
    }
}

pub fn find_form<'a>(forms: &'a [FormConfig], form_id: &str) -> Option<&'a FormConfig> {
    forms.iter().find(|form| form.id == form_id)
}

/// JSON Schema of a configuration document.
pub fn catalog_schema() -> schemars::Schema {
    schemars::schema_for!(FormCatalog)
}
