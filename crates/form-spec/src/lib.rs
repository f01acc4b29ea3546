//! Data-described forms: a closed field model, visibility rules evaluated
//! against live values, and validation schemas re-derived from both.

pub mod check;
pub mod derive;
pub mod messages;
pub mod progress;
pub mod render;
pub mod schema;
pub mod spec;
pub mod tree;
pub mod validate;
pub mod values;
pub mod visibility;

pub use check::{SpecError, check, parse_catalog};
pub use derive::{Derivation, derive, derive_on};
pub use progress::{Progress, next_field, progress};
pub use render::{
    RenderField, RenderPayload, RenderStatus, build_render_payload, render_json_ui, render_text,
};
pub use schema::{FieldRule, OptionSets, SchemaBuilder, ValidationSchema, Validator, generate};
pub use spec::{
    Condition, DynamicOptions, FetchMethod, Field, FieldKind, FieldOption, FormCatalog, FormConfig,
    OptionSource, VisibilityCondition, catalog_schema, find_form,
};
pub use tree::{FlatField, SEPARATOR, flatten, lookup};
pub use validate::{ValidationError, ValidationResult, validate};
pub use values::{FormValues, flatten_values, initial_values, is_empty_value, nest_values};
pub use visibility::{VisibilityMap, is_leaf_visible, is_visible, resolve_visibility};
