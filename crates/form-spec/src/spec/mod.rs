pub mod field;
pub mod form;

pub use field::{
    ChoiceField, Condition, DateField, DynamicOptions, FetchMethod, Field, FieldBase, FieldKind,
    FieldOption, GroupField, NumberField, NumericBound, NumericRules, OptionSource, RelativeBound,
    SelectField, TextField, TextRules, VisibilityCondition,
};
pub use form::{FormCatalog, FormConfig, FormSection, catalog_schema, find_form};
