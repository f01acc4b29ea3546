use chrono::NaiveDate;

use crate::schema::{OptionSets, SchemaBuilder, ValidationSchema};
use crate::spec::form::FormConfig;
use crate::values::FormValues;
use crate::visibility::VisibilityMap;

/// Everything that depends on a values snapshot: per-leaf visibility and the
/// schema whose requiredness follows it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Derivation {
    pub visibility: VisibilityMap,
    pub schema: ValidationSchema,
}

impl Derivation {
    pub fn is_visible(&self, id: &str) -> bool {
        self.visibility.get(id).copied().unwrap_or(false)
    }
}

/// Re-derives visibility and schema for `values`. Pure: the same inputs on the
/// same day always produce equal derivations.
pub fn derive(form: &FormConfig, values: &FormValues, options: &OptionSets) -> Derivation {
    derive_with(SchemaBuilder::new().with_options(options), form, values)
}

/// [`derive`] against a fixed calendar date.
pub fn derive_on(
    today: NaiveDate,
    form: &FormConfig,
    values: &FormValues,
    options: &OptionSets,
) -> Derivation {
    derive_with(
        SchemaBuilder::new().with_today(today).with_options(options),
        form,
        values,
    )
}

fn derive_with(builder: SchemaBuilder<'_>, form: &FormConfig, values: &FormValues) -> Derivation {
    let schema = builder.build(form.top_level_fields(), values);
    let visibility = schema
        .rules()
        .iter()
        .map(|rule| (rule.id.clone(), rule.visible))
        .collect();
    Derivation { visibility, schema }
}
