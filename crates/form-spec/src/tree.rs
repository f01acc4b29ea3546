use crate::spec::field::{Field, VisibilityCondition};

/// Joins ancestor group ids with a leaf id.
pub const SEPARATOR: &str = ".";

/// A leaf field together with its fully-qualified id.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatField<'a> {
    pub id: String,
    pub field: &'a Field,
    /// Visibility conditions of the enclosing groups, outermost first.
    pub inherited: Vec<&'a VisibilityCondition>,
}

impl<'a> FlatField<'a> {
    /// Every condition gating this leaf, ancestors first.
    pub fn conditions(&self) -> impl Iterator<Item = &'a VisibilityCondition> + '_ {
        self.inherited
            .iter()
            .copied()
            .chain(self.field.conditions())
    }
}

/// Flattens a field tree into its leaves, in declaration order. Groups are
/// structural and never emitted themselves.
pub fn flatten<'a>(fields: impl IntoIterator<Item = &'a Field>) -> Vec<FlatField<'a>> {
    let mut out = Vec::new();
    let mut inherited = Vec::new();
    for field in fields {
        flatten_into(field, "", &mut inherited, &mut out);
    }
    out
}

fn flatten_into<'a>(
    field: &'a Field,
    prefix: &str,
    inherited: &mut Vec<&'a VisibilityCondition>,
    out: &mut Vec<FlatField<'a>>,
) {
    let id = qualify(prefix, field.id());
    match field.children() {
        Some(children) => {
            let depth = inherited.len();
            inherited.extend(field.conditions());
            for child in children {
                flatten_into(child, &id, inherited, out);
            }
            inherited.truncate(depth);
        }
        None => out.push(FlatField {
            id,
            field,
            inherited: inherited.clone(),
        }),
    }
}

/// Finds the leaf with the given flattened id.
pub fn lookup<'a>(fields: impl IntoIterator<Item = &'a Field>, id: &str) -> Option<&'a Field> {
    flatten(fields)
        .into_iter()
        .find(|flat| flat.id == id)
        .map(|flat| flat.field)
}

pub fn qualify(prefix: &str, id: &str) -> String {
    if prefix.is_empty() {
        id.to_string()
    } else {
        format!("{prefix}{SEPARATOR}{id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vehicle_tree() -> Vec<Field> {
        serde_json::from_value(json!([
            { "id": "name", "type": "text", "label": "Name" },
            {
                "id": "vehicle",
                "type": "group",
                "label": "Vehicle",
                "visibility": { "dependsOn": "name", "condition": "notEquals", "value": "" },
                "fields": [
                    { "id": "make", "type": "text", "label": "Make" },
                    {
                        "id": "engine",
                        "type": "group",
                        "label": "Engine",
                        "fields": [ { "id": "cc", "type": "number", "label": "CC" } ]
                    }
                ]
            }
        ]))
        .expect("tree")
    }

    #[test]
    fn flatten_emits_leaves_with_qualified_ids() {
        let tree = vehicle_tree();
        let ids: Vec<_> = flatten(&tree).into_iter().map(|flat| flat.id).collect();
        assert_eq!(ids, vec!["name", "vehicle.make", "vehicle.engine.cc"]);
    }

    #[test]
    fn flatten_carries_group_conditions() {
        let tree = vehicle_tree();
        let flat = flatten(&tree);
        assert!(flat[0].inherited.is_empty());
        assert_eq!(flat[1].inherited.len(), 1);
        assert_eq!(flat[2].conditions().count(), 1);
    }

    #[test]
    fn condition_lists_are_all_carried() {
        let tree: Vec<Field> = serde_json::from_value(json!([
            {
                "id": "extras",
                "type": "group",
                "label": "Extras",
                "conditions": [
                    { "field": "age", "operator": "greaterThan", "value": 17 },
                    { "field": "country", "operator": "equals", "value": "US" }
                ],
                "fields": [
                    {
                        "id": "ssn",
                        "type": "text",
                        "label": "SSN",
                        "visibility": { "dependsOn": "consent", "condition": "equals", "value": "yes" }
                    }
                ]
            }
        ]))
        .expect("tree");
        let flat = flatten(&tree);
        assert_eq!(flat[0].inherited.len(), 2);
        let depends_on: Vec<_> = flat[0]
            .conditions()
            .map(|condition| condition.depends_on.as_str())
            .collect();
        assert_eq!(depends_on, vec!["age", "country", "consent"]);
    }

    #[test]
    fn lookup_finds_nested_leaf() {
        let tree = vehicle_tree();
        let field = lookup(&tree, "vehicle.engine.cc").expect("leaf");
        assert_eq!(field.label(), "CC");
        assert!(lookup(&tree, "vehicle").is_none());
        assert!(lookup(&tree, "cc").is_none());
    }
}
