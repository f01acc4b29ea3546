use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use thiserror::Error;

use crate::spec::field::Field;
use crate::spec::form::{FormCatalog, FormConfig};
use crate::tree::{SEPARATOR, flatten};

/// Structural problems in a form configuration.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("failed to parse form configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("field id '{0}' is used more than once")]
    DuplicateId(String),
    #[error("field id '{0}' is empty or contains the '.' separator")]
    InvalidId(String),
    #[error("field '{field}' depends on unknown field '{depends_on}'")]
    UnknownDependency { field: String, depends_on: String },
    #[error("visibility conditions form a cycle: {}", .0.join(" -> "))]
    VisibilityCycle(Vec<String>),
    #[error("field '{field}' has an invalid pattern: {source}")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },
}

/// Parses a configuration document holding one form or a list of forms and
/// checks each of them.
pub fn parse_catalog(json: &str) -> Result<Vec<FormConfig>, SpecError> {
    let catalog: FormCatalog = serde_json::from_str(json)?;
    let forms = catalog.into_forms();
    for form in &forms {
        check(form)?;
    }
    Ok(forms)
}

/// Verifies id uniqueness, dependency targets, acyclic visibility and patterns.
pub fn check(form: &FormConfig) -> Result<(), SpecError> {
    let top_level: Vec<&Field> = form.top_level_fields().collect();
    check_siblings(&top_level)?;

    let flat = flatten(top_level.iter().copied());
    let mut leaf_ids = BTreeSet::new();
    for leaf in &flat {
        if !leaf_ids.insert(leaf.id.as_str()) {
            return Err(SpecError::DuplicateId(leaf.id.clone()));
        }
    }

    let mut graph: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for leaf in &flat {
        let mut edges = Vec::new();
        for condition in leaf.conditions() {
            if !leaf_ids.contains(condition.depends_on.as_str()) {
                return Err(SpecError::UnknownDependency {
                    field: leaf.id.clone(),
                    depends_on: condition.depends_on.clone(),
                });
            }
            edges.push(condition.depends_on.as_str());
        }
        if let Some(dynamic) = leaf.field.dynamic_options()
            && !leaf_ids.contains(dynamic.depends_on.as_str())
        {
            return Err(SpecError::UnknownDependency {
                field: leaf.id.clone(),
                depends_on: dynamic.depends_on.clone(),
            });
        }
        if let Field::Text(text) | Field::Textarea(text) = leaf.field
            && let Some(pattern) = text.validation.as_ref().and_then(|rules| rules.pattern.as_ref())
        {
            Regex::new(pattern).map_err(|source| SpecError::InvalidPattern {
                field: leaf.id.clone(),
                source,
            })?;
        }
        graph.insert(leaf.id.as_str(), edges);
    }

    find_cycle(&graph).map_or(Ok(()), |cycle| Err(SpecError::VisibilityCycle(cycle)))
}

fn check_siblings(fields: &[&Field]) -> Result<(), SpecError> {
    let mut seen = BTreeSet::new();
    for field in fields {
        let id = field.id();
        if id.is_empty() || id.contains(SEPARATOR) {
            return Err(SpecError::InvalidId(id.to_string()));
        }
        if !seen.insert(id) {
            return Err(SpecError::DuplicateId(id.to_string()));
        }
        if let Some(children) = field.children() {
            check_siblings(&children.iter().collect::<Vec<_>>())?;
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

fn find_cycle<'a>(graph: &BTreeMap<&'a str, Vec<&'a str>>) -> Option<Vec<String>> {
    let mut marks: BTreeMap<&str, Mark> = BTreeMap::new();
    let mut stack = Vec::new();
    for &node in graph.keys() {
        if let Some(cycle) = visit(node, graph, &mut marks, &mut stack) {
            return Some(cycle);
        }
    }
    None
}

fn visit<'a>(
    node: &'a str,
    graph: &BTreeMap<&'a str, Vec<&'a str>>,
    marks: &mut BTreeMap<&'a str, Mark>,
    stack: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    match marks.get(node) {
        Some(Mark::Done) => return None,
        Some(Mark::Visiting) => {
            let start = stack.iter().position(|entry| *entry == node).unwrap_or(0);
            let mut cycle: Vec<String> = stack[start..].iter().map(|id| id.to_string()).collect();
            cycle.push(node.to_string());
            return Some(cycle);
        }
        None => {}
    }
    marks.insert(node, Mark::Visiting);
    stack.push(node);
    for &next in graph.get(node).into_iter().flatten() {
        if let Some(cycle) = visit(next, graph, marks, stack) {
            return Some(cycle);
        }
    }
    stack.pop();
    marks.insert(node, Mark::Done);
    None
}
