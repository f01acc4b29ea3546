use chrono::{Datelike, Local};
use serde_json::{Value, json};

use form_spec::{
    FormConfig, FormValues, OptionSets, derive, find_form, flatten_values, generate,
    parse_catalog, validate,
};

fn fixture(name: &str) -> &'static str {
    match name {
        "insurance_forms" => include_str!("../tests/fixtures/insurance_forms.json"),
        _ => panic!("unknown fixture {}", name),
    }
}

fn form(form_id: &str) -> FormConfig {
    let forms = parse_catalog(fixture("insurance_forms")).expect("fixture parses and checks");
    find_form(&forms, form_id).expect("form present").clone()
}

fn values(value: Value) -> FormValues {
    flatten_values(&value)
}

#[test]
fn hidden_pregnancy_question_is_not_required() {
    let form = form("health-insurance");
    let answers = values(json!({ "name": "Sam", "age": "40", "gender": "male" }));
    let schema = generate(form.top_level_fields(), &answers);

    let rule = schema.rule("pregnancy").expect("rule");
    assert!(rule.declared_required);
    assert!(!rule.visible);
    assert!(!rule.required);

    let result = schema.validate(&answers);
    assert!(result.valid, "{result:?}");
}

#[test]
fn visible_pregnancy_question_must_be_answered() {
    let form = form("health-insurance");
    let answers = values(json!({ "name": "Sam", "age": "40", "gender": "female" }));

    let result = validate(&form, &answers);
    assert!(!result.valid);
    assert_eq!(result.missing_required, vec!["pregnancy"]);
    let error = result.error_for("pregnancy").expect("pregnancy error");
    assert_eq!(error.code, "required");
    assert_eq!(error.message, "Are you currently pregnant? is required");
}

#[test]
fn nested_vehicle_year_honours_bounds() {
    let form = form("car-insurance");
    let this_year = Local::now().year();

    let too_old = values(json!({
        "name": "Sam",
        "vehicle": { "make": "Ford", "model": "T", "year": "1899" }
    }));
    let result = validate(&form, &too_old);
    let error = result.error_for("vehicle.year").expect("year error");
    assert_eq!(error.code, "min");
    assert_eq!(error.path, "/vehicle/year");
    assert_eq!(error.message, "Year must be at least 1950");

    let future = values(json!({
        "name": "Sam",
        "vehicle": { "make": "Tesla", "model": "Next", "year": this_year + 1 }
    }));
    let result = validate(&form, &future);
    let error = result.error_for("vehicle.year").expect("year error");
    assert_eq!(error.code, "max");
    assert_eq!(error.message, format!("Year must be at most {this_year}"));

    let current = values(json!({
        "name": "Sam",
        "vehicle": { "make": "Tesla", "model": "Now", "year": this_year.to_string() }
    }));
    assert!(validate(&form, &current).valid);
}

#[test]
fn submission_values_exclude_hidden_fields() {
    let form = form("health-insurance");
    let answers = values(json!({
        "name": "Sam",
        "age": "40",
        "gender": "male",
        "pregnancy": "no",
        "existing-conditions": ["asthma"],
        "medication": "inhaler",
        "last-checkup": "2024-05-01"
    }));
    let schema = generate(form.top_level_fields(), &answers);
    let cleaned = schema.apply(&answers).expect("valid submission");

    let keys: Vec<_> = cleaned.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec!["age", "existing-conditions", "gender", "last-checkup", "name"]
    );
    assert_eq!(cleaned["age"], json!(40));
}

#[test]
fn zip_pattern_uses_custom_message() {
    let form = form("home-insurance");
    let answers = values(json!({ "address": { "street": "1 Main St", "zip": "ABCDE" } }));
    let result = validate(&form, &answers);
    let error = result.error_for("address.zip").expect("zip error");
    assert_eq!(error.code, "pattern_mismatch");
    assert_eq!(error.message, "Please enter a valid ZIP code");
}

#[test]
fn generation_is_idempotent() {
    let form = form("home-insurance");
    let answers = values(json!({ "state": "CA", "has-security": "yes" }));
    let sets = OptionSets::new();
    assert_eq!(derive(&form, &answers, &sets), derive(&form, &answers, &sets));
}

#[test]
fn json_schema_tracks_visibility() {
    let form = form("home-insurance");
    let without = generate(form.top_level_fields(), &values(json!({ "has-security": "no" })))
        .to_json_schema();
    let with = generate(form.top_level_fields(), &values(json!({ "has-security": "yes" })))
        .to_json_schema();

    let required = |schema: &Value| {
        schema["required"]
            .as_array()
            .expect("required")
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect::<Vec<_>>()
    };
    assert!(!required(&without).contains(&"security-type".to_string()));
    assert!(required(&with).contains(&"security-type".to_string()));
    assert_eq!(with["properties"]["address.zip"]["type"], "string");
}
