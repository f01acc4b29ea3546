use std::collections::BTreeSet;

use serde_json::json;

use form_spec::{
    FieldOption, FormConfig, OptionSets, RenderStatus, build_render_payload, derive,
    find_form, flatten_values, initial_values, parse_catalog, render_json_ui, render_text,
    validate,
};

fn form(form_id: &str) -> FormConfig {
    let forms = parse_catalog(include_str!("fixtures/insurance_forms.json")).expect("fixture");
    find_form(&forms, form_id).expect("form present").clone()
}

#[test]
fn json_ui_lists_fields_with_visibility_and_progress() {
    let form = form("health-insurance");
    let values = flatten_values(&json!({ "name": "Sam", "gender": "female" }));
    let derivation = derive(&form, &values, &OptionSets::new());
    let payload = build_render_payload(&form, &values, &derivation);
    let ui = render_json_ui(&payload);

    assert_eq!(ui["form_id"], "health-insurance");
    assert_eq!(ui["status"], "need_input");
    assert_eq!(ui["next_field_id"], "age");
    assert_eq!(ui["progress"], json!({ "answered": 2, "total": 6 }));

    let fields = ui["fields"].as_array().expect("fields");
    let pregnancy = fields
        .iter()
        .find(|field| field["id"] == "pregnancy")
        .expect("pregnancy");
    assert_eq!(pregnancy["visible"], true);
    assert_eq!(pregnancy["required"], true);
    assert_eq!(pregnancy["options"][0], json!({ "label": "yes", "value": "yes" }));

    let medication = fields
        .iter()
        .find(|field| field["id"] == "medication")
        .expect("medication");
    assert_eq!(medication["visible"], false);
    assert_eq!(medication["type"], "textarea");
}

#[test]
fn json_ui_carries_placeholders() {
    let form = form("home-insurance");
    let values = initial_values(&form);
    let derivation = derive(&form, &values, &OptionSets::new());
    let ui = render_json_ui(&build_render_payload(&form, &values, &derivation));

    let fields = ui["fields"].as_array().expect("fields");
    let zip = fields
        .iter()
        .find(|field| field["id"] == "address.zip")
        .expect("zip");
    assert_eq!(zip["placeholder"], "94105");
    let street = fields
        .iter()
        .find(|field| field["id"] == "address.street")
        .expect("street");
    assert!(street.get("placeholder").is_none());
}

#[test]
fn text_render_shows_only_visible_fields() {
    let form = form("home-insurance");
    let values = flatten_values(&json!({ "has-security": "no", "state": "CA" }));
    let mut sets = OptionSets::new();
    sets.insert(
        "city".into(),
        vec![FieldOption::from("Los Angeles"), FieldOption::from("San Diego")],
    );
    let derivation = derive(&form, &values, &sets);
    let mut payload = build_render_payload(&form, &values, &derivation);
    payload.mark_busy(&BTreeSet::from(["city".to_string()]));
    let text = render_text(&payload);

    assert!(text.contains("Form: Home Insurance Application (home-insurance)"));
    assert!(text.contains("Next field: address.street"));
    assert!(text.contains(" - city (City) [required] [loading options]"));
    assert!(text.contains(" - state (State) [required] = CA"));
    assert!(!text.contains("security-type"));

    let city = payload.field("city").expect("city");
    assert_eq!(
        city.options.as_deref().map(<[FieldOption]>::len),
        Some(2)
    );
}

#[test]
fn annotations_switch_status_to_error() {
    let form = form("car-insurance");
    let values = initial_values(&form);
    let derivation = derive(&form, &values, &OptionSets::new());
    let mut payload = build_render_payload(&form, &values, &derivation);
    let result = validate(&form, &values);
    payload.annotate(&result);

    assert_eq!(payload.status, RenderStatus::Error);
    assert_eq!(
        payload.field("vehicle.make").and_then(|field| field.error.as_deref()),
        Some("Make is required")
    );
    assert!(render_text(&payload).contains("   ! Full Name is required"));
}

#[test]
fn complete_form_reports_complete() {
    let form = form("car-insurance");
    let values = flatten_values(&json!({
        "name": "Sam",
        "vehicle": { "make": "Ford", "model": "Focus", "year": 2015 }
    }));
    let derivation = derive(&form, &values, &OptionSets::new());
    let payload = build_render_payload(&form, &values, &derivation);

    assert_eq!(payload.status, RenderStatus::Complete);
    assert!(payload.next_field_id.is_none());
    assert!(render_text(&payload).contains("All visible fields are filled."));
}
