use serde_json::json;

use wizard_spec::{
    FieldValue, FormData, StepTable, WizardSchema, data_schema, progress, resolve_visibility,
    validate_step, validate_visible_steps, visible_steps,
};

fn fixture() -> WizardSchema {
    WizardSchema::from_json(include_str!("fixtures/onboarding.json")).expect("deserialize")
}

fn table() -> StepTable {
    StepTable::from_schema(&fixture()).expect("table")
}

#[test]
fn profile_step_reports_each_failing_field_once() {
    let table = table();
    let data = FormData::new()
        .with("display_name", "A")
        .with("bio", "x".repeat(200));

    let result = validate_step(&table, 1, &data);
    assert!(!result.is_valid());
    assert_eq!(
        result.errors.get("display_name").map(String::as_str),
        Some("Display name must be at least 2 characters")
    );
    assert_eq!(
        result.errors.get("bio").map(String::as_str),
        Some("Bio must be at most 160 characters")
    );
    assert_eq!(result.errors.len(), 2);
}

#[test]
fn missing_required_field_uses_label() {
    let result = validate_step(&table(), 1, &FormData::new());
    assert_eq!(
        result.errors.get("display_name").map(String::as_str),
        Some("Display name is required")
    );
}

#[test]
fn nested_paths_and_custom_messages() {
    let data = FormData::new()
        .with("organizer.city", "Lisbon")
        .with("organizer.meetup_url", "http://example.org");
    let result = validate_step(&table(), 3, &data);
    assert_eq!(
        result.errors.get("organizer.meetup_url").map(String::as_str),
        Some("Meetup page must start with https://")
    );
}

#[test]
fn enum_choices_are_enforced() {
    let result = validate_step(&table(), 2, &FormData::new().with("role", "admin"));
    assert_eq!(
        result.errors.get("role").map(String::as_str),
        Some("Role must be one of: member, organizer, creator")
    );
}

#[test]
fn conditional_step_follows_role() {
    let table = table();
    let member = FormData::new().with("role", "member");
    let organizer = FormData::new().with("role", "organizer");

    assert_eq!(visible_steps(&table, &member), vec![1, 2, 4, 6]);
    assert_eq!(visible_steps(&table, &organizer), vec![1, 2, 3, 4, 6]);
    assert_eq!(visible_steps(&table, &FormData::new()), vec![1, 2, 4, 6]);

    let visibility = resolve_visibility(&table, &organizer);
    assert_eq!(visibility.get(&5), Some(&false));
    assert_eq!(visibility, resolve_visibility(&table, &organizer));
}

#[test]
fn progress_counts_only_visible_steps() {
    let table = table();
    let data = FormData::new().with("role", "member");
    let at_six = progress(&table, 6, &data);
    assert_eq!(at_six.step_number, 4);
    assert_eq!(at_six.total, 4);

    let at_four = progress(&table, 4, &data.clone().with("role", "organizer"));
    assert_eq!(at_four.step_number, 4);
    assert_eq!(at_four.total, 5);
}

#[test]
fn whole_record_validation_skips_hidden_steps() {
    let table = table();
    let data = FormData::from_value(json!({
        "display_name": "Ada",
        "role": "member",
        "interests": ["code"],
        "accept_terms": true
    }))
    .expect("object");
    assert!(validate_visible_steps(&table, &data).is_empty());

    let mut organizer = data.clone();
    organizer.set("role", "organizer");
    organizer.set("accept_terms", false);
    let failures = validate_visible_steps(&table, &organizer);
    let failing_steps: Vec<_> = failures.iter().map(|(id, _)| *id).collect();
    assert_eq!(failing_steps, vec![3, 6]);
}

#[test]
fn defaults_come_from_field_declarations() {
    let defaults = fixture().defaults();
    assert_eq!(defaults.get("role"), Some(&FieldValue::text("member")));
    assert_eq!(defaults.len(), 1);
}

#[test]
fn data_schema_lists_unconditional_required_fields() {
    let schema = data_schema(&fixture());
    let props = schema["properties"].as_object().expect("properties");
    assert!(props.contains_key("organizer.city"));
    assert_eq!(props["interests"]["maxItems"], 3);
    assert_eq!(props["accept_terms"]["const"], true);

    let required: Vec<_> = schema["required"]
        .as_array()
        .expect("required")
        .iter()
        .filter_map(|value| value.as_str())
        .collect();
    assert!(required.contains(&"display_name"));
    assert!(required.contains(&"accept_terms"));
    assert!(!required.contains(&"organizer.city"));
    assert!(!required.contains(&"portfolio_url"));
}
