use serde_json::json;

use form_spec::{
    RenderStatus, SchemaRepository, SectionStatus, build_empty_state, build_render_payload, render_json_ui,
    render_text,
};

fn schema() -> SchemaRepository {
    SchemaRepository::from_json_str(include_str!("../tests/fixtures/inspection.json")).expect("fixture dictionary")
}

#[test]
fn payload_lists_every_section_with_status() {
    let schema = schema();
    let payload = build_render_payload(&schema, &build_empty_state(&schema));

    assert_eq!(payload.version, "2024.06");
    assert_eq!(payload.status, RenderStatus::NeedInput);
    assert_eq!(payload.skip_reasons, vec!["Not accessible", "Not applicable", "Owner declined"]);

    let statuses: Vec<_> = payload.sections.iter().map(|section| (section.id.as_str(), section.status)).collect();
    assert_eq!(
        statuses,
        vec![
            ("job", SectionStatus::Active),
            ("switchboard", SectionStatus::Active),
            ("roof_space", SectionStatus::GatedOut),
            ("gpo_lighting", SectionStatus::Active),
            ("thermal", SectionStatus::Active),
            ("access", SectionStatus::AutoSkipped),
        ]
    );

    let roof = payload.sections.iter().find(|section| section.id == "roof_space").expect("roof");
    assert!(roof.fields.is_empty());
}

#[test]
fn hidden_fields_are_not_rendered() {
    let schema = schema();
    let payload = build_render_payload(&schema, &build_empty_state(&schema));
    let switchboard = payload.sections.iter().find(|section| section.id == "switchboard").expect("switchboard");
    let keys: Vec<_> = switchboard.fields.iter().map(|field| field.key.as_str()).collect();
    assert_eq!(keys, vec!["switchboard.has_rcd"]);
}

#[test]
fn json_ui_carries_choices_and_errors() {
    let schema = schema();
    let state = build_empty_state(&schema).set_answer("job.client_name", json!("R. Nguyen"));
    let ui = render_json_ui(&build_render_payload(&schema, &state));

    assert_eq!(ui["status"], json!("need_input"));
    let job = &ui["sections"][0];
    assert_eq!(job["id"], json!("job"));
    let fields = job["fields"].as_array().expect("fields");
    let property = fields
        .iter()
        .find(|field| field["key"] == json!("job.property_type"))
        .expect("property type");
    assert_eq!(property["choices"], json!(["house", "unit", "townhouse"]));
    assert_eq!(property["error"], json!("Required."));

    let client = fields
        .iter()
        .find(|field| field["key"] == json!("job.client_name"))
        .expect("client");
    assert_eq!(client["current_value"], json!("R. Nguyen"));
    assert!(client.get("error").is_none());
}

#[test]
fn text_render_summarises_progress() {
    let schema = schema();
    let state = build_empty_state(&schema).set_answer("job.client_name", json!("R. Nguyen"));
    let text = render_text(&build_render_payload(&schema, &state));
    assert!(text.starts_with("Inspection (2024.06) status: need_input"));
    assert!(text.contains(" - job.client_name (Client name) [required] = R. Nguyen"));
    assert!(text.contains("[roof_space] Roof space - gated_out"));
    assert!(text.contains("     ! Required."));
}
