use serde_json::json;

use form_spec::{
    FileDraftStore, InspectionState, MemoryDraftStore, SchemaRepository, Session, SubmitError,
};

fn schema() -> SchemaRepository {
    SchemaRepository::from_json_str(include_str!("../tests/fixtures/inspection.json")).expect("fixture dictionary")
}

fn fill_job(session: &mut Session<'_>) {
    session.set_answer("job.address", json!("12 Smith St, Fitzroy VIC 3065"));
    session.set_answer("job.address_place_id", json!("ChIJ-fitzroy"));
    session.set_answer("job.address_components", json!({ "suburb": "Fitzroy", "postcode": "3065" }));
    session.set_answer("job.client_name", json!("R. Nguyen"));
    session.set_answer("job.property_type", json!("unit"));
}

#[test]
fn submit_refuses_incomplete_inspection() {
    let schema = schema();
    let mut session = Session::new(&schema);
    match session.submit() {
        Err(SubmitError::Invalid(report)) => assert!(report.contains_key("job")),
        Ok(_) => panic!("incomplete inspection submitted"),
    }
    assert!(session.state().get_value("job.has_roof_space").is_some());
}

#[test]
fn submit_returns_snapshot_and_resets() {
    let schema = schema();
    let mut session = Session::new(&schema);
    fill_job(&mut session);
    let submitted = session.submit().expect("valid inspection");
    assert_eq!(submitted.get_value("job.client_name"), Some(&json!("R. Nguyen")));
    assert!(session.state().get_value("job.client_name").unwrap_or(&json!(null)).is_null());
}

#[test]
fn transitions_are_mirrored_to_drafts() {
    let schema = schema();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("draft.json");

    {
        let mut session = Session::with_drafts(&schema, Box::new(FileDraftStore::new(&path)));
        session.set_answer("job.client_name", json!("R. Nguyen"));
        session.add_issue_photo("roof_space.water_damage", "photo-1");
    }

    let resumed = Session::with_drafts(&schema, Box::new(FileDraftStore::new(&path)));
    assert_eq!(resumed.state().get_value("job.client_name"), Some(&json!("R. Nguyen")));
    assert_eq!(
        resumed
            .state()
            .issue_detail("roof_space.water_damage")
            .map(|detail| detail.photo_ids.clone()),
        Some(vec!["photo-1".to_string()])
    );
}

#[test]
fn reset_discards_draft() {
    let schema = schema();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("draft.cbor");
    let mut session = Session::with_drafts(&schema, Box::new(FileDraftStore::new(&path)));
    session.set_answer("job.storeys", json!(2));
    assert!(path.exists());
    session.reset();
    assert!(!path.exists());
    assert!(session.state().get_value("job.storeys").unwrap_or(&json!(null)).is_null());
}

#[test]
fn declined_gate_change_is_not_persisted() {
    let schema = schema();
    let start = InspectionState::new()
        .set_answer("job.has_roof_space", json!(true))
        .set_answer("roof_space.insulation", json!("batts"));
    let mut session = Session::with_drafts(&schema, Box::new(MemoryDraftStore::with_snapshot(start)));

    let conflict = session
        .set_answer_with_gate_check("job.has_roof_space", json!(false), |_| false)
        .expect_err("declined");
    assert_eq!(conflict.paths, vec!["roof_space"]);
    assert_eq!(session.state().get_value("roof_space.insulation"), Some(&json!("batts")));

    let cleared = session
        .set_answer_with_gate_check("job.has_roof_space", json!(false), |_| true)
        .expect("confirmed");
    assert_eq!(cleared, vec!["roof_space"]);
    assert!(session.state().get_value("roof_space.insulation").is_none());
}

#[test]
fn auto_skip_is_applied_through_the_session() {
    let schema = schema();
    let mut session = Session::new(&schema);
    session.set_answer("access.notes", json!("Ladder needed"));
    session.apply_auto_skip();
    assert!(session.state().get_value("access.notes").is_none());
}
