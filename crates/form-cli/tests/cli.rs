use assert_cmd::Command;
use assert_fs::prelude::*;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};

const DICTIONARY: &str = include_str!("../../form-spec/tests/fixtures/inspection.json");

fn inspect_forms(dictionary: &Path, state: &Path) -> Command {
    let mut cmd = Command::cargo_bin("inspect-forms").expect("binary");
    cmd.arg("--dictionary")
        .arg(dictionary)
        .arg("--state")
        .arg(state)
        .env_remove("INSPECT_FORMS_STATE");
    cmd
}

struct Workspace {
    dir: assert_fs::TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = assert_fs::TempDir::new().expect("temp dir");
        dir.child("dictionary.json").write_str(DICTIONARY).expect("dictionary");
        Self { dir }
    }

    fn state_path(&self) -> PathBuf {
        self.dir.path().join("state.json")
    }

    fn cmd(&self) -> Command {
        inspect_forms(&self.dir.path().join("dictionary.json"), &self.state_path())
    }

    fn state(&self) -> Value {
        let raw = fs::read_to_string(self.state_path()).expect("state file");
        serde_json::from_str(&raw).expect("state json")
    }
}

fn render_json(cmd: &mut Command) -> Value {
    let output = cmd
        .args(["render", "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("render json")
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let ws = Workspace::new();
    ws.cmd().arg("init").assert().success();
    assert_eq!(
        ws.state()["job"]["has_roof_space"],
        json!({ "value": false, "status": "answered" })
    );
    ws.cmd().arg("init").assert().failure();
    ws.cmd().args(["init", "--force"]).assert().success();
}

#[test]
fn set_parses_by_field_type() {
    let ws = Workspace::new();
    ws.cmd().args(["set", "job.storeys", "2"]).assert().success();
    ws.cmd().args(["set", "job.storeys", "two"]).assert().failure();
    assert_eq!(ws.state()["job"]["storeys"]["value"], json!(2));

    ws.cmd()
        .args(["set", "job.client_name", "--skip", "--reason", "Owner declined"])
        .assert()
        .success();
    let skipped = &ws.state()["job"]["client_name"];
    assert_eq!(skipped["status"], json!("skipped"));
    assert_eq!(skipped["skip_reason"], json!("Owner declined"));
}

#[test]
fn gate_change_prompts_before_clearing() {
    let ws = Workspace::new();
    ws.cmd().args(["set", "job.has_roof_space", "yes"]).assert().success();
    ws.cmd().args(["set", "roof_space.insulation", "batts"]).assert().success();

    ws.cmd()
        .args(["set", "job.has_roof_space", "no"])
        .write_stdin("n\n")
        .assert()
        .failure();
    assert_eq!(ws.state()["roof_space"]["insulation"]["value"], json!("batts"));

    ws.cmd()
        .args(["set", "job.has_roof_space", "no", "--yes"])
        .assert()
        .success();
    let state = ws.state();
    assert!(state.get("roof_space").is_none());
    assert_eq!(state["job"]["has_roof_space"]["value"], json!(false));
}

#[test]
fn validate_reports_and_fails_until_complete() {
    let ws = Workspace::new();
    ws.cmd().arg("init").assert().success();
    let output = ws.cmd().arg("validate").assert().failure().get_output().stdout.clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(text.contains("Validation result: invalid"));
    assert!(text.contains("job.client_name - Required."));

    for (key, value) in [
        ("job.address", "12 Smith St"),
        ("job.address_place_id", "ChIJ-fitzroy"),
        ("job.address_components", r#"{"suburb": "Fitzroy"}"#),
        ("job.client_name", "R. Nguyen"),
        ("job.property_type", "house"),
    ] {
        ws.cmd().args(["set", key, value]).assert().success();
    }
    ws.cmd().arg("validate").assert().success();
    ws.cmd().args(["validate", "--section", "nope"]).assert().failure();
}

#[test]
fn render_json_lists_sections() {
    let ws = Workspace::new();
    let ui = render_json(&mut ws.cmd());
    assert_eq!(ui["version"], json!("2024.06"));
    assert_eq!(ui["sections"][2]["status"], json!("gated_out"));
}

#[test]
fn issue_details_accumulate_photos() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["issue", "roof_space.water_damage", "--location", "Above ensuite"])
        .assert()
        .success();
    ws.cmd()
        .args(["issue", "roof_space.water_damage", "--photo", "p1", "--photo", "p2", "--photo", "p3"])
        .assert()
        .success();
    let detail = &ws.state()["_issue_details"]["roof_space.water_damage"];
    assert_eq!(detail["location"], json!("Above ensuite"));
    assert_eq!(detail["photo_ids"], json!(["p1", "p2"]));
}

#[test]
fn cbor_state_path_round_trips_through_commands() {
    let dir = tempfile::tempdir().expect("temp dir");
    let dictionary = dir.path().join("dictionary.json");
    fs::write(&dictionary, DICTIONARY).expect("dictionary");
    let state = dir.path().join("inspection.cbor");

    inspect_forms(&dictionary, &state)
        .args(["set", "job.has_roof_space", "yes"])
        .assert()
        .success();
    let bytes = fs::read(&state).expect("state file");
    assert!(serde_json::from_slice::<Value>(&bytes).is_err());

    let ui = render_json(&mut inspect_forms(&dictionary, &state));
    assert_eq!(ui["sections"][2]["status"], json!("active"));
}

#[test]
fn dictionary_schema_needs_no_dictionary() {
    let output = Command::cargo_bin("inspect-forms")
        .expect("binary")
        .arg("dictionary-schema")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let schema: Value = serde_json::from_slice(&output).expect("schema json");
    assert_eq!(schema["title"], json!("Dictionary"));
    assert!(schema["properties"]["sections"].is_object());
}
