use serde_json::{Map, Value, json};

use crate::answer::is_blank;
use crate::gate::{Resolver, SectionStatus};
use crate::repository::SchemaRepository;
use crate::rules::display_value;
use crate::spec::FieldType;
use crate::state::InspectionState;
use crate::validate::{ValidationReport, pending_issue_captures, validate_all};

/// Status labels returned by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// At least one active section still reports errors.
    NeedInput,
    /// Every active section validates.
    Complete,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::NeedInput => "need_input",
            RenderStatus::Complete => "complete",
        }
    }
}

/// Progress counters exposed to renderers.
#[derive(Debug, Clone, Default)]
pub struct RenderProgress {
    pub answered: usize,
    pub total: usize,
}

/// Describes a single visible field for render outputs.
#[derive(Debug, Clone)]
pub struct RenderField {
    pub key: String,
    pub label: String,
    pub kind: FieldType,
    pub ui: Option<String>,
    pub required: bool,
    pub skippable: bool,
    pub current_value: Option<Value>,
    pub skipped: bool,
    pub skip_reason: Option<String>,
    pub choices: Vec<String>,
    pub error: Option<String>,
    pub needs_issue_capture: bool,
}

impl RenderField {
    pub fn is_answered(&self) -> bool {
        self.skipped || self.current_value.as_ref().is_some_and(|value| !is_blank(value))
    }
}

#[derive(Debug, Clone)]
pub struct RenderSection {
    pub id: String,
    pub title: String,
    pub status: SectionStatus,
    pub fields: Vec<RenderField>,
    pub progress: RenderProgress,
}

/// Collected payload used by both text and JSON renderers.
#[derive(Debug, Clone)]
pub struct RenderPayload {
    pub version: String,
    pub status: RenderStatus,
    pub progress: RenderProgress,
    pub skip_reasons: Vec<String>,
    pub sections: Vec<RenderSection>,
}

/// Build the renderer payload from the dictionary and current state.
///
/// Gated-out and auto-skipped sections are listed without fields.
pub fn build_render_payload(schema: &SchemaRepository, state: &InspectionState) -> RenderPayload {
    let resolver = Resolver::new(schema, state);
    let report = validate_all(schema, state);
    let pending = pending_issue_captures(schema, state);

    let sections = schema
        .sections()
        .iter()
        .map(|section| {
            let status = resolver.section_status(section);
            let fields = if status.is_active() {
                resolver
                    .visible_fields(section)
                    .into_iter()
                    .map(|field| {
                        let answer = state.get_answer(&field.key);
                        RenderField {
                            key: field.key.clone(),
                            label: field.label.clone(),
                            kind: field.kind,
                            ui: field.ui.clone(),
                            required: resolver.is_required(field),
                            skippable: field.skippable,
                            current_value: state.get_value(&field.key).cloned(),
                            skipped: answer.is_some_and(|answer| answer.is_skipped()),
                            skip_reason: answer.and_then(|answer| answer.skip_reason.clone()),
                            choices: schema.choices_for(field).to_vec(),
                            error: field_error(&report, &section.id, &field.key),
                            needs_issue_capture: pending.contains(&field.key),
                        }
                    })
                    .collect::<Vec<_>>()
            } else {
                Vec::new()
            };
            let progress = RenderProgress {
                answered: fields.iter().filter(|field| field.is_answered()).count(),
                total: fields.len(),
            };
            RenderSection {
                id: section.id.clone(),
                title: section.title.clone(),
                status,
                fields,
                progress,
            }
        })
        .collect::<Vec<_>>();

    let progress = sections
        .iter()
        .fold(RenderProgress::default(), |acc, section| RenderProgress {
            answered: acc.answered + section.progress.answered,
            total: acc.total + section.progress.total,
        });

    RenderPayload {
        version: schema.version().to_string(),
        status: if report.is_empty() {
            RenderStatus::Complete
        } else {
            RenderStatus::NeedInput
        },
        progress,
        skip_reasons: schema.skip_reasons().to_vec(),
        sections,
    }
}

fn field_error(report: &ValidationReport, section_id: &str, key: &str) -> Option<String> {
    report.get(section_id).and_then(|errors| errors.get(key)).cloned()
}

/// Render the payload as a structured JSON-friendly value.
pub fn render_json_ui(payload: &RenderPayload) -> Value {
    let sections = payload
        .sections
        .iter()
        .map(|section| {
            let fields = section
                .fields
                .iter()
                .map(|field| {
                    let mut map = Map::new();
                    map.insert("key".into(), Value::String(field.key.clone()));
                    map.insert("label".into(), Value::String(field.label.clone()));
                    map.insert("type".into(), Value::String(field.kind.as_str().into()));
                    map.insert("required".into(), Value::Bool(field.required));
                    map.insert("skippable".into(), Value::Bool(field.skippable));
                    if let Some(ui) = &field.ui {
                        map.insert("ui".into(), Value::String(ui.clone()));
                    }
                    if let Some(current_value) = &field.current_value {
                        map.insert("current_value".into(), current_value.clone());
                    }
                    if field.skipped {
                        map.insert("skipped".into(), Value::Bool(true));
                        map.insert(
                            "skip_reason".into(),
                            field.skip_reason.clone().map(Value::String).unwrap_or(Value::Null),
                        );
                    }
                    if !field.choices.is_empty() {
                        map.insert(
                            "choices".into(),
                            Value::Array(field.choices.iter().cloned().map(Value::String).collect()),
                        );
                    }
                    if let Some(error) = &field.error {
                        map.insert("error".into(), Value::String(error.clone()));
                    }
                    map.insert("needs_issue_capture".into(), Value::Bool(field.needs_issue_capture));
                    Value::Object(map)
                })
                .collect::<Vec<_>>();
            json!({
                "id": section.id,
                "title": section.title,
                "status": section.status.as_str(),
                "progress": {
                    "answered": section.progress.answered,
                    "total": section.progress.total,
                },
                "fields": fields,
            })
        })
        .collect::<Vec<_>>();

    json!({
        "version": payload.version,
        "status": payload.status.as_str(),
        "progress": {
            "answered": payload.progress.answered,
            "total": payload.progress.total,
        },
        "skip_reasons": payload.skip_reasons,
        "sections": sections,
    })
}

/// Render the payload as human-friendly text.
pub fn render_text(payload: &RenderPayload) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "Inspection ({}) status: {} ({}/{})",
        payload.version,
        payload.status.as_str(),
        payload.progress.answered,
        payload.progress.total
    ));

    for section in &payload.sections {
        match section.status {
            SectionStatus::Active => lines.push(format!(
                "[{}] {} ({}/{})",
                section.id, section.title, section.progress.answered, section.progress.total
            )),
            other => {
                lines.push(format!("[{}] {} - {}", section.id, section.title, other.as_str()));
                continue;
            }
        }
        for field in &section.fields {
            let mut entry = format!(" - {} ({})", field.key, field.label);
            if field.required {
                entry.push_str(" [required]");
            }
            if field.skipped {
                entry.push_str(&format!(
                    " = skipped ({})",
                    field.skip_reason.as_deref().unwrap_or("no reason")
                ));
            } else if let Some(value) = field.current_value.as_ref().filter(|value| !is_blank(value)) {
                entry.push_str(&format!(" = {}", display_value(value)));
            }
            lines.push(entry);
            if let Some(error) = &field.error {
                lines.push(format!("     ! {}", error));
            }
            if field.needs_issue_capture {
                lines.push("     ! issue details pending".to_string());
            }
        }
    }

    lines.join("\n")
}
