//! Section gating, auto-skip and field visibility.

use serde_json::Value;
use tracing::debug;

use crate::answer::AnswerPayload;
use crate::error::GateCascadeConflict;
use crate::flatten::FlatState;
use crate::repository::SchemaRepository;
use crate::spec::{FieldDefinition, SectionDefinition};
use crate::state::InspectionState;

/// Whether a section takes part in rendering and validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionStatus {
    Active,
    /// A gate's dependency does not hold; nothing is rendered or validated.
    GatedOut,
    /// The section's auto-skip condition holds; it is not applicable.
    AutoSkipped,
}

impl SectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionStatus::Active => "active",
            SectionStatus::GatedOut => "gated_out",
            SectionStatus::AutoSkipped => "auto_skipped",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SectionStatus::Active)
    }
}

/// Visibility decisions over one flattened snapshot of the state.
pub struct Resolver<'a> {
    schema: &'a SchemaRepository,
    flat: FlatState,
}

impl<'a> Resolver<'a> {
    pub fn new(schema: &'a SchemaRepository, state: &InspectionState) -> Self {
        Self {
            schema,
            flat: state.flatten(),
        }
    }

    pub fn schema(&self) -> &'a SchemaRepository {
        self.schema
    }

    pub fn flat(&self) -> &FlatState {
        &self.flat
    }

    /// Gates are AND-combined: one mismatch (including an unset dependency)
    /// gates the whole section out.
    pub fn is_gated_out(&self, section: &SectionDefinition) -> bool {
        section
            .gates
            .iter()
            .any(|gate| {
                !self
                    .flat
                    .get(&gate.depends_on)
                    .is_some_and(|value| gate_matches(value, &gate.equals))
            })
    }

    pub fn is_auto_skipped(&self, section: &SectionDefinition) -> bool {
        section
            .section_auto_skip
            .as_ref()
            .is_some_and(|auto_skip| self.schema.evaluate_auto_skip(&auto_skip.when, &self.flat))
    }

    pub fn section_status(&self, section: &SectionDefinition) -> SectionStatus {
        if self.is_gated_out(section) {
            SectionStatus::GatedOut
        } else if self.is_auto_skipped(section) {
            SectionStatus::AutoSkipped
        } else {
            SectionStatus::Active
        }
    }

    pub fn is_visible(&self, field: &FieldDefinition) -> bool {
        field
            .show_when
            .as_deref()
            .is_none_or(|expr| self.schema.evaluate(expr, &self.flat))
    }

    pub fn is_required(&self, field: &FieldDefinition) -> bool {
        field.required
            || field
                .required_when
                .as_deref()
                .is_some_and(|expr| self.schema.evaluate(expr, &self.flat))
    }

    /// Fields of `section` to present, in declaration order.
    pub fn visible_fields<'s>(&self, section: &'s SectionDefinition) -> Vec<&'s FieldDefinition> {
        section
            .fields
            .iter()
            .filter(|field| self.is_visible(field))
            .collect()
    }
}

/// Unknown sections are never gated out.
pub fn is_section_gated_out(schema: &SchemaRepository, section_id: &str, state: &InspectionState) -> bool {
    schema
        .section(section_id)
        .is_some_and(|section| Resolver::new(schema, state).is_gated_out(section))
}

pub fn is_section_auto_skipped(
    schema: &SchemaRepository,
    section_id: &str,
    state: &InspectionState,
) -> bool {
    schema
        .section(section_id)
        .is_some_and(|section| Resolver::new(schema, state).is_auto_skipped(section))
}

/// Paths listed by every currently auto-skipped section, deduplicated.
pub fn auto_skip_clear_paths(schema: &SchemaRepository, state: &InspectionState) -> Vec<String> {
    let resolver = Resolver::new(schema, state);
    let mut paths = Vec::new();
    for section in schema.sections() {
        let Some(auto_skip) = &section.section_auto_skip else {
            continue;
        };
        if resolver.is_auto_skipped(section) {
            push_unique(&mut paths, &auto_skip.clear_paths);
        }
    }
    paths
}

/// Clears the paths of every auto-skipped section in one transition.
pub fn apply_auto_skip(schema: &SchemaRepository, state: &InspectionState) -> InspectionState {
    let paths = auto_skip_clear_paths(schema, state);
    if paths.is_empty() {
        return state.clone();
    }
    debug!(count = paths.len(), "clearing auto-skipped section answers");
    state.clear_paths(&paths)
}

/// Union of `clear_paths` for rules watching `key`, only on a true -> false flip.
pub fn get_clear_paths_for_gate_change(
    schema: &SchemaRepository,
    key: &str,
    previous: &Value,
    next: &Value,
) -> Vec<String> {
    if previous != &Value::Bool(true) || next != &Value::Bool(false) {
        return Vec::new();
    }
    let mut paths = Vec::new();
    for section in schema.sections() {
        for rule in section
            .clear_on_gate_change
            .iter()
            .filter(|rule| rule.if_changed == key)
        {
            push_unique(&mut paths, &rule.clear_paths);
        }
    }
    paths
}

/// Writes `payload` at `key` and clears whatever the gate flip invalidates.
///
/// When paths would be cleared, `confirm` is asked first; declining aborts
/// the whole transition and reports the affected paths. Returns the new state
/// and the cleared paths.
pub fn set_answer_with_gate_check(
    schema: &SchemaRepository,
    state: &InspectionState,
    key: &str,
    payload: impl Into<AnswerPayload>,
    previous: &Value,
    confirm: impl FnOnce(&[String]) -> bool,
) -> Result<(InspectionState, Vec<String>), GateCascadeConflict> {
    let answer = payload.into().into_answer();
    let paths = get_clear_paths_for_gate_change(schema, key, previous, &answer.value);
    if !paths.is_empty() && !confirm(&paths) {
        debug!(key = %key, count = paths.len(), "gate change declined");
        return Err(GateCascadeConflict {
            key: key.to_string(),
            paths,
        });
    }
    let next = state.set_answer(key, answer);
    if paths.is_empty() {
        return Ok((next, paths));
    }
    debug!(key = %key, count = paths.len(), "gate change clearing dependent answers");
    Ok((next.clear_paths(&paths), paths))
}

/// Strict equality, except that numbers compare by value (`2` == `2.0`).
fn gate_matches(value: &Value, expected: &Value) -> bool {
    match (value, expected) {
        (Value::Number(left), Value::Number(right)) => left.as_f64() == right.as_f64(),
        _ => value == expected,
    }
}

fn push_unique(into: &mut Vec<String>, paths: &[String]) {
    for path in paths {
        if !into.contains(path) {
            into.push(path.clone());
        }
    }
}
