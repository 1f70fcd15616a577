use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::answer::{coerce_number, is_blank};
use crate::gate::Resolver;
use crate::repository::SchemaRepository;
use crate::rules::{self, CrossFieldRule, RoomTable};
use crate::spec::{CrossFieldValidation, ExceptionsRule, FieldDefinition, FieldType, SectionDefinition};
use crate::state::InspectionState;

pub const SKIP_REASON_REQUIRED: &str = "Skip reason required.";
pub const REQUIRED: &str = "Required.";

/// `field key -> message` for one section.
pub type FieldErrors = BTreeMap<String, String>;
/// `section id -> field errors`, listing only sections with errors.
pub type ValidationReport = BTreeMap<String, FieldErrors>;

/// Validates one section. Gated-out, auto-skipped and unknown sections
/// produce no errors.
pub fn validate_section(schema: &SchemaRepository, section_id: &str, state: &InspectionState) -> FieldErrors {
    let Some(section) = schema.section(section_id) else {
        return FieldErrors::new();
    };
    let resolver = Resolver::new(schema, state);
    SectionValidator::new(&resolver, state).run(section)
}

/// Validates every section against one snapshot.
pub fn validate_all(schema: &SchemaRepository, state: &InspectionState) -> ValidationReport {
    let resolver = Resolver::new(schema, state);
    let report: ValidationReport = schema
        .sections()
        .iter()
        .map(|section| (section.id.clone(), SectionValidator::new(&resolver, state).run(section)))
        .filter(|(_, errors)| !errors.is_empty())
        .collect();
    debug!(
        sections_with_errors = report.len(),
        errors = report.values().map(BTreeMap::len).sum::<usize>(),
        "validated inspection state"
    );
    report
}

/// Submission is allowed only when no section reports errors.
pub fn is_submittable(report: &ValidationReport) -> bool {
    report.values().all(BTreeMap::is_empty)
}

struct SectionValidator<'r, 's> {
    resolver: &'r Resolver<'s>,
    state: &'r InspectionState,
    errors: FieldErrors,
}

impl<'r, 's> SectionValidator<'r, 's> {
    fn new(resolver: &'r Resolver<'s>, state: &'r InspectionState) -> Self {
        Self {
            resolver,
            state,
            errors: FieldErrors::new(),
        }
    }

    fn run(mut self, section: &SectionDefinition) -> FieldErrors {
        if !self.resolver.section_status(section).is_active() {
            return self.errors;
        }
        for field in self.resolver.visible_fields(section) {
            if let Some(message) = self.check_field(field) {
                self.errors.insert(field.key.clone(), message);
            }
        }
        if let Some(rule) = &section.exceptions_when_failures {
            self.check_exceptions(rule);
        }
        for rule in &section.cross_field_validations {
            self.check_cross_field(rule);
        }
        self.errors
    }

    fn check_field(&self, field: &FieldDefinition) -> Option<String> {
        let required = self.resolver.is_required(field);
        let stored = self.state.lookup(&field.key);

        if let Some(answer) = stored.and_then(|stored| stored.answer())
            && answer.is_skipped()
        {
            return (required && !answer.has_skip_reason()).then(|| SKIP_REASON_REQUIRED.to_string());
        }

        let value = stored.map(|stored| stored.value()).unwrap_or(&Value::Null);
        if required && let Some(message) = check_type(field, value) {
            return Some(message);
        }
        if is_blank(value) {
            return None;
        }
        // A filled-in address or room table is checked even when optional.
        self.check_structure(field, value)
    }

    /// Business rules that apply whenever a visible field holds data.
    fn check_structure(&self, field: &FieldDefinition, value: &Value) -> Option<String> {
        if field.kind == FieldType::ArrayObject
            && let Some(rows) = value.as_array()
        {
            if let Some(table) = RoomTable::from_ui(field.ui.as_deref()) {
                return table.validate(rows);
            }
            if let Some(columns) = &field.item_schema {
                return rules::validate_item_rows(columns, rows);
            }
        }
        if field.is_address_autocomplete() {
            return rules::validate_address(
                self.state.get_value(&field.place_id_key()),
                self.state.get_value(&field.components_key()),
            );
        }
        if field.on_issue_capture
            && is_affirmative(value)
            && !self
                .state
                .issue_detail(&field.key)
                .is_some_and(|detail| detail.is_complete())
        {
            return Some("Issue details required: location and at least one photo.".into());
        }
        None
    }

    fn check_exceptions(&mut self, rule: &ExceptionsRule) {
        let summary = self.rows(&rule.summary);
        let Some(failing) = rules::first_failing_category(&summary) else {
            return;
        };
        if self.state.get_value(&rule.no_exceptions) == Some(&Value::Bool(true)) {
            self.errors.entry(rule.no_exceptions.clone()).or_insert_with(|| {
                format!("{} has failures; \"no exceptions\" cannot be selected.", failing.label)
            });
        }
        let exceptions = self.rows(&rule.exceptions);
        let message = if exceptions.is_empty() {
            Some(format!("Add at least one exception for {}.", failing.label))
        } else {
            rules::first_exception_without_photo(&exceptions)
        };
        if let Some(message) = message {
            self.errors.entry(rule.exceptions.clone()).or_insert(message);
        }
    }

    fn check_cross_field(&mut self, rule: &CrossFieldValidation) {
        let flat = self.resolver.flat();
        if let Some(condition) = &rule.condition
            && !self.resolver.schema().evaluate(condition, flat)
        {
            return;
        }
        let Some(predicate) = CrossFieldRule::from_id(&rule.rule_id) else {
            warn!(rule = %rule.id, rule_id = %rule.rule_id, "unknown cross-field rule id; skipping");
            return;
        };
        let values: Option<Vec<f64>> = rule
            .fields
            .iter()
            .map(|key| flat.get(key).and_then(coerce_number))
            .collect();
        let Some(values) = values else {
            return;
        };
        match predicate.holds(&values) {
            Some(true) => {}
            Some(false) => {
                if let Some(target) = rule.target_key() {
                    let message = rules::render_message(&rule.error_message, &rule.fields, flat);
                    self.errors.entry(target.to_string()).or_insert(message);
                }
            }
            None => warn!(rule = %rule.id, fields = rule.fields.len(), "cross-field rule has the wrong number of fields"),
        }
    }

    fn rows(&self, key: &str) -> Vec<Value> {
        self.state
            .get_value(key)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }
}

/// Emptiness and type checks for a required field.
fn check_type(field: &FieldDefinition, value: &Value) -> Option<String> {
    match field.kind {
        FieldType::Boolean => (!value.is_boolean()).then(|| REQUIRED.to_string()),
        FieldType::ArrayEnum | FieldType::ArrayObject => match value.as_array() {
            Some(items) if !items.is_empty() => None,
            _ if field.kind == FieldType::ArrayEnum => Some("Select at least one option.".into()),
            _ => Some("Add at least one entry.".into()),
        },
        FieldType::String | FieldType::Enum => match value {
            Value::String(text) if !text.trim().is_empty() => None,
            Value::Null | Value::String(_) => Some(REQUIRED.into()),
            _ => Some("Must be text.".into()),
        },
        FieldType::Integer | FieldType::Number => {
            if is_blank(value) {
                return Some(REQUIRED.into());
            }
            let Some(number) = coerce_number(value) else {
                return Some("Must be a number.".into());
            };
            if field.kind == FieldType::Integer && number.fract() != 0.0 {
                return Some("Must be a whole number.".into());
            }
            if let Some(min) = field.min
                && number < min
            {
                return Some(format!("Must be at least {}.", rules::display_value(&Value::from(min))));
            }
            if let Some(max) = field.max
                && number > max
            {
                return Some(format!("Must be at most {}.", rules::display_value(&Value::from(max))));
            }
            None
        }
    }
}

fn is_affirmative(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(text) => text.eq_ignore_ascii_case("yes"),
        _ => false,
    }
}

/// Issue-capture fields answered affirmatively that still lack details.
pub fn pending_issue_captures(schema: &SchemaRepository, state: &InspectionState) -> Vec<String> {
    let resolver = Resolver::new(schema, state);
    schema
        .sections()
        .iter()
        .filter(|section| resolver.section_status(section).is_active())
        .flat_map(|section| resolver.visible_fields(section))
        .filter(|field| field.on_issue_capture)
        .filter(|field| state.get_value(&field.key).is_some_and(is_affirmative))
        .filter(|field| !state.issue_detail(&field.key).is_some_and(|detail| detail.is_complete()))
        .map(|field| field.key.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::Answer;
    use serde_json::json;

    fn schema() -> SchemaRepository {
        SchemaRepository::from_json_str(
            &json!({
                "version": "1",
                "sections": [{
                    "id": "job",
                    "title": "Job",
                    "fields": [
                        { "key": "job.storeys", "label": "Storeys", "type": "integer", "required": true, "min": 1, "max": 4 },
                        { "key": "job.area", "label": "Area", "type": "number", "required": true },
                        { "key": "job.notes", "label": "Notes", "type": "string" },
                        { "key": "job.smoke_alarms", "label": "Smoke alarms", "type": "boolean", "required": true },
                        { "key": "job.hazards", "label": "Hazards", "type": "array_enum", "required": true, "enum_values": ["asbestos"] }
                    ]
                }]
            })
            .to_string(),
        )
        .expect("schema")
    }

    #[test]
    fn required_checks_by_type() {
        let schema = schema();
        let state = InspectionState::new()
            .set_answer("job.storeys", json!(2.5))
            .set_answer("job.area", json!("big"))
            .set_answer("job.hazards", json!([]));
        let errors = validate_section(&schema, "job", &state);
        assert_eq!(errors.get("job.storeys").map(String::as_str), Some("Must be a whole number."));
        assert_eq!(errors.get("job.area").map(String::as_str), Some("Must be a number."));
        assert_eq!(errors.get("job.smoke_alarms").map(String::as_str), Some(REQUIRED));
        assert_eq!(errors.get("job.hazards").map(String::as_str), Some("Select at least one option."));
        assert!(!errors.contains_key("job.notes"));
    }

    #[test]
    fn false_is_a_valid_boolean_answer() {
        let schema = schema();
        let state = InspectionState::new().set_answer("job.smoke_alarms", json!(false));
        assert!(!validate_section(&schema, "job", &state).contains_key("job.smoke_alarms"));
    }

    #[test]
    fn bounds_are_enforced() {
        let schema = schema();
        let state = InspectionState::new().set_answer("job.storeys", json!(9));
        assert_eq!(
            validate_section(&schema, "job", &state).get("job.storeys").map(String::as_str),
            Some("Must be at most 4.")
        );
    }

    #[test]
    fn skipped_without_reason_is_the_only_error() {
        let schema = schema();
        for key in ["job.storeys", "job.area", "job.smoke_alarms", "job.hazards"] {
            let state = InspectionState::new().set_answer(key, Answer::skipped(None, None));
            let errors = validate_section(&schema, "job", &state);
            assert_eq!(errors.get(key).map(String::as_str), Some(SKIP_REASON_REQUIRED));
        }
        let reasoned = InspectionState::new().set_answer(
            "job.storeys",
            Answer::skipped(Some("Not accessible".into()), None),
        );
        assert!(!validate_section(&schema, "job", &reasoned).contains_key("job.storeys"));
    }

    #[test]
    fn unknown_section_has_no_errors() {
        assert!(validate_section(&schema(), "nope", &InspectionState::new()).is_empty());
    }
}
