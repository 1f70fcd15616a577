//! Fixed business rules: cross-field arithmetic predicates, room tables,
//! exceptions-when-failures, item-schema rows and address selection.
//!
//! Table rules walk rows in order and stop at the first offending row, so
//! only one message per table is ever reported.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::answer::{coerce_number, is_blank};
use crate::flatten::FlatState;
use crate::spec::field::{UI_GPO_ROOM_TABLE, UI_LIGHTING_ROOM_TABLE};
use crate::spec::{FieldType, ItemFieldSpec};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_.\-]+)\}").expect("placeholder regex"));

const SINK_ADJACENT_ROOMS: &[&str] = &["kitchen", "bathroom", "laundry", "ensuite"];

/// Arithmetic predicates selectable by `rule_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossFieldRule {
    /// `pass + fail == tested`
    RcdPassFailSum,
    /// Sum of every field but the last equals the last.
    SumEqualsTotal,
    /// First field is at most the second.
    LessOrEqual,
    /// First field is at least the second.
    GreaterOrEqual,
}

impl CrossFieldRule {
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "rcd_pass_fail_sum" => Some(CrossFieldRule::RcdPassFailSum),
            "sum_equals_total" => Some(CrossFieldRule::SumEqualsTotal),
            "less_or_equal" => Some(CrossFieldRule::LessOrEqual),
            "greater_or_equal" => Some(CrossFieldRule::GreaterOrEqual),
            _ => None,
        }
    }

    /// `None` when the number of values does not fit the predicate.
    pub fn holds(&self, values: &[f64]) -> Option<bool> {
        match (self, values) {
            (CrossFieldRule::RcdPassFailSum, [pass, fail, tested]) => {
                Some(approx_eq(pass + fail, *tested))
            }
            (CrossFieldRule::SumEqualsTotal, [parts @ .., total]) if !parts.is_empty() => {
                Some(approx_eq(parts.iter().sum(), *total))
            }
            (CrossFieldRule::LessOrEqual, [left, right]) => Some(left <= right),
            (CrossFieldRule::GreaterOrEqual, [left, right]) => Some(left >= right),
            _ => None,
        }
    }
}

fn approx_eq(left: f64, right: f64) -> bool {
    (left - right).abs() < 1e-9
}

/// Substitutes `{name}` placeholders with values from `flat`. A name matches
/// a listed field by full key or by its last segment; unknown names stay.
pub fn render_message(template: &str, fields: &[String], flat: &FlatState) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            fields
                .iter()
                .find(|key| key.as_str() == name || key.rsplit('.').next() == Some(name))
                .and_then(|key| flat.get(key))
                .map(display_value)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => match number.as_f64() {
            Some(float) if float.fract() == 0.0 && float.abs() < 1e15 => format!("{}", float as i64),
            _ => number.to_string(),
        },
        Value::Bool(flag) => flag.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// The two room-table flavours sharing the exception invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomTable {
    Outlets,
    Lighting,
}

impl RoomTable {
    pub fn from_ui(ui: Option<&str>) -> Option<Self> {
        match ui {
            Some(UI_GPO_ROOM_TABLE) => Some(RoomTable::Outlets),
            Some(UI_LIGHTING_ROOM_TABLE) => Some(RoomTable::Lighting),
            _ => None,
        }
    }

    fn count_column(&self) -> &'static str {
        match self {
            RoomTable::Outlets => "gpo_count",
            RoomTable::Lighting => "fixture_count",
        }
    }

    fn count_label(&self) -> &'static str {
        match self {
            RoomTable::Outlets => "outlet count",
            RoomTable::Lighting => "fixture count",
        }
    }

    /// First violation across `rows`, if any.
    pub fn validate(&self, rows: &[Value]) -> Option<String> {
        rows.iter()
            .enumerate()
            .find_map(|(index, row)| self.validate_row(index, row))
    }

    fn validate_row(&self, index: usize, row: &Value) -> Option<String> {
        let room = row_label(row, "room_name", "Room", index);

        if text(row, "room_access") == Some("not_accessible") {
            let reason = text(row, "access_reason").unwrap_or_default();
            if reason.trim().is_empty() {
                return Some(format!("{room}: reason required when the room is not accessible."));
            }
            if reason == "other" && blank(row, "access_reason_other") {
                return Some(format!("{room}: describe why the room is not accessible."));
            }
            return None;
        }

        let Some(total) = number(row, self.count_column()) else {
            return Some(format!("{room}: {} required.", self.count_label()));
        };
        let Some(tested) = number(row, "tested_count") else {
            return Some(format!("{room}: tested count required."));
        };
        let Some(passed) = number(row, "pass_count") else {
            return Some(format!("{room}: pass count required."));
        };

        if tested > total {
            return Some(format!("{room}: tested count cannot exceed {}.", self.count_label()));
        }
        if tested < total && blank(row, "note") {
            return Some(format!("{room}: note required when not every item was tested."));
        }
        if passed > tested {
            return Some(format!("{room}: pass count cannot exceed tested count."));
        }

        let issue = text(row, "issue").unwrap_or_default().trim();
        let issue_flagged = !issue.is_empty() && issue != "none";
        if passed < tested && !issue_flagged {
            return Some(format!("{room}: issue required when not every tested item passed."));
        }
        if issue == "other" && blank(row, "issue_other") {
            return Some(format!("{room}: describe the issue."));
        }

        let photo_required = issue_flagged || (*self == RoomTable::Outlets && is_sink_adjacent(row));
        if photo_required && !has_photo(row) {
            return Some(format!("{room}: photo required."));
        }
        None
    }
}

fn is_sink_adjacent(row: &Value) -> bool {
    row.get("sink_adjacent").and_then(Value::as_bool) == Some(true)
        || text(row, "room_type")
            .is_some_and(|kind| SINK_ADJACENT_ROOMS.contains(&kind.trim().to_lowercase().as_str()))
}

/// Where a failing summary row was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailingCategory {
    pub label: String,
}

/// First summary row with fewer passes than tests.
pub fn first_failing_category(summary: &[Value]) -> Option<FailingCategory> {
    summary.iter().enumerate().find_map(|(index, row)| {
        let tested = number(row, "tested_count")?;
        let passed = number(row, "pass_count")?;
        (passed < tested).then(|| FailingCategory {
            label: row_label(row, "category", "Row", index),
        })
    })
}

/// First exception entry lacking photo evidence.
pub fn first_exception_without_photo(exceptions: &[Value]) -> Option<String> {
    exceptions
        .iter()
        .enumerate()
        .find(|(_, row)| !has_photo(row))
        .map(|(index, _)| format!("Exception {}: photo required.", index + 1))
}

/// Checks repeatable rows against their column definitions.
pub fn validate_item_rows(
    columns: &BTreeMap<String, ItemFieldSpec>,
    rows: &[Value],
) -> Option<String> {
    for (index, row) in rows.iter().enumerate() {
        for (name, column) in columns {
            let label = column.label.as_deref().unwrap_or(name);
            let value = row.get(name).unwrap_or(&Value::Null);
            if is_blank(value) {
                if column.required {
                    return Some(format!("Row {}: {label} is required.", index + 1));
                }
                continue;
            }
            if let Some(problem) = check_column(column, value) {
                return Some(format!("Row {}: {label} {problem}", index + 1));
            }
        }
    }
    None
}

fn check_column(column: &ItemFieldSpec, value: &Value) -> Option<&'static str> {
    match column.kind {
        FieldType::Boolean if !value.is_boolean() => Some("must be yes or no."),
        FieldType::Integer | FieldType::Number => {
            let Some(number) = coerce_number(value) else {
                return Some("must be a number.");
            };
            if column.kind == FieldType::Integer && number.fract() != 0.0 {
                return Some("must be a whole number.");
            }
            if column.min.is_some_and(|min| number < min) {
                return Some("is below the minimum.");
            }
            if column.max.is_some_and(|max| number > max) {
                return Some("is above the maximum.");
            }
            None
        }
        FieldType::Enum => column
            .enum_values
            .as_ref()
            .filter(|values| value.as_str().is_none_or(|text| !values.iter().any(|v| v == text)))
            .map(|_| "is not a valid option."),
        _ => None,
    }
}

/// Address autocomplete fields need a selected place plus structured parts.
pub fn validate_address(place_id: Option<&Value>, components: Option<&Value>) -> Option<String> {
    const MESSAGE: &str = "Select an address from the suggestions.";
    if place_id.is_none_or(is_blank) {
        return Some(MESSAGE.into());
    }
    let has_part = components.is_some_and(|parts| {
        ["suburb", "state", "postcode"]
            .iter()
            .any(|name| parts.get(*name).is_some_and(|value| !is_blank(value)))
    });
    if has_part { None } else { Some(MESSAGE.into()) }
}

fn text<'a>(row: &'a Value, name: &str) -> Option<&'a str> {
    row.get(name).and_then(Value::as_str)
}

fn number(row: &Value, name: &str) -> Option<f64> {
    row.get(name).and_then(coerce_number)
}

fn blank(row: &Value, name: &str) -> bool {
    row.get(name).is_none_or(is_blank)
}

fn has_photo(row: &Value) -> bool {
    row.get("photo_ids")
        .and_then(Value::as_array)
        .is_some_and(|ids| ids.iter().any(|id| !is_blank(id)))
}

fn row_label(row: &Value, name_column: &str, fallback: &str, index: usize) -> String {
    match text(row, name_column) {
        Some(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => format!("{fallback} {}", index + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rcd_sum_predicate() {
        let rule = CrossFieldRule::from_id("rcd_pass_fail_sum").expect("rule");
        assert_eq!(rule.holds(&[4.0, 1.0, 5.0]), Some(true));
        assert_eq!(rule.holds(&[4.0, 1.0, 6.0]), Some(false));
        assert_eq!(rule.holds(&[4.0, 1.0]), None);
        assert!(CrossFieldRule::from_id("mystery").is_none());
    }

    #[test]
    fn message_placeholders_use_last_segment() {
        let fields = vec!["rcd.total_pass".to_string(), "rcd.total_tested".to_string()];
        let flat: FlatState = [
            ("rcd.total_pass".to_string(), json!(4)),
            ("rcd.total_tested".to_string(), json!(6.0)),
        ]
        .into_iter()
        .collect();
        let message = render_message("{total_pass} of {rcd.total_tested} ({other})", &fields, &flat);
        assert_eq!(message, "4 of 6 ({other})");
    }

    #[test]
    fn not_accessible_rows_need_reasons() {
        let rows = [json!({ "room_name": "Garage", "room_access": "not_accessible", "access_reason": "other" })];
        let message = RoomTable::Lighting.validate(&rows).expect("error");
        assert!(message.starts_with("Garage:"));
        assert!(message.contains("describe"));
    }

    #[test]
    fn inaccessible_outlet_rows_need_a_reason() {
        let rows = [
            json!({ "room_name": "Lounge", "room_access": "not_accessible", "access_reason": "locked" }),
            json!({ "room_access": "not_accessible", "access_reason": " " }),
        ];
        assert_eq!(
            RoomTable::Outlets.validate(&rows).as_deref(),
            Some("Room 2: reason required when the room is not accessible.")
        );
    }

    #[test]
    fn tested_count_is_capped_by_room_count() {
        let rows = [json!({
            "room_name": "Laundry", "room_access": "accessible",
            "gpo_count": 2, "tested_count": 3, "pass_count": 3, "issue": "none"
        })];
        assert_eq!(
            RoomTable::Outlets.validate(&rows).as_deref(),
            Some("Laundry: tested count cannot exceed outlet count.")
        );
    }

    #[test]
    fn pass_count_is_capped_by_tested_count() {
        let rows = [json!({
            "room_name": "Hall", "room_access": "accessible",
            "fixture_count": 3, "tested_count": 3, "pass_count": 4, "issue": "none"
        })];
        assert_eq!(
            RoomTable::Lighting.validate(&rows).as_deref(),
            Some("Hall: pass count cannot exceed tested count.")
        );
    }

    #[test]
    fn other_issue_needs_a_description() {
        let rows = [json!({
            "room_name": "Bedroom 1", "room_access": "accessible",
            "gpo_count": 4, "tested_count": 4, "pass_count": 3, "issue": "other",
            "issue_other": "  ", "photo_ids": ["p1"]
        })];
        assert_eq!(
            RoomTable::Outlets.validate(&rows).as_deref(),
            Some("Bedroom 1: describe the issue.")
        );
    }

    #[test]
    fn untested_items_need_a_note() {
        let rows = [json!({ "room_access": "accessible", "fixture_count": 4, "tested_count": 2, "pass_count": 2, "issue": "none" })];
        let message = RoomTable::Lighting.validate(&rows).expect("error");
        assert!(message.contains("note required"));
    }

    #[test]
    fn sink_adjacent_outlets_need_photos() {
        let row = json!({
            "room_name": "Kitchen", "room_type": "kitchen", "room_access": "accessible",
            "gpo_count": 2, "tested_count": 2, "pass_count": 2, "issue": "none"
        });
        assert!(RoomTable::Outlets.validate(std::slice::from_ref(&row)).is_some_and(|m| m.contains("photo")));
        assert!(RoomTable::Lighting.validate(&[json!({
            "room_type": "kitchen", "room_access": "accessible",
            "fixture_count": 2, "tested_count": 2, "pass_count": 2, "issue": "none"
        })]).is_none());
    }

    #[test]
    fn failing_summary_category() {
        let summary = [
            json!({ "category": "Switchboard", "tested_count": 2, "pass_count": 2 }),
            json!({ "category": "Ceiling fans", "tested_count": 3, "pass_count": 1 }),
        ];
        assert_eq!(
            first_failing_category(&summary).map(|failing| failing.label),
            Some("Ceiling fans".to_string())
        );
    }

    #[test]
    fn item_rows_report_first_problem() {
        let columns: BTreeMap<String, ItemFieldSpec> = serde_json::from_value(json!({
            "location": { "type": "string", "label": "Location", "required": true },
            "count": { "type": "integer", "min": 0 }
        }))
        .expect("columns");
        let rows = [
            json!({ "location": "Hall", "count": 1 }),
            json!({ "location": "", "count": 1.5 }),
            json!({ "count": -1 }),
        ];
        assert_eq!(
            validate_item_rows(&columns, &rows).as_deref(),
            Some("Row 2: count must be a whole number.")
        );
    }

    #[test]
    fn address_requires_place_and_component() {
        let place = json!("ChIJ123");
        let parts = json!({ "suburb": "Carlton" });
        assert!(validate_address(Some(&place), Some(&parts)).is_none());
        assert!(validate_address(None, Some(&parts)).is_some());
        assert!(validate_address(Some(&place), Some(&json!({ "street": "Main" }))).is_some());
    }
}
