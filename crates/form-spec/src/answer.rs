use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Most photos kept per field or section in either side channel.
pub const MAX_PHOTOS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    Answered,
    Skipped,
}

/// Stored value for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Answer {
    pub value: Value,
    pub status: AnswerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_note: Option<String>,
}

impl Answer {
    pub fn answered(value: Value) -> Self {
        Self {
            value,
            status: AnswerStatus::Answered,
            skip_reason: None,
            skip_note: None,
        }
    }

    pub fn skipped(reason: Option<String>, note: Option<String>) -> Self {
        Self {
            value: Value::Null,
            status: AnswerStatus::Skipped,
            skip_reason: reason,
            skip_note: note,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.status == AnswerStatus::Skipped
    }

    /// True when the skip carries a non-blank reason.
    pub fn has_skip_reason(&self) -> bool {
        self.skip_reason
            .as_deref()
            .is_some_and(|reason| !reason.trim().is_empty())
    }

    /// Whether a JSON node carries the answer shape (`value` + `status`).
    pub fn is_answer_shaped(value: &Value) -> bool {
        value
            .as_object()
            .is_some_and(|map| map.contains_key("value") && map.contains_key("status"))
    }

    /// Reads an answer out of loosely shaped JSON. Unknown statuses count as
    /// answered and non-string skip fields are dropped.
    pub fn from_json(value: &Value) -> Option<Self> {
        if !Self::is_answer_shaped(value) {
            return None;
        }
        let map = value.as_object()?;
        let status = match map.get("status").and_then(Value::as_str) {
            Some("skipped") => AnswerStatus::Skipped,
            _ => AnswerStatus::Answered,
        };
        let text = |name: &str| map.get(name).and_then(Value::as_str).map(str::to_string);
        Some(Self {
            value: map.get("value").cloned().unwrap_or(Value::Null),
            status,
            skip_reason: text("skip_reason"),
            skip_note: text("skip_note"),
        })
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Input accepted by the setters: a full answer or a bare value.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerPayload {
    Answer(Answer),
    Value(Value),
}

impl AnswerPayload {
    /// Classifies arbitrary JSON, treating answer-shaped objects as answers.
    pub fn from_json(value: Value) -> Self {
        match Answer::from_json(&value) {
            Some(answer) => AnswerPayload::Answer(answer),
            None => AnswerPayload::Value(value),
        }
    }

    pub fn into_answer(self) -> Answer {
        match self {
            AnswerPayload::Answer(answer) => answer,
            AnswerPayload::Value(value) => Answer::answered(value),
        }
    }
}

impl From<Answer> for AnswerPayload {
    fn from(answer: Answer) -> Self {
        AnswerPayload::Answer(answer)
    }
}

impl From<Value> for AnswerPayload {
    fn from(value: Value) -> Self {
        AnswerPayload::Value(value)
    }
}

/// Normalised view of whatever is stored at a leaf.
///
/// Every read site goes through this instead of shape-checking raw JSON.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stored<'a> {
    Answer(&'a Answer),
    Plain(&'a Value),
}

impl<'a> Stored<'a> {
    pub fn value(&self) -> &'a Value {
        match self {
            Stored::Answer(answer) => &answer.value,
            Stored::Plain(value) => value,
        }
    }

    pub fn answer(&self) -> Option<&'a Answer> {
        match self {
            Stored::Answer(answer) => Some(answer),
            Stored::Plain(_) => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.answer().is_some_and(Answer::is_skipped)
    }
}

/// Follow-up data captured when an answer reports a problem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct IssueDetail {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub photo_ids: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

impl IssueDetail {
    /// Location and at least one photo are present.
    pub fn is_complete(&self) -> bool {
        !self.location.trim().is_empty() && self.photo_ids.iter().any(|id| !id.trim().is_empty())
    }
}

/// Photo attached to a section or field before upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StagedPhoto {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// Blank means null, an empty or whitespace string, or an empty array.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Numeric view of a value, accepting numeric strings.
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_value_payload_is_wrapped_as_answered() {
        let answer = AnswerPayload::from_json(json!("brick")).into_answer();
        assert_eq!(answer.status, AnswerStatus::Answered);
        assert_eq!(answer.value, json!("brick"));
    }

    #[test]
    fn answer_shaped_payload_is_kept() {
        let payload = AnswerPayload::from_json(json!({
            "value": null,
            "status": "skipped",
            "skip_reason": "Not accessible"
        }));
        let answer = payload.into_answer();
        assert!(answer.is_skipped());
        assert!(answer.has_skip_reason());
    }

    #[test]
    fn object_without_status_is_plain() {
        assert!(Answer::from_json(&json!({ "value": 3 })).is_none());
    }

    #[test]
    fn to_json_omits_absent_skip_fields() {
        assert_eq!(
            Answer::answered(json!(2)).to_json(),
            json!({ "value": 2, "status": "answered" })
        );
        assert_eq!(
            Answer::skipped(Some("Locked".into()), None).to_json(),
            json!({ "value": null, "status": "skipped", "skip_reason": "Locked" })
        );
    }

    #[test]
    fn blank_skip_reason_is_not_a_reason() {
        let answer = Answer::skipped(Some("  ".into()), None);
        assert!(!answer.has_skip_reason());
    }

    #[test]
    fn numeric_strings_coerce() {
        assert_eq!(coerce_number(&json!("4")), Some(4.0));
        assert_eq!(coerce_number(&json!(true)), None);
        assert_eq!(coerce_number(&Value::Null), None);
    }
}
