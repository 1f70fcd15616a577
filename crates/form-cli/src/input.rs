//! Parses command-line text into typed answer values.

use form_spec::{FieldDefinition, FieldType, SchemaRepository};
use serde_json::{Number, Value};
use thiserror::Error;

/// Rejected input. `debug_message` is logged, never shown.
#[derive(Debug, Error)]
#[error("{user_message}")]
pub struct ValueParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl ValueParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}

/// Parses `raw` for `key`. Keys outside the dictionary (address companions,
/// ad-hoc notes) accept JSON and fall back to plain text.
pub fn parse_value(schema: &SchemaRepository, key: &str, raw: &str) -> Result<Value, ValueParseError> {
    let raw = raw.trim();
    let Some(field) = schema.field(key) else {
        return Ok(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())));
    };
    if raw.is_empty() {
        return Ok(Value::Null);
    }
    match field.kind {
        FieldType::Boolean => parse_boolean(raw),
        FieldType::Integer => parse_integer(raw),
        FieldType::Number => parse_number(raw),
        FieldType::Enum => parse_choice(schema.choices_for(field), raw).map(Value::String),
        FieldType::ArrayEnum => parse_choices(schema, field, raw),
        FieldType::ArrayObject => parse_rows(raw),
        FieldType::String => Ok(Value::String(raw.to_string())),
    }
}

fn parse_boolean(raw: &str) -> Result<Value, ValueParseError> {
    match raw.to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
        "false" | "f" | "no" | "n" | "0" => Ok(Value::Bool(false)),
        _ => Err(ValueParseError::new(
            "Please enter yes or no.",
            Some("expected boolean (y/n/true/false)".to_string()),
        )),
    }
}

fn parse_integer(raw: &str) -> Result<Value, ValueParseError> {
    raw.parse::<i64>()
        .map(Number::from)
        .map(Value::Number)
        .map_err(|_| ValueParseError::new("Please enter a whole number.", Some("expected integer".to_string())))
}

fn parse_number(raw: &str) -> Result<Value, ValueParseError> {
    let value = raw
        .parse::<f64>()
        .map_err(|_| ValueParseError::new("Please enter a number.", Some("expected number".to_string())))?;
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| ValueParseError::new("Please enter a finite number.", None))
}

/// Free text is accepted when the dictionary lists no choices.
fn parse_choice(choices: &[String], raw: &str) -> Result<String, ValueParseError> {
    if choices.is_empty() {
        return Ok(raw.to_string());
    }
    choices
        .iter()
        .find(|choice| choice.eq_ignore_ascii_case(raw))
        .cloned()
        .ok_or_else(|| {
            ValueParseError::new(
                format!("Choose one of: {}.", choices.join(", ")),
                Some(format!("got '{raw}'")),
            )
        })
}

fn parse_choices(schema: &SchemaRepository, field: &FieldDefinition, raw: &str) -> Result<Value, ValueParseError> {
    let choices = schema.choices_for(field);
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| parse_choice(choices, part).map(Value::String))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn parse_rows(raw: &str) -> Result<Value, ValueParseError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) if value.is_array() => Ok(value),
        Ok(_) => Err(ValueParseError::new(
            "Table answers must be a JSON array.",
            Some("expected array of row objects".to_string()),
        )),
        Err(err) => Err(ValueParseError::new(
            "Invalid table; provide a JSON array (e.g. [{\"room_name\": \"Kitchen\"}]).",
            Some(err.to_string()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> SchemaRepository {
        SchemaRepository::from_json_str(include_str!("../../form-spec/tests/fixtures/inspection.json"))
            .expect("fixture dictionary")
    }

    #[test]
    fn booleans_accept_yes() {
        assert_eq!(parse_value(&schema(), "job.has_roof_space", "yes").unwrap(), json!(true));
        assert!(parse_value(&schema(), "job.has_roof_space", "maybe").is_err());
    }

    #[test]
    fn integers_reject_fractions() {
        assert_eq!(parse_value(&schema(), "job.storeys", "2").unwrap(), json!(2));
        assert!(parse_value(&schema(), "job.storeys", "2.5").is_err());
    }

    #[test]
    fn enums_match_dictionary_choices() {
        let schema = schema();
        assert_eq!(parse_value(&schema, "job.property_type", "House").unwrap(), json!("house"));
        let error = parse_value(&schema, "job.property_type", "castle").unwrap_err();
        assert_eq!(error.user_message, "Choose one of: house, unit, townhouse.");
        assert_eq!(error.to_string(), error.user_message);
    }

    #[test]
    fn tables_need_json_arrays() {
        let schema = schema();
        assert!(parse_value(&schema, "gpo_lighting.gpo_rooms", r#"{"room_name": "Kitchen"}"#).is_err());
        assert!(
            parse_value(&schema, "gpo_lighting.gpo_rooms", r#"[{"room_name": "Kitchen"}]"#)
                .unwrap()
                .is_array()
        );
    }

    #[test]
    fn unknown_keys_take_json_or_text() {
        let schema = schema();
        assert_eq!(
            parse_value(&schema, "job.address_components", r#"{"postcode": "3065"}"#).unwrap(),
            json!({ "postcode": "3065" })
        );
        assert_eq!(parse_value(&schema, "job.address_place_id", "ChIJ-x").unwrap(), json!("ChIJ-x"));
    }
}
