use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::spec::field::FieldDefinition;
use crate::spec::validation::{CrossFieldValidation, ExceptionsRule};

/// Section precondition: the section stays visible only while the value at
/// `depends_on` strictly equals `equals`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Gate {
    pub depends_on: String,
    pub equals: Value,
}

/// Marks a section not-applicable and clears the listed paths when `when` holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SectionAutoSkip {
    pub when: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clear_paths: Vec<String>,
}

/// Paths to clear when the boolean at `if_changed` flips from true to false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClearOnGateChange {
    pub if_changed: String,
    pub clear_paths: Vec<String>,
}

/// Named, ordered group of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SectionDefinition {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gates: Vec<Gate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_auto_skip: Option<SectionAutoSkip>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clear_on_gate_change: Vec<ClearOnGateChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exceptions_when_failures: Option<ExceptionsRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cross_field_validations: Vec<CrossFieldValidation>,
    pub fields: Vec<FieldDefinition>,
}

/// Top-level field dictionary document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Dictionary {
    pub version: String,
    #[serde(default)]
    pub enums: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reasons: Option<Vec<String>>,
    pub sections: Vec<SectionDefinition>,
}
