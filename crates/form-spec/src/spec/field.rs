use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Presentation hint marking a Google-style address autocomplete input.
pub const UI_ADDRESS_AUTOCOMPLETE: &str = "address_autocomplete";
/// Presentation hint for the electrical outlet (GPO) room table.
pub const UI_GPO_ROOM_TABLE: &str = "gpo_room_table";
/// Presentation hint for the lighting room table.
pub const UI_LIGHTING_ROOM_TABLE: &str = "lighting_room_table";

/// Key suffix reserved for exception lists; never seeded with defaults.
pub const EXCEPTIONS_SUFFIX: &str = ".exceptions";

/// Value kinds a field can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Enum,
    ArrayEnum,
    ArrayObject,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Enum => "enum",
            FieldType::ArrayEnum => "array_enum",
            FieldType::ArrayObject => "array_object",
        }
    }
}

/// Column definition for a repeatable (table/card) field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ItemFieldSpec {
    #[serde(rename = "type")]
    pub kind: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// One question in the dictionary.
///
/// `key` is a dot-delimited path that addresses exactly one leaf of the
/// answer tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldDefinition {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_when: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_when: Option<String>,
    #[serde(default)]
    pub skippable: bool,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_schema: Option<BTreeMap<String, ItemFieldSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<String>,
    #[serde(default)]
    pub on_issue_capture: bool,
}

impl FieldDefinition {
    /// Whether `build_empty_state` seeds this field with a default answer.
    pub fn is_seeded(&self) -> bool {
        self.kind != FieldType::ArrayObject && !self.key.ends_with(EXCEPTIONS_SUFFIX)
    }

    pub fn is_address_autocomplete(&self) -> bool {
        self.ui.as_deref() == Some(UI_ADDRESS_AUTOCOMPLETE)
    }

    /// Sibling key holding the selected place identifier for address fields.
    pub fn place_id_key(&self) -> String {
        format!("{}_place_id", self.key)
    }

    /// Sibling key holding structured address components.
    pub fn components_key(&self) -> String {
        format!("{}_components", self.key)
    }
}
