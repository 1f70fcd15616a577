use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Declarative numeric consistency rule spanning several fields.
///
/// `rule_id` selects one of the fixed predicates in [`crate::rules::CrossFieldRule`];
/// formulas are never user-defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CrossFieldValidation {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    pub rule_id: String,
    pub fields: Vec<String>,
    pub error_message: String,
    /// Field the error is reported against. Defaults to the last listed field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attach_to: Option<String>,
}

impl CrossFieldValidation {
    pub fn target_key(&self) -> Option<&str> {
        self.attach_to
            .as_deref()
            .or_else(|| self.fields.last().map(String::as_str))
    }
}

/// Requires exceptions whenever a summary table reports failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExceptionsRule {
    /// Key of the summary table (rows carry `category`, `tested_count`, `pass_count`).
    pub summary: String,
    /// Key of the boolean "no exceptions" flag.
    pub no_exceptions: String,
    /// Key of the exception list (rows carry `photo_ids`).
    pub exceptions: String,
}
