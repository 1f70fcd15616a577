use std::path::PathBuf;

use thiserror::Error;

use crate::validate::ValidationReport;

/// Failures while loading the field dictionary.
///
/// Only construction can fail; lookups on a loaded repository fall back to
/// empty results instead.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read dictionary '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse dictionary: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("field key '{key}' is declared more than once")]
    DuplicateKey { key: String },
    #[error("section id '{id}' is declared more than once")]
    DuplicateSection { id: String },
}

/// A gate flip would clear dependent answers and the user declined.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("changing '{key}' would clear {} dependent answer(s)", .paths.len())]
pub struct GateCascadeConflict {
    pub key: String,
    pub paths: Vec<String>,
}

/// Submission was attempted while sections still report errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    #[error("{} section(s) failed validation", .0.len())]
    Invalid(ValidationReport),
}

/// Draft persistence failures. Logged and swallowed by the draft stores.
#[derive(Debug, Error)]
pub enum DraftError {
    #[error("draft io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("draft json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("draft cbor error: {0}")]
    Cbor(#[from] serde_cbor::Error),
}
