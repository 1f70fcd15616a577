#![allow(missing_docs)]

pub mod answer;
pub mod draft;
pub mod error;
pub mod expr;
pub mod flatten;
pub mod gate;
pub mod render;
pub mod repository;
pub mod rules;
pub mod session;
pub mod spec;
pub mod state;
pub mod validate;

pub use answer::{Answer, AnswerPayload, AnswerStatus, IssueDetail, MAX_PHOTOS, StagedPhoto, Stored};
pub use draft::{DraftFormat, DraftStore, FileDraftStore, MemoryDraftStore};
pub use error::{DraftError, GateCascadeConflict, SchemaError, SubmitError};
pub use expr::{Expr, ExprCache, ExprError};
pub use flatten::{FlatState, flatten_value};
pub use gate::{
    Resolver, SectionStatus, apply_auto_skip, get_clear_paths_for_gate_change, is_section_auto_skipped,
    is_section_gated_out, set_answer_with_gate_check,
};
pub use render::{
    RenderField, RenderPayload, RenderProgress, RenderSection, RenderStatus, build_render_payload,
    render_json_ui, render_text,
};
pub use repository::SchemaRepository;
pub use session::Session;
pub use spec::{
    ClearOnGateChange, CrossFieldValidation, Dictionary, ExceptionsRule, FieldDefinition, FieldType, Gate,
    ItemFieldSpec, SectionAutoSkip, SectionDefinition,
};
pub use state::{InspectionState, build_empty_state};
pub use validate::{FieldErrors, ValidationReport, is_submittable, validate_all, validate_section};
