//! Single-owner editing session over one inspection.

use serde_json::Value;
use tracing::{debug, info};

use crate::answer::{AnswerPayload, IssueDetail, StagedPhoto};
use crate::draft::DraftStore;
use crate::error::{GateCascadeConflict, SubmitError};
use crate::gate;
use crate::repository::SchemaRepository;
use crate::state::{InspectionState, build_empty_state};
use crate::validate::{ValidationReport, validate_all};

/// Owns the current state and mirrors every transition to an optional draft
/// store.
pub struct Session<'a> {
    schema: &'a SchemaRepository,
    state: InspectionState,
    drafts: Option<Box<dyn DraftStore + 'a>>,
}

impl<'a> Session<'a> {
    /// Cold start without persistence.
    pub fn new(schema: &'a SchemaRepository) -> Self {
        Self {
            schema,
            state: build_empty_state(schema),
            drafts: None,
        }
    }

    /// Resumes from the draft store when it holds a snapshot, otherwise
    /// starts from the empty skeleton.
    pub fn with_drafts(schema: &'a SchemaRepository, mut drafts: Box<dyn DraftStore + 'a>) -> Self {
        let state = match drafts.load() {
            Some(state) => {
                info!("resuming inspection from draft");
                state
            }
            None => build_empty_state(schema),
        };
        Self {
            schema,
            state,
            drafts: Some(drafts),
        }
    }

    pub fn schema(&self) -> &'a SchemaRepository {
        self.schema
    }

    pub fn state(&self) -> &InspectionState {
        &self.state
    }

    pub fn set_answer(&mut self, key: &str, payload: impl Into<AnswerPayload>) {
        let next = self.state.set_answer(key, payload);
        self.commit(next);
    }

    /// Gate-aware write. The previous value is read from the current state.
    /// Returns the cleared paths, or the conflict when `confirm` declines.
    pub fn set_answer_with_gate_check(
        &mut self,
        key: &str,
        payload: impl Into<AnswerPayload>,
        confirm: impl FnOnce(&[String]) -> bool,
    ) -> Result<Vec<String>, GateCascadeConflict> {
        let previous = self.state.get_value(key).cloned().unwrap_or(Value::Null);
        let (next, cleared) =
            gate::set_answer_with_gate_check(self.schema, &self.state, key, payload, &previous, confirm)?;
        self.commit(next);
        Ok(cleared)
    }

    pub fn clear_paths<S: AsRef<str>>(&mut self, paths: &[S]) {
        let next = self.state.clear_paths(paths);
        self.commit(next);
    }

    pub fn apply_auto_skip(&mut self) {
        let next = gate::apply_auto_skip(self.schema, &self.state);
        self.commit(next);
    }

    pub fn upsert_issue_detail(&mut self, key: &str, detail: IssueDetail) {
        let next = self.state.upsert_issue_detail(key, detail);
        self.commit(next);
    }

    pub fn remove_issue_detail(&mut self, key: &str) {
        let next = self.state.remove_issue_detail(key);
        self.commit(next);
    }

    pub fn add_issue_photo(&mut self, key: &str, photo_id: &str) {
        let next = self.state.add_issue_photo(key, photo_id);
        self.commit(next);
    }

    pub fn remove_issue_photo(&mut self, key: &str, photo_id: &str) {
        let next = self.state.remove_issue_photo(key, photo_id);
        self.commit(next);
    }

    pub fn stage_photo(&mut self, key: &str, photo: StagedPhoto) {
        let next = self.state.stage_photo(key, photo);
        self.commit(next);
    }

    pub fn update_staged_photo(&mut self, key: &str, photo: StagedPhoto) {
        let next = self.state.update_staged_photo(key, photo);
        self.commit(next);
    }

    pub fn unstage_photo(&mut self, key: &str, photo_id: &str) {
        let next = self.state.unstage_photo(key, photo_id);
        self.commit(next);
    }

    pub fn validate_all(&self) -> ValidationReport {
        validate_all(self.schema, &self.state)
    }

    /// Hands back the final snapshot when every section validates, then
    /// starts over with an empty state and no draft.
    pub fn submit(&mut self) -> Result<InspectionState, SubmitError> {
        let report = self.validate_all();
        if !report.is_empty() {
            return Err(SubmitError::Invalid(report));
        }
        let submitted = std::mem::replace(&mut self.state, build_empty_state(self.schema));
        if let Some(drafts) = self.drafts.as_mut() {
            drafts.clear();
        }
        info!("inspection submitted");
        Ok(submitted)
    }

    /// Discards all answers and the stored draft.
    pub fn reset(&mut self) {
        self.state = build_empty_state(self.schema);
        if let Some(drafts) = self.drafts.as_mut() {
            drafts.clear();
        }
        debug!("inspection reset");
    }

    fn commit(&mut self, next: InspectionState) {
        if next == self.state {
            return;
        }
        self.state = next;
        if let Some(drafts) = self.drafts.as_mut() {
            drafts.save(&self.state);
        }
    }
}
