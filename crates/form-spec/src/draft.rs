//! Best-effort local persistence of the in-progress state.
//!
//! Failures are logged and swallowed; the in-memory state stays authoritative.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::DraftError;
use crate::state::InspectionState;

pub trait DraftStore {
    fn load(&mut self) -> Option<InspectionState>;
    fn save(&mut self, state: &InspectionState);
    fn clear(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftFormat {
    Json,
    Cbor,
}

impl DraftFormat {
    /// CBOR for `.cbor` paths, JSON otherwise.
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("cbor") => DraftFormat::Cbor,
            _ => DraftFormat::Json,
        }
    }
}

/// Draft kept in a single file next to the working directory.
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    path: PathBuf,
    format: DraftFormat,
}

impl FileDraftStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = DraftFormat::for_path(&path);
        Self { path, format }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<InspectionState>, DraftError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        let state = match self.format {
            DraftFormat::Json => serde_json::from_slice(&bytes)?,
            DraftFormat::Cbor => serde_cbor::from_slice(&bytes)?,
        };
        Ok(Some(state))
    }

    fn write(&self, state: &InspectionState) -> Result<(), DraftError> {
        let bytes = match self.format {
            DraftFormat::Json => serde_json::to_vec_pretty(state)?,
            DraftFormat::Cbor => serde_cbor::to_vec(state)?,
        };
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, bytes)?;
        Ok(())
    }
}

impl DraftStore for FileDraftStore {
    fn load(&mut self) -> Option<InspectionState> {
        match self.read() {
            Ok(state) => state,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "draft could not be loaded; ignoring");
                None
            }
        }
    }

    fn save(&mut self, state: &InspectionState) {
        match self.write(state) {
            Ok(()) => debug!(path = %self.path.display(), "draft saved"),
            Err(error) => warn!(path = %self.path.display(), %error, "draft could not be saved"),
        }
    }

    fn clear(&mut self) {
        if let Err(error) = fs::remove_file(&self.path)
            && error.kind() != ErrorKind::NotFound
        {
            warn!(path = %self.path.display(), %error, "draft could not be removed");
        }
    }
}

/// In-process draft slot, useful for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryDraftStore {
    snapshot: Option<InspectionState>,
    saves: usize,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(state: InspectionState) -> Self {
        Self {
            snapshot: Some(state),
            saves: 0,
        }
    }

    pub fn snapshot(&self) -> Option<&InspectionState> {
        self.snapshot.as_ref()
    }

    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl DraftStore for MemoryDraftStore {
    fn load(&mut self) -> Option<InspectionState> {
        self.snapshot.clone()
    }

    fn save(&mut self, state: &InspectionState) {
        self.snapshot = Some(state.clone());
        self.saves += 1;
    }

    fn clear(&mut self) {
        self.snapshot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_draft_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = FileDraftStore::new(dir.path().join("drafts/inspection.json"));
        assert!(store.load().is_none());
        let state = InspectionState::new().set_answer("job.address", json!("1 Main St"));
        store.save(&state);
        assert_eq!(store.load(), Some(state));
        store.clear();
        assert!(store.load().is_none());
    }

    #[test]
    fn cbor_draft_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = FileDraftStore::new(dir.path().join("inspection.cbor"));
        let state = InspectionState::new()
            .set_answer("rooms.count", json!(3))
            .add_issue_photo("roof.leaks", "p1");
        store.save(&state);
        assert_eq!(store.load(), Some(state));
    }

    #[test]
    fn corrupt_draft_is_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("inspection.json");
        fs::write(&path, b"{not json").expect("write");
        let mut store = FileDraftStore::new(path);
        assert!(store.load().is_none());
    }
}
