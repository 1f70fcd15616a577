//! Nested answer tree with copy-on-write updates.
//!
//! Every mutation returns a new [`InspectionState`]; the receiver is never
//! touched. Subtrees sit behind `Arc`, so a write only copies the nodes along
//! the written path and everything else stays shared with the previous state.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::answer::{Answer, AnswerPayload, IssueDetail, MAX_PHOTOS, StagedPhoto, Stored};
use crate::flatten::{FlatState, flatten_value, join};
use crate::repository::SchemaRepository;
use crate::spec::FieldType;

/// Root key holding issue-capture details, keyed by field key.
pub const ISSUE_DETAILS_KEY: &str = "_issue_details";
/// Root key holding staged photos, keyed by section id or field key.
pub const STAGED_PHOTOS_KEY: &str = "_staged_photos";

type Tree = BTreeMap<String, Node>;

/// One node of the answer tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Answer(Arc<Answer>),
    /// Stored data that is not answer-shaped (legacy drafts, schema drift).
    Plain(Arc<Value>),
    Branch(Arc<Tree>),
}

impl Node {
    fn from_json(value: &Value) -> Self {
        if let Some(answer) = Answer::from_json(value) {
            return Node::Answer(Arc::new(answer));
        }
        match value {
            Value::Object(map) => Node::Branch(Arc::new(
                map.iter()
                    .map(|(key, child)| (key.clone(), Node::from_json(child)))
                    .collect(),
            )),
            other => Node::Plain(Arc::new(other.clone())),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Node::Answer(answer) => answer.to_json(),
            Node::Plain(value) => value.as_ref().clone(),
            Node::Branch(children) => Value::Object(
                children
                    .iter()
                    .map(|(key, child)| (key.clone(), child.to_json()))
                    .collect(),
            ),
        }
    }

    fn flatten_into(&self, prefix: &str, out: &mut FlatState) {
        match self {
            Node::Answer(answer) => {
                out.insert(prefix.to_string(), answer.value.clone());
            }
            Node::Plain(value) => flatten_value(prefix, value, out),
            Node::Branch(children) => {
                for (key, child) in children.iter() {
                    child.flatten_into(&join(prefix, key), out);
                }
            }
        }
    }
}

/// Answer tree plus the issue-detail and staged-photo side channels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InspectionState {
    tree: Arc<Tree>,
    issue_details: Arc<BTreeMap<String, IssueDetail>>,
    staged_photos: Arc<BTreeMap<String, Vec<StagedPhoto>>>,
}

/// Seeds every schema field with its type default.
///
/// Booleans start `false`, `array_enum` fields `[]`, everything else `null`;
/// table fields and exception lists are left out.
pub fn build_empty_state(schema: &SchemaRepository) -> InspectionState {
    let mut tree = Tree::new();
    for field in schema.fields().filter(|field| field.is_seeded()) {
        let default = match field.kind {
            FieldType::Boolean => Value::Bool(false),
            FieldType::ArrayEnum => Value::Array(Vec::new()),
            _ => Value::Null,
        };
        insert_path(&mut tree, &segments(&field.key), Node::Answer(Arc::new(Answer::answered(default))));
    }
    InspectionState {
        tree: Arc::new(tree),
        ..InspectionState::default()
    }
}

impl InspectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes an answer (bare values are wrapped as answered) at `key`,
    /// creating intermediate objects as needed.
    pub fn set_answer(&self, key: &str, payload: impl Into<AnswerPayload>) -> Self {
        let answer = payload.into().into_answer();
        let mut next = self.clone();
        insert_path(
            Arc::make_mut(&mut next.tree),
            &segments(key),
            Node::Answer(Arc::new(answer)),
        );
        next
    }

    /// Removes the answer or subtree at each path. Missing paths are ignored.
    pub fn clear_paths<S: AsRef<str>>(&self, paths: &[S]) -> Self {
        let mut next = self.clone();
        for path in paths {
            let path = path.as_ref();
            if get_node(&next.tree, &segments(path)).is_none() {
                continue;
            }
            remove_path(Arc::make_mut(&mut next.tree), &segments(path));
            debug!(path = %path, "cleared answer path");
        }
        next
    }

    pub fn node(&self, key: &str) -> Option<&Node> {
        get_node(&self.tree, &segments(key))
    }

    /// Normalised leaf at `key`; branches are not leaves.
    pub fn lookup(&self, key: &str) -> Option<Stored<'_>> {
        match self.node(key)? {
            Node::Answer(answer) => Some(Stored::Answer(answer)),
            Node::Plain(value) => Some(Stored::Plain(value)),
            Node::Branch(_) => None,
        }
    }

    /// The answer at `key`, or `None` when the stored node is not answer-shaped.
    pub fn get_answer(&self, key: &str) -> Option<&Answer> {
        self.lookup(key).and_then(|stored| stored.answer())
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.lookup(key).map(|stored| stored.value())
    }

    /// Dot-path projection of the answer tree. Side channels are excluded.
    pub fn flatten(&self) -> FlatState {
        let mut out = FlatState::new();
        for (key, node) in self.tree.iter() {
            node.flatten_into(key, &mut out);
        }
        out
    }

    pub fn issue_detail(&self, key: &str) -> Option<&IssueDetail> {
        self.issue_details.get(key)
    }

    pub fn issue_details(&self) -> &BTreeMap<String, IssueDetail> {
        &self.issue_details
    }

    /// Stores issue details for `key`. Photos beyond the cap are dropped.
    pub fn upsert_issue_detail(&self, key: &str, mut detail: IssueDetail) -> Self {
        if detail.photo_ids.len() > MAX_PHOTOS {
            debug!(key = %key, "issue detail photos truncated to cap");
            detail.photo_ids.truncate(MAX_PHOTOS);
        }
        let mut next = self.clone();
        Arc::make_mut(&mut next.issue_details).insert(key.to_string(), detail);
        next
    }

    pub fn remove_issue_detail(&self, key: &str) -> Self {
        if !self.issue_details.contains_key(key) {
            return self.clone();
        }
        let mut next = self.clone();
        Arc::make_mut(&mut next.issue_details).remove(key);
        next
    }

    /// Adds a photo reference to the issue detail for `key`, creating the
    /// detail if needed. Ignored once the cap is reached.
    pub fn add_issue_photo(&self, key: &str, photo_id: &str) -> Self {
        let current = self.issue_details.get(key);
        if current.is_some_and(|detail| {
            detail.photo_ids.len() >= MAX_PHOTOS || detail.photo_ids.iter().any(|id| id == photo_id)
        }) {
            debug!(key = %key, photo_id = %photo_id, "issue photo not added");
            return self.clone();
        }
        let mut next = self.clone();
        Arc::make_mut(&mut next.issue_details)
            .entry(key.to_string())
            .or_default()
            .photo_ids
            .push(photo_id.to_string());
        next
    }

    pub fn remove_issue_photo(&self, key: &str, photo_id: &str) -> Self {
        let Some(detail) = self.issue_details.get(key) else {
            return self.clone();
        };
        if !detail.photo_ids.iter().any(|id| id == photo_id) {
            return self.clone();
        }
        let mut next = self.clone();
        if let Some(detail) = Arc::make_mut(&mut next.issue_details).get_mut(key) {
            detail.photo_ids.retain(|id| id != photo_id);
        }
        next
    }

    pub fn staged_photos(&self, key: &str) -> &[StagedPhoto] {
        self.staged_photos.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Stages a photo under a section id or field key. Ignored once the cap
    /// is reached or when the id is already staged.
    pub fn stage_photo(&self, key: &str, photo: StagedPhoto) -> Self {
        let staged = self.staged_photos(key);
        if staged.len() >= MAX_PHOTOS || staged.iter().any(|existing| existing.id == photo.id) {
            debug!(key = %key, photo_id = %photo.id, "staged photo not added");
            return self.clone();
        }
        let mut next = self.clone();
        Arc::make_mut(&mut next.staged_photos)
            .entry(key.to_string())
            .or_default()
            .push(photo);
        next
    }

    /// Replaces the metadata of an already staged photo.
    pub fn update_staged_photo(&self, key: &str, photo: StagedPhoto) -> Self {
        if !self.staged_photos(key).iter().any(|existing| existing.id == photo.id) {
            return self.clone();
        }
        let mut next = self.clone();
        if let Some(photos) = Arc::make_mut(&mut next.staged_photos).get_mut(key)
            && let Some(slot) = photos.iter_mut().find(|existing| existing.id == photo.id)
        {
            *slot = photo;
        }
        next
    }

    pub fn unstage_photo(&self, key: &str, photo_id: &str) -> Self {
        if !self.staged_photos(key).iter().any(|photo| photo.id == photo_id) {
            return self.clone();
        }
        let mut next = self.clone();
        let photos = Arc::make_mut(&mut next.staged_photos);
        if let Some(list) = photos.get_mut(key) {
            list.retain(|photo| photo.id != photo_id);
            if list.is_empty() {
                photos.remove(key);
            }
        }
        next
    }

    /// Root JSON object: the answer tree plus the reserved side-channel keys.
    pub fn to_json(&self) -> Value {
        let mut map = match Node::Branch(self.tree.clone()).to_json() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if !self.issue_details.is_empty()
            && let Ok(details) = serde_json::to_value(self.issue_details.as_ref())
        {
            map.insert(ISSUE_DETAILS_KEY.into(), details);
        }
        if !self.staged_photos.is_empty()
            && let Ok(photos) = serde_json::to_value(self.staged_photos.as_ref())
        {
            map.insert(STAGED_PHOTOS_KEY.into(), photos);
        }
        Value::Object(map)
    }

    /// Rebuilds state from JSON. Malformed side channels are dropped and a
    /// non-object root yields an empty state.
    pub fn from_json(value: &Value) -> Self {
        let Some(root) = value.as_object() else {
            warn!("stored state is not an object; starting empty");
            return Self::default();
        };
        let mut tree = Tree::new();
        let mut issue_details = BTreeMap::new();
        let mut staged_photos = BTreeMap::new();
        for (key, child) in root {
            match key.as_str() {
                ISSUE_DETAILS_KEY => match serde_json::from_value(child.clone()) {
                    Ok(details) => issue_details = details,
                    Err(error) => warn!(%error, "ignoring malformed issue details"),
                },
                STAGED_PHOTOS_KEY => match serde_json::from_value(child.clone()) {
                    Ok(photos) => staged_photos = photos,
                    Err(error) => warn!(%error, "ignoring malformed staged photos"),
                },
                _ => {
                    tree.insert(key.clone(), Node::from_json(child));
                }
            }
        }
        Self {
            tree: Arc::new(tree),
            issue_details: Arc::new(issue_details),
            staged_photos: Arc::new(staged_photos),
        }
    }

    #[cfg(test)]
    pub(crate) fn shares_subtree_with(&self, other: &Self, top_key: &str) -> bool {
        match (self.tree.get(top_key), other.tree.get(top_key)) {
            (Some(Node::Branch(left)), Some(Node::Branch(right))) => Arc::ptr_eq(left, right),
            _ => false,
        }
    }
}

impl Serialize for InspectionState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for InspectionState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_json(&value))
    }
}

fn segments(key: &str) -> Vec<&str> {
    key.split('.').filter(|segment| !segment.is_empty()).collect()
}

fn get_node<'a>(tree: &'a Tree, path: &[&str]) -> Option<&'a Node> {
    let (first, rest) = path.split_first()?;
    let node = tree.get(*first)?;
    if rest.is_empty() {
        return Some(node);
    }
    match node {
        Node::Branch(children) => get_node(children, rest),
        _ => None,
    }
}

fn insert_path(tree: &mut Tree, path: &[&str], leaf: Node) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    if rest.is_empty() {
        tree.insert(first.to_string(), leaf);
        return;
    }
    let slot = tree
        .entry(first.to_string())
        .or_insert_with(|| Node::Branch(Arc::default()));
    if !matches!(slot, Node::Branch(_)) {
        *slot = Node::Branch(Arc::default());
    }
    if let Node::Branch(children) = slot {
        insert_path(Arc::make_mut(children), rest, leaf);
    }
}

fn remove_path(tree: &mut Tree, path: &[&str]) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    if rest.is_empty() {
        tree.remove(*first);
        return;
    }
    if let Some(Node::Branch(children)) = tree.get_mut(*first) {
        remove_path(Arc::make_mut(children), rest);
    }
}
