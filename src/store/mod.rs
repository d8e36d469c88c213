//! Document store abstraction.
//!
//! Handlers never talk to a database directly. They go through [`Store`],
//! which models a small document database: collections of JSON documents
//! keyed by `_id`, filtered finds, atomic find-and-update / find-and-delete,
//! and relation edges whose `(kind, target, source)` key is unique.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::id::ObjectId;

pub mod memory;
pub mod scylla;

pub use memory::MemoryStore;
pub use scylla::ScyllaStore;

/// A stored document. Always carries `_id`; owned documents carry `owner`.
pub type Document = Map<String, Value>;

pub const ID_FIELD: &str = "_id";
pub const OWNER_FIELD: &str = "owner";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate value for unique field `{field}`")]
    Conflict { field: String },
    #[error("stored document is malformed: {0}")]
    Corrupt(String),
    #[error("store backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Collection {
    Users,
    Videos,
    Comments,
    Tweets,
    Playlists,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Users,
        Collection::Videos,
        Collection::Comments,
        Collection::Tweets,
        Collection::Playlists,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Videos => "videos",
            Collection::Comments => "comments",
            Collection::Tweets => "tweets",
            Collection::Playlists => "playlists",
        }
    }

    /// Field naming the document this one hangs off, if the collection has
    /// one. Backends may index it.
    pub const fn parent_field(self) -> Option<&'static str> {
        match self {
            Collection::Comments => Some("video"),
            _ => None,
        }
    }

    /// Fields whose values must be unique across the collection.
    pub const fn unique_fields(self) -> &'static [&'static str] {
        match self {
            Collection::Users => &["username", "email"],
            _ => &[],
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String, Value),
    In(String, Vec<Value>),
    /// Array field contains the value.
    Contains(String, Value),
}

impl Condition {
    fn matches(&self, doc: &Document) -> bool {
        match self {
            Condition::Eq(field, expected) => doc.get(field).unwrap_or(&Value::Null) == expected,
            Condition::In(field, allowed) => doc
                .get(field)
                .is_some_and(|value| allowed.iter().any(|candidate| candidate == value)),
            Condition::Contains(field, expected) => doc
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(expected)),
        }
    }
}

/// Conjunction of equality-style conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: &ObjectId) -> Self {
        Self::new().eq(ID_FIELD, id.to_string())
    }

    pub fn owned_by(owner: &ObjectId) -> Self {
        Self::new().eq(OWNER_FIELD, owner.to_string())
    }

    pub fn ids(ids: &[ObjectId]) -> Self {
        Self::new().one_of(ID_FIELD, ids.iter().map(|id| Value::from(id.to_string())))
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Eq(field.to_owned(), value.into()));
        self
    }

    pub fn one_of(mut self, field: &str, values: impl IntoIterator<Item = Value>) -> Self {
        self.conditions
            .push(Condition::In(field.to_owned(), values.into_iter().collect()));
        self
    }

    pub fn contains(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Contains(field.to_owned(), value.into()));
        self
    }

    pub fn and(mut self, other: Filter) -> Self {
        self.conditions.extend(other.conditions);
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions.iter().all(|condition| condition.matches(doc))
    }

    /// The `_id` this filter pins, if any.
    pub fn id_eq(&self) -> Option<&str> {
        self.string_eq(ID_FIELD)
    }

    /// The `owner` this filter pins, if any.
    pub fn owner_eq(&self) -> Option<&str> {
        self.string_eq(OWNER_FIELD)
    }

    /// The `_id` set this filter restricts to, if any.
    pub fn id_in(&self) -> Option<Vec<String>> {
        self.conditions.iter().find_map(|condition| match condition {
            Condition::In(field, values) if field == ID_FIELD => Some(
                values
                    .iter()
                    .filter_map(|value| value.as_str().map(str::to_owned))
                    .collect(),
            ),
            _ => None,
        })
    }

    /// The string value this filter pins `wanted` to, if any.
    pub fn string_eq(&self, wanted: &str) -> Option<&str> {
        self.conditions.iter().find_map(|condition| match condition {
            Condition::Eq(field, Value::String(value)) if field == wanted => Some(value.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    Set(String, Value),
    Unset(String),
    Inc(String, i64),
    /// Append to an array field unless already present.
    AddToSet(String, Value),
    /// Remove every occurrence from an array field.
    Pull(String, Value),
}

impl UpdateOp {
    pub fn set(field: &str, value: impl Into<Value>) -> Self {
        UpdateOp::Set(field.to_owned(), value.into())
    }

    pub fn unset(field: &str) -> Self {
        UpdateOp::Unset(field.to_owned())
    }

    pub fn inc(field: &str, by: i64) -> Self {
        UpdateOp::Inc(field.to_owned(), by)
    }

    pub fn add_to_set(field: &str, value: impl Into<Value>) -> Self {
        UpdateOp::AddToSet(field.to_owned(), value.into())
    }

    pub fn pull(field: &str, value: impl Into<Value>) -> Self {
        UpdateOp::Pull(field.to_owned(), value.into())
    }
}

/// Applies `ops` to `doc` in order. Shared by every backend so update
/// semantics are identical regardless of where documents live.
pub fn apply_updates(doc: &mut Document, ops: &[UpdateOp]) {
    for op in ops {
        match op {
            UpdateOp::Set(field, value) => {
                doc.insert(field.clone(), value.clone());
            }
            UpdateOp::Unset(field) => {
                doc.remove(field);
            }
            UpdateOp::Inc(field, by) => {
                let current = doc.get(field).and_then(Value::as_i64).unwrap_or(0);
                doc.insert(field.clone(), Value::from(current.saturating_add(*by)));
            }
            UpdateOp::AddToSet(field, value) => {
                let slot = doc
                    .entry(field.clone())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if !slot.is_array() {
                    *slot = Value::Array(Vec::new());
                }
                if let Value::Array(items) = slot {
                    if !items.contains(value) {
                        items.push(value.clone());
                    }
                }
            }
            UpdateOp::Pull(field, value) => {
                if let Some(Value::Array(items)) = doc.get_mut(field) {
                    items.retain(|item| item != value);
                }
            }
        }
    }
}

/// Values of the unique fields of `collection` present in `doc`.
pub fn unique_values(collection: Collection, doc: &Document) -> BTreeMap<&'static str, Value> {
    collection
        .unique_fields()
        .iter()
        .filter_map(|field| doc.get(*field).map(|value| (*field, value.clone())))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeKind {
    VideoLike,
    CommentLike,
    TweetLike,
    Subscription,
}

impl EdgeKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            EdgeKind::VideoLike => "like:video",
            EdgeKind::CommentLike => "like:comment",
            EdgeKind::TweetLike => "like:tweet",
            EdgeKind::Subscription => "subscription",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "like:video" => Some(EdgeKind::VideoLike),
            "like:comment" => Some(EdgeKind::CommentLike),
            "like:tweet" => Some(EdgeKind::TweetLike),
            "subscription" => Some(EdgeKind::Subscription),
            _ => None,
        }
    }
}

/// A directed relation record: `source` likes / subscribes to `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub kind: EdgeKind,
    pub source: ObjectId,
    pub target: ObjectId,
    pub created_at: DateTime<Utc>,
}

impl Edge {
    pub fn new(kind: EdgeKind, source: ObjectId, target: ObjectId) -> Self {
        Self {
            kind,
            source,
            target,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts a new document. Fails with [`StoreError::Conflict`] when a
    /// unique field collides with an existing document.
    async fn insert(&self, collection: Collection, doc: Document) -> Result<(), StoreError>;

    /// All documents matching `filter`, in `_id` order.
    async fn find(&self, collection: Collection, filter: &Filter)
        -> Result<Vec<Document>, StoreError>;

    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        Ok(self.find(collection, filter).await?.into_iter().next())
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let docs = self.find(collection, filter).await?;
        Ok(u64::try_from(docs.len()).unwrap_or(u64::MAX))
    }

    /// Atomically applies `ops` to the first document matching `filter` and
    /// returns the updated document, or `None` when nothing matched.
    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        ops: &[UpdateOp],
    ) -> Result<Option<Document>, StoreError>;

    /// Atomically removes the first document matching `filter` and returns it.
    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError>;

    async fn delete_many(&self, collection: Collection, filter: &Filter)
        -> Result<u64, StoreError>;

    /// Inserts the edge unless one with the same key exists. Returns whether
    /// this call created it.
    async fn insert_edge(&self, edge: &Edge) -> Result<bool, StoreError>;

    /// Deletes the edge if present. Returns whether this call removed it.
    async fn delete_edge(
        &self,
        kind: EdgeKind,
        source: &ObjectId,
        target: &ObjectId,
    ) -> Result<bool, StoreError>;

    async fn edge_exists(
        &self,
        kind: EdgeKind,
        source: &ObjectId,
        target: &ObjectId,
    ) -> Result<bool, StoreError>;

    async fn count_edges_to(&self, kind: EdgeKind, target: &ObjectId) -> Result<u64, StoreError>;

    async fn edges_from(&self, kind: EdgeKind, source: &ObjectId)
        -> Result<Vec<Edge>, StoreError>;

    async fn edges_to(&self, kind: EdgeKind, target: &ObjectId) -> Result<Vec<Edge>, StoreError>;

    async fn delete_edges_to(&self, kind: EdgeKind, target: &ObjectId)
        -> Result<u64, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn filter_matches_all_conditions() {
        let video = doc(json!({"_id": "a", "owner": "u1", "isPublished": true, "tags": ["x"]}));
        assert!(Filter::new().eq("owner", "u1").eq("isPublished", true).matches(&video));
        assert!(!Filter::new().eq("owner", "u1").eq("isPublished", false).matches(&video));
        assert!(Filter::new().one_of("_id", [json!("b"), json!("a")]).matches(&video));
        assert!(Filter::new().contains("tags", "x").matches(&video));
        assert!(!Filter::new().contains("tags", "y").matches(&video));
    }

    #[test]
    fn missing_fields_compare_as_null() {
        let video = doc(json!({"_id": "a"}));
        assert!(Filter::new().eq("refreshToken", Value::Null).matches(&video));
    }

    #[test]
    fn filter_exposes_key_conditions() {
        let owner = ObjectId::new();
        let id = ObjectId::new();
        let filter = Filter::by_id(&id).and(Filter::owned_by(&owner));
        assert_eq!(filter.id_eq(), Some(id.to_string().as_str()));
        assert_eq!(filter.owner_eq(), Some(owner.to_string().as_str()));
        assert_eq!(Filter::ids(&[id]).id_in(), Some(vec![id.to_string()]));
    }

    #[test]
    fn updates_follow_document_store_semantics() {
        let mut playlist = doc(json!({"_id": "p", "name": "old", "videos": ["v1"], "views": 1}));
        apply_updates(
            &mut playlist,
            &[
                UpdateOp::set("name", "new"),
                UpdateOp::add_to_set("videos", "v1"),
                UpdateOp::add_to_set("videos", "v2"),
                UpdateOp::pull("videos", "v1"),
                UpdateOp::inc("views", 2),
                UpdateOp::unset("missing"),
            ],
        );
        assert_eq!(
            Value::Object(playlist),
            json!({"_id": "p", "name": "new", "videos": ["v2"], "views": 3})
        );
    }

    #[test]
    fn add_to_set_creates_missing_arrays() {
        let mut user = doc(json!({"_id": "u"}));
        apply_updates(&mut user, &[UpdateOp::add_to_set("watchHistory", "v")]);
        assert_eq!(user.get("watchHistory"), Some(&json!(["v"])));
    }

    #[test]
    fn edge_kinds_round_trip_through_their_labels() {
        for kind in [
            EdgeKind::VideoLike,
            EdgeKind::CommentLike,
            EdgeKind::TweetLike,
            EdgeKind::Subscription,
        ] {
            assert_eq!(EdgeKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EdgeKind::parse("follow"), None);
    }
}
