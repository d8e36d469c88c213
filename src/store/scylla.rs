//! ScyllaDB-backed store.
//!
//! Each collection is a table `(id text PRIMARY KEY, owner text, parent text,
//! doc text)` holding the JSON document, with secondary indexes on `owner`
//! and `parent`. Unique fields double as lookup keys through
//! `unique_claims`, so only unkeyed listings scan a table. Every
//! conditional write is a lightweight transaction: updates and deletes
//! compare-and-set on the stored document text, unique fields are claimed in
//! `unique_claims` with `IF NOT EXISTS`, and edges rely on their primary key.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::TryStreamExt;
use log::{debug, warn};
use scylla::frame::response::result::CqlValue;
use scylla::{QueryResult, Session};
use serde_json::Value;

use super::{
    apply_updates, unique_values, Collection, Document, Edge, EdgeKind, Filter, Store, StoreError,
    UpdateOp, ID_FIELD, OWNER_FIELD,
};
use crate::id::ObjectId;

/// Compare-and-set rounds before an update or delete gives up.
const CAS_ATTEMPTS: usize = 5;

fn backend<E: std::fmt::Display>(err: E) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn was_applied(result: &QueryResult) -> bool {
    result
        .rows
        .as_ref()
        .and_then(|rows| rows.first())
        .and_then(|row| row.columns.first())
        .and_then(|column| column.as_ref())
        .and_then(CqlValue::as_boolean)
        .unwrap_or(false)
}

fn encode(doc: &Document) -> Result<String, StoreError> {
    serde_json::to_string(doc).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn decode(text: &str) -> Result<Document, StoreError> {
    serde_json::from_str(text).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn document_id(doc: &Document) -> Result<String, StoreError> {
    doc.get(ID_FIELD)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| StoreError::Corrupt("document has no string `_id`".to_owned()))
}

fn document_owner(doc: &Document, id: &str) -> String {
    doc.get(OWNER_FIELD)
        .and_then(Value::as_str)
        .unwrap_or(id)
        .to_owned()
}

fn claim_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn parse_object_id(raw: &str) -> Result<ObjectId, StoreError> {
    ObjectId::parse(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

/// Unique values present in `after` that differ from `before`.
fn changed_unique(
    collection: Collection,
    before: &Document,
    after: &Document,
) -> Vec<(&'static str, Value)> {
    let old = unique_values(collection, before);
    unique_values(collection, after)
        .into_iter()
        .filter(|(field, value)| old.get(field) != Some(value))
        .collect()
}

fn document_parent(collection: Collection, doc: &Document) -> Option<String> {
    collection
        .parent_field()
        .and_then(|field| doc.get(field))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

/// How a filter reaches its rows. Every path but `Scan` is a key or index
/// lookup; the filter is still applied to whatever comes back.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AccessPath {
    Id(String),
    Ids(Vec<String>),
    /// Resolved through `unique_claims`.
    Unique { field: &'static str, value: String },
    Owner(String),
    Parent(String),
    Scan,
}

fn plan(collection: Collection, filter: &Filter) -> AccessPath {
    if let Some(id) = filter.id_eq() {
        return AccessPath::Id(id.to_owned());
    }
    if let Some(ids) = filter.id_in() {
        return AccessPath::Ids(ids);
    }
    for &field in collection.unique_fields() {
        if let Some(value) = filter.string_eq(field) {
            return AccessPath::Unique {
                field,
                value: value.to_owned(),
            };
        }
    }
    if let Some(owner) = filter.owner_eq() {
        return AccessPath::Owner(owner.to_owned());
    }
    if let Some(parent) = collection
        .parent_field()
        .and_then(|field| filter.string_eq(field))
    {
        return AccessPath::Parent(parent.to_owned());
    }
    AccessPath::Scan
}

pub struct ScyllaStore {
    session: Arc<Session>,
    keyspace: String,
}

impl ScyllaStore {
    pub fn new(session: Arc<Session>, keyspace: impl Into<String>) -> Self {
        Self {
            session,
            keyspace: keyspace.into(),
        }
    }

    fn table(&self, collection: Collection) -> String {
        format!("{}.{}", self.keyspace, collection.name())
    }

    async fn select_docs(&self, cql: String, values: Vec<String>) -> Result<Vec<String>, StoreError> {
        let texts: Vec<(String,)> = self
            .session
            .query_iter(cql, values)
            .await
            .map_err(backend)?
            .into_typed::<(String,)>()
            .try_collect()
            .await
            .map_err(backend)?;
        Ok(texts.into_iter().map(|(text,)| text).collect())
    }

    async fn claim_holder(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Result<Option<String>, StoreError> {
        let holder = self
            .session
            .query(
                format!(
                    "SELECT id FROM {}.unique_claims WHERE collection = ? AND field = ? AND value = ?",
                    self.keyspace
                ),
                (collection.name(), field, value),
            )
            .await
            .map_err(backend)?
            .maybe_first_row_typed::<(String,)>()
            .map_err(backend)?;
        Ok(holder.map(|(id,)| id))
    }

    /// Candidate documents for `filter`, fetched along the narrowest path.
    async fn candidates(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<String>, StoreError> {
        let table = self.table(collection);
        let by_id = format!("SELECT doc FROM {table} WHERE id = ?");
        match plan(collection, filter) {
            AccessPath::Id(id) => self.select_docs(by_id, vec![id]).await,
            AccessPath::Ids(ids) if ids.is_empty() => Ok(Vec::new()),
            AccessPath::Ids(ids) => {
                let texts: Vec<(String,)> = self
                    .session
                    .query_iter(format!("SELECT doc FROM {table} WHERE id IN ?"), (ids,))
                    .await
                    .map_err(backend)?
                    .into_typed::<(String,)>()
                    .try_collect()
                    .await
                    .map_err(backend)?;
                Ok(texts.into_iter().map(|(text,)| text).collect())
            }
            AccessPath::Unique { field, value } => {
                match self.claim_holder(collection, field, &value).await? {
                    Some(id) => self.select_docs(by_id, vec![id]).await,
                    None => Ok(Vec::new()),
                }
            }
            AccessPath::Owner(owner) => {
                self.select_docs(format!("SELECT doc FROM {table} WHERE owner = ?"), vec![owner])
                    .await
            }
            AccessPath::Parent(parent) => {
                self.select_docs(format!("SELECT doc FROM {table} WHERE parent = ?"), vec![parent])
                    .await
            }
            AccessPath::Scan => {
                debug!("Full scan of {} for {:?}", collection, filter);
                self.select_docs(format!("SELECT doc FROM {table}"), Vec::new())
                    .await
            }
        }
    }

    /// Matching rows together with the exact stored text, in `_id` order.
    async fn rows(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<(String, Document)>, StoreError> {
        let texts = self.candidates(collection, filter).await?;
        let mut rows = Vec::with_capacity(texts.len());
        for text in texts {
            let doc = decode(&text)?;
            if filter.matches(&doc) {
                rows.push((text, doc));
            }
        }
        rows.sort_by(|(_, a), (_, b)| {
            let a = a.get(ID_FIELD).and_then(Value::as_str).unwrap_or_default();
            let b = b.get(ID_FIELD).and_then(Value::as_str).unwrap_or_default();
            a.cmp(b)
        });
        Ok(rows)
    }

    async fn first_row(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<(String, Document)>, StoreError> {
        Ok(self.rows(collection, filter).await?.into_iter().next())
    }

    /// Claims `value` of `field` for document `id`. Returns `false` when a
    /// different document already holds it.
    async fn claim(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
        id: &str,
    ) -> Result<bool, StoreError> {
        let result = self
            .session
            .query(
                format!(
                    "INSERT INTO {}.unique_claims (collection, field, value, id) VALUES (?, ?, ?, ?) IF NOT EXISTS",
                    self.keyspace
                ),
                (collection.name(), field, value, id),
            )
            .await
            .map_err(backend)?;
        if was_applied(&result) {
            return Ok(true);
        }
        let holder = self.claim_holder(collection, field, value).await?;
        Ok(holder.is_some_and(|holder| holder == id))
    }

    async fn release(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
        id: &str,
    ) -> Result<(), StoreError> {
        self.session
            .query(
                format!(
                    "DELETE FROM {}.unique_claims WHERE collection = ? AND field = ? AND value = ? IF id = ?",
                    self.keyspace
                ),
                (collection.name(), field, value, id),
            )
            .await
            .map_err(backend)?;
        Ok(())
    }

    /// Claims every value in `wanted`, rolling back on the first conflict.
    async fn claim_all(
        &self,
        collection: Collection,
        id: &str,
        wanted: &[(&'static str, Value)],
    ) -> Result<(), StoreError> {
        for (index, (field, value)) in wanted.iter().enumerate() {
            if !self.claim(collection, field, &claim_value(value), id).await? {
                self.release_all(collection, id, wanted.get(..index).unwrap_or_default())
                    .await?;
                return Err(StoreError::Conflict {
                    field: (*field).to_owned(),
                });
            }
        }
        Ok(())
    }

    async fn release_all(
        &self,
        collection: Collection,
        id: &str,
        held: &[(&'static str, Value)],
    ) -> Result<(), StoreError> {
        for (field, value) in held {
            self.release(collection, field, &claim_value(value), id).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Store for ScyllaStore {
    async fn insert(&self, collection: Collection, doc: Document) -> Result<(), StoreError> {
        let id = document_id(&doc)?;
        let claims: Vec<_> = unique_values(collection, &doc).into_iter().collect();
        self.claim_all(collection, &id, &claims).await?;

        let result = self
            .session
            .query(
                format!(
                    "INSERT INTO {} (id, owner, parent, doc) VALUES (?, ?, ?, ?) IF NOT EXISTS",
                    self.table(collection)
                ),
                (
                    &id,
                    document_owner(&doc, &id),
                    document_parent(collection, &doc),
                    encode(&doc)?,
                ),
            )
            .await
            .map_err(backend)?;
        if !was_applied(&result) {
            self.release_all(collection, &id, &claims).await?;
            return Err(StoreError::Conflict {
                field: ID_FIELD.to_owned(),
            });
        }
        debug!("Inserted document {} into {}", id, collection);
        Ok(())
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .rows(collection, filter)
            .await?
            .into_iter()
            .map(|(_, doc)| doc)
            .collect())
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        ops: &[UpdateOp],
    ) -> Result<Option<Document>, StoreError> {
        for attempt in 1..=CAS_ATTEMPTS {
            let Some((stored, current)) = self.first_row(collection, filter).await? else {
                return Ok(None);
            };
            let id = document_id(&current)?;
            let mut updated = current.clone();
            apply_updates(&mut updated, ops);

            let claimed = changed_unique(collection, &current, &updated);
            self.claim_all(collection, &id, &claimed).await?;

            let result = self
                .session
                .query(
                    format!(
                        "UPDATE {} SET doc = ?, parent = ? WHERE id = ? IF doc = ?",
                        self.table(collection)
                    ),
                    (
                        encode(&updated)?,
                        document_parent(collection, &updated),
                        &id,
                        &stored,
                    ),
                )
                .await
                .map_err(backend)?;
            if was_applied(&result) {
                let released = changed_unique(collection, &updated, &current);
                self.release_all(collection, &id, &released).await?;
                return Ok(Some(updated));
            }
            self.release_all(collection, &id, &claimed).await?;
            warn!(
                "Concurrent write on {} {} (attempt {}/{})",
                collection, id, attempt, CAS_ATTEMPTS
            );
        }
        Err(StoreError::Backend(format!(
            "update on {collection} lost {CAS_ATTEMPTS} compare-and-set rounds"
        )))
    }

    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        for _ in 0..CAS_ATTEMPTS {
            let Some((stored, current)) = self.first_row(collection, filter).await? else {
                return Ok(None);
            };
            let id = document_id(&current)?;
            let result = self
                .session
                .query(
                    format!("DELETE FROM {} WHERE id = ? IF doc = ?", self.table(collection)),
                    (&id, &stored),
                )
                .await
                .map_err(backend)?;
            if was_applied(&result) {
                let held: Vec<_> = unique_values(collection, &current).into_iter().collect();
                self.release_all(collection, &id, &held).await?;
                return Ok(Some(current));
            }
        }
        Err(StoreError::Backend(format!(
            "delete on {collection} lost {CAS_ATTEMPTS} compare-and-set rounds"
        )))
    }

    async fn delete_many(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<u64, StoreError> {
        let mut removed = 0;
        for (stored, doc) in self.rows(collection, filter).await? {
            let id = document_id(&doc)?;
            let result = self
                .session
                .query(
                    format!("DELETE FROM {} WHERE id = ? IF doc = ?", self.table(collection)),
                    (&id, &stored),
                )
                .await
                .map_err(backend)?;
            if was_applied(&result) {
                let held: Vec<_> = unique_values(collection, &doc).into_iter().collect();
                self.release_all(collection, &id, &held).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn insert_edge(&self, edge: &Edge) -> Result<bool, StoreError> {
        let result = self
            .session
            .query(
                format!(
                    "INSERT INTO {}.edges (kind, target, source, created_at) VALUES (?, ?, ?, ?) IF NOT EXISTS",
                    self.keyspace
                ),
                (
                    edge.kind.as_str(),
                    edge.target.to_string(),
                    edge.source.to_string(),
                    edge.created_at.timestamp_millis(),
                ),
            )
            .await
            .map_err(backend)?;
        Ok(was_applied(&result))
    }

    async fn delete_edge(
        &self,
        kind: EdgeKind,
        source: &ObjectId,
        target: &ObjectId,
    ) -> Result<bool, StoreError> {
        let result = self
            .session
            .query(
                format!(
                    "DELETE FROM {}.edges WHERE kind = ? AND target = ? AND source = ? IF EXISTS",
                    self.keyspace
                ),
                (kind.as_str(), target.to_string(), source.to_string()),
            )
            .await
            .map_err(backend)?;
        Ok(was_applied(&result))
    }

    async fn edge_exists(
        &self,
        kind: EdgeKind,
        source: &ObjectId,
        target: &ObjectId,
    ) -> Result<bool, StoreError> {
        let row = self
            .session
            .query(
                format!(
                    "SELECT source FROM {}.edges WHERE kind = ? AND target = ? AND source = ?",
                    self.keyspace
                ),
                (kind.as_str(), target.to_string(), source.to_string()),
            )
            .await
            .map_err(backend)?
            .maybe_first_row_typed::<(String,)>()
            .map_err(backend)?;
        Ok(row.is_some())
    }

    async fn count_edges_to(&self, kind: EdgeKind, target: &ObjectId) -> Result<u64, StoreError> {
        let (count,) = self
            .session
            .query(
                format!(
                    "SELECT COUNT(*) FROM {}.edges WHERE kind = ? AND target = ?",
                    self.keyspace
                ),
                (kind.as_str(), target.to_string()),
            )
            .await
            .map_err(backend)?
            .single_row_typed::<(i64,)>()
            .map_err(backend)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn edges_from(
        &self,
        kind: EdgeKind,
        source: &ObjectId,
    ) -> Result<Vec<Edge>, StoreError> {
        let rows: Vec<(String, String, String, i64)> = self
            .session
            .query_iter(
                format!(
                    "SELECT kind, target, source, created_at FROM {}.edges WHERE source = ?",
                    self.keyspace
                ),
                (source.to_string(),),
            )
            .await
            .map_err(backend)?
            .into_typed::<(String, String, String, i64)>()
            .try_collect()
            .await
            .map_err(backend)?;
        edges_from_rows(rows, kind)
    }

    async fn edges_to(&self, kind: EdgeKind, target: &ObjectId) -> Result<Vec<Edge>, StoreError> {
        let rows: Vec<(String, String, String, i64)> = self
            .session
            .query_iter(
                format!(
                    "SELECT kind, target, source, created_at FROM {}.edges WHERE kind = ? AND target = ?",
                    self.keyspace
                ),
                (kind.as_str(), target.to_string()),
            )
            .await
            .map_err(backend)?
            .into_typed::<(String, String, String, i64)>()
            .try_collect()
            .await
            .map_err(backend)?;
        edges_from_rows(rows, kind)
    }

    async fn delete_edges_to(
        &self,
        kind: EdgeKind,
        target: &ObjectId,
    ) -> Result<u64, StoreError> {
        let count = self.count_edges_to(kind, target).await?;
        self.session
            .query(
                format!(
                    "DELETE FROM {}.edges WHERE kind = ? AND target = ?",
                    self.keyspace
                ),
                (kind.as_str(), target.to_string()),
            )
            .await
            .map_err(backend)?;
        Ok(count)
    }
}

fn edges_from_rows(
    rows: Vec<(String, String, String, i64)>,
    kind: EdgeKind,
) -> Result<Vec<Edge>, StoreError> {
    let mut edges = Vec::new();
    for (raw_kind, target, source, created_at) in rows {
        if EdgeKind::parse(&raw_kind) != Some(kind) {
            continue;
        }
        edges.push(Edge {
            kind,
            source: parse_object_id(&source)?,
            target: parse_object_id(&target)?,
            created_at: Utc
                .timestamp_millis_opt(created_at)
                .single()
                .unwrap_or_default(),
        });
    }
    Ok(edges)
}
