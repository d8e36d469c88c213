//! In-process store.
//!
//! Everything sits behind one [`RwLock`], so every conditional operation is
//! trivially atomic. Used for local development and throughout the tests.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{
    apply_updates, unique_values, Collection, Document, Edge, EdgeKind, Filter, Store, StoreError,
    UpdateOp, ID_FIELD,
};
use crate::id::ObjectId;

type EdgeKey = (EdgeKind, ObjectId, ObjectId);

#[derive(Default)]
struct State {
    collections: HashMap<Collection, BTreeMap<String, Document>>,
    /// Keyed by `(kind, target, source)`; the key itself is the uniqueness
    /// constraint.
    edges: BTreeMap<EdgeKey, DateTime<Utc>>,
}

impl State {
    fn table(&self, collection: Collection) -> Option<&BTreeMap<String, Document>> {
        self.collections.get(&collection)
    }

    fn table_mut(&mut self, collection: Collection) -> &mut BTreeMap<String, Document> {
        self.collections.entry(collection).or_default()
    }

    fn first_match(&self, collection: Collection, filter: &Filter) -> Option<String> {
        let table = self.table(collection)?;
        if let Some(id) = filter.id_eq() {
            return table
                .get(id)
                .filter(|doc| filter.matches(doc))
                .map(|_| id.to_owned());
        }
        table
            .iter()
            .find(|(_, doc)| filter.matches(doc))
            .map(|(id, _)| id.clone())
    }

    /// Rejects `doc` if a different document already holds one of its
    /// unique values.
    fn check_unique(
        &self,
        collection: Collection,
        doc: &Document,
        own_id: &str,
    ) -> Result<(), StoreError> {
        let Some(table) = self.table(collection) else {
            return Ok(());
        };
        for (field, value) in unique_values(collection, doc) {
            let taken = table
                .iter()
                .any(|(id, other)| id != own_id && other.get(field) == Some(&value));
            if taken {
                return Err(StoreError::Conflict {
                    field: field.to_owned(),
                });
            }
        }
        Ok(())
    }
}

fn document_id(doc: &Document) -> Result<String, StoreError> {
    doc.get(ID_FIELD)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| StoreError::Corrupt("document has no string `_id`".to_owned()))
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert(&self, collection: Collection, doc: Document) -> Result<(), StoreError> {
        let id = document_id(&doc)?;
        let mut state = self.state.write().await;
        if state
            .table(collection)
            .is_some_and(|table| table.contains_key(&id))
        {
            return Err(StoreError::Conflict {
                field: ID_FIELD.to_owned(),
            });
        }
        state.check_unique(collection, &doc, &id)?;
        state.table_mut(collection).insert(id, doc);
        debug!("Inserted document into {}", collection);
        Ok(())
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Document>, StoreError> {
        let state = self.state.read().await;
        let Some(table) = state.table(collection) else {
            return Ok(Vec::new());
        };
        if let Some(id) = filter.id_eq() {
            return Ok(table
                .get(id)
                .filter(|doc| filter.matches(doc))
                .cloned()
                .into_iter()
                .collect());
        }
        Ok(table
            .values()
            .filter(|doc| filter.matches(doc))
            .cloned()
            .collect())
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        ops: &[UpdateOp],
    ) -> Result<Option<Document>, StoreError> {
        let mut state = self.state.write().await;
        let Some(id) = state.first_match(collection, filter) else {
            return Ok(None);
        };
        let Some(mut updated) = state.table(collection).and_then(|t| t.get(&id)).cloned() else {
            return Ok(None);
        };
        apply_updates(&mut updated, ops);
        state.check_unique(collection, &updated, &id)?;
        state.table_mut(collection).insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        let mut state = self.state.write().await;
        let Some(id) = state.first_match(collection, filter) else {
            return Ok(None);
        };
        Ok(state.table_mut(collection).remove(&id))
    }

    async fn delete_many(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let table = state.table_mut(collection);
        let before = table.len();
        table.retain(|_, doc| !filter.matches(doc));
        Ok(u64::try_from(before - table.len()).unwrap_or(u64::MAX))
    }

    async fn insert_edge(&self, edge: &Edge) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let key = (edge.kind, edge.target, edge.source);
        if state.edges.contains_key(&key) {
            return Ok(false);
        }
        state.edges.insert(key, edge.created_at);
        Ok(true)
    }

    async fn delete_edge(
        &self,
        kind: EdgeKind,
        source: &ObjectId,
        target: &ObjectId,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.edges.remove(&(kind, *target, *source)).is_some())
    }

    async fn edge_exists(
        &self,
        kind: EdgeKind,
        source: &ObjectId,
        target: &ObjectId,
    ) -> Result<bool, StoreError> {
        let state = self.state.read().await;
        Ok(state.edges.contains_key(&(kind, *target, *source)))
    }

    async fn count_edges_to(&self, kind: EdgeKind, target: &ObjectId) -> Result<u64, StoreError> {
        let edges = self.edges_to(kind, target).await?;
        Ok(u64::try_from(edges.len()).unwrap_or(u64::MAX))
    }

    async fn edges_from(
        &self,
        kind: EdgeKind,
        source: &ObjectId,
    ) -> Result<Vec<Edge>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .edges
            .iter()
            .filter(|((edge_kind, _, edge_source), _)| *edge_kind == kind && edge_source == source)
            .map(|(&(kind, target, source), &created_at)| Edge {
                kind,
                source,
                target,
                created_at,
            })
            .collect())
    }

    async fn edges_to(&self, kind: EdgeKind, target: &ObjectId) -> Result<Vec<Edge>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .edges
            .iter()
            .filter(|((edge_kind, edge_target, _), _)| *edge_kind == kind && edge_target == target)
            .map(|(&(kind, target, source), &created_at)| Edge {
                kind,
                source,
                target,
                created_at,
            })
            .collect())
    }

    async fn delete_edges_to(
        &self,
        kind: EdgeKind,
        target: &ObjectId,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let before = state.edges.len();
        state
            .edges
            .retain(|(edge_kind, edge_target, _), _| !(*edge_kind == kind && edge_target == target));
        Ok(u64::try_from(before - state.edges.len()).unwrap_or(u64::MAX))
    }
}
