//! Typed access to the document store.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::id::ObjectId;
use crate::models::{self, Resource};
use crate::store::{Document, Filter, Store, StoreError, UpdateOp};

pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::Corrupt(format!(
            "expected an object, serialized to {other}"
        ))),
        Err(err) => Err(StoreError::Corrupt(err.to_string())),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(doc)).map_err(|err| StoreError::Corrupt(err.to_string()))
}

/// Stamp applied with every update.
pub fn touch() -> UpdateOp {
    UpdateOp::set("updatedAt", models::now().timestamp_millis())
}

#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn Store>,
}

impl Repository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// The untyped store, for edges and aggregation.
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub async fn insert<T: Resource>(&self, value: &T) -> Result<(), StoreError> {
        self.store.insert(T::COLLECTION, to_document(value)?).await
    }

    pub async fn get<T: Resource>(&self, id: &ObjectId) -> Result<Option<T>, StoreError> {
        self.find_one(&Filter::by_id(id)).await
    }

    pub async fn find_one<T: Resource>(&self, filter: &Filter) -> Result<Option<T>, StoreError> {
        self.store
            .find_one(T::COLLECTION, filter)
            .await?
            .map(from_document)
            .transpose()
    }

    pub async fn find<T: Resource>(&self, filter: &Filter) -> Result<Vec<T>, StoreError> {
        self.store
            .find(T::COLLECTION, filter)
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }

    pub async fn count<T: Resource>(&self, filter: &Filter) -> Result<u64, StoreError> {
        self.store.count(T::COLLECTION, filter).await
    }

    /// Applies `ops` plus an `updatedAt` stamp to the first match.
    pub async fn update<T: Resource>(
        &self,
        filter: &Filter,
        mut ops: Vec<UpdateOp>,
    ) -> Result<Option<T>, StoreError> {
        ops.push(touch());
        self.store
            .update_one(T::COLLECTION, filter, &ops)
            .await?
            .map(from_document)
            .transpose()
    }

    pub async fn delete<T: Resource>(&self, filter: &Filter) -> Result<Option<T>, StoreError> {
        self.store
            .delete_one(T::COLLECTION, filter)
            .await?
            .map(from_document)
            .transpose()
    }

    pub async fn delete_many<T: Resource>(&self, filter: &Filter) -> Result<u64, StoreError> {
        self.store.delete_many(T::COLLECTION, filter).await
    }
}
