//! Owner-scoped mutations.
//!
//! A caller may only change what they own. The ownership check and the
//! mutation are a single conditional store operation, so there is no window
//! between "is this mine?" and "change it". A missing document and a
//! document owned by someone else produce the same error, which keeps
//! resource existence private.

use log::info;

use crate::error::{ApiError, ApiResult};
use crate::id::ObjectId;
use crate::models::Resource;
use crate::repository::Repository;
use crate::store::{Filter, UpdateOp};

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Update(Vec<UpdateOp>),
    Delete,
}

impl Mutation {
    fn verb(&self) -> &'static str {
        match self {
            Mutation::Update(_) => "update",
            Mutation::Delete => "delete",
        }
    }
}

/// The filter every owner-scoped operation runs under.
pub fn owned(id: &ObjectId, caller: &ObjectId) -> Filter {
    Filter::by_id(id).and(Filter::owned_by(caller))
}

pub fn not_owned<T: Resource>(verb: &str) -> ApiError {
    ApiError::NotFoundOrForbidden(format!(
        "{} does not exist or you're not authorized to {verb} it",
        T::LABEL
    ))
}

/// Applies `mutation` to the document `id` iff `caller` owns it. Returns the
/// document after an update, or as it was before a delete.
pub async fn mutate_owned<T: Resource>(
    repo: &Repository,
    id: &ObjectId,
    caller: &ObjectId,
    mutation: Mutation,
) -> ApiResult<T> {
    mutate_owned_if(repo, id, caller, Filter::new(), mutation).await
}

/// Like [`mutate_owned`], with `condition` folded into the same atomic
/// filter.
pub async fn mutate_owned_if<T: Resource>(
    repo: &Repository,
    id: &ObjectId,
    caller: &ObjectId,
    condition: Filter,
    mutation: Mutation,
) -> ApiResult<T> {
    let verb = mutation.verb();
    let filter = owned(id, caller).and(condition);
    let outcome = match mutation {
        Mutation::Update(ops) => repo.update::<T>(&filter, ops).await?,
        Mutation::Delete => repo.delete::<T>(&filter).await?,
    };
    match outcome {
        Some(doc) => {
            info!("{} {} {}d by {}", T::LABEL, id, verb, caller);
            Ok(doc)
        }
        None => Err(not_owned::<T>(verb)),
    }
}
