//! Idempotent on/off relations (likes and subscriptions).

use crate::id::ObjectId;
use crate::store::{Edge, EdgeKind, Store, StoreError};

/// Identifies one relation: `source` (the caller) towards `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeKey {
    pub kind: EdgeKind,
    pub source: ObjectId,
    pub target: ObjectId,
}

impl EdgeKey {
    pub fn new(kind: EdgeKind, source: ObjectId, target: ObjectId) -> Self {
        Self {
            kind,
            source,
            target,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleOutcome {
    /// Whether the relation exists after the call.
    pub active: bool,
    /// Relations of this kind pointing at the target after the call.
    pub count: u64,
}

/// Flips the relation: removes it if present, otherwise creates it.
///
/// Uniqueness is enforced by the store key. Two concurrent first-time
/// toggles both see nothing to delete; one insert wins and the other finds
/// the edge already present, so both report `active` and exactly one edge
/// exists.
pub async fn toggle_relation(store: &dyn Store, key: &EdgeKey) -> Result<ToggleOutcome, StoreError> {
    let removed = store.delete_edge(key.kind, &key.source, &key.target).await?;
    let active = if removed {
        false
    } else {
        store
            .insert_edge(&Edge::new(key.kind, key.source, key.target))
            .await?;
        true
    };
    let count = store.count_edges_to(key.kind, &key.target).await?;
    Ok(ToggleOutcome { active, count })
}
