use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::ObjectId;

pub const COMMENT_FIELDS: &[&str] = &["_id", "content", "video", "owner", "createdAt", "updatedAt"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub content: String,
    pub video: ObjectId,
    pub owner: ObjectId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(video: ObjectId, owner: ObjectId, content: String) -> Self {
        let now = super::now();
        Self {
            id: ObjectId::new(),
            content,
            video,
            owner,
            created_at: now,
            updated_at: now,
        }
    }
}
