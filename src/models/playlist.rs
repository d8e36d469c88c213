use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::ObjectId;

/// Video fields shown inside a playlist.
pub const PLAYLIST_VIDEO_FIELDS: &[&str] = &["_id", "title", "thumbnail", "views", "duration", "owner"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub description: String,
    pub owner: ObjectId,
    #[serde(default)]
    pub videos: Vec<ObjectId>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Playlist {
    pub fn new(owner: ObjectId, name: String, description: String) -> Self {
        let now = super::now();
        Self {
            id: ObjectId::new(),
            name,
            description,
            owner,
            videos: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
