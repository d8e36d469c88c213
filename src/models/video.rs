use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::ObjectId;

/// Fields returned by video listings and lookups.
pub const VIDEO_FIELDS: &[&str] = &[
    "_id",
    "videoFile",
    "thumbnail",
    "title",
    "description",
    "duration",
    "views",
    "isPublished",
    "owner",
    "createdAt",
    "updatedAt",
];

/// Fields of the owner's dashboard listing.
pub const CHANNEL_VIDEO_FIELDS: &[&str] = &[
    "_id",
    "title",
    "thumbnail",
    "views",
    "duration",
    "isPublished",
    "createdAt",
];

/// Fields clients may sort listings by.
pub const VIDEO_SORT_FIELDS: &[&str] = &["createdAt", "updatedAt", "views", "duration", "title"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub owner: ObjectId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Video {
    pub fn new(
        owner: ObjectId,
        title: String,
        description: String,
        video_file: String,
        thumbnail: String,
        duration: f64,
    ) -> Self {
        let now = super::now();
        Self {
            id: ObjectId::new(),
            video_file,
            thumbnail,
            title,
            description,
            duration,
            views: 0,
            is_published: true,
            owner,
            created_at: now,
            updated_at: now,
        }
    }

    /// Published videos are public; drafts are visible to their owner only.
    pub fn visible_to(&self, viewer: &ObjectId) -> bool {
        self.is_published || self.owner == *viewer
    }
}
