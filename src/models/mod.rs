//! Stored entities and their public projections.

use chrono::{DateTime, SubsecRound, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::store::Collection;

mod comment;
mod playlist;
mod tweet;
mod user;
mod video;

pub use comment::{Comment, COMMENT_FIELDS};
pub use playlist::{Playlist, PLAYLIST_VIDEO_FIELDS};
pub use tweet::{Tweet, TWEET_MAX_CHARS};
pub use user::{ChannelProfile, User, UserView, USER_SUMMARY_FIELDS};
pub use video::{Video, CHANNEL_VIDEO_FIELDS, VIDEO_FIELDS, VIDEO_SORT_FIELDS};

/// Current time at the precision timestamps are stored with.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// A document type that lives in one collection of the store.
pub trait Resource: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: Collection;
    /// Human-readable name used in client-facing messages.
    const LABEL: &'static str;
}

impl Resource for User {
    const COLLECTION: Collection = Collection::Users;
    const LABEL: &'static str = "User";
}

impl Resource for Video {
    const COLLECTION: Collection = Collection::Videos;
    const LABEL: &'static str = "Video";
}

impl Resource for Comment {
    const COLLECTION: Collection = Collection::Comments;
    const LABEL: &'static str = "Comment";
}

impl Resource for Tweet {
    const COLLECTION: Collection = Collection::Tweets;
    const LABEL: &'static str = "Tweet";
}

impl Resource for Playlist {
    const COLLECTION: Collection = Collection::Playlists;
    const LABEL: &'static str = "Playlist";
}
