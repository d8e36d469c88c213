//! Like toggles for videos, comments and tweets.

use actix_web::{get, patch, web, HttpResponse};
use serde_json::{json, Map, Value};

use super::videos::visible_video;
use crate::aggregate::{join_owner_summaries, project};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::id::ObjectId;
use crate::models::{Comment, Tweet, Video, PLAYLIST_VIDEO_FIELDS};
use crate::repository::to_document;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::store::{EdgeKind, Filter};
use crate::toggle::{toggle_relation, EdgeKey};
use crate::validation::parse_id;

/// Toggles `kind` from the caller to `target` and renders the outcome.
async fn toggle_like(
    state: &AppState,
    caller: &AuthUser,
    kind: EdgeKind,
    target: ObjectId,
    label: &str,
    count_field: &str,
) -> ApiResult<HttpResponse> {
    let outcome = toggle_relation(
        state.repo.store(),
        &EdgeKey::new(kind, caller.id(), target),
    )
    .await?;

    let mut data = Map::new();
    data.insert("isLiked".into(), Value::Bool(outcome.active));
    data.insert(count_field.into(), json!(outcome.count));
    let message = if outcome.active {
        format!("{label} liked successfully")
    } else {
        format!("{label} like removed successfully")
    };
    Ok(ApiResponse::ok(data, message))
}

#[patch("/toggle/v/{video_id}")]
pub async fn toggle_video_like(
    state: web::Data<AppState>,
    caller: AuthUser,
    video_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&video_id, "Video")?;
    visible_video(&state.repo, &id, &caller.id()).await?;
    toggle_like(&state, &caller, EdgeKind::VideoLike, id, "Video", "videoLikeCount").await
}

#[patch("/toggle/c/{comment_id}")]
pub async fn toggle_comment_like(
    state: web::Data<AppState>,
    caller: AuthUser,
    comment_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&comment_id, "Comment")?;
    state
        .repo
        .get::<Comment>(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;
    toggle_like(&state, &caller, EdgeKind::CommentLike, id, "Comment", "commentLikeCount").await
}

#[patch("/toggle/t/{tweet_id}")]
pub async fn toggle_tweet_like(
    state: web::Data<AppState>,
    caller: AuthUser,
    tweet_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&tweet_id, "Tweet")?;
    state
        .repo
        .get::<Tweet>(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Tweet not found"))?;
    toggle_like(&state, &caller, EdgeKind::TweetLike, id, "Tweet", "tweetLikeCount").await
}

/// Videos the caller liked, most recent like first.
#[get("/videos")]
pub async fn liked_videos(
    state: web::Data<AppState>,
    caller: AuthUser,
) -> ApiResult<HttpResponse> {
    let viewer = caller.id();
    let store = state.repo.store();
    let mut likes = store.edges_from(EdgeKind::VideoLike, &viewer).await?;
    likes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let ids: Vec<ObjectId> = likes.iter().map(|edge| edge.target).collect();

    let videos: Vec<Video> = state.repo.find(&Filter::ids(&ids)).await?;
    let mut ordered = Vec::with_capacity(videos.len());
    for id in &ids {
        if let Some(video) = videos
            .iter()
            .find(|video| video.id == *id && video.visible_to(&viewer))
        {
            ordered.push(to_document(video)?);
        }
    }

    let docs: Vec<_> = join_owner_summaries(store, ordered)
        .await?
        .iter()
        .map(|doc| project(doc, PLAYLIST_VIDEO_FIELDS))
        .collect();
    Ok(ApiResponse::ok(docs, "Liked videos fetched successfully"))
}
