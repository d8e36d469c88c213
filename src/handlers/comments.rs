use actix_web::{delete, get, patch, post, web, HttpResponse};
use log::info;
use serde::Deserialize;
use serde_json::json;

use super::videos::visible_video;
use crate::aggregate::{PageWindow, Pipeline};
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::models::{Comment, COMMENT_FIELDS, USER_SUMMARY_FIELDS};
use crate::ownership::{mutate_owned, Mutation};
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::store::{Collection, EdgeKind, Filter, UpdateOp};
use crate::validation::{parse_id, required_text};

const CONTENT_REQUIRED: &str = "Content is required for comment";

#[derive(Debug, Deserialize)]
pub struct CommentListQuery {
    page: Option<i64>,
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    content: Option<String>,
}

#[get("/{video_id}")]
pub async fn list_comments(
    state: web::Data<AppState>,
    caller: AuthUser,
    video_id: web::Path<String>,
    params: web::Query<CommentListQuery>,
) -> ApiResult<HttpResponse> {
    let video_id = parse_id(&video_id, "Video")?;
    visible_video(&state.repo, &video_id, &caller.id()).await?;

    let page = Pipeline::new(Collection::Comments)
        .matching(Filter::new().eq("video", video_id.to_string()))
        .join_owner(USER_SUMMARY_FIELDS)
        .project(COMMENT_FIELDS)
        .paginate(PageWindow::new(params.page, params.limit))
        .run(state.repo.store())
        .await?;
    Ok(ApiResponse::ok(page, "Comments fetched successfully"))
}

#[post("/{video_id}")]
pub async fn add_comment(
    state: web::Data<AppState>,
    caller: AuthUser,
    video_id: web::Path<String>,
    body: web::Json<CommentRequest>,
) -> ApiResult<HttpResponse> {
    let video_id = parse_id(&video_id, "Video")?;
    let content = required_text(body.content.as_deref(), CONTENT_REQUIRED)?;
    visible_video(&state.repo, &video_id, &caller.id()).await?;

    let comment = Comment::new(video_id, caller.id(), content);
    state.repo.insert(&comment).await?;
    info!("Comment {} added to video {}", comment.id, video_id);
    Ok(ApiResponse::ok(comment, "Comment added successfully"))
}

#[patch("/c/{comment_id}")]
pub async fn update_comment(
    state: web::Data<AppState>,
    caller: AuthUser,
    comment_id: web::Path<String>,
    body: web::Json<CommentRequest>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&comment_id, "Comment")?;
    let content = required_text(body.content.as_deref(), CONTENT_REQUIRED)?;
    let comment: Comment = mutate_owned(
        &state.repo,
        &id,
        &caller.id(),
        Mutation::Update(vec![UpdateOp::set("content", content)]),
    )
    .await?;
    Ok(ApiResponse::ok(comment, "Comment updated successfully"))
}

#[delete("/c/{comment_id}")]
pub async fn delete_comment(
    state: web::Data<AppState>,
    caller: AuthUser,
    comment_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&comment_id, "Comment")?;
    let _: Comment = mutate_owned(&state.repo, &id, &caller.id(), Mutation::Delete).await?;
    state
        .repo
        .store()
        .delete_edges_to(EdgeKind::CommentLike, &id)
        .await?;
    Ok(ApiResponse::ok(json!({}), "Comment deleted successfully"))
}
