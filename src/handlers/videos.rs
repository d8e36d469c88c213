//! Video publishing, listing and lifecycle.

use actix_multipart::form::tempfile::TempFile;
use actix_multipart::form::text::Text;
use actix_multipart::form::MultipartForm;
use actix_web::{delete, get, patch, post, web, HttpResponse};
use log::{debug, info};
use serde::Deserialize;
use serde_json::json;

use super::read_upload;
use crate::aggregate::{join_owner_summaries, project, PageWindow, Pipeline, SortDirection};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::id::ObjectId;
use crate::media::MediaKind;
use crate::models::{Comment, User, Video, USER_SUMMARY_FIELDS, VIDEO_FIELDS, VIDEO_SORT_FIELDS};
use crate::ownership::{mutate_owned, mutate_owned_if, not_owned, owned, Mutation};
use crate::repository::{to_document, Repository};
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::store::{Collection, EdgeKind, Filter, UpdateOp};
use crate::validation::{optional_text, parse_id, required_text};

const PUBLISH_TOGGLE_ATTEMPTS: usize = 3;

/// A video the viewer may see, or 404. Drafts of other users are
/// indistinguishable from missing videos.
pub(crate) async fn visible_video(
    repo: &Repository,
    id: &ObjectId,
    viewer: &ObjectId,
) -> ApiResult<Video> {
    repo.get::<Video>(id)
        .await?
        .filter(|video| video.visible_to(viewer))
        .ok_or_else(|| ApiError::not_found("Video not found"))
}

/// Counts one view of a video the viewer may see. Visibility is part of the
/// update filter, so a video unpublished mid-request is never counted.
pub(crate) async fn record_view(
    repo: &Repository,
    id: &ObjectId,
    viewer: &ObjectId,
) -> ApiResult<Video> {
    let bump = || vec![UpdateOp::inc("views", 1)];
    if let Some(video) = repo
        .update::<Video>(&Filter::by_id(id).eq("isPublished", true), bump())
        .await?
    {
        return Ok(video);
    }
    repo.update::<Video>(&Filter::by_id(id).and(Filter::owned_by(viewer)), bump())
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoListQuery {
    page: Option<i64>,
    limit: Option<i64>,
    query: Option<String>,
    sort_by: Option<String>,
    sort_type: Option<String>,
    user_id: Option<String>,
}

#[get("")]
pub async fn list_videos(
    state: web::Data<AppState>,
    caller: AuthUser,
    params: web::Query<VideoListQuery>,
) -> ApiResult<HttpResponse> {
    let params = params.into_inner();

    let mut filter = Filter::new();
    match optional_text(params.user_id.as_deref()) {
        Some(raw) => {
            let owner = parse_id(&raw, "User")?;
            filter = filter.and(Filter::owned_by(&owner));
            if owner != caller.id() {
                filter = filter.eq("isPublished", true);
            }
        }
        None => filter = filter.eq("isPublished", true),
    }

    let sort_field = optional_text(params.sort_by.as_deref()).unwrap_or_else(|| "createdAt".into());
    if !VIDEO_SORT_FIELDS.contains(&sort_field.as_str()) {
        return Err(ApiError::invalid(format!(
            "sortBy must be one of: {}",
            VIDEO_SORT_FIELDS.join(", ")
        )));
    }
    let direction = match optional_text(params.sort_type.as_deref()) {
        Some(raw) => SortDirection::parse(&raw)
            .ok_or_else(|| ApiError::invalid("sortType must be asc or desc"))?,
        None => SortDirection::Desc,
    };

    let page = Pipeline::new(Collection::Videos)
        .matching(filter)
        .search(&["title", "description"], params.query.as_deref().unwrap_or_default())
        .join_owner(USER_SUMMARY_FIELDS)
        .project(VIDEO_FIELDS)
        .sort_by(&sort_field, direction)
        .paginate(PageWindow::new(params.page, params.limit))
        .run(state.repo.store())
        .await?;

    debug!("Listed {} of {} videos", page.docs.len(), page.total_docs);
    Ok(ApiResponse::ok(page, "Videos fetched successfully"))
}

#[derive(Debug, MultipartForm)]
pub struct PublishForm {
    title: Option<Text<String>>,
    description: Option<Text<String>>,
    video: Option<TempFile>,
    thumbnail: Option<TempFile>,
}

#[post("/publish-video")]
pub async fn publish_video(
    state: web::Data<AppState>,
    caller: AuthUser,
    MultipartForm(form): MultipartForm<PublishForm>,
) -> ApiResult<HttpResponse> {
    const REQUIRED: &str = "Title and description are required";
    let title = required_text(form.title.as_deref().map(String::as_str), REQUIRED)?;
    let description = required_text(form.description.as_deref().map(String::as_str), REQUIRED)?;
    let thumbnail = read_upload(form.thumbnail, MediaKind::Image)
        .await?
        .ok_or_else(|| ApiError::invalid("Thumbnail is required"))?;
    let video_file = read_upload(form.video, MediaKind::Video)
        .await?
        .ok_or_else(|| ApiError::invalid("Video file is required"))?;

    let thumbnail = state.media.upload(thumbnail).await?;
    let video_file = state.media.upload(video_file).await?;

    let video = Video::new(
        caller.id(),
        title,
        description,
        video_file.url,
        thumbnail.url,
        video_file.duration.unwrap_or_default(),
    );
    state.repo.insert(&video).await?;
    info!("Video {} published by {}", video.id, caller.id());
    Ok(ApiResponse::ok(video, "Video published successfully"))
}

/// Fetching a video counts as a view and lands in the caller's history.
#[get("/{video_id}")]
pub async fn get_video(
    state: web::Data<AppState>,
    caller: AuthUser,
    video_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&video_id, "Video")?;
    let viewer = caller.id();
    let video = record_view(&state.repo, &id, &viewer).await?;
    state
        .repo
        .update::<User>(
            &Filter::by_id(&viewer),
            vec![UpdateOp::add_to_set("watchHistory", id.to_string())],
        )
        .await?;

    let joined = join_owner_summaries(state.repo.store(), vec![to_document(&video)?])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    debug!("Video {} viewed by {}", id, viewer);
    Ok(ApiResponse::ok(
        project(&joined, VIDEO_FIELDS),
        "Video fetched successfully",
    ))
}

#[derive(Debug, Deserialize)]
pub struct UpdateVideoRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[patch("/{video_id}")]
pub async fn update_video(
    state: web::Data<AppState>,
    caller: AuthUser,
    video_id: web::Path<String>,
    body: web::Json<UpdateVideoRequest>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&video_id, "Video")?;
    let mut ops = Vec::new();
    if let Some(title) = optional_text(body.title.as_deref()) {
        ops.push(UpdateOp::set("title", title));
    }
    if let Some(description) = optional_text(body.description.as_deref()) {
        ops.push(UpdateOp::set("description", description));
    }
    if ops.is_empty() {
        return Err(ApiError::invalid("Title or description is required"));
    }

    let video: Video = mutate_owned(&state.repo, &id, &caller.id(), Mutation::Update(ops)).await?;
    Ok(ApiResponse::ok(video, "Video updated successfully"))
}

#[delete("/{video_id}")]
pub async fn delete_video(
    state: web::Data<AppState>,
    caller: AuthUser,
    video_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&video_id, "Video")?;
    let video: Video = mutate_owned(&state.repo, &id, &caller.id(), Mutation::Delete).await?;

    let store = state.repo.store();
    let comments: Vec<Comment> = state
        .repo
        .find(&Filter::new().eq("video", id.to_string()))
        .await?;
    for comment in &comments {
        store.delete_edges_to(EdgeKind::CommentLike, &comment.id).await?;
    }
    let removed_comments = state
        .repo
        .delete_many::<Comment>(&Filter::new().eq("video", id.to_string()))
        .await?;
    let removed_likes = store.delete_edges_to(EdgeKind::VideoLike, &id).await?;

    info!(
        "Video {} deleted with {} comments and {} likes",
        video.id, removed_comments, removed_likes
    );
    Ok(ApiResponse::ok(json!({}), "Video deleted successfully"))
}

#[patch("/toggle/publish/{video_id}")]
pub async fn toggle_publish(
    state: web::Data<AppState>,
    caller: AuthUser,
    video_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&video_id, "Video")?;
    let owner = caller.id();

    for _ in 0..PUBLISH_TOGGLE_ATTEMPTS {
        let current: Video = state
            .repo
            .find_one(&owned(&id, &owner))
            .await?
            .ok_or_else(|| not_owned::<Video>("update"))?;
        let flipped = mutate_owned_if::<Video>(
            &state.repo,
            &id,
            &owner,
            Filter::new().eq("isPublished", current.is_published),
            Mutation::Update(vec![UpdateOp::set("isPublished", !current.is_published)]),
        )
        .await;
        match flipped {
            Ok(video) => {
                return Ok(ApiResponse::ok(
                    video,
                    "Video publish status toggled successfully",
                ))
            }
            // Someone flipped it between our read and write; read again.
            Err(ApiError::NotFoundOrForbidden(_)) => continue,
            Err(err) => return Err(err),
        }
    }
    Err(ApiError::Conflict(
        "Publish status changed concurrently, please retry".to_owned(),
    ))
}
