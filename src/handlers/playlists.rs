//! Curated, ordered video collections owned by one user.

use actix_web::{delete, get, patch, post, web, HttpResponse};
use log::info;
use serde::Deserialize;
use serde_json::{json, Value};

use super::videos::visible_video;
use crate::aggregate::{join_owner_summaries, project, Pipeline, SortDirection};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::models::{Playlist, Video, PLAYLIST_VIDEO_FIELDS};
use crate::ownership::{mutate_owned, not_owned, owned, Mutation};
use crate::repository::to_document;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::store::{Collection, Filter, UpdateOp};
use crate::validation::{optional_text, parse_id, required_text};

#[derive(Debug, Deserialize)]
pub struct PlaylistRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[post("")]
pub async fn create_playlist(
    state: web::Data<AppState>,
    caller: AuthUser,
    body: web::Json<PlaylistRequest>,
) -> ApiResult<HttpResponse> {
    const REQUIRED: &str = "Name and description are required";
    let name = required_text(body.name.as_deref(), REQUIRED)?;
    let description = required_text(body.description.as_deref(), REQUIRED)?;
    let playlist = Playlist::new(caller.id(), name, description);
    state.repo.insert(&playlist).await?;
    info!("Playlist {} created by {}", playlist.id, caller.id());
    Ok(ApiResponse::created(playlist, "Playlist created successfully"))
}

#[get("/user/{user_id}")]
pub async fn user_playlists(
    state: web::Data<AppState>,
    caller: AuthUser,
    user_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let user_id = parse_id(&user_id, "User")?;
    if user_id != caller.id() {
        return Err(ApiError::forbidden("Unauthorized request for playlists"));
    }
    let playlists = Pipeline::new(Collection::Playlists)
        .matching(Filter::owned_by(&user_id))
        .sort_by("createdAt", SortDirection::Desc)
        .collect(state.repo.store())
        .await?;
    Ok(ApiResponse::ok(playlists, "Playlists fetched successfully"))
}

/// The playlist with its videos inlined in playlist order. Videos that are
/// gone or not visible to the caller are left out.
#[get("/{playlist_id}")]
pub async fn get_playlist(
    state: web::Data<AppState>,
    caller: AuthUser,
    playlist_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&playlist_id, "Playlist")?;
    let viewer = caller.id();
    let playlist: Playlist = state
        .repo
        .find_one(&owned(&id, &viewer))
        .await?
        .ok_or_else(|| not_owned::<Playlist>("view"))?;

    let videos: Vec<Video> = state.repo.find(&Filter::ids(&playlist.videos)).await?;
    let mut ordered = Vec::with_capacity(videos.len());
    for video_id in &playlist.videos {
        if let Some(video) = videos
            .iter()
            .find(|video| video.id == *video_id && video.visible_to(&viewer))
        {
            ordered.push(to_document(video)?);
        }
    }
    let videos: Vec<Value> = join_owner_summaries(state.repo.store(), ordered)
        .await?
        .iter()
        .map(|doc| Value::Object(project(doc, PLAYLIST_VIDEO_FIELDS)))
        .collect();

    let mut doc = to_document(&playlist)?;
    doc.insert("videos".into(), Value::Array(videos));
    Ok(ApiResponse::ok(doc, "Playlist fetched successfully"))
}

#[patch("/{playlist_id}")]
pub async fn update_playlist(
    state: web::Data<AppState>,
    caller: AuthUser,
    playlist_id: web::Path<String>,
    body: web::Json<PlaylistRequest>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&playlist_id, "Playlist")?;
    let mut ops = Vec::new();
    if let Some(name) = optional_text(body.name.as_deref()) {
        ops.push(UpdateOp::set("name", name));
    }
    if let Some(description) = optional_text(body.description.as_deref()) {
        ops.push(UpdateOp::set("description", description));
    }
    if ops.is_empty() {
        return Err(ApiError::invalid("Name or description is required"));
    }
    let playlist: Playlist =
        mutate_owned(&state.repo, &id, &caller.id(), Mutation::Update(ops)).await?;
    Ok(ApiResponse::ok(playlist, "Playlist updated successfully"))
}

#[delete("/{playlist_id}")]
pub async fn delete_playlist(
    state: web::Data<AppState>,
    caller: AuthUser,
    playlist_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&playlist_id, "Playlist")?;
    let _: Playlist = mutate_owned(&state.repo, &id, &caller.id(), Mutation::Delete).await?;
    Ok(ApiResponse::ok(json!({}), "Playlist deleted successfully"))
}

/// Adding twice keeps a single entry.
#[patch("/add/{video_id}/{playlist_id}")]
pub async fn add_video(
    state: web::Data<AppState>,
    caller: AuthUser,
    path: web::Path<(String, String)>,
) -> ApiResult<HttpResponse> {
    let (video_id, playlist_id) = path.into_inner();
    let video_id = parse_id(&video_id, "Video")?;
    let playlist_id = parse_id(&playlist_id, "Playlist")?;
    visible_video(&state.repo, &video_id, &caller.id()).await?;

    let playlist: Playlist = mutate_owned(
        &state.repo,
        &playlist_id,
        &caller.id(),
        Mutation::Update(vec![UpdateOp::add_to_set("videos", video_id.to_string())]),
    )
    .await?;
    Ok(ApiResponse::ok(playlist, "Video added to playlist successfully"))
}

#[patch("/remove/{video_id}/{playlist_id}")]
pub async fn remove_video(
    state: web::Data<AppState>,
    caller: AuthUser,
    path: web::Path<(String, String)>,
) -> ApiResult<HttpResponse> {
    let (video_id, playlist_id) = path.into_inner();
    let video_id = parse_id(&video_id, "Video")?;
    let playlist_id = parse_id(&playlist_id, "Playlist")?;

    let playlist: Playlist = mutate_owned(
        &state.repo,
        &playlist_id,
        &caller.id(),
        Mutation::Update(vec![UpdateOp::pull("videos", video_id.to_string())]),
    )
    .await?;
    Ok(ApiResponse::ok(playlist, "Video removed from playlist successfully"))
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test;

    use super::*;
    use crate::handlers::app;
    use crate::id::ObjectId;
    use crate::test_support::{bearer, seed_user, seed_video, test_state};

    #[actix_web::test]
    async fn creation_needs_name_and_description() {
        let state = test_state();
        let (_, token) = seed_user(&state, "alice").await;
        let app = test::init_service(app(state)).await;

        let create = |body: Value| {
            test::TestRequest::post()
                .uri("/api/v1/playlists")
                .insert_header(bearer(&token))
                .set_json(body)
                .to_request()
        };

        let res = test::call_service(&app, create(json!({"name": "Mix"}))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = test::call_service(&app, create(json!({"name": "Mix", "description": "tunes"}))).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["data"]["videos"], json!([]));
    }

    #[actix_web::test]
    async fn videos_keep_insertion_order_without_duplicates() {
        let state = test_state();
        let (alice, token) = seed_user(&state, "alice").await;
        let first = seed_video(&state, &alice, "first", true).await;
        let second = seed_video(&state, &alice, "second", true).await;
        let playlist = Playlist::new(alice.id, "Mix".into(), "tunes".into());
        state.repo.insert(&playlist).await.expect("playlist");
        let app = test::init_service(app(state)).await;

        for video in [&second, &first, &second] {
            let req = test::TestRequest::patch()
                .uri(&format!("/api/v1/playlists/add/{}/{}", video.id, playlist.id))
                .insert_header(bearer(&token))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        }

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/playlists/{}", playlist.id))
            .insert_header(bearer(&token))
            .to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        let videos = body["data"]["videos"].as_array().expect("videos");
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0]["title"], "second");
        assert_eq!(videos[1]["title"], "first");
        assert_eq!(videos[0]["owner"]["username"], "alice");

        let req = test::TestRequest::patch()
            .uri(&format!("/api/v1/playlists/remove/{}/{}", second.id, playlist.id))
            .insert_header(bearer(&token))
            .to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(body["data"]["videos"], json!([first.id.to_string()]));
    }

    #[actix_web::test]
    async fn other_users_playlists_stay_private() {
        let state = test_state();
        let (alice, _) = seed_user(&state, "alice").await;
        let (_, bob_token) = seed_user(&state, "bob").await;
        let playlist = Playlist::new(alice.id, "Mix".into(), "tunes".into());
        state.repo.insert(&playlist).await.expect("playlist");
        let app = test::init_service(app(state)).await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/playlists/{}", playlist.id))
            .insert_header(bearer(&bob_token))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/playlists/user/{}", alice.id))
            .insert_header(bearer(&bob_token))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/v1/playlists/{}", playlist.id))
            .insert_header(bearer(&bob_token))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::patch()
            .uri(&format!("/api/v1/playlists/add/{}/{}", ObjectId::new(), playlist.id))
            .insert_header(bearer(&bob_token))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
