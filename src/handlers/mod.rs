//! HTTP surface: routing, extractor configuration and the handlers.

use actix_multipart::form::tempfile::TempFile;
use actix_multipart::form::MultipartFormConfig;
use actix_web::body::MessageBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::middleware::{from_fn, Logger};
use actix_web::{web, App};

use crate::error::{ApiError, ApiResult};
use crate::media::{MediaKind, MediaUpload};
use crate::middleware::enforce_deadline;
use crate::state::AppState;

pub mod comments;
pub mod dashboard;
pub mod healthcheck;
pub mod likes;
pub mod playlists;
pub mod subscriptions;
pub mod tweets;
pub mod users;
pub mod videos;

pub const API_PREFIX: &str = "/api/v1";

/// Registers every route below the API prefix.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::invalid(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| ApiError::invalid(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::invalid(err.to_string()).into()),
    )
    .service(healthcheck::healthcheck)
    .service(
        web::scope("/users")
            .service(users::register)
            .service(users::login)
            .service(users::logout)
            .service(users::refresh_token)
            .service(users::change_password)
            .service(users::current_user)
            .service(users::update_account)
            .service(users::update_avatar)
            .service(users::update_cover_image)
            .service(users::channel_profile)
            .service(users::watch_history),
    )
    .service(
        web::scope("/videos")
            .service(videos::list_videos)
            .service(videos::publish_video)
            .service(videos::toggle_publish)
            .service(videos::get_video)
            .service(videos::update_video)
            .service(videos::delete_video),
    )
    .service(
        web::scope("/comments")
            .service(comments::list_comments)
            .service(comments::add_comment)
            .service(comments::update_comment)
            .service(comments::delete_comment),
    )
    .service(
        web::scope("/likes")
            .service(likes::toggle_video_like)
            .service(likes::toggle_comment_like)
            .service(likes::toggle_tweet_like)
            .service(likes::liked_videos),
    )
    .service(
        web::scope("/tweets")
            .service(tweets::create_tweet)
            .service(tweets::user_tweets)
            .service(tweets::update_tweet)
            .service(tweets::delete_tweet),
    )
    .service(
        web::scope("/subscriptions")
            .service(subscriptions::toggle_subscription)
            .service(subscriptions::channel_subscribers)
            .service(subscriptions::subscribed_channels),
    )
    .service(
        web::scope("/playlists")
            .service(playlists::create_playlist)
            .service(playlists::user_playlists)
            .service(playlists::add_video)
            .service(playlists::remove_video)
            .service(playlists::get_playlist)
            .service(playlists::update_playlist)
            .service(playlists::delete_playlist),
    )
    .service(
        web::scope("/dashboard")
            .service(dashboard::channel_stats)
            .service(dashboard::channel_videos),
    );
}

/// The complete application: state, middleware and routes.
pub fn app(
    state: AppState,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let uploads = MultipartFormConfig::default()
        .total_limit(state.max_upload_bytes)
        .error_handler(|err, _req| ApiError::invalid(err.to_string()).into());

    App::new()
        .app_data(web::Data::new(state))
        .app_data(uploads)
        .wrap(from_fn(enforce_deadline))
        .wrap(Logger::default())
        .service(web::scope(API_PREFIX).configure(configure))
}

/// Reads a spooled multipart file. Empty parts count as absent.
pub(crate) async fn read_upload(
    file: Option<TempFile>,
    kind: MediaKind,
) -> ApiResult<Option<MediaUpload>> {
    let Some(file) = file.filter(|file| file.size > 0) else {
        return Ok(None);
    };
    let bytes = tokio::fs::read(file.file.path())
        .await
        .map_err(|err| ApiError::internal(format!("reading spooled upload failed: {err}")))?;
    Ok(Some(MediaUpload {
        kind,
        file_name: file.file_name.unwrap_or_else(|| "upload".to_owned()),
        content_type: file.content_type.map(|mime| mime.to_string()),
        bytes,
    }))
}
