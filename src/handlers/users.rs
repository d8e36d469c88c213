//! Accounts, sessions and channel pages.

use actix_multipart::form::tempfile::TempFile;
use actix_multipart::form::text::Text;
use actix_multipart::form::MultipartForm;
use actix_web::http::StatusCode;
use actix_web::{get, patch, post, web, HttpRequest, HttpResponse};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::read_upload;
use crate::aggregate::{join_owner_summaries, project};
use crate::auth::{AuthUser, TokenPair, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::error::{ApiError, ApiResult};
use crate::id::ObjectId;
use crate::media::{MediaKind, MediaUpload};
use crate::models::{ChannelProfile, User, UserView, Video, VIDEO_FIELDS};
use crate::repository::to_document;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::store::{EdgeKind, Filter, UpdateOp};
use crate::validation::{email, optional_text, required_text};

fn text(field: &Option<Text<String>>) -> Option<&str> {
    field.as_ref().map(|value| value.as_str())
}

async fn upload_required(
    state: &AppState,
    file: Option<TempFile>,
    missing: &str,
) -> ApiResult<String> {
    let upload: MediaUpload = read_upload(file, MediaKind::Image)
        .await?
        .ok_or_else(|| ApiError::invalid(missing))?;
    Ok(state.media.upload(upload).await?.url)
}

#[derive(Debug, MultipartForm)]
pub struct RegisterForm {
    #[multipart(rename = "fullName")]
    full_name: Option<Text<String>>,
    username: Option<Text<String>>,
    email: Option<Text<String>>,
    password: Option<Text<String>>,
    avatar: Option<TempFile>,
    #[multipart(rename = "coverImage")]
    cover_image: Option<TempFile>,
}

#[post("/register")]
pub async fn register(
    state: web::Data<AppState>,
    MultipartForm(form): MultipartForm<RegisterForm>,
) -> ApiResult<HttpResponse> {
    const ALL_REQUIRED: &str = "All fields are required";
    let full_name = required_text(text(&form.full_name), ALL_REQUIRED)?;
    let username = required_text(text(&form.username), ALL_REQUIRED)?.to_lowercase();
    let email = email(text(&form.email))?;
    let password = required_text(text(&form.password), ALL_REQUIRED)?;

    let taken = state
        .repo
        .find_one::<User>(&Filter::new().eq("username", username.as_str()))
        .await?
        .is_some()
        || state
            .repo
            .find_one::<User>(&Filter::new().eq("email", email.as_str()))
            .await?
            .is_some();
    if taken {
        return Err(ApiError::Conflict(
            "User with email or username already exists".to_owned(),
        ));
    }

    let avatar = upload_required(&state, form.avatar, "Avatar file is required").await?;
    let cover_image = match read_upload(form.cover_image, MediaKind::Image).await? {
        Some(upload) => Some(state.media.upload(upload).await?.url),
        None => None,
    };
    let password_hash = state.passwords.hash(password).await?;

    let user = User::new(&username, &email, &full_name, avatar, cover_image, password_hash);
    state.repo.insert(&user).await?;
    info!("User registered: {} ({})", user.username, user.id);
    Ok(ApiResponse::created(
        UserView::from(&user),
        "User registered successfully",
    ))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default, alias = "userName")]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionPayload {
    user: UserView,
    #[serde(flatten)]
    tokens: TokenPair,
}

/// Mints a token pair and records the refresh token on the user.
async fn start_session(state: &AppState, user: &User) -> ApiResult<TokenPair> {
    let tokens = state.tokens.issue_pair(user)?;
    state
        .repo
        .update::<User>(
            &Filter::by_id(&user.id),
            vec![UpdateOp::set("refreshToken", tokens.refresh_token.as_str())],
        )
        .await?
        .ok_or_else(|| ApiError::unauthenticated("Invalid user credentials"))?;
    Ok(tokens)
}

fn session_response(state: &AppState, user: &User, tokens: TokenPair, message: &str) -> HttpResponse {
    let access = state.cookies.issue(ACCESS_COOKIE, tokens.access_token.clone());
    let refresh = state.cookies.issue(REFRESH_COOKIE, tokens.refresh_token.clone());
    ApiResponse::new(
        StatusCode::OK,
        SessionPayload {
            user: UserView::from(user),
            tokens,
        },
        message,
    )
    .respond_with(|builder| builder.cookie(access).cookie(refresh))
}

#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    let filter = match (
        optional_text(body.username.as_deref()),
        optional_text(body.email.as_deref()),
    ) {
        (Some(username), _) => Filter::new().eq("username", username.to_lowercase()),
        (None, Some(email)) => Filter::new().eq("email", email.to_lowercase()),
        (None, None) => return Err(ApiError::invalid("Username or email is required")),
    };
    let password = required_text(body.password.as_deref(), "Password is required")?;

    let invalid = || ApiError::unauthenticated("Invalid user credentials");
    let user = state
        .repo
        .find_one::<User>(&filter)
        .await?
        .ok_or_else(invalid)?;
    if !state
        .passwords
        .verify(password, user.password_hash.clone())
        .await?
    {
        debug!("Rejected password for {}", user.id);
        return Err(invalid());
    }

    let tokens = start_session(&state, &user).await?;
    info!("User logged in: {}", user.id);
    Ok(session_response(&state, &user, tokens, "User logged in successfully"))
}

#[post("/logout")]
pub async fn logout(state: web::Data<AppState>, caller: AuthUser) -> ApiResult<HttpResponse> {
    state
        .repo
        .update::<User>(
            &Filter::by_id(&caller.id()),
            vec![UpdateOp::unset("refreshToken")],
        )
        .await?;
    info!("User logged out: {}", caller.id());
    let access = state.cookies.clear(ACCESS_COOKIE);
    let refresh = state.cookies.clear(REFRESH_COOKIE);
    Ok(
        ApiResponse::new(StatusCode::OK, json!({}), "User logged out")
            .respond_with(|builder| builder.cookie(access).cookie(refresh)),
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    refresh_token: Option<String>,
}

#[post("/refresh-token")]
pub async fn refresh_token(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
) -> ApiResult<HttpResponse> {
    let incoming = req
        .cookie(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .filter(|token| !token.is_empty())
        .or_else(|| body.and_then(|body| body.into_inner().refresh_token))
        .ok_or_else(|| ApiError::unauthenticated("Unauthorized request"))?;

    let claims = state.tokens.verify_refresh(&incoming)?;
    let id = ObjectId::parse(&claims.sub)
        .map_err(|_| ApiError::unauthenticated("Invalid refresh token"))?;
    let user = state
        .repo
        .get::<User>(&id)
        .await?
        .ok_or_else(|| ApiError::unauthenticated("Invalid refresh token"))?;

    // Rotate only if the presented token is still the current one.
    let tokens = state.tokens.issue_pair(&user)?;
    let rotated = state
        .repo
        .update::<User>(
            &Filter::by_id(&id).eq("refreshToken", incoming.as_str()),
            vec![UpdateOp::set("refreshToken", tokens.refresh_token.as_str())],
        )
        .await?
        .ok_or_else(|| ApiError::unauthenticated("Refresh token is expired or used"))?;

    info!("Tokens refreshed for {}", id);
    Ok(session_response(&state, &rotated, tokens, "Access token refreshed"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    old_password: Option<String>,
    #[serde(default)]
    new_password: Option<String>,
}

#[post("/change-password")]
pub async fn change_password(
    state: web::Data<AppState>,
    caller: AuthUser,
    body: web::Json<ChangePasswordRequest>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    let old = required_text(body.old_password.as_deref(), "Old and new password are required")?;
    let new = required_text(body.new_password.as_deref(), "Old and new password are required")?;

    if !state
        .passwords
        .verify(old, caller.0.password_hash.clone())
        .await?
    {
        return Err(ApiError::invalid("Invalid old password"));
    }
    let hash = state.passwords.hash(new).await?;
    state
        .repo
        .update::<User>(
            &Filter::by_id(&caller.id()),
            vec![UpdateOp::set("passwordHash", hash)],
        )
        .await?;
    info!("Password changed for {}", caller.id());
    Ok(ApiResponse::ok(json!({}), "Password changed successfully"))
}

#[get("/current-user")]
pub async fn current_user(caller: AuthUser) -> ApiResult<HttpResponse> {
    Ok(ApiResponse::ok(
        UserView::from(&caller.0),
        "Current user fetched successfully",
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[patch("/update-account")]
pub async fn update_account(
    state: web::Data<AppState>,
    caller: AuthUser,
    body: web::Json<UpdateAccountRequest>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    let mut ops = Vec::new();
    if let Some(full_name) = optional_text(body.full_name.as_deref()) {
        ops.push(UpdateOp::set("fullName", full_name));
    }
    if optional_text(body.email.as_deref()).is_some() {
        ops.push(UpdateOp::set("email", email(body.email.as_deref())?));
    }
    if ops.is_empty() {
        return Err(ApiError::invalid("Full name or email is required"));
    }

    let user = state
        .repo
        .update::<User>(&Filter::by_id(&caller.id()), ops)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    info!("Account details updated for {}", user.id);
    Ok(ApiResponse::ok(
        UserView::from(&user),
        "Account details updated successfully",
    ))
}

#[derive(Debug, MultipartForm)]
pub struct AvatarForm {
    avatar: Option<TempFile>,
}

#[patch("/avatar")]
pub async fn update_avatar(
    state: web::Data<AppState>,
    caller: AuthUser,
    MultipartForm(form): MultipartForm<AvatarForm>,
) -> ApiResult<HttpResponse> {
    let url = upload_required(&state, form.avatar, "Avatar file is missing").await?;
    let user = state
        .repo
        .update::<User>(&Filter::by_id(&caller.id()), vec![UpdateOp::set("avatar", url)])
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    info!("Avatar updated for {}", user.id);
    Ok(ApiResponse::ok(UserView::from(&user), "Avatar updated successfully"))
}

#[derive(Debug, MultipartForm)]
pub struct CoverImageForm {
    #[multipart(rename = "coverImage")]
    cover_image: Option<TempFile>,
}

#[patch("/cover-image")]
pub async fn update_cover_image(
    state: web::Data<AppState>,
    caller: AuthUser,
    MultipartForm(form): MultipartForm<CoverImageForm>,
) -> ApiResult<HttpResponse> {
    let url = upload_required(&state, form.cover_image, "Cover image file is missing").await?;
    let user = state
        .repo
        .update::<User>(
            &Filter::by_id(&caller.id()),
            vec![UpdateOp::set("coverImage", url)],
        )
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    info!("Cover image updated for {}", user.id);
    Ok(ApiResponse::ok(
        UserView::from(&user),
        "Cover image updated successfully",
    ))
}

#[get("/c/{username}")]
pub async fn channel_profile(
    state: web::Data<AppState>,
    caller: AuthUser,
    username: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let username = required_text(Some(username.as_str()), "Username is missing")?.to_lowercase();
    let channel = state
        .repo
        .find_one::<User>(&Filter::new().eq("username", username.as_str()))
        .await?
        .ok_or_else(|| ApiError::not_found("Channel does not exist"))?;

    let store = state.repo.store();
    let caller_id = caller.id();
    let (subscribers, subscribed_to, is_subscribed) = futures::try_join!(
        store.count_edges_to(EdgeKind::Subscription, &channel.id),
        store.edges_from(EdgeKind::Subscription, &channel.id),
        store.edge_exists(EdgeKind::Subscription, &caller_id, &channel.id),
    )?;

    debug!("Channel profile {} viewed by {}", channel.id, caller.id());
    Ok(ApiResponse::ok(
        ChannelProfile {
            id: channel.id,
            username: channel.username,
            full_name: channel.full_name,
            email: channel.email,
            avatar: channel.avatar,
            cover_image: channel.cover_image,
            subscribers_count: subscribers,
            channels_subscribed_to_count: u64::try_from(subscribed_to.len()).unwrap_or(u64::MAX),
            is_subscribed,
        },
        "User channel fetched successfully",
    ))
}

#[get("/history")]
pub async fn watch_history(
    state: web::Data<AppState>,
    caller: AuthUser,
) -> ApiResult<HttpResponse> {
    let history = &caller.0.watch_history;
    let videos: Vec<Video> = state.repo.find(&Filter::ids(history)).await?;
    let viewer = caller.id();

    // Keep watch order, skipping videos that vanished or were unpublished.
    let mut ordered = Vec::with_capacity(history.len());
    for id in history {
        if let Some(video) = videos.iter().find(|video| video.id == *id) {
            if video.visible_to(&viewer) {
                ordered.push(to_document(video)?);
            }
        }
    }
    let docs: Vec<_> = join_owner_summaries(state.repo.store(), ordered)
        .await?
        .iter()
        .map(|doc| project(doc, VIDEO_FIELDS))
        .collect();

    Ok(ApiResponse::ok(docs, "Watch history fetched successfully"))
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::Value;

    use super::*;
    use crate::handlers::app;
    use crate::store::Edge;
    use crate::test_support::{bearer, seed_user, seed_video, test_state, MultipartBody, TEST_PASSWORD};

    fn registration(username: &str, email: &str) -> MultipartBody {
        MultipartBody::new()
            .text("fullName", "Alice Liddell")
            .text("username", username)
            .text("email", email)
            .text("password", "s3cret!")
            .file("avatar", "a.png", "image/png", b"\x89PNG")
    }

    #[actix_web::test]
    async fn register_hides_credentials_and_rejects_duplicates() {
        let app = test::init_service(app(test_state())).await;

        let req = registration("Alice", "alice@example.com")
            .attach(test::TestRequest::post().uri("/api/v1/users/register"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["data"]["username"], "alice");
        assert!(body["data"].get("passwordHash").is_none());
        assert!(body["data"].get("refreshToken").is_none());
        assert_eq!(body["data"]["avatar"], "https://media.test/0/a.png");

        let req = registration("alice", "other@example.com")
            .attach(test::TestRequest::post().uri("/api/v1/users/register"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn register_requires_an_avatar() {
        let app = test::init_service(app(test_state())).await;
        let req = MultipartBody::new()
            .text("fullName", "Bob")
            .text("username", "bob")
            .text("email", "bob@example.com")
            .text("password", "pw")
            .attach(test::TestRequest::post().uri("/api/v1/users/register"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["message"], "Avatar file is required");
    }

    #[actix_web::test]
    async fn login_sets_cookies_and_wrong_passwords_are_401() {
        let state = test_state();
        let (user, _) = seed_user(&state, "alice").await;
        let app = test::init_service(app(state.clone())).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/users/login")
            .set_json(json!({"email": "alice@example.com", "password": "nope"}))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri("/api/v1/users/login")
            .set_json(json!({"userName": "ALICE", "password": TEST_PASSWORD}))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let cookies: Vec<String> = res
            .response()
            .cookies()
            .map(|cookie| cookie.name().to_owned())
            .collect();
        assert!(cookies.contains(&ACCESS_COOKIE.to_owned()));
        assert!(cookies.contains(&REFRESH_COOKIE.to_owned()));
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["data"]["user"]["_id"], user.id.to_string());
        assert!(body["data"]["accessToken"].is_string());

        let stored: Option<User> = state.repo.get(&user.id).await.expect("get");
        assert_eq!(
            stored.and_then(|u| u.refresh_token),
            body["data"]["refreshToken"].as_str().map(str::to_owned)
        );
    }

    #[actix_web::test]
    async fn protected_routes_require_a_token() {
        let app = test::init_service(app(test_state())).await;
        let req = test::TestRequest::get()
            .uri("/api/v1/users/current-user")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/api/v1/users/current-user")
            .insert_header(bearer("garbage"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn refresh_tokens_rotate_and_cannot_be_replayed() {
        let state = test_state();
        let (user, _) = seed_user(&state, "alice").await;
        let tokens = start_session(&state, &user).await.expect("session");
        let app = test::init_service(app(state.clone())).await;

        let refresh = |token: &str| {
            test::TestRequest::post()
                .uri("/api/v1/users/refresh-token")
                .set_json(json!({"refreshToken": token}))
                .to_request()
        };
        let res = test::call_service(&app, refresh(&tokens.refresh_token)).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(res).await;
        assert_ne!(body["data"]["refreshToken"], tokens.refresh_token.as_str());

        let replay = test::call_service(&app, refresh(&tokens.refresh_token)).await;
        assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn logout_forgets_the_refresh_token() {
        let state = test_state();
        let (user, access) = seed_user(&state, "alice").await;
        start_session(&state, &user).await.expect("session");
        let app = test::init_service(app(state.clone())).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/users/logout")
            .insert_header(bearer(&access))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);

        let stored: Option<User> = state.repo.get(&user.id).await.expect("get");
        assert_eq!(stored.and_then(|u| u.refresh_token), None);
    }

    #[actix_web::test]
    async fn change_password_checks_the_old_one() {
        let state = test_state();
        let (_, access) = seed_user(&state, "alice").await;
        let app = test::init_service(app(state)).await;

        let change = |old: &str| {
            test::TestRequest::post()
                .uri("/api/v1/users/change-password")
                .insert_header(bearer(&access))
                .set_json(json!({"oldPassword": old, "newPassword": "brand new"}))
                .to_request()
        };
        let res = test::call_service(&app, change("wrong")).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = test::call_service(&app, change(TEST_PASSWORD)).await;
        assert_eq!(res.status(), StatusCode::OK);

        let req = test::TestRequest::post()
            .uri("/api/v1/users/login")
            .set_json(json!({"username": "alice", "password": "brand new"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn update_account_rejects_taken_emails() {
        let state = test_state();
        let (_, access) = seed_user(&state, "alice").await;
        seed_user(&state, "bob").await;
        let app = test::init_service(app(state)).await;

        let req = test::TestRequest::patch()
            .uri("/api/v1/users/update-account")
            .insert_header(bearer(&access))
            .set_json(json!({"email": "bob@example.com"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::patch()
            .uri("/api/v1/users/update-account")
            .insert_header(bearer(&access))
            .set_json(json!({"fullName": "Alice L."}))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["data"]["fullName"], "Alice L.");
    }

    #[actix_web::test]
    async fn avatar_updates_store_the_new_url() {
        let state = test_state();
        let (_, access) = seed_user(&state, "alice").await;
        let app = test::init_service(app(state)).await;

        let req = MultipartBody::new()
            .file("avatar", "new.png", "image/png", b"png")
            .attach(
                test::TestRequest::patch()
                    .uri("/api/v1/users/avatar")
                    .insert_header(bearer(&access)),
            )
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["data"]["avatar"], "https://media.test/0/new.png");
    }

    #[actix_web::test]
    async fn channel_profile_reports_subscriptions() {
        let state = test_state();
        let (alice, alice_token) = seed_user(&state, "alice").await;
        let (bob, _) = seed_user(&state, "bob").await;
        let store = state.repo.store();
        store
            .insert_edge(&Edge::new(EdgeKind::Subscription, alice.id, bob.id))
            .await
            .expect("edge");
        let app = test::init_service(app(state.clone())).await;

        let req = test::TestRequest::get()
            .uri("/api/v1/users/c/Bob")
            .insert_header(bearer(&alice_token))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["data"]["subscribersCount"], 1);
        assert_eq!(body["data"]["channelsSubscribedToCount"], 0);
        assert_eq!(body["data"]["isSubscribed"], true);
        assert!(body["data"].get("passwordHash").is_none());

        let req = test::TestRequest::get()
            .uri("/api/v1/users/c/nobody")
            .insert_header(bearer(&alice_token))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn watch_history_lists_viewed_videos_with_owners() {
        let state = test_state();
        let (alice, alice_token) = seed_user(&state, "alice").await;
        let video = seed_video(&state, &alice, "intro", true).await;
        let app = test::init_service(app(state)).await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/videos/{}", video.id))
            .insert_header(bearer(&alice_token))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri("/api/v1/users/history")
            .insert_header(bearer(&alice_token))
            .to_request();
        let res = test::call_service(&app, req).await;
        let body: Value = test::read_body_json(res).await;
        let history = body["data"].as_array().expect("array");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["title"], "intro");
        assert_eq!(history[0]["owner"]["username"], "alice");
    }

    #[::core::prelude::v1::test]
    fn session_payload_flattens_tokens() {
        let user = User::new("a", "a@x.io", "A", "u".into(), None, "h".into());
        let payload = SessionPayload {
            user: UserView::from(&user),
            tokens: TokenPair {
                access_token: "acc".into(),
                refresh_token: "ref".into(),
            },
        };
        let json = serde_json::to_value(payload).expect("serialize");
        assert_eq!(json["accessToken"], "acc");
        assert_eq!(json["refreshToken"], "ref");
    }
}
