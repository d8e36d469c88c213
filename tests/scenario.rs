//! A full user journey through the HTTP surface against the in-memory store.

use actix_web::http::StatusCode;
use actix_web::test;
use rstest::{fixture, rstest};
use serde_json::{json, Value};

use vidtube::handlers::app;
use vidtube::state::AppState;
use vidtube::test_support::{bearer, test_state, MultipartBody};

#[fixture]
fn state() -> AppState {
    test_state()
}

fn register(username: &str) -> test::TestRequest {
    MultipartBody::new()
        .text("fullName", username)
        .text("username", username)
        .text("email", &format!("{username}@example.com"))
        .text("password", "s3cret-pass")
        .file("avatar", "avatar.png", "image/png", b"png")
        .attach(test::TestRequest::post().uri("/api/v1/users/register"))
}

#[rstest]
#[actix_web::test]
async fn registration_publishing_and_likes(state: AppState) {
    let app = test::init_service(app(state)).await;

    let res = test::call_service(&app, register("alice").to_request()).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["data"]["username"], "alice");
    assert!(body["data"].get("password").is_none());
    assert!(body["data"].get("passwordHash").is_none());
    assert!(body["data"].get("refreshToken").is_none());

    let res = test::call_service(&app, register("bob").to_request()).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let login = |username: &str, password: &str| {
        test::TestRequest::post()
            .uri("/api/v1/users/login")
            .set_json(json!({ "username": username, "password": password }))
            .to_request()
    };

    let res = test::call_service(&app, login("alice", "wrong")).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body: Value = test::read_body_json(test::call_service(&app, login("alice", "s3cret-pass")).await).await;
    let alice = body["data"]["accessToken"].as_str().expect("alice token").to_owned();
    let body: Value = test::read_body_json(test::call_service(&app, login("bob", "s3cret-pass")).await).await;
    let bob = body["data"]["accessToken"].as_str().expect("bob token").to_owned();

    let req = test::TestRequest::post()
        .uri("/api/v1/tweets")
        .insert_header(bearer(&alice))
        .set_json(json!({ "content": "x".repeat(281) }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = MultipartBody::new()
        .text("title", "Cats")
        .text("description", "A video about cats")
        .file("video", "cats.mp4", "video/mp4", b"mp4")
        .file("thumbnail", "cats.png", "image/png", b"png")
        .attach(test::TestRequest::post().uri("/api/v1/videos/publish-video"))
        .insert_header(bearer(&alice))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["data"]["isPublished"], true);
    let video_id = body["data"]["_id"].as_str().expect("video id").to_owned();

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/videos/{video_id}"))
        .insert_header(bearer(&bob))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let like = || {
        test::TestRequest::patch()
            .uri(&format!("/api/v1/likes/toggle/v/{video_id}"))
            .insert_header(bearer(&alice))
            .to_request()
    };
    let body: Value = test::read_body_json(test::call_service(&app, like()).await).await;
    assert_eq!(body["data"], json!({ "isLiked": true, "videoLikeCount": 1 }));
    let body: Value = test::read_body_json(test::call_service(&app, like()).await).await;
    assert_eq!(body["data"], json!({ "isLiked": false, "videoLikeCount": 0 }));
}

#[rstest]
#[actix_web::test]
async fn channel_owner_sees_subscribers_on_the_dashboard(state: AppState) {
    let app = test::init_service(app(state)).await;
    for name in ["carol", "dave"] {
        let res = test::call_service(&app, register(name).to_request()).await;
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let mut sessions = Vec::new();
    for name in ["carol", "dave"] {
        let req = test::TestRequest::post()
            .uri("/api/v1/users/login")
            .set_json(json!({ "email": format!("{name}@example.com"), "password": "s3cret-pass" }))
            .to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        sessions.push((
            body["data"]["user"]["_id"].as_str().expect("id").to_owned(),
            body["data"]["accessToken"].as_str().expect("token").to_owned(),
        ));
    }
    let (carol_id, carol) = &sessions[0];
    let (_, dave) = &sessions[1];

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/subscriptions/c/{carol_id}"))
        .insert_header(bearer(dave))
        .to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["data"]["isSubscribed"], true);

    let req = test::TestRequest::get()
        .uri("/api/v1/dashboard/stats")
        .insert_header(bearer(carol))
        .to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["data"]["totalSubscribers"], 1);
    assert_eq!(body["data"]["totalVideos"], 0);

    let req = test::TestRequest::get()
        .uri("/api/v1/users/c/carol")
        .insert_header(bearer(dave))
        .to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["data"]["subscribersCount"], 1);
    assert_eq!(body["data"]["isSubscribed"], true);
}
