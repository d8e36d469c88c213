//! Channel statistics for the signed-in owner.

use actix_web::{get, web, HttpResponse};
use futures::future::try_join_all;
use serde::Serialize;

use crate::aggregate::{Pipeline, SortDirection};
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::models::{Video, CHANNEL_VIDEO_FIELDS};
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::store::{Collection, EdgeKind, Filter};

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub total_videos: u64,
    pub total_views: i64,
    pub total_subscribers: u64,
    pub total_likes: u64,
}

/// Sum of views, pinned at `i64::MAX` like the view counter itself.
fn total_views(videos: &[Video]) -> i64 {
    videos
        .iter()
        .fold(0i64, |acc, video| acc.saturating_add(video.views))
}

#[get("/stats")]
pub async fn channel_stats(
    state: web::Data<AppState>,
    caller: AuthUser,
) -> ApiResult<HttpResponse> {
    let owner = caller.id();
    let store = state.repo.store();
    let owned = Filter::owned_by(&owner);
    let (videos, total_subscribers) = futures::try_join!(
        state.repo.find::<Video>(&owned),
        store.count_edges_to(EdgeKind::Subscription, &owner),
    )?;
    let likes = try_join_all(
        videos
            .iter()
            .map(|video| store.count_edges_to(EdgeKind::VideoLike, &video.id)),
    )
    .await?;

    let stats = ChannelStats {
        total_videos: u64::try_from(videos.len()).unwrap_or(u64::MAX),
        total_views: total_views(&videos),
        total_subscribers,
        total_likes: likes.iter().sum(),
    };
    Ok(ApiResponse::ok(stats, "Channel stats fetched successfully"))
}

/// Every video of the caller, drafts included, newest first.
#[get("/videos")]
pub async fn channel_videos(
    state: web::Data<AppState>,
    caller: AuthUser,
) -> ApiResult<HttpResponse> {
    let videos = Pipeline::new(Collection::Videos)
        .matching(Filter::owned_by(&caller.id()))
        .project(CHANNEL_VIDEO_FIELDS)
        .sort_by("createdAt", SortDirection::Desc)
        .collect(state.repo.store())
        .await?;
    Ok(ApiResponse::ok(videos, "Channel videos fetched successfully"))
}

#[cfg(test)]
mod tests {
    use actix_web::test;
    use serde_json::{json, Value};

    use super::*;
    use crate::handlers::app;
    use crate::store::{Edge, UpdateOp};
    use crate::test_support::{bearer, seed_user, seed_video, test_state};

    #[actix_web::test]
    async fn stats_add_up_views_likes_and_subscribers() {
        let state = test_state();
        let (alice, token) = seed_user(&state, "alice").await;
        let (bob, _) = seed_user(&state, "bob").await;
        let (carol, _) = seed_user(&state, "carol").await;
        let first = seed_video(&state, &alice, "first", true).await;
        let second = seed_video(&state, &alice, "second", false).await;
        seed_video(&state, &bob, "elsewhere", true).await;

        let store = state.repo.store();
        for (video, views) in [(&first, 7), (&second, 3)] {
            state
                .repo
                .update::<Video>(&Filter::by_id(&video.id), vec![UpdateOp::inc("views", views)])
                .await
                .expect("views");
        }
        for fan in [&bob, &carol] {
            store
                .insert_edge(&Edge::new(EdgeKind::VideoLike, fan.id, first.id))
                .await
                .expect("like");
        }
        store
            .insert_edge(&Edge::new(EdgeKind::VideoLike, bob.id, second.id))
            .await
            .expect("like");
        store
            .insert_edge(&Edge::new(EdgeKind::Subscription, carol.id, alice.id))
            .await
            .expect("subscribe");
        let app = test::init_service(app(state.clone())).await;

        let req = test::TestRequest::get()
            .uri("/api/v1/dashboard/stats")
            .insert_header(bearer(&token))
            .to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(
            body["data"],
            json!({"totalVideos": 2, "totalViews": 10, "totalSubscribers": 1, "totalLikes": 3})
        );
    }

    #[actix_web::test]
    async fn huge_view_counts_saturate_instead_of_overflowing() {
        let state = test_state();
        let (alice, token) = seed_user(&state, "alice").await;
        for title in ["viral", "also viral"] {
            let video = seed_video(&state, &alice, title, true).await;
            state
                .repo
                .update::<Video>(
                    &Filter::by_id(&video.id),
                    vec![UpdateOp::set("views", i64::MAX - 1)],
                )
                .await
                .expect("views");
        }
        let app = test::init_service(app(state)).await;

        let req = test::TestRequest::get()
            .uri("/api/v1/dashboard/stats")
            .insert_header(bearer(&token))
            .to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(body["data"]["totalViews"], i64::MAX);
    }

    #[actix_web::test]
    async fn an_empty_channel_reports_zeros() {
        let state = test_state();
        let (_, token) = seed_user(&state, "alice").await;
        let app = test::init_service(app(state)).await;

        let req = test::TestRequest::get()
            .uri("/api/v1/dashboard/stats")
            .insert_header(bearer(&token))
            .to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(
            body["data"],
            json!({"totalVideos": 0, "totalViews": 0, "totalSubscribers": 0, "totalLikes": 0})
        );
    }

    #[actix_web::test]
    async fn channel_videos_include_drafts_without_owner_details() {
        let state = test_state();
        let (alice, token) = seed_user(&state, "alice").await;
        seed_video(&state, &alice, "public", true).await;
        seed_video(&state, &alice, "draft", false).await;
        let app = test::init_service(app(state)).await;

        let req = test::TestRequest::get()
            .uri("/api/v1/dashboard/videos")
            .insert_header(bearer(&token))
            .to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        let docs = body["data"].as_array().expect("array");
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|doc| doc.get("owner").is_none()));
        assert!(docs.iter().any(|doc| doc["isPublished"] == false));
    }
}
