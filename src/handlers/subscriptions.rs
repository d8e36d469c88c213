//! Channel subscriptions. A channel is a user; subscribing is a toggle.

use actix_web::{get, post, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::aggregate::lookup_users;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::id::ObjectId;
use crate::models::{User, USER_SUMMARY_FIELDS};
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::store::{Document, Edge, EdgeKind};
use crate::toggle::{toggle_relation, EdgeKey};
use crate::validation::parse_id;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscriberEntry {
    subscriber: Document,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    subscribed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChannelEntry {
    channel: Document,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    subscribed_at: DateTime<Utc>,
}

/// Pairs each edge with the summary of the user on `side`, newest first.
/// Edges pointing at deleted users are skipped.
async fn with_summaries(
    state: &AppState,
    mut edges: Vec<Edge>,
    side: impl Fn(&Edge) -> ObjectId,
) -> ApiResult<Vec<(Document, DateTime<Utc>)>> {
    edges.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let ids: Vec<ObjectId> = edges.iter().map(&side).collect();
    let users = lookup_users(state.repo.store(), &ids, USER_SUMMARY_FIELDS).await?;
    Ok(edges
        .iter()
        .filter_map(|edge| {
            let user = users.get(&side(edge).to_string())?;
            Some((user.clone(), edge.created_at))
        })
        .collect())
}

#[post("/c/{channel_id}")]
pub async fn toggle_subscription(
    state: web::Data<AppState>,
    caller: AuthUser,
    channel_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let channel = parse_id(&channel_id, "Channel")?;
    if channel == caller.id() {
        return Err(ApiError::invalid("You cannot subscribe to your own channel"));
    }
    state
        .repo
        .get::<User>(&channel)
        .await?
        .ok_or_else(|| ApiError::not_found("Channel not found"))?;

    let outcome = toggle_relation(
        state.repo.store(),
        &EdgeKey::new(EdgeKind::Subscription, caller.id(), channel),
    )
    .await?;
    let message = if outcome.active {
        "Subscribed successfully"
    } else {
        "Unsubscribed successfully"
    };
    Ok(ApiResponse::ok(
        json!({ "isSubscribed": outcome.active, "subscribersCount": outcome.count }),
        message,
    ))
}

/// Subscribers of a channel. Only the channel owner may look.
#[get("/c/{channel_id}")]
pub async fn channel_subscribers(
    state: web::Data<AppState>,
    caller: AuthUser,
    channel_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let channel = parse_id(&channel_id, "Channel")?;
    if channel != caller.id() {
        return Err(ApiError::forbidden("Unauthorized request for subscribers"));
    }
    let edges = state
        .repo
        .store()
        .edges_to(EdgeKind::Subscription, &channel)
        .await?;
    let entries: Vec<SubscriberEntry> = with_summaries(&state, edges, |edge| edge.source)
        .await?
        .into_iter()
        .map(|(subscriber, subscribed_at)| SubscriberEntry {
            subscriber,
            subscribed_at,
        })
        .collect();
    Ok(ApiResponse::ok(entries, "Subscribers fetched successfully"))
}

/// Channels a user subscribes to. Only visible to that user.
#[get("/u/{subscriber_id}")]
pub async fn subscribed_channels(
    state: web::Data<AppState>,
    caller: AuthUser,
    subscriber_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let subscriber = parse_id(&subscriber_id, "Subscriber")?;
    if subscriber != caller.id() {
        return Err(ApiError::forbidden(
            "Unauthorized request for subscribed channels",
        ));
    }
    let edges = state
        .repo
        .store()
        .edges_from(EdgeKind::Subscription, &subscriber)
        .await?;
    let entries: Vec<ChannelEntry> = with_summaries(&state, edges, |edge| edge.target)
        .await?
        .into_iter()
        .map(|(channel, subscribed_at)| ChannelEntry {
            channel,
            subscribed_at,
        })
        .collect();
    Ok(ApiResponse::ok(entries, "Subscribed channels fetched successfully"))
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::Value;

    use super::*;
    use crate::handlers::app;
    use crate::test_support::{bearer, seed_user, test_state};

    #[actix_web::test]
    async fn subscribing_toggles_and_counts() {
        let state = test_state();
        let (alice, alice_token) = seed_user(&state, "alice").await;
        let (_, bob_token) = seed_user(&state, "bob").await;
        let app = test::init_service(app(state)).await;

        let toggle = |token: &str| {
            test::TestRequest::post()
                .uri(&format!("/api/v1/subscriptions/c/{}", alice.id))
                .insert_header(bearer(token))
                .to_request()
        };

        let body: Value = test::read_body_json(test::call_service(&app, toggle(&bob_token)).await).await;
        assert_eq!(body["data"], json!({"isSubscribed": true, "subscribersCount": 1}));

        let res = test::call_service(&app, toggle(&alice_token)).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(test::call_service(&app, toggle(&bob_token)).await).await;
        assert_eq!(body["data"], json!({"isSubscribed": false, "subscribersCount": 0}));
    }

    #[actix_web::test]
    async fn unknown_channels_are_not_found() {
        let state = test_state();
        let (_, token) = seed_user(&state, "alice").await;
        let app = test::init_service(app(state)).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/subscriptions/c/{}", ObjectId::new()))
            .insert_header(bearer(&token))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn listings_are_private_to_their_subject() {
        let state = test_state();
        let (alice, alice_token) = seed_user(&state, "alice").await;
        let (bob, bob_token) = seed_user(&state, "bob").await;
        let app = test::init_service(app(state)).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/subscriptions/c/{}", alice.id))
            .insert_header(bearer(&bob_token))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let get = |uri: String, token: &str| {
            test::TestRequest::get()
                .uri(&uri)
                .insert_header(bearer(token))
                .to_request()
        };

        let res = test::call_service(&app, get(format!("/api/v1/subscriptions/c/{}", alice.id), &bob_token)).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = test::call_service(&app, get(format!("/api/v1/subscriptions/c/{}", alice.id), &alice_token)).await;
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["data"][0]["subscriber"]["username"], "bob");
        assert!(body["data"][0]["subscribedAt"].is_number());

        let res = test::call_service(&app, get(format!("/api/v1/subscriptions/u/{}", bob.id), &bob_token)).await;
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["data"][0]["channel"]["username"], "alice");

        let res = test::call_service(&app, get(format!("/api/v1/subscriptions/u/{}", bob.id), &alice_token)).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }
}
