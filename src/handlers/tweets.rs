use actix_web::{delete, get, patch, post, web, HttpResponse};
use log::info;
use serde::Deserialize;
use serde_json::json;

use crate::aggregate::{Pipeline, SortDirection};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::models::{Tweet, User};
use crate::ownership::{mutate_owned, Mutation};
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::store::{Collection, EdgeKind, Filter, UpdateOp};
use crate::validation::{parse_id, tweet_content};

#[derive(Debug, Deserialize)]
pub struct TweetRequest {
    #[serde(default)]
    content: Option<String>,
}

#[post("")]
pub async fn create_tweet(
    state: web::Data<AppState>,
    caller: AuthUser,
    body: web::Json<TweetRequest>,
) -> ApiResult<HttpResponse> {
    let content = tweet_content(body.content.as_deref())?;
    let tweet = Tweet::new(caller.id(), content);
    state.repo.insert(&tweet).await?;
    info!("Tweet {} created by {}", tweet.id, caller.id());
    Ok(ApiResponse::created(tweet, "Tweet created successfully"))
}

/// All tweets of one user, newest first.
#[get("/user/{user_id}")]
pub async fn user_tweets(
    state: web::Data<AppState>,
    _caller: AuthUser,
    user_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let user_id = parse_id(&user_id, "User")?;
    state
        .repo
        .get::<User>(&user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let tweets = Pipeline::new(Collection::Tweets)
        .matching(Filter::owned_by(&user_id))
        .sort_by("createdAt", SortDirection::Desc)
        .collect(state.repo.store())
        .await?;
    Ok(ApiResponse::ok(tweets, "User tweets fetched successfully"))
}

#[patch("/{tweet_id}")]
pub async fn update_tweet(
    state: web::Data<AppState>,
    caller: AuthUser,
    tweet_id: web::Path<String>,
    body: web::Json<TweetRequest>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&tweet_id, "Tweet")?;
    let content = tweet_content(body.content.as_deref())?;
    let tweet: Tweet = mutate_owned(
        &state.repo,
        &id,
        &caller.id(),
        Mutation::Update(vec![UpdateOp::set("content", content)]),
    )
    .await?;
    Ok(ApiResponse::ok(tweet, "Tweet updated successfully"))
}

#[delete("/{tweet_id}")]
pub async fn delete_tweet(
    state: web::Data<AppState>,
    caller: AuthUser,
    tweet_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&tweet_id, "Tweet")?;
    let _: Tweet = mutate_owned(&state.repo, &id, &caller.id(), Mutation::Delete).await?;
    state
        .repo
        .store()
        .delete_edges_to(EdgeKind::TweetLike, &id)
        .await?;
    Ok(ApiResponse::ok(json!({}), "Tweet deleted successfully"))
}
