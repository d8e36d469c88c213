//! Tokens, password hashing, auth cookies and the authenticated-user
//! extractor.

use actix_web::cookie::Cookie;
use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use chrono::Utc;
use futures::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::TokenSettings;
use crate::error::{ApiError, ApiResult};
use crate::id::ObjectId;
use crate::models::User;
use crate::state::AppState;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("could not sign token: {0}")]
    Encode(String),
    #[error("token rejected: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessClaims {
    pub sub: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signs and verifies HS256 tokens. Access and refresh tokens use separate
/// secrets, so one can never stand in for the other.
#[derive(Clone)]
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: i64,
    refresh_ttl: i64,
}

impl TokenService {
    pub fn new(settings: &TokenSettings) -> Self {
        let seconds = |ttl: std::time::Duration| i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        Self {
            access_encoding: EncodingKey::from_secret(settings.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(settings.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(settings.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(settings.refresh_secret.as_bytes()),
            access_ttl: seconds(settings.access_ttl),
            refresh_ttl: seconds(settings.refresh_ttl),
        }
    }

    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, TokenError> {
        let iat = Utc::now().timestamp();
        let access = AccessClaims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            iat,
            exp: iat.saturating_add(self.access_ttl),
            jti: Uuid::new_v4().to_string(),
        };
        let refresh = RefreshClaims {
            sub: user.id.to_string(),
            iat,
            exp: iat.saturating_add(self.refresh_ttl),
            jti: Uuid::new_v4().to_string(),
        };
        let header = Header::new(Algorithm::HS256);
        Ok(TokenPair {
            access_token: encode(&header, &access, &self.access_encoding)
                .map_err(|err| TokenError::Encode(err.to_string()))?,
            refresh_token: encode(&header, &refresh, &self.refresh_encoding)
                .map_err(|err| TokenError::Encode(err.to_string()))?,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        decode::<AccessClaims>(token, &self.access_decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|err| TokenError::Invalid(err.to_string()))
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        decode::<RefreshClaims>(token, &self.refresh_decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|err| TokenError::Invalid(err.to_string()))
    }
}

/// bcrypt on the blocking pool.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub async fn hash(&self, password: String) -> ApiResult<String> {
        let cost = self.cost;
        Ok(web::block(move || bcrypt::hash(password, cost)).await??)
    }

    pub async fn verify(&self, password: String, hash: String) -> ApiResult<bool> {
        Ok(web::block(move || bcrypt::verify(password, &hash)).await??)
    }
}

/// Attributes shared by both auth cookies.
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    pub secure: bool,
}

impl CookiePolicy {
    pub fn issue(&self, name: &'static str, value: String) -> Cookie<'static> {
        Cookie::build(name, value)
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .finish()
    }

    pub fn clear(&self, name: &'static str) -> Cookie<'static> {
        let mut cookie = self.issue(name, String::new());
        cookie.make_removal();
        cookie
    }
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
}

/// The access token from the cookie, else from `Authorization: Bearer`.
pub fn access_token(req: &HttpRequest) -> Option<String> {
    req.cookie(ACCESS_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .filter(|token| !token.is_empty())
        .or_else(|| bearer_token(req))
}

/// The caller, resolved from a valid access token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn id(&self) -> ObjectId {
        self.0.id
    }
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token = access_token(req);
        let state = req.app_data::<web::Data<AppState>>().cloned();
        Box::pin(async move {
            let state =
                state.ok_or_else(|| ApiError::internal("application state is not registered"))?;
            let token = token.ok_or_else(|| ApiError::unauthenticated("Unauthorized request"))?;
            let claims = state.tokens.verify_access(&token)?;
            let id = ObjectId::parse(&claims.sub)
                .map_err(|_| ApiError::unauthenticated("Invalid access token"))?;
            match state.repo.get::<User>(&id).await? {
                Some(user) => Ok(AuthUser(user)),
                None => {
                    debug!("Access token for missing user {}", id);
                    Err(ApiError::unauthenticated("Invalid access token"))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use actix_web::test::TestRequest;
    use rstest::{fixture, rstest};

    #[fixture]
    fn tokens() -> TokenService {
        TokenService::new(&TokenSettings {
            access_secret: "access-secret".into(),
            access_ttl: Duration::from_secs(60),
            refresh_secret: "refresh-secret".into(),
            refresh_ttl: Duration::from_secs(600),
        })
    }

    fn alice() -> User {
        User::new("alice", "alice@example.com", "Alice", "a.png".into(), None, "hash".into())
    }

    #[rstest]
    fn issued_tokens_verify_with_their_own_key(tokens: TokenService) {
        let user = alice();
        let pair = tokens.issue_pair(&user).expect("issue");

        let access = tokens.verify_access(&pair.access_token).expect("access");
        assert_eq!(access.sub, user.id.to_string());
        assert_eq!(access.username, "alice");

        let refresh = tokens.verify_refresh(&pair.refresh_token).expect("refresh");
        assert_eq!(refresh.sub, user.id.to_string());
    }

    #[rstest]
    fn tokens_are_not_interchangeable(tokens: TokenService) {
        let pair = tokens.issue_pair(&alice()).expect("issue");
        assert!(tokens.verify_access(&pair.refresh_token).is_err());
        assert!(tokens.verify_refresh(&pair.access_token).is_err());
    }

    #[rstest]
    fn every_issue_produces_a_fresh_refresh_token(tokens: TokenService) {
        let user = alice();
        let first = tokens.issue_pair(&user).expect("issue");
        let second = tokens.issue_pair(&user).expect("issue");
        assert_ne!(first.refresh_token, second.refresh_token);
    }

    #[rstest]
    fn tampered_tokens_are_rejected(tokens: TokenService) {
        let pair = tokens.issue_pair(&alice()).expect("issue");
        let tampered = format!("{}x", pair.access_token);
        assert!(matches!(
            tokens.verify_access(&tampered),
            Err(TokenError::Invalid(_))
        ));
    }

    #[actix_web::test]
    async fn passwords_hash_and_verify() {
        let hasher = PasswordHasher::new(4);
        let hash = hasher.hash("hunter2".into()).await.expect("hash");
        assert!(hasher.verify("hunter2".into(), hash.clone()).await.expect("verify"));
        assert!(!hasher.verify("hunter3".into(), hash).await.expect("verify"));
    }

    #[test]
    fn cookies_are_http_only_and_scoped_to_root() {
        let policy = CookiePolicy { secure: true };
        let cookie = policy.issue(ACCESS_COOKIE, "t".into());
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/"));

        let cleared = policy.clear(REFRESH_COOKIE);
        assert_eq!(cleared.value(), "");
        assert!(cleared.max_age().is_some());
    }

    #[test]
    fn cookie_token_wins_over_bearer_header() {
        let req = TestRequest::default()
            .cookie(Cookie::new(ACCESS_COOKIE, "from-cookie"))
            .insert_header((header::AUTHORIZATION, "Bearer from-header"))
            .to_http_request();
        assert_eq!(access_token(&req).as_deref(), Some("from-cookie"));

        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer from-header"))
            .to_http_request();
        assert_eq!(access_token(&req).as_deref(), Some("from-header"));

        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Basic abc"))
            .to_http_request();
        assert_eq!(access_token(&req), None);
    }
}
