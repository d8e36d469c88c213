//! Shared fixtures for handler tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use actix_web::http::header;
use actix_web::test::TestRequest;
use async_trait::async_trait;

use crate::auth::{CookiePolicy, PasswordHasher, TokenService};
use crate::config::TokenSettings;
use crate::media::{MediaError, MediaKind, MediaStorage, MediaUpload, StoredMedia};
use crate::models::{User, Video};
use crate::repository::Repository;
use crate::state::AppState;
use crate::store::MemoryStore;

pub const FAKE_VIDEO_SECONDS: f64 = 42.5;
pub const TEST_PASSWORD: &str = "correct horse";
const BOUNDARY: &str = "vidtube-test-boundary";

/// Hands out predictable URLs without leaving the process.
#[derive(Default)]
pub struct FakeMediaStorage {
    uploads: AtomicUsize,
}

#[async_trait]
impl MediaStorage for FakeMediaStorage {
    async fn upload(&self, upload: MediaUpload) -> Result<StoredMedia, MediaError> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(StoredMedia {
            url: format!("https://media.test/{n}/{}", upload.file_name),
            public_id: format!("test/{n}"),
            duration: (upload.kind == MediaKind::Video).then_some(FAKE_VIDEO_SECONDS),
        })
    }
}

pub fn test_state() -> AppState {
    AppState {
        repo: Repository::new(Arc::new(MemoryStore::new())),
        media: Arc::new(FakeMediaStorage::default()),
        tokens: TokenService::new(&TokenSettings {
            access_secret: "test-access".into(),
            access_ttl: Duration::from_secs(600),
            refresh_secret: "test-refresh".into(),
            refresh_ttl: Duration::from_secs(6_000),
        }),
        passwords: PasswordHasher::new(4),
        cookies: CookiePolicy { secure: false },
        request_timeout: Duration::from_secs(5),
        max_upload_bytes: 1024 * 1024,
    }
}

/// Stores a user whose password is [`TEST_PASSWORD`] and returns it with a
/// valid access token.
pub async fn seed_user(state: &AppState, username: &str) -> (User, String) {
    let hash = bcrypt::hash(TEST_PASSWORD, 4).expect("hash");
    let user = User::new(
        username,
        &format!("{username}@example.com"),
        username,
        format!("https://media.test/{username}.png"),
        None,
        hash,
    );
    state.repo.insert(&user).await.expect("insert user");
    let pair = state.tokens.issue_pair(&user).expect("tokens");
    (user, pair.access_token)
}

pub async fn seed_video(state: &AppState, owner: &User, title: &str, published: bool) -> Video {
    let mut video = Video::new(
        owner.id,
        title.to_owned(),
        format!("about {title}"),
        format!("https://media.test/{title}.mp4"),
        format!("https://media.test/{title}.png"),
        10.0,
    );
    video.is_published = published;
    state.repo.insert(&video).await.expect("insert video");
    video
}

pub fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {token}"))
}

/// Hand-assembled `multipart/form-data` payload.
#[derive(Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn attach(mut self, request: TestRequest) -> TestRequest {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        request
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(self.body)
    }
}
