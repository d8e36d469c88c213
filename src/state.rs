//! Shared application state, built once at startup.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{CookiePolicy, PasswordHasher, TokenService};
use crate::config::Config;
use crate::media::MediaStorage;
use crate::repository::Repository;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub repo: Repository,
    pub media: Arc<dyn MediaStorage>,
    pub tokens: TokenService,
    pub passwords: PasswordHasher,
    pub cookies: CookiePolicy,
    pub request_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn from_config(
        config: &Config,
        store: Arc<dyn Store>,
        media: Arc<dyn MediaStorage>,
    ) -> Self {
        Self {
            repo: Repository::new(store),
            media,
            tokens: TokenService::new(&config.tokens()),
            passwords: PasswordHasher::new(config.bcrypt_cost),
            cookies: CookiePolicy {
                secure: config.secure_cookies,
            },
            request_timeout: config.request_timeout(),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}
