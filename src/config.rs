//! Command-line and environment configuration.

use std::time::Duration;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    /// In-process store, lost on restart.
    Memory,
    /// ScyllaDB cluster.
    Scylla,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "vidtube", about = "Video sharing platform backend")]
pub struct Config {
    #[arg(long, env = "VIDTUBE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "VIDTUBE_PORT", default_value_t = 8000)]
    pub port: u16,

    /// HTTP worker threads; defaults to the number of CPUs.
    #[arg(long, env = "VIDTUBE_WORKERS")]
    pub workers: Option<usize>,

    #[arg(long, env = "VIDTUBE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "VIDTUBE_STORE", value_enum, default_value_t = StoreBackend::Scylla)]
    pub store: StoreBackend,

    #[arg(
        long,
        env = "VIDTUBE_SCYLLA_NODES",
        value_delimiter = ',',
        default_value = "127.0.0.1:9042"
    )]
    pub scylla_nodes: Vec<String>,

    #[arg(long, env = "VIDTUBE_SCYLLA_KEYSPACE", default_value = "vidtube")]
    pub scylla_keyspace: String,

    #[arg(long, env = "VIDTUBE_SCYLLA_REPLICATION", default_value_t = 1)]
    pub scylla_replication_factor: u32,

    #[arg(long, env = "VIDTUBE_ACCESS_TOKEN_SECRET")]
    pub access_token_secret: String,

    #[arg(long, env = "VIDTUBE_ACCESS_TOKEN_TTL_SECS", default_value_t = 86_400)]
    pub access_token_ttl_secs: u64,

    #[arg(long, env = "VIDTUBE_REFRESH_TOKEN_SECRET")]
    pub refresh_token_secret: String,

    #[arg(long, env = "VIDTUBE_REFRESH_TOKEN_TTL_SECS", default_value_t = 864_000)]
    pub refresh_token_ttl_secs: u64,

    #[arg(long, env = "VIDTUBE_BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    pub bcrypt_cost: u32,

    /// Mark auth cookies `Secure`. Disable only for plain-HTTP development.
    #[arg(long, env = "VIDTUBE_SECURE_COOKIES", default_value_t = true, action = clap::ArgAction::Set)]
    pub secure_cookies: bool,

    /// Deadline applied to every request.
    #[arg(long, env = "VIDTUBE_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    #[arg(long, env = "VIDTUBE_MAX_UPLOAD_BYTES", default_value_t = 512 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    #[arg(long, env = "CLOUDINARY_CLOUD_NAME")]
    pub cloudinary_cloud_name: String,

    #[arg(long, env = "CLOUDINARY_API_KEY")]
    pub cloudinary_api_key: String,

    #[arg(long, env = "CLOUDINARY_API_SECRET")]
    pub cloudinary_api_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScyllaSettings {
    pub known_nodes: Vec<String>,
    pub keyspace: String,
    pub replication_factor: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSettings {
    pub access_secret: String,
    pub access_ttl: Duration,
    pub refresh_secret: String,
    pub refresh_ttl: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudinarySettings {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("keyspace `{0}` may only contain letters, digits and underscores")]
    Keyspace(String),
    #[error("bcrypt cost {0} is outside 4..=31")]
    BcryptCost(u32),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

impl Config {
    /// Checks cross-field constraints clap cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_token_secret.trim().is_empty() {
            return Err(ConfigError::Empty("access token secret"));
        }
        if self.refresh_token_secret.trim().is_empty() {
            return Err(ConfigError::Empty("refresh token secret"));
        }
        let keyspace_ok = !self.scylla_keyspace.is_empty()
            && self
                .scylla_keyspace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !keyspace_ok {
            return Err(ConfigError::Keyspace(self.scylla_keyspace.clone()));
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ConfigError::BcryptCost(self.bcrypt_cost));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Zero("request timeout"));
        }
        if self.access_token_ttl_secs == 0 || self.refresh_token_ttl_secs == 0 {
            return Err(ConfigError::Zero("token lifetime"));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn scylla(&self) -> ScyllaSettings {
        ScyllaSettings {
            known_nodes: self.scylla_nodes.clone(),
            keyspace: self.scylla_keyspace.clone(),
            replication_factor: self.scylla_replication_factor,
        }
    }

    pub fn tokens(&self) -> TokenSettings {
        TokenSettings {
            access_secret: self.access_token_secret.clone(),
            access_ttl: Duration::from_secs(self.access_token_ttl_secs),
            refresh_secret: self.refresh_token_secret.clone(),
            refresh_ttl: Duration::from_secs(self.refresh_token_ttl_secs),
        }
    }

    pub fn cloudinary(&self) -> CloudinarySettings {
        CloudinarySettings {
            cloud_name: self.cloudinary_cloud_name.clone(),
            api_key: self.cloudinary_api_key.clone(),
            api_secret: self.cloudinary_api_secret.clone(),
        }
    }
}
