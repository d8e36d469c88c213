//! Media uploads to the external object store.
//!
//! Handlers depend on [`MediaStorage`] only. [`CloudinaryStorage`] is the
//! production adapter; tests substitute an in-process fake.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::config::CloudinarySettings;

const UPLOAD_FOLDER: &str = "vidtube";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    fn resource_type(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub kind: MediaKind,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Where an upload ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMedia {
    pub url: String,
    pub public_id: String,
    /// Seconds; only reported for video.
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unreadable provider response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait MediaStorage: Send + Sync {
    async fn upload(&self, upload: MediaUpload) -> Result<StoredMedia, MediaError>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
    #[serde(default)]
    duration: Option<f64>,
}

/// Signed uploads against the Cloudinary REST API.
pub struct CloudinaryStorage {
    client: Client,
    settings: CloudinarySettings,
    base_url: String,
}

impl CloudinaryStorage {
    pub fn new(settings: CloudinarySettings, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            settings,
            base_url: "https://api.cloudinary.com/v1_1".to_owned(),
        })
    }

    fn endpoint(&self, kind: MediaKind) -> String {
        format!(
            "{}/{}/{}/upload",
            self.base_url,
            self.settings.cloud_name,
            kind.resource_type()
        )
    }
}

/// Request signature: the signed parameters sorted by name, joined as
/// `k=v&k=v`, followed by the API secret, hashed with SHA-256.
pub fn sign(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn transport(err: reqwest::Error) -> MediaError {
    MediaError::Transport(err.to_string())
}

#[async_trait]
impl MediaStorage for CloudinaryStorage {
    async fn upload(&self, upload: MediaUpload) -> Result<StoredMedia, MediaError> {
        let signed = vec![
            ("folder", UPLOAD_FOLDER.to_owned()),
            ("timestamp", Utc::now().timestamp().to_string()),
        ];
        let signature = sign(&signed, &self.settings.api_secret);

        let mut file = Part::bytes(upload.bytes).file_name(upload.file_name.clone());
        if let Some(content_type) = &upload.content_type {
            file = file.mime_str(content_type).map_err(transport)?;
        }
        let mut form = Form::new()
            .part("file", file)
            .text("api_key", self.settings.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");
        for (key, value) in signed {
            form = form.text(key, value);
        }

        debug!(
            "Uploading {} ({:?}) to media storage",
            upload.file_name, upload.kind
        );
        let response = self
            .client
            .post(self.endpoint(upload.kind))
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.bytes().await.map_err(transport)?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&body).into_owned();
            warn!("Media upload rejected with {}: {}", status, body);
            return Err(MediaError::Status {
                status: status.as_u16(),
                body,
            });
        }
        parse_upload_response(&body)
    }
}

fn parse_upload_response(body: &[u8]) -> Result<StoredMedia, MediaError> {
    let decoded: UploadResponse =
        serde_json::from_slice(body).map_err(|err| MediaError::Decode(err.to_string()))?;
    Ok(StoredMedia {
        url: decoded.secure_url,
        public_id: decoded.public_id,
        duration: decoded.duration,
    })
}
