//! Image storage port with Cloudinary and local-disk adapters.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{multipart, Client};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::UploadedFile;
use crate::config::CloudinaryConfig;
use crate::models::ImageRef;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media store transport failed: {0}")]
    Transport(String),
    #[error("media store returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("media store response decode failed: {0}")]
    Decode(String),
    #[error("media store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid media filename {0:?}")]
    InvalidFilename(String),
}

/// Stores uploaded images and deletes them by their `filename` id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn store(&self, file: UploadedFile) -> Result<ImageRef, MediaError>;
    async fn destroy(&self, filename: &str) -> Result<(), MediaError>;
}

/// Cloudinary upload API client using signed requests.
pub struct CloudinaryStore {
    client: Client,
    config: CloudinaryConfig,
}

#[derive(Debug, Deserialize)]
struct UploadResponseDto {
    secure_url: String,
    public_id: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponseDto {
    result: String,
}

impl CloudinaryStore {
    pub fn new(config: CloudinaryConfig, timeout: Duration) -> Result<Self, MediaError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| MediaError::Transport(err.to_string()))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/v1_1/{}/image/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.cloud_name,
            action
        )
    }

    async fn post(&self, url: String, form: multipart::Form) -> Result<Vec<u8>, MediaError> {
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| MediaError::Transport(err.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| MediaError::Transport(err.without_url().to_string()))?;
        if !status.is_success() {
            return Err(MediaError::Status {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body).chars().take(200).collect(),
            });
        }
        Ok(body.to_vec())
    }
}

#[async_trait]
impl MediaStore for CloudinaryStore {
    async fn store(&self, file: UploadedFile) -> Result<ImageRef, MediaError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[("folder", &self.config.folder), ("timestamp", &timestamp)],
            &self.config.api_secret,
        );

        let mut part = multipart::Part::bytes(file.bytes.to_vec()).file_name(file.file_name.clone());
        if let Some(content_type) = &file.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|err| MediaError::Transport(err.to_string()))?;
        }

        let form = multipart::Form::new()
            .part("file", part)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", self.config.folder.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let body = self.post(self.endpoint("upload"), form).await?;
        let uploaded: UploadResponseDto = serde_json::from_slice(&body)
            .map_err(|err| MediaError::Decode(err.to_string()))?;

        tracing::info!("Stored image {} as {}", file.file_name, uploaded.public_id);
        Ok(ImageRef {
            url: uploaded.secure_url,
            filename: uploaded.public_id,
        })
    }

    async fn destroy(&self, filename: &str) -> Result<(), MediaError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[("public_id", filename), ("timestamp", &timestamp)],
            &self.config.api_secret,
        );

        let form = multipart::Form::new()
            .text("public_id", filename.to_string())
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let body = self.post(self.endpoint("destroy"), form).await?;
        let destroyed: DestroyResponseDto = serde_json::from_slice(&body)
            .map_err(|err| MediaError::Decode(err.to_string()))?;
        if destroyed.result != "ok" {
            tracing::warn!("Destroying {} returned {:?}", filename, destroyed.result);
        }
        Ok(())
    }
}

/// Cloudinary request signature: params sorted by name, `k=v` joined with `&`,
/// secret appended, SHA-256 hex digest.
pub fn sign_params(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let payload = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Stores images under a local directory, served at `url_prefix`.
pub struct DiskMediaStore {
    root: PathBuf,
    url_prefix: String,
}

impl DiskMediaStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.into(),
        }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

#[async_trait]
impl MediaStore for DiskMediaStore {
    async fn store(&self, file: UploadedFile) -> Result<ImageRef, MediaError> {
        tokio::fs::create_dir_all(&self.root).await?;

        let name = format!("{}.{}", uuid::Uuid::new_v4(), file.extension());
        tokio::fs::write(self.root.join(&name), &file.bytes).await?;

        Ok(ImageRef {
            url: format!("{}/{}", self.url_prefix.trim_end_matches('/'), name),
            filename: name,
        })
    }

    async fn destroy(&self, filename: &str) -> Result<(), MediaError> {
        if filename.is_empty()
            || filename.contains(['/', '\\'])
            || filename.starts_with('.')
        {
            return Err(MediaError::InvalidFilename(filename.to_string()));
        }
        match tokio::fs::remove_file(self.root.join(filename)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
