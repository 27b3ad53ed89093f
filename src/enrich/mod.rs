//! Campground enrichment: geocoding and image storage.
//!
//! Creation geocodes the location first and only then uploads images, so an
//! unknown location never touches the media store. Image storage is all or
//! nothing per request.

mod geocoder;
mod media;

pub use geocoder::*;
pub use media::*;

use std::sync::Arc;

use axum::body::Bytes;
use thiserror::Error;

use crate::models::{CampgroundInput, Geometry, ImageRef, NewCampground, User};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("Could not find location {0:?}")]
    LocationNotFound(String),
    #[error("{0}")]
    InvalidUpload(String),
    #[error(transparent)]
    Geocode(#[from] GeocodeError),
    #[error(transparent)]
    Media(#[from] MediaError),
}

/// A file received in a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadedFile {
    /// Browsers submit an empty part when no file was chosen.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty() && self.file_name.is_empty()
    }

    pub fn is_image(&self) -> bool {
        match self.content_type.as_deref() {
            Some(ct) if ct.starts_with("image/") => true,
            None | Some("application/octet-stream") => {
                IMAGE_EXTENSIONS.contains(&self.extension().as_str())
            }
            Some(_) => false,
        }
    }

    /// Lower-cased extension from the file name, or from the content type.
    pub fn extension(&self) -> String {
        let from_name = self
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()));
        from_name
            .or_else(|| {
                self.content_type
                    .as_deref()
                    .and_then(|ct| ct.strip_prefix("image/"))
                    .map(|sub| if sub == "jpeg" { "jpg".to_string() } else { sub.to_string() })
                    .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
            })
            .unwrap_or_else(|| "bin".to_string())
    }
}

/// Enrichment pipeline over injected geocoder and media-store clients.
#[derive(Clone)]
pub struct Enricher {
    geocoder: Arc<dyn Geocoder>,
    media: Arc<dyn MediaStore>,
}

impl Enricher {
    pub fn new(geocoder: Arc<dyn Geocoder>, media: Arc<dyn MediaStore>) -> Self {
        Self { geocoder, media }
    }

    /// Geocode, store images, stamp the author.
    pub async fn enrich(
        &self,
        input: CampgroundInput,
        files: Vec<UploadedFile>,
        author: &User,
    ) -> Result<NewCampground, EnrichmentError> {
        let geometry = self.geocode(&input.location).await?;
        let images = self.store_images(files).await?;
        Ok(NewCampground {
            input,
            geometry,
            images,
            author: author.id.clone(),
        })
    }

    /// First geocoding match for `location`.
    pub async fn geocode(&self, location: &str) -> Result<Geometry, EnrichmentError> {
        self.geocoder
            .forward(location, 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EnrichmentError::LocationNotFound(location.to_string()))
    }

    /// Store every non-empty file. On the first failure the images already
    /// stored by this call are destroyed and the error returned.
    pub async fn store_images(
        &self,
        files: Vec<UploadedFile>,
    ) -> Result<Vec<ImageRef>, EnrichmentError> {
        let files: Vec<UploadedFile> = files.into_iter().filter(|f| !f.is_empty()).collect();
        if let Some(bad) = files.iter().find(|f| !f.is_image()) {
            return Err(EnrichmentError::InvalidUpload(format!(
                "{} is not an image",
                bad.file_name
            )));
        }

        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            match self.media.store(file).await {
                Ok(image) => stored.push(image),
                Err(err) => {
                    self.discard_images(&stored).await;
                    return Err(err.into());
                }
            }
        }
        Ok(stored)
    }

    /// Best-effort removal of images that will not be referenced.
    pub async fn discard_images(&self, images: &[ImageRef]) {
        for image in images {
            if let Err(err) = self.media.destroy(&image.filename).await {
                tracing::warn!("Failed to discard image {}: {}", image.filename, err);
            }
        }
    }
}
