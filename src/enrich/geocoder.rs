//! Forward geocoding port and its Mapbox adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use thiserror::Error;

use crate::models::Geometry;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoder is not configured")]
    Unconfigured,
    #[error("geocoder transport failed: {0}")]
    Transport(String),
    #[error("geocoder returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("geocoder response decode failed: {0}")]
    Decode(String),
}

/// Turns a free-text place name into coordinates.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Return at most `limit` matches, best first. No match is `Ok(vec![])`.
    async fn forward(&self, query: &str, limit: u8) -> Result<Vec<Geometry>, GeocodeError>;
}

/// Stand-in used when no geocoding credentials are configured.
pub struct UnconfiguredGeocoder;

#[async_trait]
impl Geocoder for UnconfiguredGeocoder {
    async fn forward(&self, _query: &str, _limit: u8) -> Result<Vec<Geometry>, GeocodeError> {
        Err(GeocodeError::Unconfigured)
    }
}

/// Mapbox Geocoding API (`mapbox.places`) client.
pub struct MapboxGeocoder {
    client: Client,
    base_url: Url,
    token: String,
}

impl MapboxGeocoder {
    pub fn new(base_url: &str, token: String, timeout: Duration) -> Result<Self, GeocodeError> {
        let base_url = Url::parse(base_url)
            .map_err(|err| GeocodeError::Transport(format!("invalid base URL: {err}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| GeocodeError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    fn request_url(&self, query: &str, limit: u8) -> Result<Url, GeocodeError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GeocodeError::Transport("base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["geocoding", "v5", "mapbox.places", &format!("{query}.json")]);
        url.query_pairs_mut()
            .append_pair("access_token", &self.token)
            .append_pair("limit", &limit.to_string());
        Ok(url)
    }
}

#[async_trait]
impl Geocoder for MapboxGeocoder {
    async fn forward(&self, query: &str, limit: u8) -> Result<Vec<Geometry>, GeocodeError> {
        let url = self.request_url(query, limit)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| GeocodeError::Transport(err.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| GeocodeError::Transport(err.without_url().to_string()))?;
        if !status.is_success() {
            return Err(GeocodeError::Status {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body).chars().take(200).collect(),
            });
        }

        let mut matches = parse_features(&body)?;
        matches.truncate(usize::from(limit));
        tracing::debug!("Geocoded {:?} to {} match(es)", query, matches.len());
        Ok(matches)
    }
}

#[derive(Debug, Deserialize)]
struct FeatureCollectionDto {
    #[serde(default)]
    features: Vec<FeatureDto>,
}

#[derive(Debug, Deserialize)]
struct FeatureDto {
    geometry: Geometry,
}

fn parse_features(body: &[u8]) -> Result<Vec<Geometry>, GeocodeError> {
    let decoded: FeatureCollectionDto = serde_json::from_slice(body)
        .map_err(|err| GeocodeError::Decode(format!("invalid geocoding payload: {err}")))?;
    Ok(decoded.features.into_iter().map(|f| f.geometry).collect())
}
