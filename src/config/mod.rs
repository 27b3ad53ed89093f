//! Configuration module for the YelpCamp backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Prefix shared by every environment variable the backend reads.
pub const ENV_PREFIX: &str = "YELPCAMP_";

/// Configuration loading failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Credentials for the Cloudinary upload API.
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: String,
    pub base_url: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
    /// Mark the session cookie `Secure` (enable behind TLS)
    pub secure_cookies: bool,
    /// Mapbox access token for forward geocoding
    pub mapbox_token: Option<String>,
    pub geocoder_base_url: String,
    /// Cloudinary credentials; uploads fall back to local disk when absent
    pub cloudinary: Option<CloudinaryConfig>,
    /// Directory for the disk media store
    pub uploads_dir: PathBuf,
    /// Timeout applied to every outbound collaborator request
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let db_path = var_or("DB_PATH", "./data/yelpcamp.sqlite").into();

        let bind_addr = parse_var("BIND_ADDR", "127.0.0.1:3000")?;

        let log_level = var_or("LOG_LEVEL", "info");

        let log_format = match var_or("LOG_FORMAT", "text").to_ascii_lowercase().as_str() {
            "text" => LogFormat::Text,
            "json" => LogFormat::Json,
            other => {
                return Err(ConfigError::Invalid {
                    key: key("LOG_FORMAT"),
                    value: other.to_string(),
                    reason: "expected `text` or `json`".to_string(),
                })
            }
        };

        let secure_cookies = parse_var("SECURE_COOKIES", "false")?;

        let mapbox_token = var("MAPBOX_TOKEN");
        let geocoder_base_url = var_or("GEOCODER_BASE_URL", "https://api.mapbox.com");

        let cloudinary = match (
            var("CLOUDINARY_CLOUD_NAME"),
            var("CLOUDINARY_KEY"),
            var("CLOUDINARY_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
                folder: var_or("CLOUDINARY_FOLDER", "YelpCamp"),
                base_url: var_or("MEDIA_BASE_URL", "https://api.cloudinary.com"),
            }),
            _ => None,
        };

        let uploads_dir = var_or("UPLOADS_DIR", "./data/uploads").into();

        let http_timeout = Duration::from_secs(parse_var("HTTP_TIMEOUT_SECS", "10")?);

        Ok(Self {
            db_path,
            bind_addr,
            log_level,
            log_format,
            secure_cookies,
            mapbox_token,
            geocoder_base_url,
            cloudinary,
            uploads_dir,
            http_timeout,
        })
    }
}

fn key(name: &str) -> String {
    format!("{ENV_PREFIX}{name}")
}

/// Read a variable, treating blank values as unset.
fn var(name: &str) -> Option<String> {
    env::var(key(name))
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn var_or(name: &str, default: &str) -> String {
    var(name).unwrap_or_else(|| default.to_string())
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = var_or(name, default);
    raw.parse().map_err(|err: T::Err| ConfigError::Invalid {
        key: key(name),
        value: raw.clone(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both cases mutate the process environment, so they run in one test.
    #[test]
    fn test_config_from_env() {
        for name in [
            "DB_PATH",
            "BIND_ADDR",
            "LOG_LEVEL",
            "LOG_FORMAT",
            "SECURE_COOKIES",
            "MAPBOX_TOKEN",
            "CLOUDINARY_CLOUD_NAME",
            "CLOUDINARY_KEY",
            "CLOUDINARY_SECRET",
            "UPLOADS_DIR",
            "HTTP_TIMEOUT_SECS",
        ] {
            env::remove_var(key(name));
        }

        let config = Config::from_env().unwrap();

        assert_eq!(config.db_path, PathBuf::from("./data/yelpcamp.sqlite"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:3000");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(!config.secure_cookies);
        assert!(config.mapbox_token.is_none());
        assert!(config.cloudinary.is_none());
        assert_eq!(config.http_timeout, Duration::from_secs(10));

        env::set_var(key("BIND_ADDR"), "not-an-address");
        let err = Config::from_env().unwrap_err();
        env::remove_var(key("BIND_ADDR"));

        assert!(err.to_string().contains("YELPCAMP_BIND_ADDR"));
    }
}
