//! Configuration module
//!
//! Environment-driven configuration for the Mediavault services. Values come
//! from the process environment (a `.env` file is honored in development via
//! `dotenvy`); accessors return typed values with sensible defaults.

use std::env;
use std::str::FromStr;

use crate::constants::{DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_QUOTA_MB};
use crate::storage_types::StorageBackend;

const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
const DEFAULT_ALLOWED_CONTENT_TYPES: &[&str] =
    &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Runtime configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub storage_backend: Option<StorageBackend>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub max_upload_bytes: usize,
    pub default_quota_mb: u64,
    pub jwt_secret: Option<String>,
    pub allowed_extensions: Vec<String>,
    pub allowed_content_types: Vec<String>,
}

impl Config {
    /// Load configuration from the environment. Missing keys fall back to
    /// defaults; malformed numeric values fall back with a warning rather
    /// than aborting startup.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Config {
            environment: env::var("MEDIAVAULT_ENV").unwrap_or_else(|_| "development".to_string()),
            storage_backend: env::var("STORAGE_BACKEND")
                .ok()
                .and_then(|s| match StorageBackend::from_str(&s) {
                    Ok(backend) => Some(backend),
                    Err(e) => {
                        tracing::warn!(error = %e, "Ignoring invalid STORAGE_BACKEND");
                        None
                    }
                }),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
            max_upload_bytes: parse_env("MAX_UPLOAD_SIZE_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
            default_quota_mb: parse_env("DEFAULT_QUOTA_MB", DEFAULT_QUOTA_MB),
            jwt_secret: env::var("JWT_SECRET").ok(),
            allowed_extensions: parse_list(
                "IMAGE_ALLOWED_EXTENSIONS",
                DEFAULT_ALLOWED_EXTENSIONS,
            ),
            allowed_content_types: parse_list(
                "IMAGE_ALLOWED_CONTENT_TYPES",
                DEFAULT_ALLOWED_CONTENT_TYPES,
            ),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment != "production"
    }

    /// The default per-user quota expressed in bytes.
    pub fn default_quota_bytes(&self) -> u64 {
        self.default_quota_mb * 1024 * 1024
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            environment: "development".to_string(),
            storage_backend: None,
            local_storage_path: None,
            local_storage_base_url: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            default_quota_mb: DEFAULT_QUOTA_MB,
            jwt_secret: None,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            allowed_content_types: DEFAULT_ALLOWED_CONTENT_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

fn parse_env<T: FromStr + Copy>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key = key, value = %raw, "Ignoring malformed numeric env var");
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_list(key: &str, default: &[&str]) -> Vec<String> {
    match env::var(key) {
        Ok(raw) => raw
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.default_quota_bytes(), 100 * 1024 * 1024);
        assert!(config.is_development());
        assert!(config
            .allowed_content_types
            .contains(&"image/webp".to_string()));
    }

    #[test]
    fn test_quota_mb_to_bytes() {
        let config = Config {
            default_quota_mb: 1,
            ..Config::default()
        };
        assert_eq!(config.default_quota_bytes(), 1_048_576);
    }
}
