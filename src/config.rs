//! Runtime settings.
//!
//! Everything here comes from the environment (optionally seeded from a `.env`
//! file by `dotenvy`). Command-line flags take precedence where both exist.

use std::path::PathBuf;

pub const DEFAULT_VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1";
pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";

/// Environment-derived settings for the Google clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Service-account JSON key (`GOOGLE_APPLICATION_CREDENTIALS`).
    pub credentials_path: Option<PathBuf>,
    /// Pre-minted bearer token (`GOOGLE_OAUTH_ACCESS_TOKEN`). Wins over the key file.
    pub access_token: Option<String>,
    pub vision_endpoint: String,
    pub storage_endpoint: String,
    /// Default staging bucket (`GCP_BUCKET`).
    pub default_bucket: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            credentials_path: None,
            access_token: None,
            vision_endpoint: DEFAULT_VISION_ENDPOINT.to_string(),
            storage_endpoint: DEFAULT_STORAGE_ENDPOINT.to_string(),
            default_bucket: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let defaults = Self::default();
        Self {
            credentials_path: get("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from),
            access_token: get("GOOGLE_OAUTH_ACCESS_TOKEN"),
            vision_endpoint: get("VISION_ENDPOINT")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.vision_endpoint),
            storage_endpoint: get("STORAGE_ENDPOINT")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.storage_endpoint),
            default_bucket: get("GCP_BUCKET"),
        }
    }

    /// Staging bucket to use: the explicit flag if given, else `GCP_BUCKET`.
    pub fn staging_bucket(&self, flag: Option<&str>) -> Option<String> {
        flag.filter(|b| !b.trim().is_empty())
            .map(str::to_string)
            .or_else(|| self.default_bucket.clone())
    }
}
