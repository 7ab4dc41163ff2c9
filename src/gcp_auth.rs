//! OAuth2 access tokens for Google Cloud REST APIs.
//!
//! Either a pre-minted bearer token from the environment, or a service account
//! key whose RS256-signed JWT is exchanged for a short-lived access token.
//! Minted tokens are cached and reused until shortly before expiry.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::config::Settings;

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
/// Refresh this many seconds before the token actually expires.
const EXPIRY_MARGIN_SECS: u64 = 60;

/// Source of bearer tokens shared by the Vision and Storage clients.
pub struct GcpCredentials {
    source: TokenSource,
}

enum TokenSource {
    Static(String),
    ServiceAccount {
        key: ServiceAccountKey,
        cache: Mutex<Option<CachedToken>>,
    },
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: u64,
}

#[derive(Clone, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}

impl GcpCredentials {
    /// Use a fixed bearer token (e.g. from `gcloud auth print-access-token`).
    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            source: TokenSource::Static(token.into()),
        }
    }

    /// Load a service account JSON key file.
    pub fn from_key_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read service account key {:?}", path))?;
        Self::from_key_json(&json)
            .with_context(|| format!("Invalid service account key {:?}", path))
    }

    fn from_key_json(json: &str) -> Result<Self> {
        let key: ServiceAccountKey =
            serde_json::from_str(json).context("Failed to parse service account JSON")?;
        Ok(Self {
            source: TokenSource::ServiceAccount {
                key,
                cache: Mutex::new(None),
            },
        })
    }

    /// Pick a token source from settings: static token first, then key file.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        if let Some(token) = &settings.access_token {
            debug!("Using access token from GOOGLE_OAUTH_ACCESS_TOKEN");
            return Ok(Self::from_token(token.clone()));
        }

        let path = settings.credentials_path.as_deref().context(
            "No Google credentials: set GOOGLE_APPLICATION_CREDENTIALS or GOOGLE_OAUTH_ACCESS_TOKEN",
        )?;
        debug!("Using service account key {:?}", path);
        Self::from_key_file(path)
    }

    /// Get a valid OAuth2 access token, refreshing if expired.
    pub async fn access_token(&self, client: &reqwest::Client) -> Result<String> {
        let (key, cache) = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::ServiceAccount { key, cache } => (key, cache),
        };

        {
            let cached = cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(ref cached) = *cached {
                if now_secs() < cached.expires_at.saturating_sub(EXPIRY_MARGIN_SECS) {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let token_uri = key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
        let now = now_secs();
        let jwt = sign_assertion(key, token_uri, now)?;

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: u64,
        }

        let resp: TokenResponse = client
            .post(token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await
            .context("Token exchange request failed")?
            .error_for_status()
            .context("Token exchange returned error")?
            .json()
            .await
            .context("Failed to parse token response")?;

        debug!(
            "Minted access token for {} (expires in {}s)",
            key.client_email, resp.expires_in
        );

        let token = resp.access_token.clone();
        *cache.lock().unwrap_or_else(PoisonError::into_inner) = Some(CachedToken {
            access_token: resp.access_token,
            expires_at: now + resp.expires_in,
        });

        Ok(token)
    }
}

fn sign_assertion(key: &ServiceAccountKey, token_uri: &str, now: u64) -> Result<String> {
    let claims = serde_json::json!({
        "iss": key.client_email,
        "scope": CLOUD_PLATFORM_SCOPE,
        "aud": token_uri,
        "iat": now,
        "exp": now + 3600,
    });

    let header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
    let encoding_key = jsonwebtoken::EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .context("Invalid RSA private key in service account JSON")?;

    jsonwebtoken::encode(&header, &claims, &encoding_key).context("Failed to encode JWT")
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
