//! Google Cloud Vision OCR client (REST `images:annotate` / `files:annotate`).

use super::{ImageAnnotation, OcrService, PageAnnotation};
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::gcp_auth::GcpCredentials;

const TEXT_DETECTION: &str = "TEXT_DETECTION";
const DOCUMENT_TEXT_DETECTION: &str = "DOCUMENT_TEXT_DETECTION";

pub struct VisionClient {
    client: reqwest::Client,
    credentials: Arc<GcpCredentials>,
    endpoint: String,
}

impl VisionClient {
    pub fn new(
        client: reqwest::Client,
        credentials: Arc<GcpCredentials>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            client,
            credentials,
            endpoint: endpoint.into(),
        }
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<R> {
        let token = self.credentials.access_token(&self.client).await?;
        let url = format!("{}/{}", self.endpoint, method);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send Vision {} request", method))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Vision API error ({}): {}", status, text);
        }

        let raw_text = resp.text().await?;
        debug!(
            "Vision {}: raw response ({} bytes): {}",
            method,
            raw_text.len(),
            truncate(&raw_text, 500)
        );
        serde_json::from_str(&raw_text)
            .with_context(|| format!("Failed to parse Vision {} response", method))
    }
}

// ── Vision API request/response types ───────────────────────────────────────

#[derive(Serialize)]
struct Feature {
    #[serde(rename = "type")]
    feature_type: &'static str,
}

#[derive(Serialize)]
struct BatchRequest<T> {
    requests: Vec<T>,
}

#[derive(Serialize)]
struct AnnotateImageRequest {
    image: InlineImage,
    features: Vec<Feature>,
}

#[derive(Serialize)]
struct InlineImage {
    content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateFileRequest {
    input_config: InputConfig,
    features: Vec<Feature>,
    pages: Vec<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InputConfig {
    gcs_source: GcsSource,
    mime_type: String,
}

#[derive(Serialize)]
struct GcsSource {
    uri: String,
}

#[derive(Deserialize)]
struct BatchImageResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Deserialize)]
struct BatchFileResponse {
    #[serde(default)]
    responses: Vec<AnnotateFileResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateFileResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
    #[serde(default)]
    total_pages: u32,
    #[serde(default)]
    error: Option<Status>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    full_text_annotation: Option<TextAnnotation>,
    #[serde(default)]
    error: Option<Status>,
}

#[derive(Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Status {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

impl AnnotateImageResponse {
    fn into_text(self) -> Result<String> {
        if let Some(err) = self.error {
            anyhow::bail!("Vision annotation error (code {}): {}", err.code, err.message);
        }
        Ok(self.full_text_annotation.map(|a| a.text).unwrap_or_default())
    }
}

impl BatchImageResponse {
    fn into_annotation(self) -> Result<ImageAnnotation> {
        let response = self
            .responses
            .into_iter()
            .next()
            .context("Vision returned no image responses")?;
        Ok(ImageAnnotation {
            text: response.into_text()?,
        })
    }
}

impl BatchFileResponse {
    fn into_annotation(self) -> Result<PageAnnotation> {
        let file = self
            .responses
            .into_iter()
            .next()
            .context("Vision returned no file responses")?;
        if let Some(err) = file.error {
            anyhow::bail!("Vision file error (code {}): {}", err.code, err.message);
        }

        // A page with no detected text still yields an (empty) image response.
        let text = match file.responses.into_iter().next() {
            Some(page) => page.into_text()?,
            None => String::new(),
        };

        Ok(PageAnnotation {
            text,
            total_pages: file.total_pages,
        })
    }
}

// ── Service implementation ──────────────────────────────────────────────────

#[async_trait::async_trait]
impl OcrService for VisionClient {
    fn name(&self) -> &str {
        "google_vision"
    }

    async fn detect_whole_image(&self, data: &[u8]) -> Result<ImageAnnotation> {
        let body = BatchRequest {
            requests: vec![AnnotateImageRequest {
                image: InlineImage {
                    content: BASE64.encode(data),
                },
                features: vec![Feature {
                    feature_type: TEXT_DETECTION,
                }],
            }],
        };

        let resp: BatchImageResponse = self.post("images:annotate", &body).await?;
        resp.into_annotation()
    }

    async fn detect_single_page(
        &self,
        uri: &str,
        mime_type: &str,
        page: u32,
    ) -> Result<PageAnnotation> {
        let body = BatchRequest {
            requests: vec![AnnotateFileRequest {
                input_config: InputConfig {
                    gcs_source: GcsSource {
                        uri: uri.to_string(),
                    },
                    mime_type: mime_type.to_string(),
                },
                features: vec![Feature {
                    feature_type: DOCUMENT_TEXT_DETECTION,
                }],
                pages: vec![page],
            }],
        };

        let resp: BatchFileResponse = self.post("files:annotate", &body).await?;
        resp.into_annotation()
    }
}

fn truncate(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
