//! Transient document staging in Google Cloud Storage.
//!
//! The Vision file-annotation endpoint only reads multi-page documents from a
//! `gs://` URI, so PDFs are uploaded under a throwaway name and deleted again
//! once annotation is over.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::gcp_auth::GcpCredentials;

/// Object storage used for staging. Implemented by [`GcsStagingStore`] and by
/// in-memory doubles in tests.
#[async_trait::async_trait]
pub trait StagingStore: Send + Sync {
    async fn upload(&self, local_path: &Path, object_id: &str, bucket: &str) -> Result<()>;
    async fn delete(&self, object_id: &str, bucket: &str) -> Result<()>;
}

/// Google Cloud Storage JSON API client.
pub struct GcsStagingStore {
    client: reqwest::Client,
    credentials: Arc<GcpCredentials>,
    endpoint: String,
}

impl GcsStagingStore {
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

    fn upload_url(&self, bucket: &str) -> String {
        format!("{}/upload/storage/v1/b/{}/o", self.endpoint, bucket)
    }

    fn object_url(&self, bucket: &str, object_id: &str) -> String {
        format!("{}/storage/v1/b/{}/o/{}", self.endpoint, bucket, object_id)
    }
}

#[async_trait::async_trait]
impl StagingStore for GcsStagingStore {
    async fn upload(&self, local_path: &Path, object_id: &str, bucket: &str) -> Result<()> {
        let data = tokio::fs::read(local_path)
            .await
            .with_context(|| format!("Failed to read {:?} for upload", local_path))?;
        let content_type = crate::mime::guess(local_path)
            .unwrap_or_else(|| "application/octet-stream".to_string());

        info!(
            "Uploading {:?} ({} bytes) to gs://{}/{}",
            local_path,
            data.len(),
            bucket,
            object_id
        );

        let token = self.credentials.access_token(&self.client).await?;
        let resp = self
            .client
            .post(self.upload_url(bucket))
            .query(&[("uploadType", "media"), ("name", object_id)])
            .bearer_auth(&token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .context("Failed to send GCS upload request")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("GCS upload failed ({}): {}", status, body);
        }

        debug!("Staged gs://{}/{}", bucket, object_id);
        Ok(())
    }

    async fn delete(&self, object_id: &str, bucket: &str) -> Result<()> {
        let token = self.credentials.access_token(&self.client).await?;
        let resp = self
            .client
            .delete(self.object_url(bucket, object_id))
            .bearer_auth(&token)
            .send()
            .await
            .context("Failed to send GCS delete request")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("GCS delete failed ({}): {}", status, body);
        }

        debug!("Deleted gs://{}/{}", bucket, object_id);
        Ok(())
    }
}
