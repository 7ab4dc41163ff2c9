//! OCR service abstraction.
//!
//! Defines the [`OcrService`] trait the extractor drives, so the Cloud Vision
//! client can be swapped for a test double.

pub mod vision;

/// Text recognized in a whole single-image document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageAnnotation {
    pub text: String,
}

/// Text recognized on one page of a multi-page document, together with the
/// document's total page count as reported by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageAnnotation {
    pub text: String,
    pub total_pages: u32,
}

/// Async trait implemented by each OCR backend.
#[async_trait::async_trait]
pub trait OcrService: Send + Sync {
    fn name(&self) -> &str;

    /// Annotate inline image bytes as a single document.
    async fn detect_whole_image(&self, data: &[u8]) -> anyhow::Result<ImageAnnotation>;

    /// Annotate exactly one page (1-indexed) of a remotely staged document.
    async fn detect_single_page(
        &self,
        uri: &str,
        mime_type: &str,
        page: u32,
    ) -> anyhow::Result<PageAnnotation>;
}
