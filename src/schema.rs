//! Paginated text extraction result types.
//!
//! The serialized form of [`ExtractionResult`] is the tool's only output:
//! a bare JSON array of `{ "page": n, "text": "..." }` objects.

use serde::{Deserialize, Serialize};

/// Recognized text for a single page (1-indexed).
///
/// Single-image inputs always produce exactly one of these with `page = 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResult {
    pub page: u32,
    pub text: String,
}

/// Ordered page results. Page numbers are contiguous starting at 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionResult {
    pages: Vec<PageResult>,
}

impl ExtractionResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Result for a whole-document (single image) annotation.
    pub fn single(text: impl Into<String>) -> Self {
        let mut result = Self::new();
        result.push_next(text);
        result
    }

    /// Page number the next appended result will carry.
    pub fn next_page(&self) -> u32 {
        self.pages.len() as u32 + 1
    }

    /// Append the text for [`Self::next_page`] and return that page number.
    pub fn push_next(&mut self, text: impl Into<String>) -> u32 {
        let page = self.next_page();
        self.pages.push(PageResult {
            page,
            text: text.into(),
        });
        page
    }

    pub fn pages(&self) -> &[PageResult] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn into_pages(self) -> Vec<PageResult> {
        self.pages
    }
}

/// A document temporarily placed in object storage so the OCR service
/// can address it by URI. Owned by exactly one extraction call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedObject {
    pub bucket: String,
    pub object_id: String,
}

impl StagedObject {
    /// Stage under a freshly generated UUID v4 object name.
    pub fn fresh(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            object_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// `gs://` URI understood by the Vision file-annotation endpoint.
    pub fn uri(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.object_id)
    }
}
