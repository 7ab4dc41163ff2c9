//! Cloud Textract - OCR text extraction for images and PDFs via Google Cloud Vision.
//!
//! Images are annotated inline in one request. PDFs are staged in a Cloud
//! Storage bucket, annotated one page per request, and deleted afterwards.

pub mod config;
pub mod error;
pub mod extractor;
pub mod gcp_auth;
pub mod mime;
pub mod ocr;
pub mod output;
pub mod schema;
pub mod staging;

pub use error::{ExtractError, Result};
pub use extractor::{ExtractionPath, Extractor};
pub use schema::{ExtractionResult, PageResult};
