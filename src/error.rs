//! Error taxonomy for a single extraction run.
//!
//! Service clients report failures as `anyhow::Error`; the extractor classifies
//! them into [`ExtractError`] according to which step failed. Each variant maps
//! onto a process exit code via [`ExtractError::exit_code`].

use std::path::PathBuf;
use thiserror::Error;

/// Exit code for a MIME type that could not be determined.
pub const EXIT_UNKNOWN_FORMAT: u8 = 1;
/// Exit code for a PDF input without a staging bucket.
pub const EXIT_MISSING_BUCKET: u8 = 2;
/// Exit code for every other failure.
pub const EXIT_FAILURE: u8 = 3;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unable to identify file's mime type: {path:?}")]
    UnknownFormat { path: PathBuf },

    #[error("GCP bucket required for PDF processing. Use --gcp-bucket.")]
    MissingConfiguration,

    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load Google credentials: {0:#}")]
    Credentials(#[source] anyhow::Error),

    #[error("Failed to stage document in bucket '{bucket}': {source:#}")]
    StagingUploadFailed {
        bucket: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("OCR request failed on page {page}: {source:#}")]
    OcrRequestFailed {
        page: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("OCR service reported {reported} total pages on page {page}, expected {expected}")]
    InconsistentPageCount {
        page: u32,
        expected: u32,
        reported: u32,
    },

    #[error("OCR service reported a document with zero pages")]
    EmptyDocument,

    /// Secondary failure: logged, never returned in place of the run's outcome.
    #[error("Failed to delete staged object {uri}: {source:#}")]
    StagingDeleteFailed {
        uri: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to write results to {path:?}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ExtractError>;

impl ExtractError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::UnknownFormat { .. } => EXIT_UNKNOWN_FORMAT,
            Self::MissingConfiguration => EXIT_MISSING_BUCKET,
            _ => EXIT_FAILURE,
        }
    }
}
