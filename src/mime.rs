//! MIME type detection from file extensions.

use std::path::Path;

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Guess a file's MIME type from its extension. `None` when unknown.
pub fn guess(path: impl AsRef<Path>) -> Option<String> {
    mime_guess::from_path(path.as_ref())
        .first()
        .map(|mime| mime.essence_str().to_string())
}
