//! JSON result writer.

use std::io::Write;
use std::path::Path;
use tracing::debug;

use crate::error::{ExtractError, Result};
use crate::schema::ExtractionResult;

/// Write `result` to `path` as a 2-space indented JSON array.
///
/// The document is written to a temporary file next to `path` and renamed
/// into place, so `path` is either absent/untouched or complete.
pub fn write_result(path: &Path, result: &ExtractionResult) -> Result<()> {
    let output_err = |source: std::io::Error| ExtractError::Output {
        path: path.to_path_buf(),
        source,
    };

    let mut json = serde_json::to_string_pretty(result).map_err(|e| output_err(e.into()))?;
    json.push('\n');

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(output_err)?;
    tmp.write_all(json.as_bytes()).map_err(output_err)?;
    tmp.as_file().sync_all().map_err(output_err)?;
    tmp.persist(path).map_err(|e| output_err(e.error))?;

    debug!("Wrote {} pages ({} bytes) to {:?}", result.len(), json.len(), path);
    Ok(())
}

/// Parse a previously written result file.
pub fn read_result(path: &Path) -> Result<ExtractionResult> {
    let io_err = |source: std::io::Error| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    };
    let json = std::fs::read_to_string(path).map_err(io_err)?;
    serde_json::from_str(&json).map_err(|e| io_err(e.into()))
}
