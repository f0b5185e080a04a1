//! PDF text extraction.
//!
//! Returns plain UTF-8 text for a PDF held in memory. Extraction never
//! panics; callers log the error and skip the file.

use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Extract text from PDF bytes. Page breaks become blank lines.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let text =
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(text.replace('\u{c}', "\n\n"))
}

pub fn extract_pdf_file(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
        path: path.display().to_string(),
        source,
    })?;
    extract_pdf_text(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_an_error_not_a_panic() {
        let err = extract_pdf_text(b"definitely not a pdf").unwrap_err();
        assert!(err.to_string().starts_with("PDF extraction failed"));
    }

    #[test]
    fn test_missing_file() {
        let err = extract_pdf_file(Path::new("/nonexistent/guide.pdf")).unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
    }
}
