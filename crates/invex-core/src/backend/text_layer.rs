//! In-process text layer extraction using lopdf and pdf-extract.

use std::path::Path;

use lopdf::Document;
use tracing::debug;

use super::{Backend, BackendKind, Result};
use crate::error::{BackendError, ToolError};

/// Text layer backend that needs no external executable.
#[derive(Debug, Default)]
pub struct PdfExtractBackend;

impl PdfExtractBackend {
    pub fn new() -> Self {
        Self
    }

    /// Read the document, decrypting PDFs protected by an empty user password.
    fn load(&self, path: &Path) -> Result<Vec<u8>> {
        let data = std::fs::read(path)?;
        let mut doc = Document::load_mem(&data)
            .map_err(|e| BackendError::TextExtraction(format!("failed to parse PDF: {}", e)))?;

        if !doc.is_encrypted() {
            return Ok(data);
        }

        doc.decrypt("")
            .map_err(|_| BackendError::TextExtraction("PDF is encrypted".to_string()))?;
        debug!("Decrypted {} with empty password", path.display());

        let mut decrypted = Vec::new();
        doc.save_to(&mut decrypted).map_err(|e| {
            BackendError::TextExtraction(format!("failed to save decrypted PDF: {}", e))
        })?;
        Ok(decrypted)
    }
}

impl Backend for PdfExtractBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::PdfExtract
    }

    fn check_available(&self) -> std::result::Result<(), ToolError> {
        Ok(())
    }

    fn to_text(&self, path: &Path, _language: &str) -> Result<String> {
        let data = self.load(path)?;
        pdf_extract::extract_text_from_mem(&data)
            .map_err(|e| BackendError::TextExtraction(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();

        let err = PdfExtractBackend::new().to_text(&path, "deu").unwrap_err();
        assert!(matches!(err, BackendError::TextExtraction(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = PdfExtractBackend::new()
            .to_text(Path::new("/nonexistent/invoice.pdf"), "deu")
            .unwrap_err();
        assert!(matches!(err, BackendError::Io(_)));
    }
}
