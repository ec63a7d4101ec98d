//! Text acquisition backends.
//!
//! A backend turns a document into raw text. Layout-text backends read the
//! text layer of a PDF; OCR backends rasterize the document and recognize it.

mod pdftotext;
mod tesseract;
mod text_layer;
mod tool;

pub use text_layer::PdfExtractBackend;
pub use pdftotext::PdfToTextBackend;
pub use tesseract::TesseractBackend;
pub use tool::ToolRunner;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BackendError, InvexError, ToolError};
use crate::models::config::ExtractionConfig;

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Registry key of a backend implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// Poppler `pdftotext -layout`.
    #[serde(rename = "pdftotext")]
    PdfToText,
    /// In-process text layer extraction.
    #[serde(rename = "pdf-extract")]
    PdfExtract,
    /// ImageMagick + Tesseract OCR.
    #[serde(rename = "tesseract")]
    Tesseract,
    /// ImageMagick + Tesseract 4 with the LSTM recognizer.
    #[serde(rename = "tesseract4")]
    Tesseract4,
}

impl BackendKind {
    pub const ALL: [BackendKind; 4] = [
        Self::PdfToText,
        Self::PdfExtract,
        Self::Tesseract,
        Self::Tesseract4,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PdfToText => "pdftotext",
            Self::PdfExtract => "pdf-extract",
            Self::Tesseract => "tesseract",
            Self::Tesseract4 => "tesseract4",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown backend: {} (expected one of {})", s, known.join(", "))
            })
    }
}

/// Trait for text acquisition implementations.
pub trait Backend {
    /// Registry key of this backend.
    fn kind(&self) -> BackendKind;

    /// Fail with [`ToolError::NotFound`] if a required executable is missing.
    fn check_available(&self) -> std::result::Result<(), ToolError>;

    /// Extract raw text from the document at `path`.
    ///
    /// Returns possibly empty text; never writes shared state.
    fn to_text(&self, path: &Path, language: &str) -> Result<String>;
}

/// One backend invocation on one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionAttempt {
    /// Backend that produced the text.
    pub backend_kind: BackendKind,
    /// Text as returned by the backend.
    pub raw_text: String,
    /// True when the text is empty after trimming whitespace.
    pub is_empty: bool,
}

impl ExtractionAttempt {
    pub fn new(backend_kind: BackendKind, raw_text: String) -> Self {
        let is_empty = raw_text.trim().is_empty();
        Self {
            backend_kind,
            raw_text,
            is_empty,
        }
    }

    /// Run `backend` on `path` and wrap the result.
    pub fn run(backend: &dyn Backend, path: &Path, language: &str) -> Result<Self> {
        let text = backend.to_text(path, language)?;
        let attempt = Self::new(backend.kind(), text);
        debug!(
            "{} produced {} chars from {} (empty: {})",
            attempt.backend_kind,
            attempt.raw_text.len(),
            path.display(),
            attempt.is_empty
        );
        Ok(attempt)
    }
}

/// Backends addressable by key, built once at startup.
#[derive(Default)]
pub struct BackendRegistry {
    backends: HashMap<BackendKind, Box<dyn Backend>>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in backend.
    pub fn with_defaults(runner: Arc<ToolRunner>, config: &ExtractionConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(PdfToTextBackend::new(Arc::clone(&runner))));
        registry.register(Box::new(PdfExtractBackend::new()));
        registry.register(Box::new(
            TesseractBackend::new(Arc::clone(&runner)).with_density(config.ocr_density),
        ));
        registry.register(Box::new(
            TesseractBackend::lstm(runner).with_density(config.ocr_density),
        ));
        registry
    }

    /// Add a backend, replacing any backend with the same key.
    pub fn register(&mut self, backend: Box<dyn Backend>) {
        self.backends.insert(backend.kind(), backend);
    }

    /// Look up a backend by key.
    pub fn get(&self, kind: BackendKind) -> std::result::Result<&dyn Backend, InvexError> {
        self.backends
            .get(&kind)
            .map(|b| b.as_ref())
            .ok_or_else(|| InvexError::Config(format!("backend {} is not registered", kind)))
    }

    /// Registered keys in declaration order.
    pub fn kinds(&self) -> Vec<BackendKind> {
        BackendKind::ALL
            .into_iter()
            .filter(|k| self.backends.contains_key(k))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedBackend(BackendKind, &'static str);

    impl Backend for FixedBackend {
        fn kind(&self) -> BackendKind {
            self.0
        }

        fn check_available(&self) -> std::result::Result<(), ToolError> {
            Ok(())
        }

        fn to_text(&self, _path: &Path, _language: &str) -> Result<String> {
            Ok(self.1.to_string())
        }
    }

    #[test]
    fn test_attempt_whitespace_is_empty() {
        let attempt = ExtractionAttempt::new(BackendKind::PdfToText, "  \n\t ".to_string());
        assert!(attempt.is_empty);

        let attempt = ExtractionAttempt::new(BackendKind::PdfToText, " x ".to_string());
        assert!(!attempt.is_empty);
    }

    #[test]
    fn test_backend_kind_round_trip_names() {
        assert_eq!("pdftotext".parse::<BackendKind>().unwrap(), BackendKind::PdfToText);
        assert_eq!("pdf-extract".parse::<BackendKind>().unwrap(), BackendKind::PdfExtract);
        assert_eq!("Tesseract".parse::<BackendKind>().unwrap(), BackendKind::Tesseract);
        assert_eq!("tesseract4".parse::<BackendKind>().unwrap(), BackendKind::Tesseract4);
        assert!("gvision".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = BackendRegistry::new();
        registry.register(Box::new(FixedBackend(BackendKind::Tesseract, "ocr")));

        assert_eq!(registry.kinds(), vec![BackendKind::Tesseract]);
        assert!(registry.get(BackendKind::Tesseract).is_ok());
        assert!(matches!(
            registry.get(BackendKind::PdfToText),
            Err(InvexError::Config(_))
        ));

        let attempt = ExtractionAttempt::run(
            registry.get(BackendKind::Tesseract).unwrap(),
            Path::new("a.pdf"),
            "deu",
        )
        .unwrap();
        assert_eq!(attempt.raw_text, "ocr");
    }

    #[test]
    fn test_default_registry_has_all_backends() {
        let runner = Arc::new(ToolRunner::new(std::time::Duration::from_secs(5)).unwrap());
        let registry = BackendRegistry::with_defaults(runner, &ExtractionConfig::default());
        assert_eq!(registry.kinds(), BackendKind::ALL.to_vec());
    }
}
