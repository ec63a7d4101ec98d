//! Length-preserving redaction of decompressed PDF content.
//!
//! The document is decompressed so that text operators appear as plain
//! ISO-8859-1 bytes, every phrase derived from a [`RedactionProfile`] is
//! overwritten with `-` of the same length, and the buffer is written back
//! over the file. Byte offsets never move, so no structure needs rebuilding.

mod decompress;
mod encoding;
mod profile;

pub use decompress::{Decompressor, DecompressorKind, LopdfDecompressor, QpdfDecompressor};
pub use encoding::{BufferRedaction, EncodedPhrase, FILLER, encode_latin1, redact_buffer};
pub use profile::{RedactionProfile, RedactionRule, RuleKind};

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::backend::ToolRunner;
use crate::error::{RedactionError, ToolError};
use crate::models::config::RedactionConfig;

/// Result type for redaction operations.
pub type Result<T> = std::result::Result<T, RedactionError>;

/// Matches found for one phrase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhraseReport {
    pub kind: RuleKind,
    pub phrase: String,
    pub matches: usize,
}

/// Summary of one [`RedactionEngine::redact_file`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RedactionReport {
    pub phrases: Vec<PhraseReport>,
    /// Number of bytes overwritten with filler.
    pub bytes_redacted: usize,
    /// Length of the decompressed document, unchanged by redaction.
    pub document_len: usize,
}

impl RedactionReport {
    pub fn total_matches(&self) -> usize {
        self.phrases.iter().map(|p| p.matches).sum()
    }
}

/// Redacts documents in place using a pluggable decompressor.
pub struct RedactionEngine {
    decompressor: Box<dyn Decompressor>,
}

impl RedactionEngine {
    pub fn new(decompressor: Box<dyn Decompressor>) -> Self {
        Self { decompressor }
    }

    /// Build the engine selected by configuration.
    pub fn from_config(config: &RedactionConfig, runner: Arc<ToolRunner>) -> Self {
        let decompressor: Box<dyn Decompressor> = match config.decompressor {
            DecompressorKind::Qpdf => Box::new(QpdfDecompressor::new(runner)),
            DecompressorKind::Lopdf => Box::new(LopdfDecompressor),
        };
        debug!("Using {} decompressor", config.decompressor);
        Self::new(decompressor)
    }

    pub fn check_available(&self) -> std::result::Result<(), ToolError> {
        self.decompressor.check_available()
    }

    /// Redact `path` in place.
    ///
    /// Tool availability and every phrase are checked before the file is read.
    /// On error the file is left untouched.
    pub fn redact_file(&self, path: &Path, profile: &RedactionProfile) -> Result<RedactionReport> {
        self.check_available()?;

        let rules = profile.rules();
        let phrases = rules
            .iter()
            .map(|rule| EncodedPhrase::new(&rule.phrase))
            .collect::<Result<Vec<_>>>()?;

        let mut buffer = self.decompressor.decompress(path)?;
        let document_len = buffer.len();

        let redacted = redact_buffer(&mut buffer, &phrases);
        debug_assert_eq!(buffer.len(), document_len);

        // Re-saving can change bytes even with nothing redacted.
        if redacted.bytes > 0 {
            persist(path, &buffer)?;
        } else {
            debug!("No phrase matched in {}, file left unchanged", path.display());
        }

        let report = RedactionReport {
            phrases: rules
                .into_iter()
                .zip(redacted.counts)
                .map(|(rule, matches)| PhraseReport {
                    kind: rule.kind,
                    phrase: rule.phrase,
                    matches,
                })
                .collect(),
            bytes_redacted: redacted.bytes,
            document_len,
        };
        info!(
            "Redacted {} ({} matches, {} bytes)",
            path.display(),
            report.total_matches(),
            report.bytes_redacted
        );
        Ok(report)
    }
}

/// Replace `path` with `data` through a sibling temporary file.
fn persist(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let permissions = std::fs::metadata(path)?.permissions();
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(data)?;
    file.as_file().set_permissions(permissions)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| RedactionError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Document, Object, Stream, dictionary};
    use pretty_assertions::assert_eq;

    const LINES: usize = 12;

    /// A one-page PDF whose compressed content stream names Herr Müller.
    fn write_fixture(path: &Path) {
        let mut content = Vec::new();
        for i in 0..LINES {
            content.extend_from_slice(
                format!("BT /F1 12 Tf 72 {} Td ", 700 - i * 14).as_bytes(),
            );
            content.extend_from_slice(b"(Herr M\xfcller, 12345 Musterstadt) Tj ET\n");
        }
        content.extend_from_slice(b"BT /F1 12 Tf 72 500 Td (M\xfcller) Tj ET\n");

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();
        doc.save(path).unwrap();
    }

    fn count(haystack: &[u8], needle: &[u8]) -> usize {
        haystack.windows(needle.len()).filter(|w| *w == needle).count()
    }

    fn engine() -> RedactionEngine {
        RedactionEngine::new(Box::new(LopdfDecompressor))
    }

    struct UnavailableDecompressor;

    impl Decompressor for UnavailableDecompressor {
        fn check_available(&self) -> std::result::Result<(), ToolError> {
            Err(ToolError::NotFound {
                tool: "qpdf".into(),
                hint: "install qpdf".into(),
            })
        }

        fn decompress(&self, _path: &Path) -> Result<Vec<u8>> {
            panic!("decompress called without an available tool");
        }
    }

    #[test]
    fn test_redact_file_with_lopdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice.pdf");
        write_fixture(&path);

        let profile = RedactionProfile::from_json(
            r#"{"lastname": "Müller", "zip": "12345", "city": "Musterstadt"}"#,
        )
        .unwrap();
        let report = engine().redact_file(&path, &profile).unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len(), report.document_len);
        assert_eq!(count(&data, b"Herr M\xfcller"), 0);
        assert_eq!(count(&data, b"12345 Musterstadt"), 0);
        assert_eq!(count(&data, b"(M\xfcller)"), 1);

        let matches: Vec<_> = report
            .phrases
            .iter()
            .map(|p| (p.phrase.as_str(), p.matches))
            .collect();
        assert_eq!(
            matches,
            vec![("12345 Musterstadt", LINES), ("Herr Müller", LINES), ("Frau Müller", 0)]
        );
        assert_eq!(report.bytes_redacted, LINES * (17 + 11));

        // Offsets are unchanged, so the document still parses.
        assert!(Document::load(&path).is_ok());
    }

    #[test]
    fn test_redact_file_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice.pdf");
        write_fixture(&path);
        let profile = RedactionProfile::from_json(r#"{"lastname": "Müller"}"#).unwrap();

        engine().redact_file(&path, &profile).unwrap();
        let once = std::fs::read(&path).unwrap();

        let report = engine().redact_file(&path, &profile).unwrap();
        assert_eq!(report.total_matches(), 0);
        assert_eq!(report.bytes_redacted, 0);
        assert_eq!(std::fs::read(&path).unwrap(), once);
    }

    #[test]
    fn test_no_match_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice.pdf");
        write_fixture(&path);
        let before = std::fs::read(&path).unwrap();

        let profile = RedactionProfile::from_json(r#"{"company": "ACME"}"#).unwrap();
        let report = engine().redact_file(&path, &profile).unwrap();

        assert_eq!(report.bytes_redacted, 0);
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_unencodable_phrase_rejected_before_io() {
        let profile = RedactionProfile::from_json(r#"{"company": "Łódź Sp. z o.o."}"#).unwrap();
        let err = engine()
            .redact_file(Path::new("/nonexistent/invoice.pdf"), &profile)
            .unwrap_err();
        assert!(matches!(err, RedactionError::Unencodable { character: 'Ł', .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_missing_tool_is_fatal() {
        let engine = RedactionEngine::new(Box::new(UnavailableDecompressor));
        let err = engine
            .redact_file(Path::new("/nonexistent/invoice.pdf"), &RedactionProfile::default())
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_failed_decompression_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4 truncated").unwrap();

        let profile = RedactionProfile::from_json(r#"{"company": "ACME"}"#).unwrap();
        let err = engine().redact_file(&path, &profile).unwrap_err();

        assert!(matches!(err, RedactionError::Decompress(_)));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4 truncated");
    }

    #[test]
    fn test_from_config_selects_decompressor() {
        let runner = Arc::new(ToolRunner::new(std::time::Duration::from_secs(5)).unwrap());
        let config = RedactionConfig {
            decompressor: DecompressorKind::Lopdf,
        };
        let engine = RedactionEngine::from_config(&config, runner);
        assert!(engine.check_available().is_ok());
    }
}
