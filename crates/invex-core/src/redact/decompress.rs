//! Content stream decompression.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use lopdf::Document;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::ToolRunner;
use crate::error::{RedactionError, ToolError};

const QPDF: &str = "qpdf";
const QPDF_HINT: &str = "install qpdf";

/// qpdf exits with 3 when it succeeded with warnings.
const QPDF_ACCEPTED: [i32; 2] = [0, 3];

/// Which decompressor the redaction engine uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecompressorKind {
    /// External `qpdf --stream-data=uncompress`.
    #[default]
    Qpdf,
    /// In-process decompression with lopdf.
    Lopdf,
}

impl fmt::Display for DecompressorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Qpdf => "qpdf",
            Self::Lopdf => "lopdf",
        })
    }
}

/// Turns a document into a buffer whose content streams are uncompressed.
pub trait Decompressor {
    /// Fail with [`ToolError::NotFound`] if a required executable is missing.
    fn check_available(&self) -> Result<(), ToolError>;

    fn decompress(&self, path: &Path) -> Result<Vec<u8>, RedactionError>;
}

/// Decompression through the qpdf executable.
pub struct QpdfDecompressor {
    runner: Arc<ToolRunner>,
}

impl QpdfDecompressor {
    pub fn new(runner: Arc<ToolRunner>) -> Self {
        Self { runner }
    }
}

impl Decompressor for QpdfDecompressor {
    fn check_available(&self) -> Result<(), ToolError> {
        self.runner.require(QPDF, QPDF_HINT).map(|_| ())
    }

    fn decompress(&self, path: &Path) -> Result<Vec<u8>, RedactionError> {
        let args = [
            std::ffi::OsStr::new("--stream-data=uncompress"),
            path.as_os_str(),
            std::ffi::OsStr::new("-"),
        ];
        let data = self
            .runner
            .stdout(QPDF, QPDF_HINT, args, None, &QPDF_ACCEPTED)?;
        debug!("qpdf decompressed {} to {} bytes", path.display(), data.len());
        Ok(data)
    }
}

/// In-process decompression with lopdf.
#[derive(Debug, Default)]
pub struct LopdfDecompressor;

impl Decompressor for LopdfDecompressor {
    fn check_available(&self) -> Result<(), ToolError> {
        Ok(())
    }

    fn decompress(&self, path: &Path) -> Result<Vec<u8>, RedactionError> {
        let mut doc = Document::load(path)
            .map_err(|e| RedactionError::Decompress(format!("failed to load PDF: {}", e)))?;
        doc.decompress();

        let mut data = Vec::new();
        doc.save_to(&mut data)
            .map_err(|e| RedactionError::Decompress(format!("failed to write PDF: {}", e)))?;
        debug!("lopdf decompressed {} to {} bytes", path.display(), data.len());
        Ok(data)
    }
}
