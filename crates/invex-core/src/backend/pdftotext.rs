//! Layout-preserving text extraction with Poppler's `pdftotext`.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use super::{Backend, BackendKind, Result, ToolRunner};
use crate::error::ToolError;

const TOOL: &str = "pdftotext";
const HINT: &str = "install poppler-utils";

/// `pdftotext -layout` backend.
pub struct PdfToTextBackend {
    runner: Arc<ToolRunner>,
}

impl PdfToTextBackend {
    pub fn new(runner: Arc<ToolRunner>) -> Self {
        Self { runner }
    }
}

impl Backend for PdfToTextBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::PdfToText
    }

    fn check_available(&self) -> std::result::Result<(), ToolError> {
        self.runner.require(TOOL, HINT).map(|_| ())
    }

    fn to_text(&self, path: &Path, _language: &str) -> Result<String> {
        let args = [
            OsStr::new("-layout"),
            OsStr::new("-enc"),
            OsStr::new("UTF-8"),
            path.as_os_str(),
            OsStr::new("-"),
        ];
        let stdout = self.runner.stdout(TOOL, HINT, args, None, &[0])?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}
