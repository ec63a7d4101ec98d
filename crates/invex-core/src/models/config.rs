//! Configuration structures for the extraction and redaction pipeline.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;
use crate::redact::DecompressorKind;

/// Main configuration for the invex pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvexConfig {
    /// Text acquisition configuration.
    pub extraction: ExtractionConfig,

    /// Template loading configuration.
    pub templates: TemplateConfig,

    /// Result output configuration.
    pub output: OutputConfig,

    /// Redaction configuration.
    pub redaction: RedactionConfig,
}

/// Text acquisition configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Primary (layout text) backend.
    pub input_reader: BackendKind,

    /// Backend used for the OCR fallback pass.
    pub ocr_reader: BackendKind,

    /// Language hint passed to every backend.
    pub language: String,

    /// Upper bound for any single external tool invocation.
    pub tool_timeout_secs: u64,

    /// Rasterization density for OCR.
    pub ocr_density: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            input_reader: BackendKind::PdfToText,
            ocr_reader: BackendKind::Tesseract,
            language: "deu".to_string(),
            tool_timeout_secs: 120,
            ocr_density: 350,
        }
    }
}

impl ExtractionConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

/// Template loading configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Folder with additional template definitions, tried before built-ins.
    pub folder: Option<PathBuf>,

    /// Skip the built-in templates.
    pub exclude_built_in: bool,
}

/// Result output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Serialization format of the result file.
    pub format: OutputFormat,

    /// strftime format used for dates in the result file.
    pub date_format: String,

    /// Result file name without extension.
    pub name: String,

    /// File name pattern for copied/moved documents.
    pub filename_format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::None,
            date_format: "%Y-%m-%d".to_string(),
            name: "invoices-output".to_string(),
            filename_format: "{date} {invoice_number} {desc}.pdf".to_string(),
        }
    }
}

/// Result file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Do not write a result file.
    #[default]
    None,
    Csv,
    Json,
    Xml,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [Self::None, Self::Csv, Self::Json, Self::Xml];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Xml => "xml",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown output format: {} (expected none, csv, json or xml)", s))
    }
}

/// Redaction configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    /// How content streams are decompressed before redaction.
    pub decompressor: DecompressorKind,
}

impl InvexConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
