//! Error types for the invex-core library.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for the invex library.
#[derive(Error, Debug)]
pub enum InvexError {
    /// Text acquisition error.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Template loading or extraction error.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// Redaction error.
    #[error("redaction error: {0}")]
    Redaction(#[from] RedactionError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl InvexError {
    /// Whether this error must abort the whole run rather than one document.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Backend(e) => e.is_fatal(),
            Self::Redaction(e) => e.is_fatal(),
            Self::Config(_) => true,
            Self::Template(_) | Self::Io(_) => false,
        }
    }
}

/// Errors raised while running an external executable.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The executable is not on PATH.
    #[error("{tool} not installed ({hint})")]
    NotFound { tool: String, hint: String },

    /// The executable did not finish in time and was killed.
    #[error("{tool} timed out after {}s", timeout.as_secs())]
    TimedOut { tool: String, timeout: Duration },

    /// The executable exited unsuccessfully.
    #[error("{tool} failed with {status}: {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },

    /// Spawning or talking to the process failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to text acquisition.
#[derive(Error, Debug)]
pub enum BackendError {
    /// External tool error.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// In-process text extraction failed.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// A missing executable is a configuration error, not a per-document one.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Tool(ToolError::NotFound { .. }))
    }
}

/// Errors related to templates.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// A template definition could not be parsed.
    #[error("invalid template definition {}: {reason}", path.display())]
    Definition { path: PathBuf, reason: String },

    /// A keyword or field pattern is not a valid regex.
    #[error("template {template}: invalid pattern {pattern:?}: {reason}")]
    InvalidPattern {
        template: String,
        pattern: String,
        reason: String,
    },

    /// A template without keywords would recognize every document.
    #[error("template {template} declares no keywords")]
    NoKeywords { template: String },

    /// A required field was not found in the text.
    #[error("template {template}: missing required field {field}")]
    MissingField { template: String, field: String },

    /// A field matched but its value could not be converted.
    #[error("template {template}: cannot parse {field} from {value:?}")]
    FieldValue {
        template: String,
        field: String,
        value: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to redaction.
#[derive(Error, Debug)]
pub enum RedactionError {
    /// External tool error.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The redaction profile is malformed.
    #[error("malformed redaction profile: {0}")]
    Profile(String),

    /// A phrase contains a character outside ISO-8859-1.
    #[error("phrase {phrase:?} contains {character:?}, which has no single-byte encoding")]
    Unencodable { phrase: String, character: char },

    /// A phrase could interact with filler bytes.
    #[error("phrase {phrase:?} rejected: {reason}")]
    UnsafePhrase { phrase: String, reason: String },

    /// Decompressing the document failed.
    #[error("failed to decompress document: {0}")]
    Decompress(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RedactionError {
    /// A missing decompression tool aborts the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Tool(ToolError::NotFound { .. }))
    }
}

/// Result type for the invex library.
pub type Result<T> = std::result::Result<T, InvexError>;
