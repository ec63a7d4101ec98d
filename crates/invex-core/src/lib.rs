//! Core library for invoice extraction and archival redaction.
//!
//! This crate provides:
//! - Text acquisition backends (pdftotext, pdf-extract, Tesseract OCR)
//! - A template capability for recognizing invoices and extracting fields
//! - The extraction controller with its OCR fallback protocol
//! - A length-preserving redaction engine for decompressed PDF content

pub mod backend;
pub mod controller;
pub mod error;
pub mod models;
pub mod redact;
pub mod template;

pub use backend::{Backend, BackendKind, BackendRegistry, ExtractionAttempt, ToolRunner};
pub use controller::{ExtractionController, ExtractionOutcome, ExtractionResult};
pub use error::{BackendError, InvexError, RedactionError, Result, TemplateError, ToolError};
pub use models::fields::{FieldMap, FieldValue};
pub use redact::{RedactionEngine, RedactionProfile, RedactionReport, RedactionRule};
pub use template::{RegexTemplate, Template};
