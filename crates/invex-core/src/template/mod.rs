//! Invoice templates.
//!
//! A template recognizes one issuer's documents and extracts fields from
//! them. Templates are tried in the order they are supplied; the first one
//! that recognizes the text wins.

mod loader;
mod regex_template;

pub use loader::{built_in_templates, load_templates, read_templates};
pub use regex_template::{RegexTemplate, TemplateDefinition, TemplateOptions};

use crate::error::TemplateError;
use crate::models::fields::FieldMap;

/// Result type for template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Trait for invoice templates.
pub trait Template {
    /// Human-readable name, usually the issuer.
    fn name(&self) -> &str;

    /// Prepare raw backend text for matching.
    fn normalize(&self, text: &str) -> String;

    /// Whether this template handles the normalized text.
    fn recognizes(&self, text: &str) -> bool;

    /// Extract fields from normalized text.
    fn extract(&self, text: &str) -> Result<FieldMap>;
}
