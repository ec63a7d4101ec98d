//! Per-document extraction with a single OCR fallback pass.
//!
//! The primary backend runs first. Empty primary text goes straight to OCR
//! without a matching pass. Non-empty text that no template recognizes gets
//! exactly one OCR retry. OCR never runs twice for the same document.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::backend::{Backend, BackendKind, BackendRegistry, ExtractionAttempt};
use crate::error::{BackendError, InvexError};
use crate::models::fields::FieldMap;
use crate::template::Template;

/// Fields extracted from one document by one template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    /// Name of the template that produced the fields.
    pub template: String,
    pub fields: FieldMap,
    /// Backend whose text was matched.
    pub backend: BackendKind,
    /// Whether the OCR backend was invoked for this document.
    pub used_ocr: bool,
}

/// Soft, per-document outcome of [`ExtractionController::extract`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    /// A template recognized the document and extracted its fields.
    Matched(ExtractionResult),
    /// No template recognized the text of any pass.
    NoTemplate { used_ocr: bool },
    /// The first recognizing template could not extract the required fields.
    Rejected { template: String, reason: String },
}

/// Drives acquisition and template matching for single documents.
pub struct ExtractionController<'a> {
    primary: &'a dyn Backend,
    ocr: &'a dyn Backend,
    templates: &'a [Box<dyn Template>],
    language: String,
}

enum MatchResult {
    Matched(ExtractionResult),
    Rejected { template: String, reason: String },
    Unrecognized,
}

impl<'a> ExtractionController<'a> {
    /// Resolve both backends from `registry`; unknown keys are configuration errors.
    pub fn new(
        registry: &'a BackendRegistry,
        primary: BackendKind,
        ocr: BackendKind,
        templates: &'a [Box<dyn Template>],
        language: impl Into<String>,
    ) -> Result<Self, InvexError> {
        Ok(Self {
            primary: registry.get(primary)?,
            ocr: registry.get(ocr)?,
            templates,
            language: language.into(),
        })
    }

    /// Fail fast when either backend's executables are missing.
    pub fn check_available(&self) -> Result<(), BackendError> {
        self.primary.check_available()?;
        self.ocr.check_available()?;
        Ok(())
    }

    /// Run the acquisition and matching protocol on one document.
    ///
    /// Errors are backend failures; check [`BackendError::is_fatal`] to
    /// decide between aborting the run and skipping the document.
    pub fn extract(&self, path: &Path) -> Result<ExtractionOutcome, BackendError> {
        let primary = self.acquire(self.primary, path)?;

        let (attempt, used_ocr) = if primary.is_empty {
            info!(
                "No text layer in {}, falling back to {}",
                path.display(),
                self.ocr.kind()
            );
            (self.acquire(self.ocr, path)?, true)
        } else {
            match self.match_templates(&primary, false) {
                MatchResult::Unrecognized => {
                    info!(
                        "No template recognized {} text of {}, retrying with {}",
                        primary.backend_kind,
                        path.display(),
                        self.ocr.kind()
                    );
                    (self.acquire(self.ocr, path)?, true)
                }
                result => return Ok(Self::finish(path, result)),
            }
        };

        match self.match_templates(&attempt, used_ocr) {
            MatchResult::Unrecognized => {
                error!("No template for {}", path.display());
                Ok(ExtractionOutcome::NoTemplate { used_ocr })
            }
            result => Ok(Self::finish(path, result)),
        }
    }

    fn acquire(
        &self,
        backend: &dyn Backend,
        path: &Path,
    ) -> Result<ExtractionAttempt, BackendError> {
        let attempt = ExtractionAttempt::run(backend, path, &self.language)?;
        debug!("START {} text of {}", attempt.backend_kind, path.display());
        debug!("{}", attempt.raw_text);
        debug!("END {} text", attempt.backend_kind);
        Ok(attempt)
    }

    fn match_templates(&self, attempt: &ExtractionAttempt, used_ocr: bool) -> MatchResult {
        for template in self.templates {
            let text = template.normalize(&attempt.raw_text);
            if !template.recognizes(&text) {
                continue;
            }

            debug!("Template {} recognized {} text", template.name(), attempt.backend_kind);
            return match template.extract(&text) {
                Ok(fields) => MatchResult::Matched(ExtractionResult {
                    template: template.name().to_string(),
                    fields,
                    backend: attempt.backend_kind,
                    used_ocr,
                }),
                Err(e) => MatchResult::Rejected {
                    template: template.name().to_string(),
                    reason: e.to_string(),
                },
            };
        }
        MatchResult::Unrecognized
    }

    fn finish(path: &Path, result: MatchResult) -> ExtractionOutcome {
        match result {
            MatchResult::Matched(result) => {
                info!(
                    "{} matched template {} ({} fields)",
                    path.display(),
                    result.template,
                    result.fields.len()
                );
                ExtractionOutcome::Matched(result)
            }
            MatchResult::Rejected { template, reason } => {
                warn!("Template {} rejected {}: {}", template, path.display(), reason);
                ExtractionOutcome::Rejected { template, reason }
            }
            MatchResult::Unrecognized => ExtractionOutcome::NoTemplate { used_ocr: false },
        }
    }
}
