//! Copying or moving matched documents under a name built from their fields.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use tracing::{info, warn};

use invex_core::{FieldMap, FieldValue, RedactionEngine, RedactionProfile, RedactionReport};

/// Date format used in archive file names, independent of the output date format.
const FILENAME_DATE_FORMAT: &str = "%Y-%m-%d";

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{(\w+)\}").unwrap();
    static ref NON_WORD: Regex = Regex::new(r"[^\w\s-]").unwrap();
    static ref SEPARATORS: Regex = Regex::new(r"[-\s]+").unwrap();
}

/// Lowercase, drop punctuation and join words with single hyphens.
pub fn slugify(value: &str) -> String {
    let cleaned = NON_WORD.replace_all(value, "");
    let lowered = cleaned.trim().to_lowercase();
    SEPARATORS.replace_all(&lowered, "-").into_owned()
}

/// Fill `{field}` placeholders in `format` from `fields`.
pub fn format_filename(format: &str, fields: &FieldMap) -> anyhow::Result<String> {
    let mut missing = None;
    let name = PLACEHOLDER.replace_all(format, |caps: &Captures| {
        let field = &caps[1];
        match fields.get(field) {
            Some(FieldValue::Text(text)) => slugify(text),
            Some(value) => value.render(FILENAME_DATE_FORMAT),
            None => {
                missing.get_or_insert_with(|| field.to_string());
                String::new()
            }
        }
    });

    if let Some(field) = missing {
        anyhow::bail!("filename format references missing field {{{}}}", field);
    }
    if name.contains(['/', '\\']) || name.trim().is_empty() {
        anyhow::bail!("filename format produced an invalid file name: {:?}", name);
    }
    Ok(name.into_owned())
}

/// Whether the archived file is a copy or replaces the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveMode {
    Copy,
    Move,
}

/// Redaction applied to every archived file.
pub struct Redaction<'a> {
    pub engine: &'a RedactionEngine,
    pub profile: &'a RedactionProfile,
}

/// Outcome of archiving one document.
#[derive(Debug)]
pub struct Archived {
    pub path: PathBuf,
    pub report: Option<RedactionReport>,
}

fn same_file(source: &Path, target: &Path) -> anyhow::Result<bool> {
    if !target.exists() {
        return Ok(false);
    }
    let source = source
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", source.display()))?;
    let target = target
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", target.display()))?;
    Ok(source == target)
}

/// Places matched documents into a target directory.
pub struct Archiver<'a> {
    mode: ArchiveMode,
    dir: PathBuf,
    filename_format: &'a str,
    redaction: Option<Redaction<'a>>,
}

impl<'a> Archiver<'a> {
    pub fn new(
        mode: ArchiveMode,
        dir: impl Into<PathBuf>,
        filename_format: &'a str,
        redaction: Option<Redaction<'a>>,
    ) -> Self {
        Self {
            mode,
            dir: dir.into(),
            filename_format,
            redaction,
        }
    }

    /// Copy `source` into the target directory, redact the copy, and for
    /// moves remove the source only after everything succeeded.
    ///
    /// The source is never modified. A failed redaction removes the copy.
    pub fn archive(&self, source: &Path, fields: &FieldMap) -> anyhow::Result<Archived> {
        let name = format_filename(self.filename_format, fields)?;
        let target = self.dir.join(name);

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        // Copying a file onto itself truncates it.
        if same_file(source, &target)? {
            return match self.mode {
                ArchiveMode::Copy => Err(anyhow::anyhow!(
                    "{} is already archived as {}",
                    source.display(),
                    target.display()
                )),
                ArchiveMode::Move => {
                    info!("{} is already in place, leaving it untouched", source.display());
                    Ok(Archived {
                        path: target,
                        report: None,
                    })
                }
            };
        }

        fs::copy(source, &target).with_context(|| {
            format!("Failed to copy {} to {}", source.display(), target.display())
        })?;

        let report = match &self.redaction {
            Some(redaction) => match redaction.engine.redact_file(&target, redaction.profile) {
                Ok(report) => Some(report),
                Err(e) => {
                    if let Err(remove) = fs::remove_file(&target) {
                        warn!("Failed to remove {}: {}", target.display(), remove);
                    }
                    return Err(anyhow::Error::new(e)
                        .context(format!("Failed to redact copy of {}", source.display())));
                }
            },
            None => None,
        };

        if self.mode == ArchiveMode::Move {
            fs::remove_file(source)
                .with_context(|| format!("Failed to remove {}", source.display()))?;
        }

        info!(
            "{} {} to {}",
            match self.mode {
                ArchiveMode::Copy => "Copied",
                ArchiveMode::Move => "Moved",
            },
            source.display(),
            target.display()
        );
        Ok(Archived {
            path: target,
            report,
        })
    }
}
