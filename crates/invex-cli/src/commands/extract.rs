//! Extract command - run the extraction protocol over many documents.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};

use invex_core::models::config::{InvexConfig, OutputFormat};
use invex_core::models::fields::validate_date_format;
use invex_core::template::load_templates;
use invex_core::{
    BackendKind, BackendRegistry, ExtractionController, ExtractionOutcome, ExtractionResult,
    RedactionEngine, RedactionProfile, ToolRunner,
};

use super::load_config;
use crate::archive::{ArchiveMode, Archiver, Redaction};
use crate::output::sink_for;

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input files, directories or glob patterns
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Backend for the first text pass
    #[arg(long, value_name = "BACKEND")]
    input_reader: Option<BackendKind>,

    /// Backend for the OCR pass
    #[arg(long, value_name = "BACKEND")]
    ocr_reader: Option<BackendKind>,

    /// Language hint passed to the backends
    #[arg(long, value_name = "LANG")]
    input_reader_lang: Option<String>,

    /// Result file format (none, csv, json, xml)
    #[arg(long, value_name = "FORMAT")]
    output_format: Option<OutputFormat>,

    /// strftime format for dates in the result file
    #[arg(long, value_name = "FORMAT")]
    output_date_format: Option<String>,

    /// Result file name without extension
    #[arg(short = 'o', long, value_name = "NAME")]
    output_name: Option<String>,

    /// Copy matched documents into this folder
    #[arg(short, long, value_name = "DIR")]
    copy: Option<PathBuf>,

    /// Move matched documents into this folder
    #[arg(short, long = "move", value_name = "DIR")]
    move_to: Option<PathBuf>,

    /// File name pattern for copied or moved documents
    #[arg(long, value_name = "PATTERN")]
    filename_format: Option<String>,

    /// Folder with additional templates, tried before the built-in ones
    #[arg(short, long, value_name = "DIR")]
    template_folder: Option<PathBuf>,

    /// Use only templates from --template-folder
    #[arg(long)]
    exclude_built_in_templates: bool,

    /// Redaction profile (inline JSON or JSON file) applied to copied or moved documents
    #[arg(long, value_name = "PROFILE")]
    anonymize: Option<String>,
}

impl ExtractArgs {
    /// Command-line values take precedence over the config file.
    fn apply(&self, config: &mut InvexConfig) {
        if let Some(kind) = self.input_reader {
            config.extraction.input_reader = kind;
        }
        if let Some(kind) = self.ocr_reader {
            config.extraction.ocr_reader = kind;
        }
        if let Some(lang) = &self.input_reader_lang {
            config.extraction.language = lang.clone();
        }
        if let Some(format) = self.output_format {
            config.output.format = format;
        }
        if let Some(format) = &self.output_date_format {
            config.output.date_format = format.clone();
        }
        if let Some(name) = &self.output_name {
            config.output.name = name.clone();
        }
        if let Some(format) = &self.filename_format {
            config.output.filename_format = format.clone();
        }
        if let Some(folder) = &self.template_folder {
            config.templates.folder = Some(folder.clone());
        }
        config.templates.exclude_built_in |= self.exclude_built_in_templates;
    }
}

/// Expand files, directories (their `*.pdf`) and glob patterns, keeping argument order.
fn collect_inputs(inputs: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        let path = Path::new(input);
        if path.is_file() {
            files.push(path.to_path_buf());
            continue;
        }

        let pattern = if path.is_dir() {
            format!("{}/*.pdf", glob::Pattern::escape(input.trim_end_matches('/')))
        } else {
            input.clone()
        };

        let mut matched: Vec<PathBuf> = glob(&pattern)?
            .filter_map(|r| r.ok())
            .filter(|p| p.is_file())
            .collect();
        matched.sort();

        if matched.is_empty() {
            warn!("No documents found for {}", input);
        }
        files.extend(matched);
    }

    Ok(files)
}

/// Archivers for `--copy` and `--move`; copies are made before the source is moved away.
fn build_archivers<'a>(
    copy: Option<&'a Path>,
    move_to: Option<&'a Path>,
    filename_format: &'a str,
    redaction: Option<(&'a RedactionEngine, &'a RedactionProfile)>,
) -> Vec<Archiver<'a>> {
    [(ArchiveMode::Copy, copy), (ArchiveMode::Move, move_to)]
        .into_iter()
        .filter_map(|(mode, dir)| Some((mode, dir?)))
        .map(|(mode, dir)| {
            let redaction = redaction.map(|(engine, profile)| Redaction { engine, profile });
            Archiver::new(mode, dir, filename_format, redaction)
        })
        .collect()
}

#[derive(Default)]
struct Summary {
    matched: usize,
    unmatched: usize,
    rejected: usize,
    failed: Vec<(PathBuf, String)>,
}

pub fn run(args: ExtractArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    args.apply(&mut config);

    validate_date_format(&config.output.date_format).map_err(anyhow::Error::msg)?;

    let files = collect_inputs(&args.inputs)?;
    if files.is_empty() {
        anyhow::bail!("No input documents found");
    }

    let runner = Arc::new(ToolRunner::new(config.extraction.tool_timeout())?);
    let registry = BackendRegistry::with_defaults(Arc::clone(&runner), &config.extraction);

    let templates = load_templates(&config.templates)?;
    if templates.is_empty() {
        anyhow::bail!("No templates loaded");
    }

    let controller = ExtractionController::new(
        &registry,
        config.extraction.input_reader,
        config.extraction.ocr_reader,
        &templates,
        config.extraction.language.clone(),
    )?;
    // The OCR backend is only checked once a document needs it.
    registry
        .get(config.extraction.input_reader)?
        .check_available()?;

    let profile = match &args.anonymize {
        Some(arg) => Some(RedactionProfile::from_arg(arg)?),
        None => None,
    };
    let engine = match &profile {
        Some(_) => {
            let engine = RedactionEngine::from_config(&config.redaction, Arc::clone(&runner));
            engine.check_available()?;
            Some(engine)
        }
        None => None,
    };

    let archivers = build_archivers(
        args.copy.as_deref(),
        args.move_to.as_deref(),
        &config.output.filename_format,
        engine.as_ref().zip(profile.as_ref()),
    );
    if archivers.is_empty() && profile.is_some() {
        warn!("--anonymize has no effect without --copy or --move");
    }

    info!("Processing {} documents with {} templates", files.len(), templates.len());

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let mut summary = Summary::default();
    let mut results: Vec<ExtractionResult> = Vec::new();

    for path in &files {
        pb.set_message(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );

        match controller.extract(path) {
            Ok(ExtractionOutcome::Matched(result)) => {
                info!("{}: {:?}", path.display(), result.fields);
                summary.matched += 1;

                for archiver in &archivers {
                    match archiver.archive(path, &result.fields) {
                        Ok(archived) => {
                            debug!("Archived as {}", archived.path.display());
                            if let Some(report) = &archived.report {
                                info!(
                                    "{}: {} phrases redacted",
                                    archived.path.display(),
                                    report.total_matches()
                                );
                            }
                        }
                        Err(e) => {
                            error!("Failed to archive {}: {:#}", path.display(), e);
                            summary.failed.push((path.clone(), format!("{:#}", e)));
                            break;
                        }
                    }
                }
                results.push(result);
            }
            Ok(ExtractionOutcome::NoTemplate { .. }) => summary.unmatched += 1,
            Ok(ExtractionOutcome::Rejected { .. }) => summary.rejected += 1,
            Err(e) if e.is_fatal() => {
                pb.abandon();
                return Err(anyhow::Error::new(e).context(format!(
                    "Aborting: cannot process {}",
                    path.display()
                )));
            }
            Err(e) => {
                warn!("Failed to process {}: {}", path.display(), e);
                summary.failed.push((path.clone(), e.to_string()));
            }
        }

        pb.inc(1);
    }

    pb.finish_and_clear();

    if let Some(sink) = sink_for(config.output.format) {
        let output =
            sink.write(&results, &config.output.name, &config.output.date_format)?;
        println!(
            "{} Wrote {} results to {}",
            style("✓").green(),
            results.len(),
            output.display()
        );
    }

    println!(
        "{} Processed {} documents in {:?}",
        style("✓").green(),
        files.len(),
        start.elapsed()
    );
    println!(
        "   {} matched, {} without template, {} rejected, {} failed",
        style(summary.matched).green(),
        style(summary.unmatched).yellow(),
        style(summary.rejected).yellow(),
        style(summary.failed.len()).red()
    );

    if !summary.failed.is_empty() {
        println!();
        println!("{}", style("Failed documents:").red());
        for (path, reason) in &summary.failed {
            println!("  - {}: {}", path.display(), reason);
        }
    }

    Ok(())
}
