//! Redact command - write a redacted copy of one document.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use console::style;
use tracing::warn;

use invex_core::{RedactionEngine, RedactionProfile, ToolRunner};

use super::load_config;

/// Arguments for the redact command.
#[derive(Args)]
pub struct RedactArgs {
    /// Document to redact; it is never modified
    input: PathBuf,

    /// Redaction profile as inline JSON or a path to a JSON file
    #[arg(short, long)]
    profile: String,

    /// Path of the redacted copy
    #[arg(short, long)]
    output: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: RedactArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    let profile = RedactionProfile::from_arg(&args.profile)?;
    let runner = Arc::new(ToolRunner::new(config.extraction.tool_timeout())?);
    let engine = RedactionEngine::from_config(&config.redaction, runner);
    engine.check_available()?;

    if !args.input.is_file() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    if args.output.exists() && args.input.canonicalize()? == args.output.canonicalize()? {
        anyhow::bail!("Output must differ from the input");
    }

    fs::copy(&args.input, &args.output).with_context(|| {
        format!("Failed to copy {} to {}", args.input.display(), args.output.display())
    })?;

    let report = match engine.redact_file(&args.output, &profile) {
        Ok(report) => report,
        Err(e) => {
            if let Err(remove) = fs::remove_file(&args.output) {
                warn!("Failed to remove {}: {}", args.output.display(), remove);
            }
            return Err(e.into());
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} Redacted {} -> {}",
        style("✓").green(),
        args.input.display(),
        args.output.display()
    );
    for phrase in &report.phrases {
        let count = if phrase.matches > 0 {
            style(phrase.matches).green()
        } else {
            style(phrase.matches).dim()
        };
        println!("  {:<14} {:<40} {}", phrase.kind.as_str(), phrase.phrase, count);
    }
    println!(
        "   {} matches, {} bytes redacted",
        style(report.total_matches()).bold(),
        report.bytes_redacted
    );

    Ok(())
}
