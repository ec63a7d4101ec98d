//! Templates command - inspect the loaded templates.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;

use invex_core::template::load_templates;

use super::load_config;

/// Arguments for the templates command.
#[derive(Args)]
pub struct TemplatesArgs {
    #[command(subcommand)]
    command: TemplatesCommand,
}

#[derive(Subcommand)]
enum TemplatesCommand {
    /// List templates in matching order
    List {
        /// Folder with additional templates, listed first
        #[arg(short, long)]
        template_folder: Option<PathBuf>,

        /// Leave out the built-in templates
        #[arg(long)]
        exclude_built_in_templates: bool,
    },
}

pub fn run(args: TemplatesArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    match args.command {
        TemplatesCommand::List {
            template_folder,
            exclude_built_in_templates,
        } => {
            let mut config = load_config(config_path)?;
            if template_folder.is_some() {
                config.templates.folder = template_folder;
            }
            config.templates.exclude_built_in |= exclude_built_in_templates;

            let templates = load_templates(&config.templates)?;
            if templates.is_empty() {
                println!("{} No templates loaded.", style("ℹ").blue());
                return Ok(());
            }

            for (i, template) in templates.iter().enumerate() {
                println!("{:>3}. {}", i + 1, template.name());
            }
            Ok(())
        }
    }
}
