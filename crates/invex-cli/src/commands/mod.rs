//! CLI subcommands.

pub mod config;
pub mod extract;
pub mod redact;
pub mod templates;

use std::path::{Path, PathBuf};

use tracing::debug;

use invex_core::models::config::InvexConfig;

/// Location of the user configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("invex")
        .join("config.json")
}

/// Load `--config` if given, else the user file if it exists, else defaults.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<InvexConfig> {
    if let Some(path) = explicit {
        debug!("Loading config from {}", path.display());
        return InvexConfig::from_file(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config {}: {}", path.display(), e)
        });
    }

    let path = default_config_path();
    if path.exists() {
        debug!("Loading config from {}", path.display());
        return InvexConfig::from_file(&path).map_err(|e| {
            anyhow::anyhow!("Failed to read config {}: {}", path.display(), e)
        });
    }

    Ok(InvexConfig::default())
}
