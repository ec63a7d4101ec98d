//! Loading template definitions from disk and from the built-in set.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{RegexTemplate, Result, Template, TemplateDefinition};
use crate::error::TemplateError;
use crate::models::config::TemplateConfig;

/// Definitions compiled into the binary, in matching order.
const BUILT_IN: [(&str, &str); 2] = [
    ("com/oyo.yml", include_str!("../../templates/com/oyo.yml")),
    (
        "de/stadtwerke-musterstadt.yml",
        include_str!("../../templates/de/stadtwerke-musterstadt.yml"),
    ),
];

#[derive(Clone, Copy)]
enum Format {
    Yaml,
    Json,
}

impl Format {
    fn of(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "yml" | "yaml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

fn parse(path: &Path, content: &str, format: Format) -> Result<Box<dyn Template>> {
    let definition: TemplateDefinition = match format {
        Format::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
    }
    .map_err(|reason| TemplateError::Definition {
        path: path.to_path_buf(),
        reason,
    })?;

    Ok(Box::new(RegexTemplate::new(definition)?))
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else if Format::of(&path).is_some() {
            files.push(path);
        }
    }
    Ok(())
}

/// Read every `.yml`, `.yaml` and `.json` definition below `folder`, sorted by path.
pub fn read_templates(folder: &Path) -> Result<Vec<Box<dyn Template>>> {
    let mut files = Vec::new();
    collect_files(folder, &mut files)?;
    files.sort();

    let mut templates = Vec::with_capacity(files.len());
    for path in files {
        let Some(format) = Format::of(&path) else {
            continue;
        };
        let content = std::fs::read_to_string(&path)?;
        let template = parse(&path, &content, format)?;
        debug!("Loaded template {} from {}", template.name(), path.display());
        templates.push(template);
    }

    Ok(templates)
}

/// Templates shipped with the library.
pub fn built_in_templates() -> Result<Vec<Box<dyn Template>>> {
    BUILT_IN
        .iter()
        .map(|(name, content)| parse(Path::new(name), content, Format::Yaml))
        .collect()
}

/// External templates first, then the built-in ones unless excluded.
pub fn load_templates(config: &TemplateConfig) -> Result<Vec<Box<dyn Template>>> {
    let mut templates = match &config.folder {
        Some(folder) => read_templates(folder)?,
        None => Vec::new(),
    };
    let external = templates.len();

    if !config.exclude_built_in {
        templates.extend(built_in_templates()?);
    }

    info!(
        "Loaded {} templates ({} external, built-ins {})",
        templates.len(),
        external,
        if config.exclude_built_in { "excluded" } else { "included" }
    );
    Ok(templates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(templates: &[Box<dyn Template>]) -> Vec<&str> {
        templates.iter().map(|t| t.name()).collect()
    }

    #[test]
    fn test_built_ins_parse() {
        let templates = built_in_templates().unwrap();
        assert_eq!(names(&templates), vec!["OYO", "Stadtwerke Musterstadt"]);
    }

    #[test]
    fn test_built_in_oyo_extracts() {
        let templates = built_in_templates().unwrap();
        let oyo = &templates[0];
        let text = oyo.normalize(
            "OYO Oravel Stays\nDate: 31/12/2017\nIBZY2087 Cash at Hotel\nGrand Total Rs 1939\n",
        );

        assert!(oyo.recognizes(&text));
        let fields = oyo.extract(&text).unwrap();
        assert_eq!(fields["invoice_number"].as_text(), Some("IBZY2087"));
        assert_eq!(fields["currency"].as_text(), Some("INR"));
    }

    #[test]
    fn test_folder_is_read_recursively_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(
            dir.path().join("nested/b.yml"),
            "issuer: Beta\nkeywords: beta\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("a.json"),
            r#"{"issuer": "Alpha", "keywords": ["alpha"]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let templates = read_templates(dir.path()).unwrap();
        assert_eq!(names(&templates), vec!["Alpha", "Beta"]);
    }

    #[test]
    fn test_external_before_built_ins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("own.yaml"), "issuer: Own\nkeywords: own\n").unwrap();

        let mut config = TemplateConfig {
            folder: Some(dir.path().to_path_buf()),
            exclude_built_in: false,
        };
        let templates = load_templates(&config).unwrap();
        assert_eq!(names(&templates), vec!["Own", "OYO", "Stadtwerke Musterstadt"]);

        config.exclude_built_in = true;
        let templates = load_templates(&config).unwrap();
        assert_eq!(names(&templates), vec!["Own"]);
    }

    #[test]
    fn test_broken_definition_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yml");
        std::fs::write(&path, "keywords: [unclosed\n").unwrap();

        match read_templates(dir.path()) {
            Err(TemplateError::Definition { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected result: {:?}", other.map(|t| t.len())),
        }
    }
}
