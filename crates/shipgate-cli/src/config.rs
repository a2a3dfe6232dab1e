//! Configuration file loading and export.

use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;

use shipgate_core::PipelineConfig;

/// Default configuration location relative to the project root.
pub const DEFAULT_CONFIG_PATH: &str = ".shipgate/pipeline.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Yaml,
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    )
}

/// Read a configuration file. `.yaml`/`.yml` files are parsed as YAML,
/// everything else as JSON.
pub fn load(path: &Path) -> Result<PipelineConfig> {
    let text = std::fs::read_to_string(path).with_context(|| {
        format!(
            "Failed to read config {} (run `shipgate init` first)",
            path.display()
        )
    })?;
    let config = if is_yaml(path) {
        serde_yaml::from_str(&text)
            .with_context(|| format!("Invalid YAML config {}", path.display()))?
    } else {
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid JSON config {}", path.display()))?
    };
    Ok(config)
}

/// Write `config` to `path` in the format its extension implies.
pub fn save(path: &Path, config: &PipelineConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let format = if is_yaml(path) {
        ExportFormat::Yaml
    } else {
        ExportFormat::Json
    };
    std::fs::write(path, render(config, format)?)
        .with_context(|| format!("Failed to write config {}", path.display()))
}

pub fn render(config: &PipelineConfig, format: ExportFormat) -> Result<String> {
    Ok(match format {
        ExportFormat::Json => {
            let mut s = serde_json::to_string_pretty(config)?;
            s.push('\n');
            s
        }
        ExportFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipgate_core::ProjectKind;

    #[test]
    fn test_save_and_load_both_formats() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::template(ProjectKind::Python, "svc");

        for name in ["nested/pipeline.json", "pipeline.yaml"] {
            let path = dir.path().join(name);
            save(&path, &config).unwrap();
            assert_eq!(load(&path).unwrap(), config);
        }
    }

    #[test]
    fn test_load_missing_file_mentions_init() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("absent.json")).unwrap_err();
        assert!(format!("{err:#}").contains("shipgate init"));
    }

    #[test]
    fn test_load_partial_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{"project": {"name": "mini"}, "strict": true}"#).unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.project.name, "mini");
        assert!(config.strict);
        assert_eq!(config.retry.retry_cap, 2);
        assert!(config.docs_enabled);
    }
}
