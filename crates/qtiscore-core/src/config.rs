//! Scoring configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::engine::ScoringEngineConfig;
use crate::operators::custom::custom_operator_by_definition;
use crate::traits::CustomOperator;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "qtiscore.toml";

/// Top-level qtiscore configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Max results scored concurrently.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Score results in parallel.
    #[serde(default)]
    pub process_parallel: bool,
    /// Add `SCORE_TOTAL` and per-category totals to the test before scoring.
    #[serde(default)]
    pub add_total_scores: bool,
    /// Output directory for scored results.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Custom operator definitions to enable, e.g. `depcp:ParseCommaDecimal`.
    #[serde(default)]
    pub custom_operators: Vec<String>,
}

fn default_parallelism() -> usize {
    4
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./qtiscore-results")
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            process_parallel: false,
            add_total_scores: false,
            output_dir: default_output_dir(),
            custom_operators: Vec::new(),
        }
    }
}

impl ScoringConfig {
    /// Reject settings the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.parallelism == 0 {
            anyhow::bail!("parallelism must be at least 1");
        }
        for definition in &self.custom_operators {
            if custom_operator_by_definition(definition).is_none() {
                anyhow::bail!("unknown custom operator definition: {definition}");
            }
        }
        Ok(())
    }

    /// The custom operators named in `custom_operators`.
    pub fn custom_operators(&self) -> Vec<Arc<dyn CustomOperator>> {
        self.custom_operators
            .iter()
            .filter_map(|definition| custom_operator_by_definition(definition))
            .collect()
    }

    pub fn engine_config(&self) -> ScoringEngineConfig {
        ScoringEngineConfig {
            parallelism: self.parallelism,
        }
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `qtiscore.toml` in the current directory
/// 2. `~/.config/qtiscore/config.toml`
///
/// Environment variable override: `QTISCORE_PARALLELISM`.
pub fn load_config() -> Result<ScoringConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ScoringConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => parse_config_file(&path)?,
        None => ScoringConfig::default(),
    };

    if let Ok(value) = std::env::var("QTISCORE_PARALLELISM") {
        config.parallelism = value
            .parse()
            .with_context(|| format!("invalid QTISCORE_PARALLELISM: {value}"))?;
    }

    config.validate()?;
    Ok(config)
}

fn parse_config_file(path: &Path) -> Result<ScoringConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    toml::from_str::<ScoringConfig>(&content)
        .with_context(|| format!("failed to parse config: {}", path.display()))
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("qtiscore"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ScoringConfig::default();
        assert_eq!(config.parallelism, 4);
        assert!(!config.process_parallel);
        assert!(!config.add_total_scores);
        assert_eq!(config.output_dir, PathBuf::from("./qtiscore-results"));
        assert!(config.custom_operators.is_empty());
        assert_eq!(config.engine_config().parallelism, 4);
    }

    #[test]
    fn parse_partial_toml() {
        let config: ScoringConfig = toml::from_str(
            r#"
process_parallel = true
custom_operators = ["depcp:ParseCommaDecimal"]
"#,
        )
        .unwrap();
        assert!(config.process_parallel);
        assert_eq!(config.parallelism, 4);
        assert!(config.validate().is_ok());
        assert_eq!(config.custom_operators().len(), 1);
    }

    #[test]
    fn unknown_custom_operator_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qtiscore.toml");
        std::fs::write(&path, "custom_operators = [\"acme:Magic\"]\n").unwrap();
        let err = load_config_from(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("acme:Magic"));
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let err = load_config_from(Some(Path::new("/nonexistent/qtiscore.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qtiscore.toml");
        std::fs::write(&path, "parallelism = \"many\"").unwrap();
        let err = load_config_from(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse config"));
    }

    #[test]
    fn zero_parallelism_is_rejected() {
        let config = ScoringConfig {
            parallelism: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
