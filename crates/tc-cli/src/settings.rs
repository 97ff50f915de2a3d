use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tc_core::{BagOfWords, ClusterConfig};

/// Environment variable naming a config file when `--config` is not given.
pub const CONFIG_ENV: &str = "TEXTCLUST_CONFIG";

/// Contents of a textclust config file. Both sections are optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub clustering: ClusterConfig,
    pub tokenizer: BagOfWords,
}

impl Settings {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse config TOML")
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config")
    }

    /// Load from `explicit`, else from `$TEXTCLUST_CONFIG`, else defaults.
    /// A named file that cannot be read is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));

        let Some(path) = path else {
            tracing::debug!("no config file, using defaults");
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let settings = Self::from_toml(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        tracing::debug!("loaded config from {}", path.display());
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(Settings::from_toml("").unwrap(), Settings::default());
    }

    #[test]
    fn test_partial_sections() {
        let settings = Settings::from_toml(
            r#"
            [clustering]
            radius = 0.5
            real_time_fading = false

            [tokenizer]
            ngram_max = 2
            stop_words = ["the", "a"]
            "#,
        )
        .unwrap();
        assert_eq!(settings.clustering.radius, 0.5);
        assert!(!settings.clustering.real_time_fading);
        assert_eq!(settings.clustering.macro_cluster_count, 3);
        assert_eq!(settings.tokenizer.ngram_min, 1);
        assert_eq!(settings.tokenizer.ngram_max, 2);
        assert_eq!(settings.tokenizer.stop_words.len(), 2);
    }

    #[test]
    fn test_toml_roundtrip() {
        let settings = Settings::default();
        let text = settings.to_toml().unwrap();
        assert!(text.contains("[clustering]"));
        assert!(text.contains("tfidf_cosine_distance"));
        assert_eq!(Settings::from_toml(&text).unwrap(), settings);
    }

    #[test]
    fn test_unknown_field_type_rejected() {
        assert!(Settings::from_toml("[clustering]\nradius = \"wide\"").is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("textclust.toml");
        std::fs::write(&path, "[clustering]\nsigma = 2.5\n").unwrap();
        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.clustering.sigma, 2.5);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
