//! Configuration loading and management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use taggable_domain::{SubjectRegistry, TaggingConfig};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub tagging: TaggingConfig,

    /// Subject type name -> stored discriminator
    #[serde(default)]
    pub subjects: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./taggable.sqlite")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./taggable.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("TAGGABLE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Configured log level; `info` when the configuration cannot be loaded
    pub fn log_level(config_path: Option<&Path>) -> String {
        Self::load(config_path)
            .map(|config| config.general.log_level)
            .unwrap_or_else(|_| default_log_level())
    }

    pub fn registry(&self) -> SubjectRegistry {
        SubjectRegistry::from_map(self.subjects.clone())
    }

    /// Effective configuration rendered as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# taggable configuration

[general]
database_path = "./taggable.sqlite"
log_level = "info"

[tagging]
# Separator used to split a single tag string such as "red, green"
delimiter = ","
default_locale = "en"
tags_table = "tags"
taggables_table = "taggables"

# Subject types that may carry tags: name = stored discriminator
[subjects]
post = "posts"
# article = "blog_articles"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_toml_parses() {
        let config: AppConfig = toml::from_str(&AppConfig::example_toml()).unwrap();
        assert_eq!(config.tagging.delimiter, ",");
        assert_eq!(config.subjects.get("post").map(String::as_str), Some("posts"));
        assert_eq!(
            config.general.database_path,
            PathBuf::from("./taggable.sqlite")
        );
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: AppConfig = toml::from_str("[tagging]\ndelimiter = \";\"\n").unwrap();
        assert_eq!(config.tagging.delimiter, ";");
        assert_eq!(config.tagging.default_locale, "en");
        assert!(config.subjects.is_empty());
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/taggable.toml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_log_level_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taggable.toml");
        std::fs::write(&path, "[general]\nlog_level = \"debug\"\n").unwrap();

        assert_eq!(AppConfig::log_level(Some(&path)), "debug");
        assert_eq!(
            AppConfig::log_level(Some(&dir.path().join("missing.toml"))),
            "info"
        );
    }

    #[test]
    fn test_registry_from_subjects() {
        let mut config = AppConfig::default();
        config
            .subjects
            .insert("post".to_string(), "posts".to_string());
        let subject = config.registry().subject("post", "9").unwrap();
        assert_eq!(subject.subject_type, "posts");
    }
}
