//! Configuration module for staticpage
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - System configuration (/etc/staticpage/config.toml)
//! - User configuration (~/.staticpage/config.toml)
//! - Project configuration (./staticpage.toml)
//! - Environment variables
//! - Command-line arguments

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::engine::{DEFAULT_PARALLELISM, DEFAULT_REGION};

const DEFAULT_PROJECT: &str = "staticpage";
const DEFAULT_STACK: &str = "dev";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default settings
    pub defaults: Defaults,

    /// Colors and output settings
    pub colors: ColorsConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Default configuration values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Project name used in resource URNs
    pub project: String,

    /// Stack name used in resource URNs
    pub stack: String,

    /// Region buckets are created in
    pub region: String,

    /// Number of resources realized concurrently
    pub parallelism: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            project: DEFAULT_PROJECT.to_string(),
            stack: DEFAULT_STACK.to_string(),
            region: DEFAULT_REGION.to_string(),
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}

/// Color settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    /// Enable colors
    pub enabled: bool,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when no `-v` flag or `RUST_LOG` is given
    pub level: String,

    /// Log format (`text` or `json`)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Config::default();

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                config = config.merge_from_file(&path)?;
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Get the list of configuration file paths to check
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // Explicit path takes priority
        if let Some(path) = explicit_path {
            paths.push(path.clone());
            return paths;
        }

        // System-wide config
        paths.push(PathBuf::from("/etc/staticpage/config.toml"));

        // User config
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".staticpage/config.toml"));
        }

        // Project config (current directory)
        paths.push(PathBuf::from("staticpage.toml"));

        if let Ok(env_config) = std::env::var("STATICPAGE_CONFIG") {
            paths.push(PathBuf::from(env_config));
        }

        paths
    }

    /// Merge configuration from a file
    fn merge_from_file(&self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let file_config: Config = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            _ => toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        Ok(self.merge(file_config))
    }

    /// Merge another config into this one. Values equal to the defaults do
    /// not override what an earlier file set.
    fn merge(&self, other: Config) -> Config {
        let defaults = Defaults::default();
        Config {
            defaults: Defaults {
                project: if other.defaults.project != defaults.project {
                    other.defaults.project
                } else {
                    self.defaults.project.clone()
                },
                stack: if other.defaults.stack != defaults.stack {
                    other.defaults.stack
                } else {
                    self.defaults.stack.clone()
                },
                region: if other.defaults.region != defaults.region {
                    other.defaults.region
                } else {
                    self.defaults.region.clone()
                },
                parallelism: if other.defaults.parallelism != defaults.parallelism {
                    other.defaults.parallelism
                } else {
                    self.defaults.parallelism
                },
            },
            colors: ColorsConfig {
                enabled: self.colors.enabled && other.colors.enabled,
            },
            logging: other.logging,
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // STATICPAGE_PROJECT
        if let Ok(project) = std::env::var("STATICPAGE_PROJECT") {
            self.defaults.project = project;
        }

        // STATICPAGE_STACK
        if let Ok(stack) = std::env::var("STATICPAGE_STACK") {
            self.defaults.stack = stack;
        }

        // STATICPAGE_REGION
        if let Ok(region) = std::env::var("STATICPAGE_REGION") {
            self.defaults.region = region;
        }

        // STATICPAGE_PARALLELISM
        if let Ok(parallelism) = std::env::var("STATICPAGE_PARALLELISM") {
            if let Ok(n) = parallelism.parse() {
                self.defaults.parallelism = n;
            }
        }

        // NO_COLOR
        if std::env::var("NO_COLOR").is_ok() || std::env::var("STATICPAGE_NO_COLOR").is_ok() {
            self.colors.enabled = false;
        }
    }

    /// Load from a specific file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Config::default().merge_from_file(path.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.defaults.project, "staticpage");
        assert_eq!(config.defaults.stack, "dev");
        assert_eq!(config.defaults.region, "us-east-1");
        assert_eq!(config.defaults.parallelism, 10);
        assert!(config.colors.enabled);
    }

    #[test]
    fn test_config_merge() {
        let base = Config {
            defaults: Defaults {
                region: "eu-west-1".to_string(),
                ..Defaults::default()
            },
            ..Config::default()
        };
        let other = Config {
            defaults: Defaults {
                parallelism: 4,
                ..Defaults::default()
            },
            ..Config::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.defaults.parallelism, 4);
        assert_eq!(merged.defaults.region, "eu-west-1");
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[defaults]\nstack = \"prod\"\nregion = \"eu-central-1\"\n\n[colors]\nenabled = false"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.defaults.stack, "prod");
        assert_eq!(config.defaults.region, "eu-central-1");
        assert_eq!(config.defaults.project, "staticpage");
        assert!(!config.colors.enabled);
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "defaults:\n  parallelism: 2\nlogging:\n  format: json").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.defaults.parallelism, 2);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("STATICPAGE_PARALLELISM", "20");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.defaults.parallelism, 20);
        std::env::remove_var("STATICPAGE_PARALLELISM");
    }
}
