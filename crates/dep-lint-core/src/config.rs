//! Configuration types for dep-lint.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::pattern::DEFAULT_CACHE_CAPACITY;
use crate::types::Severity;

/// Top-level configuration for dep-lint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Severity threshold for failure (default: "error").
    /// Violations at or above this severity make `check` exit non-zero.
    #[serde(default)]
    pub fail_on: Option<Severity>,

    /// Rule-set file, relative to the directory of the config file.
    #[serde(default)]
    pub rules: Option<PathBuf>,

    /// Matching engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Report configuration.
    #[serde(default)]
    pub report: ReportConfig,
}

impl Config {
    /// Creates a new default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Returns the failure threshold, defaulting to errors.
    #[must_use]
    pub fn fail_on(&self) -> Severity {
        self.fail_on.unwrap_or(Severity::Error)
    }
}

/// Matching engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Bound of each matcher's memo cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,

    /// Case folding for item types that do not set `ignore-case`.
    #[serde(default)]
    pub ignore_case: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            ignore_case: false,
        }
    }
}

fn default_cache_capacity() -> u64 {
    DEFAULT_CACHE_CAPACITY
}

/// Report configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    /// List rules and projections that never matched.
    #[serde(default)]
    pub show_unused: bool,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Parse error in config file.
    #[error("Failed to parse config: {message}")]
    Parse {
        /// Parse error message.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.fail_on(), Severity::Error);
        assert_eq!(config.engine.cache_capacity, DEFAULT_CACHE_CAPACITY);
        assert!(!config.engine.ignore_case);
        assert!(!config.report.show_unused);
        assert!(config.rules.is_none());
    }

    #[test]
    fn parse_config() {
        let toml = r#"
fail_on = "warning"
rules = "arch/rules.toml"

[engine]
cache_capacity = 128
ignore_case = true

[report]
show_unused = true
"#;

        let config = Config::parse(toml).expect("Failed to parse");
        assert_eq!(config.fail_on(), Severity::Warning);
        assert_eq!(config.rules, Some(PathBuf::from("arch/rules.toml")));
        assert_eq!(config.engine.cache_capacity, 128);
        assert!(config.engine.ignore_case);
        assert!(config.report.show_unused);
    }

    #[test]
    fn partial_engine_section_keeps_defaults() {
        let config = Config::parse("[engine]\nignore_case = true\n").expect("Failed to parse");
        assert_eq!(config.engine.cache_capacity, DEFAULT_CACHE_CAPACITY);
    }

    #[test]
    fn invalid_severity_is_rejected() {
        assert!(matches!(
            Config::parse("fail_on = \"fatal\""),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dep-lint.toml");
        std::fs::write(&path, "fail_on = \"info\"\n").expect("write");
        let config = Config::from_file(&path).expect("load");
        assert_eq!(config.fail_on(), Severity::Info);

        assert!(matches!(
            Config::from_file(&dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
