//! Locating the config file and the rule-set file.
//!
//! Config: `--config`, then `dep-lint.toml` or `.dep-lint.toml` in the
//! working directory, then `config.toml` in the global directory
//! (`$DEP_LINT_CONFIG_DIR`, else `~/.dep-lint`), else defaults.
//!
//! Rules: `--rules`, then the config's `rules` key (relative to the config
//! file), then `dep-lint.rules.toml` in the working directory, then
//! `rules.toml` in the global directory.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use dep_lint_core::Config;

const CONFIG_NAMES: &[&str] = &["dep-lint.toml", ".dep-lint.toml"];
const RULES_NAME: &str = "dep-lint.rules.toml";
const GLOBAL_CONFIG_NAME: &str = "config.toml";
const GLOBAL_RULES_NAME: &str = "rules.toml";

/// Configuration plus the rule-set file it selects.
#[derive(Debug)]
pub struct Settings {
    /// Parsed configuration, defaults when no file was found.
    pub config: Config,
    /// Config file that was read, if any.
    pub config_path: Option<PathBuf>,
    /// Rule-set file to load.
    pub rules_path: PathBuf,
}

/// Directories searched for settings files.
#[derive(Debug, Clone)]
pub struct Lookup {
    project_dir: PathBuf,
    global_dir: Option<PathBuf>,
}

impl Lookup {
    /// Searches `project_dir` and the user's global directory.
    #[must_use]
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            global_dir: global_dir(),
        }
    }

    #[cfg(test)]
    fn with_global_dir(project_dir: &Path, global_dir: Option<&Path>) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
            global_dir: global_dir.map(Path::to_path_buf),
        }
    }

    fn config_path(&self, explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        CONFIG_NAMES
            .iter()
            .map(|name| self.project_dir.join(name))
            .chain(self.global_dir.iter().map(|d| d.join(GLOBAL_CONFIG_NAME)))
            .find(|candidate| candidate.is_file())
    }

    fn rules_path(
        &self,
        explicit: Option<&Path>,
        config: &Config,
        config_path: Option<&Path>,
    ) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        if let Some(rules) = &config.rules {
            let base = config_path.and_then(Path::parent).unwrap_or(Path::new("."));
            return Ok(base.join(rules));
        }

        let candidates: Vec<PathBuf> = std::iter::once(self.project_dir.join(RULES_NAME))
            .chain(self.global_dir.iter().map(|d| d.join(GLOBAL_RULES_NAME)))
            .collect();
        match candidates.iter().find(|c| c.is_file()) {
            Some(found) => Ok(found.clone()),
            None => bail!(
                "No rule set found (looked for {}). Pass --rules or run `dep-lint init`.",
                candidates
                    .iter()
                    .map(|c| c.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    /// Reads the config and picks the rule-set file.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen config file cannot be read or parsed,
    /// or no rule-set file can be found.
    pub fn resolve(&self, config_flag: Option<&Path>, rules_flag: Option<&Path>) -> Result<Settings> {
        let config_path = self.config_path(config_flag);
        let config = match &config_path {
            Some(path) => {
                tracing::debug!("Using config: {}", path.display());
                Config::from_file(path)
                    .with_context(|| format!("Failed to load config: {}", path.display()))?
            }
            None => {
                tracing::debug!("No config file found, using defaults");
                Config::default()
            }
        };
        let rules_path = self.rules_path(rules_flag, &config, config_path.as_deref())?;
        tracing::debug!("Using rules: {}", rules_path.display());

        Ok(Settings {
            config,
            config_path,
            rules_path,
        })
    }
}

/// `$DEP_LINT_CONFIG_DIR`, else `~/.dep-lint`.
fn global_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os("DEP_LINT_CONFIG_DIR") {
        return Some(PathBuf::from(dir));
    }
    home::home_dir().map(|h| h.join(".dep-lint"))
}
