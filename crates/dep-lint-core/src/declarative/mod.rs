//! Rule-set files driven by TOML configuration.
//!
//! # Architecture
//!
//! ```text
//! TOML text
//!   ↓ serde (DTO layer)
//! config_dto types
//!   ↓ validate + compile (includes resolved depth first)
//! RuleSet (item types, rule groups, projections)
//! ```

use std::path::Path;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::rule_set::RuleSet;

pub mod config_dto;
pub mod loader;
pub mod model;

/// Errors from parsing TOML and loading rule sets.
#[derive(Debug, thiserror::Error)]
pub enum LoadRulesError {
    /// TOML deserialization failed.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Domain model validation failed.
    #[error("{0}")]
    Load(#[from] loader::LoadError),
}

/// Parses rule-set TOML. Includes resolve against the current directory.
///
/// # Errors
///
/// Returns an error if TOML parsing, an include, or model validation fails.
pub fn load_rules_from_toml(content: &str) -> Result<RuleSet, LoadRulesError> {
    let dto: config_dto::RuleSetDto = toml::from_str(content)?;
    let set = loader::RuleSetLoader::default().load_dto("<inline>", dto, Path::new("."))?;
    Ok(set)
}

/// Loads a rule-set file and everything it includes.
///
/// # Errors
///
/// Returns an error if a file cannot be read or parsed, or validation fails.
pub fn load_rules_from_file(
    path: &Path,
    engine: &EngineConfig,
) -> Result<Arc<RuleSet>, LoadRulesError> {
    Ok(loader::RuleSetLoader::new(engine).load_file(path)?)
}
