//! Subcommand implementations.

use std::sync::Arc;

use anyhow::{Context, Result};
use dep_lint_core::{declarative, RuleSet};

use crate::settings::Settings;

pub mod check;
pub mod init;
pub mod list_rules;
pub mod output;
pub mod reduce;

/// Loads the rule set the settings point at.
fn load_rules(settings: &Settings) -> Result<Arc<RuleSet>> {
    let path = &settings.rules_path;
    declarative::load_rules_from_file(path, &settings.config.engine)
        .with_context(|| format!("Failed to load rules: {}", path.display()))
}
