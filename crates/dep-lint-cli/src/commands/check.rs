//! Check command implementation.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use dep_lint_core::Checker;

use crate::input;
use crate::settings::Settings;
use crate::OutputFormat;

/// Runs the check command.
pub fn run(
    deps_path: &Path,
    settings: &Settings,
    format: OutputFormat,
    show_unused: bool,
) -> Result<()> {
    let config = &settings.config;
    let rules = super::load_rules(settings)?;
    let mut dependencies = input::read_dependencies(deps_path, &rules)?;

    let mut checker = Checker::builder()
        .rule_set(Arc::clone(&rules))
        .build()
        .context("Failed to build checker")?;

    tracing::info!(
        "Checking {} dependencies against {} rules",
        dependencies.len(),
        checker.rule_count()
    );

    let result = checker.check(&mut dependencies);

    super::output::print(&result, format)?;
    if show_unused || config.report.show_unused {
        super::output::print_unused(&rules, true);
    }

    if result.has_violations_at(config.fail_on()) || result.config_errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}
