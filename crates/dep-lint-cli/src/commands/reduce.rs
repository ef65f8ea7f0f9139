//! Reduce command implementation.

use std::path::Path;

use anyhow::{bail, Result};
use dep_lint_core::GraphReducer;

use crate::input;
use crate::settings::Settings;
use crate::OutputFormat;

/// Runs the reduce command.
pub fn run(
    deps_path: &Path,
    settings: &Settings,
    format: OutputFormat,
    show_unused: bool,
) -> Result<()> {
    let config = &settings.config;
    let rules = super::load_rules(settings)?;
    let dependencies = input::read_dependencies(deps_path, &rules)?;

    let reducer = GraphReducer::from_rule_set(&rules);
    if reducer.projections().is_empty() {
        bail!("{} declares no projections", settings.rules_path.display());
    }

    tracing::info!(
        "Reducing {} dependencies with {} projections",
        dependencies.len(),
        reducer.projections().len()
    );

    let graph = reducer.reduce(&dependencies);

    super::output::print_graph(&graph, format)?;
    if show_unused || config.report.show_unused {
        super::output::print_unused(&rules, false);
    }

    Ok(())
}
