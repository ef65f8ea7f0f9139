//! List rules command implementation.

use anyhow::Result;
use dep_lint_core::RuleSet;

use crate::settings::Settings;

/// Runs the list-rules command.
pub fn run(settings: &Settings) -> Result<()> {
    let rules = super::load_rules(settings)?;
    if let Some(path) = &settings.config_path {
        println!("config: {}\n", path.display());
    }
    for set in rules.all_sets() {
        print_set(set);
    }
    Ok(())
}

fn print_set(set: &RuleSet) {
    println!("{}", set.name());
    println!("{}", "-".repeat(80));

    for item_type in set.item_types() {
        println!("  type {item_type}");
    }

    for group in std::iter::once(set.default_group()).chain(set.groups()) {
        if group.is_empty() {
            continue;
        }
        match group.filter() {
            Some(filter) => println!("\n  [{}] for {}", group.name(), filter.patterns().join(", ")),
            None => println!("\n  [{}]", group.name()),
        }
        for rule in group.rules() {
            println!(
                "    {:<22} {}",
                rule.kind().to_string(),
                rule.representation().text()
            );
        }
    }

    if !set.projections().is_empty() {
        println!("\n  projections:");
        for projection in set.projections() {
            let inner = if projection.is_inner() { " (inner)" } else { "" };
            println!("    {projection}{inner}");
        }
    }

    if !set.skipped().is_empty() {
        println!("\n  \x1b[31mskipped:\x1b[0m");
        for entry in set.skipped() {
            println!("    {}: {}", entry.text, entry.error);
        }
    }

    println!();
}
