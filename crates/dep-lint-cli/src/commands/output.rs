//! Shared output formatting for check results and reduced graphs.

use std::collections::BTreeSet;

use anyhow::Result;
use dep_lint_core::{CheckResult, Dependency, Item, ReducedGraph, RuleSet, Severity};
use serde::Serialize;

use crate::OutputFormat;

/// Print check results in the specified format.
pub fn print(result: &CheckResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print_text(result),
        OutputFormat::Json => return print_json(result),
        OutputFormat::Compact => print_compact(result),
    }
    Ok(())
}

fn severity_indicator(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "\x1b[31merror\x1b[0m",
        Severity::Warning => "\x1b[33mwarning\x1b[0m",
        Severity::Info => "\x1b[34minfo\x1b[0m",
    }
}

fn print_text(result: &CheckResult) {
    let (errors, warnings, _) = result.count_by_severity();

    for violation in &result.violations {
        match &violation.location {
            Some(location) => println!(
                "{} {} -> {} at {location}",
                violation.code, violation.using, violation.used
            ),
            None => println!("{} {} -> {}", violation.code, violation.using, violation.used),
        }
        println!(
            "  {}: {} ({}x)",
            severity_indicator(violation.severity),
            violation.message,
            violation.count
        );
        if let Some(group) = &violation.group {
            println!("  = group: {group}");
        }
        println!();
    }

    let summary_color = if errors > 0 {
        "\x1b[31m"
    } else if warnings > 0 {
        "\x1b[33m"
    } else {
        "\x1b[32m"
    };

    println!(
        "{}Found {} error(s), {} warning(s) in {} dependencies\x1b[0m",
        summary_color, errors, warnings, result.dependencies_checked
    );
    if result.config_errors > 0 {
        println!(
            "\x1b[31m{} rule(s) or projection(s) were skipped, see the log above\x1b[0m",
            result.config_errors
        );
    }
}

fn print_json(result: &CheckResult) -> Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    println!("{json}");
    Ok(())
}

fn print_compact(result: &CheckResult) {
    for violation in &result.violations {
        let location = violation
            .location
            .as_ref()
            .map_or_else(|| "-".to_string(), ToString::to_string);
        println!(
            "{location}: {} [{}] {} -> {}: {}",
            violation.severity, violation.code, violation.using, violation.used, violation.message,
        );
    }
}

// ── Reduced graph ──

#[derive(Serialize)]
struct ItemJson<'a> {
    #[serde(rename = "type")]
    item_type: &'a str,
    values: &'a [String],
    inner: bool,
}

#[derive(Serialize)]
struct EdgeJson<'a> {
    using: ItemJson<'a>,
    used: ItemJson<'a>,
    count: usize,
    questionable_count: usize,
    bad_count: usize,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    markers: &'a BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    example: Option<&'a str>,
}

#[derive(Serialize)]
struct GraphJson<'a> {
    dependencies: Vec<EdgeJson<'a>>,
    dropped: usize,
}

fn item_json<'a>(item: &'a Item, graph: &ReducedGraph) -> ItemJson<'a> {
    ItemJson {
        item_type: item.item_type().name(),
        values: item.values(),
        inner: graph.inner_items.contains(item),
    }
}

fn edge_json<'a>(dependency: &'a Dependency, graph: &ReducedGraph) -> EdgeJson<'a> {
    EdgeJson {
        using: item_json(dependency.using(), graph),
        used: item_json(dependency.used(), graph),
        count: dependency.count(),
        questionable_count: dependency.questionable_count(),
        bad_count: dependency.bad_count(),
        markers: dependency.markers(),
        example: dependency.example(),
    }
}

/// Print a reduced graph in the specified format.
pub fn print_graph(graph: &ReducedGraph, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = GraphJson {
                dependencies: graph
                    .dependencies
                    .iter()
                    .map(|d| edge_json(d, graph))
                    .collect(),
                dropped: graph.dropped,
            };
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Compact => {
            for dependency in &graph.dependencies {
                println!(
                    "{};{};{};{};{}",
                    dependency.using(),
                    dependency.used(),
                    dependency.count(),
                    dependency.questionable_count(),
                    dependency.bad_count()
                );
            }
        }
        OutputFormat::Text => {
            for dependency in &graph.dependencies {
                let status = if dependency.bad_count() > 0 {
                    format!(" \x1b[31m({} bad)\x1b[0m", dependency.bad_count())
                } else if dependency.questionable_count() > 0 {
                    format!(
                        " \x1b[33m({} questionable)\x1b[0m",
                        dependency.questionable_count()
                    )
                } else {
                    String::new()
                };
                println!("{dependency} [{}]{status}", dependency.count());
            }
            println!(
                "\n{} edge(s) carrying {} dependencies, {} dropped",
                graph.dependencies.len(),
                graph.total_count(),
                graph.dropped
            );
        }
    }
    Ok(())
}

// ── Unused entries ──

/// Print rules and projections that never matched.
pub fn print_unused(rules: &RuleSet, include_rules: bool) {
    let projections = rules.unused_projections();
    let unused_rules = if include_rules {
        rules.unused_rules()
    } else {
        Vec::new()
    };
    if unused_rules.is_empty() && projections.is_empty() {
        return;
    }

    println!("\nUnused entries:");
    for rule in unused_rules {
        match rule.origin() {
            Some(origin) => println!("  rule {rule} ({origin})"),
            None => println!("  rule {rule}"),
        }
    }
    for projection in projections {
        match projection.origin() {
            Some(origin) => println!("  projection {projection} ({origin})"),
            None => println!("  projection {projection}"),
        }
    }
}
