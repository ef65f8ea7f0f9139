//! Dependency graph input.
//!
//! Dependencies are read from a JSON document produced by an extractor:
//!
//! ```json
//! {
//!   "dependencies": [
//!     {
//!       "using": { "type": "CLASS", "values": ["com.acme.billing", "Invoice"] },
//!       "used":  { "type": "CLASS", "values": ["java.util", "List"] },
//!       "count": 3,
//!       "source": { "file": "src/Invoice.java", "line": 12 },
//!       "markers": ["field"],
//!       "example": "private List<Line> lines;"
//!     }
//!   ]
//! }
//! ```
//!
//! Item types are resolved by name against the loaded rule set.

use std::path::Path;

use anyhow::{bail, Context, Result};
use dep_lint_core::{Dependency, Item, ItemPool, Location, RuleSet};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct DependencyFileDto {
    #[serde(default)]
    dependencies: Vec<DependencyDto>,
}

#[derive(Debug, Deserialize)]
struct ItemDto {
    #[serde(rename = "type")]
    item_type: String,
    values: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DependencyDto {
    using: ItemDto,
    used: ItemDto,
    #[serde(default = "default_count")]
    count: usize,
    #[serde(default)]
    questionable_count: usize,
    #[serde(default)]
    bad_count: usize,
    #[serde(default)]
    source: Option<Location>,
    #[serde(default)]
    markers: Vec<String>,
    #[serde(default)]
    example: Option<String>,
}

fn default_count() -> usize {
    1
}

/// Reads a dependency file, interning equal items.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, names an item
/// type the rule set does not declare, or has an item of the wrong arity.
pub fn read_dependencies(path: &Path, rules: &RuleSet) -> Result<Vec<Dependency>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dependencies: {}", path.display()))?;
    parse_dependencies(&content, rules)
        .with_context(|| format!("Invalid dependency file: {}", path.display()))
}

fn parse_dependencies(content: &str, rules: &RuleSet) -> Result<Vec<Dependency>> {
    let dto: DependencyFileDto = serde_json::from_str(content)?;
    let mut pool = ItemPool::new();

    let dependencies = dto
        .dependencies
        .into_iter()
        .enumerate()
        .map(|(index, dep)| {
            convert_dependency(dep, rules, &mut pool)
                .with_context(|| format!("dependency #{}", index + 1))
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        "Read {} dependencies over {} distinct items",
        dependencies.len(),
        pool.len()
    );
    Ok(dependencies)
}

fn convert_item(dto: ItemDto, rules: &RuleSet, pool: &mut ItemPool) -> Result<Item> {
    let Some(item_type) = rules.item_type(&dto.item_type) else {
        bail!("unknown item type `{}`", dto.item_type);
    };
    Ok(pool.item(item_type, dto.values)?)
}

fn convert_dependency(dto: DependencyDto, rules: &RuleSet, pool: &mut ItemPool) -> Result<Dependency> {
    let using = convert_item(dto.using, rules, pool)?;
    let used = convert_item(dto.used, rules, pool)?;

    let mut dependency = Dependency::new(using, used, dto.count)
        .with_tallies(dto.questionable_count, dto.bad_count);
    if let Some(source) = dto.source {
        dependency = dependency.with_source(source);
    }
    for marker in dto.markers {
        dependency = dependency.with_marker(marker);
    }
    if let Some(example) = dto.example {
        dependency = dependency.with_example(example);
    }
    Ok(dependency)
}
