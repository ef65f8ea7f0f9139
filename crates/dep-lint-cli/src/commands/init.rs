//! Init command implementation.

use anyhow::{bail, Result};
use std::path::Path;

const DEFAULT_CONFIG: &str = r#"# dep-lint configuration

# Violations at or above this severity make `dep-lint check` fail.
# fail_on = "warning"

# Rule-set file, relative to this file.
rules = "dep-lint.rules.toml"

[engine]
# Bound of each pattern's memo cache.
cache_capacity = 4096
# Case folding for item types that do not set `ignore-case`.
ignore_case = false

[report]
# List rules and projections that never matched.
show_unused = false
"#;

const DEFAULT_RULES: &str = r#"# dep-lint rules
#
# Patterns have one segment per key field, separated by `:`.
#   *   matches within one name part
#   **  matches anything
#   (..) captures, \1 refers back to the using side

[[item-types]]
name = "CLASS"
fields = ["NAMESPACE", "CLASS"]

[[item-types]]
name = "MODULE"
fields = ["MODULE"]

# Anything may use the standard library.
[[rules]]
rule = "** ---> java.**"

# Modules may use themselves.
[[rules]]
rule = 'com.example.(*).** ---> com.example.\1.**'

# Legacy classes are off limits.
[[rules]]
rule = "** ---! **:Legacy*"

# [[groups]]
# name = "web"
# filter = ["com.example.web.**"]
#
# [[groups.rules]]
# rule = "** ---? com.example.db.**"

[[projections]]
source = "com.example.*.**:**"
targets = ['\1']
target-type = "MODULE"
"#;

/// Runs the init command.
pub fn run(force: bool) -> Result<()> {
    let files = [
        (Path::new("dep-lint.toml"), DEFAULT_CONFIG),
        (Path::new("dep-lint.rules.toml"), DEFAULT_RULES),
    ];

    if !force {
        if let Some((path, _)) = files.iter().find(|(path, _)| path.exists()) {
            bail!(
                "{} already exists. Use --force to overwrite.",
                path.display()
            );
        }
    }

    for (path, content) in files {
        std::fs::write(path, content)?;
        println!("Created {}", path.display());
    }

    println!("\nNext steps:");
    println!("  1. Edit dep-lint.rules.toml to describe your architecture");
    println!("  2. Run: dep-lint check deps.json");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dep_lint_core::{declarative, Config};

    #[test]
    fn templates_parse() {
        let config = Config::parse(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.engine.cache_capacity, 4096);
        assert_eq!(config.rules.as_deref(), Some(Path::new("dep-lint.rules.toml")));

        let rules = declarative::load_rules_from_toml(DEFAULT_RULES).unwrap();
        assert!(rules.skipped().is_empty());
        assert_eq!(rules.default_group().len(), 3);
        assert_eq!(rules.projections().len(), 1);
    }
}
