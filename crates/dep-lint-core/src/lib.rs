//! # dep-lint-core
//!
//! Core engine for checking dependency graphs against architecture rules.
//!
//! Rules are pairs of wildcard item patterns. This crate provides:
//!
//! - [`PatternCompiler`] turning patterns into per-field [`ItemMatcher`]s
//! - [`DependencyRule`] correlating the two patterns of a rule through `\N`
//! - [`RuleGroup`] classifying dependencies as allowed, questionable,
//!   forbidden or unmatched
//! - [`Projection`] and [`GraphReducer`] for collapsing a graph to coarser items
//! - [`Checker`] running a whole [`RuleSet`] over a dependency stream
//!
//! ## Example
//!
//! ```ignore
//! use dep_lint_core::{declarative, Checker, Config};
//!
//! let config = Config::default();
//! let rules = declarative::load_rules_from_file("dep-lint.rules.toml".as_ref(), &config.engine)?;
//! let mut checker = Checker::builder().rule_set(rules).build()?;
//!
//! let result = checker.check(&mut dependencies);
//! println!("{}", result.format_report(config.fail_on()));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod checker;
mod config;
mod item;
mod projection;
mod reducer;
mod rule;
mod rule_group;
mod rule_set;
mod types;

pub mod declarative;
pub mod pattern;

pub use checker::{Checker, CheckerBuilder, CheckerError};
pub use config::{Config, ConfigError, EngineConfig, ReportConfig};
pub use item::{Dependency, FieldDescriptor, Item, ItemError, ItemPool, ItemType};
pub use pattern::{ItemMatcher, MatchResult, PatternCompiler, PatternError};
pub use projection::{Projection, ProjectionDefinition, TargetTemplate};
pub use reducer::{GraphReducer, ReducedGraph};
pub use rule::{DependencyRule, RuleDefinition, RuleKind, RuleRepresentation};
pub use rule_group::{RuleGroup, Verdict, DEFAULT_GROUP_NAME};
pub use rule_set::{RuleSet, SkippedEntry};
pub use types::{CheckResult, Location, Outcome, RuleViolation, Severity};
