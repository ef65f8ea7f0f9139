//! Runs every applicable rule group over a dependency stream.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::item::Dependency;
use crate::rule_group::RuleGroup;
use crate::rule_set::RuleSet;
use crate::types::CheckResult;

/// Errors building a [`Checker`].
#[derive(Debug, Error)]
pub enum CheckerError {
    /// Neither a rule set nor any group was given.
    #[error("no rules to check against")]
    NoRules,
}

/// Builder for configuring a [`Checker`].
#[derive(Debug, Default)]
pub struct CheckerBuilder {
    rule_set: Option<Arc<RuleSet>>,
    groups: Vec<RuleGroup>,
}

impl CheckerBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the groups of a rule set and everything it includes.
    #[must_use]
    pub fn rule_set(mut self, rule_set: Arc<RuleSet>) -> Self {
        self.rule_set = Some(rule_set);
        self
    }

    /// Adds a group.
    #[must_use]
    pub fn group(mut self, group: RuleGroup) -> Self {
        self.groups.push(group);
        self
    }

    /// Adds multiple groups.
    #[must_use]
    pub fn groups<I>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = RuleGroup>,
    {
        self.groups.extend(groups);
        self
    }

    /// Builds the checker. Groups without rules are left out.
    ///
    /// # Errors
    ///
    /// Returns an error if no rule set or group was given.
    pub fn build(self) -> Result<Checker, CheckerError> {
        if self.rule_set.is_none() && self.groups.is_empty() {
            return Err(CheckerError::NoRules);
        }

        let mut groups: Vec<RuleGroup> = self
            .rule_set
            .as_ref()
            .map(|set| set.all_groups().cloned().collect())
            .unwrap_or_default();
        groups.extend(self.groups);
        groups.retain(|g| {
            if g.is_empty() {
                debug!("Skipping empty group: {}", g.name());
            }
            !g.is_empty()
        });

        Ok(Checker {
            rule_set: self.rule_set,
            groups,
        })
    }
}

/// Checks dependencies against rule groups.
///
/// Use [`Checker::builder()`] to construct an instance.
#[derive(Debug, Clone)]
pub struct Checker {
    rule_set: Option<Arc<RuleSet>>,
    groups: Vec<RuleGroup>,
}

impl Checker {
    /// Creates a new builder for configuring a checker.
    #[must_use]
    pub fn builder() -> CheckerBuilder {
        CheckerBuilder::new()
    }

    /// Returns the rule set, if the checker was built from one.
    #[must_use]
    pub fn rule_set(&self) -> Option<&Arc<RuleSet>> {
        self.rule_set.as_ref()
    }

    /// Returns the groups in evaluation order.
    #[must_use]
    pub fn groups(&self) -> &[RuleGroup] {
        &self.groups
    }

    /// Returns the number of rules across all groups.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.groups.iter().map(RuleGroup::len).sum()
    }

    /// Checks every dependency against every group that applies to it.
    ///
    /// Each dependency counts once towards `dependencies_checked`, however
    /// many groups apply. Entries the rule set skipped count as
    /// configuration errors.
    pub fn check(&mut self, dependencies: &mut [Dependency]) -> CheckResult {
        info!(
            "Checking {} dependencies against {} rule(s) in {} group(s)",
            dependencies.len(),
            self.rule_count(),
            self.groups.len()
        );

        let mut result = CheckResult::new();
        for dependency in dependencies.iter_mut() {
            let mut applied = false;
            for group in &mut self.groups {
                applied |= group.check_dependency(dependency, &mut result).is_some();
            }
            if !applied {
                debug!("No group applies to {dependency}");
            }
            result.dependencies_checked += 1;
        }

        if let Some(set) = &self.rule_set {
            result.config_errors = set.all_skipped().len();
        }

        info!(
            "Check complete: {} violations in {} dependencies",
            result.violations.len(),
            result.dependencies_checked
        );
        result
    }
}
