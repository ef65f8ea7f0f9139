//! Classification of dependencies by ordered rule lists.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::item::Dependency;
use crate::pattern::GroupFilter;
use crate::rule::{DependencyRule, RuleKind, RuleRepresentation};
use crate::types::{CheckResult, Outcome, RuleViolation};

/// Number of checks before the first re-sort.
const INITIAL_REORDER_THRESHOLD: usize = 200;

/// Name of the group that applies to every dependency.
pub const DEFAULT_GROUP_NAME: &str = "default";

/// Verdict on a single dependency.
#[derive(Debug, Clone)]
pub struct Verdict {
    /// Classification.
    pub outcome: Outcome,
    /// Rule that decided it, absent for unmatched dependencies.
    pub rule: Option<Arc<RuleRepresentation>>,
}

/// Rules that apply to dependencies whose using item passes a filter.
///
/// Forbidden rules are tried first, then allowed, then questionable. Lists
/// are periodically re-sorted so frequently hit rules are tried early; the
/// sort is stable and only changes which rule is found, never the outcome.
///
/// The group is `Clone`; clones share rule representations and memo
/// caches, so a driver can hand one clone to each worker.
#[derive(Debug, Clone)]
pub struct RuleGroup {
    name: String,
    filter: Option<GroupFilter>,
    allowed: Vec<DependencyRule>,
    questionable: Vec<DependencyRule>,
    forbidden: Vec<DependencyRule>,
    checks: usize,
    next_reorder_at: usize,
}

impl RuleGroup {
    /// Creates an empty group.
    #[must_use]
    pub fn new(name: impl Into<String>, filter: Option<GroupFilter>) -> Self {
        Self {
            name: name.into(),
            filter,
            allowed: Vec::new(),
            questionable: Vec::new(),
            forbidden: Vec::new(),
            checks: 0,
            next_reorder_at: INITIAL_REORDER_THRESHOLD,
        }
    }

    /// Creates the unfiltered default group.
    #[must_use]
    pub fn default_group() -> Self {
        Self::new(DEFAULT_GROUP_NAME, None)
    }

    /// Returns the group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the filter, if any.
    #[must_use]
    pub fn filter(&self) -> Option<&GroupFilter> {
        self.filter.as_ref()
    }

    /// Adds a rule to the list for its kind.
    ///
    /// Returns `false` and drops the rule if an alike rule is already present.
    pub fn add_rule(&mut self, rule: DependencyRule) -> bool {
        let list = self.list_mut(rule.kind());
        if list.iter().any(|r| r.is_alike(&rule)) {
            debug!("duplicate rule `{rule}` ignored");
            return false;
        }
        list.push(rule);
        true
    }

    fn list_mut(&mut self, kind: RuleKind) -> &mut Vec<DependencyRule> {
        match kind {
            RuleKind::MayUse => &mut self.allowed,
            RuleKind::MayUseWithWarning => &mut self.questionable,
            RuleKind::MustNotUse => &mut self.forbidden,
        }
    }

    /// Iterates over all rules: forbidden, allowed, then questionable.
    pub fn rules(&self) -> impl Iterator<Item = &DependencyRule> {
        self.forbidden
            .iter()
            .chain(&self.allowed)
            .chain(&self.questionable)
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.allowed.len() + self.questionable.len() + self.forbidden.len()
    }

    /// Whether the group has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the group applies to `dependency`.
    #[must_use]
    pub fn applies_to(&self, dependency: &Dependency) -> bool {
        self.filter
            .as_ref()
            .map_or(true, |f| f.matches(dependency.using()))
    }

    /// Classifies `dependency` without touching its counters.
    pub fn classify(&mut self, dependency: &Dependency) -> Verdict {
        let verdict = if let Some(rule) = first_match(&mut self.forbidden, dependency) {
            Verdict {
                outcome: Outcome::Forbidden,
                rule: Some(rule),
            }
        } else if let Some(rule) = first_match(&mut self.allowed, dependency) {
            Verdict {
                outcome: Outcome::Allowed,
                rule: Some(rule),
            }
        } else if let Some(rule) = first_match(&mut self.questionable, dependency) {
            Verdict {
                outcome: Outcome::Questionable,
                rule: Some(rule),
            }
        } else {
            Verdict {
                outcome: Outcome::Unmatched,
                rule: None,
            }
        };

        self.checks += 1;
        if self.checks > self.next_reorder_at {
            self.reorder();
        }
        verdict
    }

    fn reorder(&mut self) {
        debug!(
            "re-sorting rules of group `{}` after {} check(s)",
            self.name, self.checks
        );
        for list in [
            &mut self.forbidden,
            &mut self.allowed,
            &mut self.questionable,
        ] {
            list.sort_by(|a, b| b.hits().cmp(&a.hits()));
        }
        self.next_reorder_at = self.next_reorder_at * 6 / 5 + INITIAL_REORDER_THRESHOLD;
    }

    /// Checks one dependency if the group applies to it.
    ///
    /// Marks the dependency's counters and records a violation for any
    /// outcome other than allowed. Returns `None` when the filter rejects
    /// the dependency.
    pub fn check_dependency(
        &mut self,
        dependency: &mut Dependency,
        result: &mut CheckResult,
    ) -> Option<Outcome> {
        if !self.applies_to(dependency) {
            return None;
        }

        let verdict = self.classify(dependency);
        let message = match (&verdict.outcome, &verdict.rule) {
            (Outcome::Allowed, _) => return Some(Outcome::Allowed),
            (Outcome::Forbidden, Some(rule)) => format!("forbidden by `{}`", rule.text()),
            (Outcome::Questionable, Some(rule)) => format!("questionable per `{}`", rule.text()),
            _ => "no rule allows this dependency".to_string(),
        };

        match verdict.outcome {
            Outcome::Questionable => {
                dependency.mark_questionable();
                warn!("{dependency}: {message}");
            }
            _ => {
                dependency.mark_bad();
                error!("{dependency}: {message}");
            }
        }

        let mut violation = RuleViolation::new(
            verdict.outcome,
            dependency.using().to_string(),
            dependency.used().to_string(),
            dependency.count(),
            message,
        )
        .with_group(self.name.clone())
        .with_location(dependency.source().cloned());
        if let Some(rule) = &verdict.rule {
            violation = violation.with_rule(rule.to_string());
        }
        result.violations.push(violation);

        Some(verdict.outcome)
    }

    /// Checks every dependency the group applies to.
    pub fn check(&mut self, dependencies: &mut [Dependency]) -> CheckResult {
        let mut result = CheckResult::new();
        for dependency in dependencies.iter_mut() {
            if self.check_dependency(dependency, &mut result).is_some() {
                result.dependencies_checked += 1;
            }
        }
        result
    }

    /// Adds the per-rule hits `other`, a clone of this group, counted
    /// after it was cloned.
    ///
    /// Rules are paired by shared representation, so differing list
    /// orders after re-sorting do not matter.
    pub fn merge_hits_from(&mut self, other: &Self) {
        for rule in self
            .forbidden
            .iter_mut()
            .chain(&mut self.allowed)
            .chain(&mut self.questionable)
        {
            if let Some(twin) = other
                .rules()
                .find(|r| Arc::ptr_eq(r.representation(), rule.representation()))
            {
                rule.add_hits(twin.hits_since_clone());
            }
        }
    }
}

fn first_match(
    rules: &mut [DependencyRule],
    dependency: &Dependency,
) -> Option<Arc<RuleRepresentation>> {
    rules
        .iter_mut()
        .find_map(|rule| rule.is_match(dependency).then(|| Arc::clone(rule.representation())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Item, ItemType};
    use crate::pattern::PatternCompiler;
    use crate::rule::RuleDefinition;

    fn class_type() -> Arc<ItemType> {
        Arc::new(ItemType::new("CLASS", ["NAMESPACE", "CLASS"], false).unwrap())
    }

    fn dep(using: [&str; 2], used: [&str; 2]) -> Dependency {
        let t = class_type();
        Dependency::new(Item::new(&t, using).unwrap(), Item::new(&t, used).unwrap(), 3)
    }

    fn group(rules: &[(&str, RuleKind, &str)]) -> RuleGroup {
        let t = class_type();
        let compiler = PatternCompiler::default();
        let mut g = RuleGroup::default_group();
        for &(using, kind, used) in rules {
            let rule =
                DependencyRule::new(&compiler, &t, &t, RuleDefinition::new(using, kind, used))
                    .unwrap();
            g.add_rule(rule);
        }
        g
    }

    #[test]
    fn forbidden_outranks_allowed() {
        let mut g = group(&[
            ("**", RuleKind::MayUse, "**:*"),
            ("**", RuleKind::MustNotUse, "**:Legacy*"),
        ]);
        let mut deps = vec![dep(["app", "Main"], ["lib", "LegacyUtil"])];
        let result = g.check(&mut deps);

        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].outcome, Outcome::Forbidden);
        assert_eq!(deps[0].bad_count(), 3);
    }

    #[test]
    fn correlated_rule_allows_same_package_only() {
        let mut g = group(&[("(*):*", RuleKind::MayUse, r"\1:*")]);
        let mut deps = vec![
            dep(["Pkg1", "X"], ["Pkg1", "Y"]),
            dep(["Pkg1", "X"], ["Pkg2", "Y"]),
        ];
        let result = g.check(&mut deps);

        assert_eq!(result.dependencies_checked, 2);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].outcome, Outcome::Unmatched);
        assert!(result.violations[0].rule.is_none());
        assert_eq!(deps[0].bad_count(), 0);
        assert_eq!(deps[1].bad_count(), 3);
    }

    #[test]
    fn questionable_marks_questionable_count() {
        let mut g = group(&[("**", RuleKind::MayUseWithWarning, "old.**")]);
        let mut deps = vec![dep(["app", "Main"], ["old.io", "File"])];
        let result = g.check(&mut deps);

        assert_eq!(result.violations[0].outcome, Outcome::Questionable);
        assert_eq!(deps[0].questionable_count(), 3);
        assert_eq!(deps[0].bad_count(), 0);
        assert!(!result.has_errors());
        assert!(result.has_warnings());
    }

    #[test]
    fn verdicts_do_not_depend_on_input_order() {
        let rules = [
            ("a.**", RuleKind::MayUse, "b.**"),
            ("**", RuleKind::MustNotUse, "c.**"),
            ("**", RuleKind::MayUseWithWarning, "d.**"),
        ];
        let forward = vec![
            dep(["a.x", "A"], ["b.y", "B"]),
            dep(["a.x", "A"], ["c.y", "C"]),
            dep(["a.x", "A"], ["d.y", "D"]),
            dep(["z.x", "Z"], ["e.y", "E"]),
        ];
        let mut backward = forward.clone();
        backward.reverse();

        let mut g1 = group(&rules);
        let mut g2 = group(&rules);
        let mut outcomes_forward: Vec<_> = forward
            .iter()
            .map(|d| (d.to_string(), g1.classify(d).outcome))
            .collect();
        let mut outcomes_backward: Vec<_> = backward
            .iter()
            .map(|d| (d.to_string(), g2.classify(d).outcome))
            .collect();
        outcomes_forward.sort_by(|a, b| a.0.cmp(&b.0));
        outcomes_backward.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(outcomes_forward, outcomes_backward);
    }

    #[test]
    fn reordering_keeps_outcomes() {
        let mut g = group(&[
            ("**", RuleKind::MayUse, "rare.**"),
            ("**", RuleKind::MayUse, "common.**"),
            ("**", RuleKind::MustNotUse, "common.bad.**"),
        ]);
        for _ in 0..1000 {
            let d = dep(["app", "Main"], ["common.x", "Y"]);
            assert_eq!(g.classify(&d).outcome, Outcome::Allowed);
            let bad = dep(["app", "Main"], ["common.bad.x", "Y"]);
            assert_eq!(g.classify(&bad).outcome, Outcome::Forbidden);
        }
        // sorted by hits: common.** has 1000 hits, rare.** none
        assert_eq!(g.allowed[0].used().pattern(), "common.**");
        assert!(g.next_reorder_at > INITIAL_REORDER_THRESHOLD);
    }

    #[test]
    fn threshold_grows_geometrically() {
        let mut g = group(&[("**", RuleKind::MayUse, "**")]);
        let d = dep(["a", "A"], ["b", "B"]);
        for _ in 0..=200 {
            g.classify(&d);
        }
        assert_eq!(g.next_reorder_at, 200 * 6 / 5 + 200);
    }

    #[test]
    fn filter_skips_other_dependencies() {
        let t = class_type();
        let compiler = PatternCompiler::default();
        let mut g = RuleGroup::new(
            "billing",
            Some(GroupFilter::new(["billing.**"], false).unwrap()),
        );
        g.add_rule(
            DependencyRule::new(
                &compiler,
                &t,
                &t,
                RuleDefinition::new("**", RuleKind::MustNotUse, "shipping.**"),
            )
            .unwrap(),
        );

        let mut deps = vec![
            dep(["billing.core", "A"], ["shipping.api", "B"]),
            dep(["orders.core", "A"], ["shipping.api", "B"]),
        ];
        let result = g.check(&mut deps);
        assert_eq!(result.dependencies_checked, 1);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].group.as_deref(), Some("billing"));
    }

    #[test]
    fn duplicate_rules_are_dropped() {
        let mut g = group(&[
            ("a.**", RuleKind::MayUse, "b.**"),
            ("a.**", RuleKind::MayUse, "b.**"),
        ]);
        assert_eq!(g.len(), 1);
        assert!(!g.is_empty());
        g.allowed.clear();
        assert!(g.is_empty());
    }

    #[test]
    fn worker_hits_merge_back() {
        let mut main = group(&[("**", RuleKind::MayUse, "**")]);
        let mut worker = main.clone();
        let d = dep(["a", "A"], ["b", "B"]);
        main.classify(&d);
        worker.classify(&d);
        worker.classify(&d);

        main.merge_hits_from(&worker);
        let rule = main.rules().next().unwrap();
        assert_eq!(rule.hits(), 3);
        assert_eq!(rule.representation().hits(), 3);
    }

    #[test]
    fn hits_before_cloning_are_not_merged_twice() {
        let mut main = group(&[("**", RuleKind::MayUse, "**")]);
        let d = dep(["a", "A"], ["b", "B"]);
        for _ in 0..5 {
            main.classify(&d);
        }

        let mut worker = main.clone();
        worker.classify(&d);
        assert_eq!(worker.rules().next().unwrap().hits_since_clone(), 1);

        main.merge_hits_from(&worker);
        let rule = main.rules().next().unwrap();
        assert_eq!(rule.hits(), 6);
        assert_eq!(rule.representation().hits(), 6);
    }
}
