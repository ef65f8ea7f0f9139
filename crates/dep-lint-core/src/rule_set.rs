//! A loaded rule-set file and the rule sets it includes.

use std::sync::Arc;

use crate::item::ItemType;
use crate::pattern::PatternError;
use crate::projection::Projection;
use crate::rule::RuleRepresentation;
use crate::rule_group::RuleGroup;
use crate::types::Location;

/// A rule or projection whose pattern did not compile.
#[derive(Debug, Clone)]
pub struct SkippedEntry {
    /// Text of the rule or projection.
    pub text: String,
    /// Where it was written.
    pub origin: Option<Location>,
    /// Why it was skipped.
    pub error: PatternError,
}

/// Item types, rule groups and projections of one file, plus the rule
/// sets it includes.
#[derive(Debug, Clone)]
pub struct RuleSet {
    name: String,
    item_types: Vec<Arc<ItemType>>,
    default_group: RuleGroup,
    groups: Vec<RuleGroup>,
    projections: Vec<Arc<Projection>>,
    includes: Vec<Arc<RuleSet>>,
    skipped: Vec<SkippedEntry>,
}

impl RuleSet {
    /// Creates an empty rule set.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            item_types: Vec::new(),
            default_group: RuleGroup::default_group(),
            groups: Vec::new(),
            projections: Vec::new(),
            includes: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Returns the rule set name (usually its file path).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the item types declared locally.
    #[must_use]
    pub fn item_types(&self) -> &[Arc<ItemType>] {
        &self.item_types
    }

    /// Returns the default group.
    #[must_use]
    pub fn default_group(&self) -> &RuleGroup {
        &self.default_group
    }

    /// Returns the default group for adding rules.
    pub fn default_group_mut(&mut self) -> &mut RuleGroup {
        &mut self.default_group
    }

    /// Returns the filtered groups.
    #[must_use]
    pub fn groups(&self) -> &[RuleGroup] {
        &self.groups
    }

    /// Returns the local projections.
    #[must_use]
    pub fn projections(&self) -> &[Arc<Projection>] {
        &self.projections
    }

    /// Returns the included rule sets.
    #[must_use]
    pub fn includes(&self) -> &[Arc<RuleSet>] {
        &self.includes
    }

    /// Returns the entries skipped in this file.
    #[must_use]
    pub fn skipped(&self) -> &[SkippedEntry] {
        &self.skipped
    }

    /// Adds an item type.
    pub fn add_item_type(&mut self, item_type: Arc<ItemType>) {
        self.item_types.push(item_type);
    }

    /// Adds a filtered group.
    pub fn add_group(&mut self, group: RuleGroup) {
        self.groups.push(group);
    }

    /// Adds a projection after those already present.
    pub fn add_projection(&mut self, projection: Projection) {
        self.projections.push(Arc::new(projection));
    }

    /// Adds an included rule set.
    pub fn add_include(&mut self, include: Arc<RuleSet>) {
        self.includes.push(include);
    }

    /// Records an entry that was not compiled.
    pub fn record_skipped(&mut self, entry: SkippedEntry) {
        self.skipped.push(entry);
    }

    /// This set and every set it includes, depth first, each set once even
    /// when reachable along several paths.
    #[must_use]
    pub fn all_sets(&self) -> Vec<&RuleSet> {
        let mut out = Vec::new();
        self.visit(&mut out);
        out
    }

    fn visit<'a>(&'a self, out: &mut Vec<&'a RuleSet>) {
        if out.iter().any(|seen| std::ptr::eq(*seen, self)) {
            return;
        }
        out.push(self);
        for include in &self.includes {
            include.visit(out);
        }
    }

    /// Looks up an item type declared here or in an included set.
    #[must_use]
    pub fn item_type(&self, name: &str) -> Option<&Arc<ItemType>> {
        self.all_sets()
            .into_iter()
            .flat_map(|set| set.item_types.iter())
            .find(|t| t.name() == name)
    }

    /// Projections in evaluation order: local ones first, then those of
    /// included sets.
    #[must_use]
    pub fn ordered_projections(&self) -> Vec<Arc<Projection>> {
        self.all_sets()
            .into_iter()
            .flat_map(|set| set.projections.iter().cloned())
            .collect()
    }

    /// Every group of this set and its includes, default groups first
    /// within each set.
    pub fn all_groups(&self) -> impl Iterator<Item = &RuleGroup> {
        self.all_sets()
            .into_iter()
            .flat_map(|set| std::iter::once(&set.default_group).chain(&set.groups))
    }

    /// Every skipped entry of this set and its includes.
    #[must_use]
    pub fn all_skipped(&self) -> Vec<&SkippedEntry> {
        self.all_sets()
            .into_iter()
            .flat_map(|set| set.skipped.iter())
            .collect()
    }

    /// Rules that never matched, across this set and its includes.
    #[must_use]
    pub fn unused_rules(&self) -> Vec<Arc<RuleRepresentation>> {
        let mut unused: Vec<Arc<RuleRepresentation>> = Vec::new();
        for rule in self.all_groups().flat_map(RuleGroup::rules) {
            let representation = rule.representation();
            if representation.hits() == 0 && !unused.iter().any(|r| Arc::ptr_eq(r, representation))
            {
                unused.push(Arc::clone(representation));
            }
        }
        unused
    }

    /// Projections that never mapped an item.
    #[must_use]
    pub fn unused_projections(&self) -> Vec<Arc<Projection>> {
        self.ordered_projections()
            .into_iter()
            .filter(|p| p.matches() == 0)
            .collect()
    }
}
