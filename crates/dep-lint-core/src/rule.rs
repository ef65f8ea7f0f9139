//! Dependency rules: a using pattern, a used pattern and a verdict kind.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::item::{Dependency, ItemType};
use crate::pattern::{CompileOptions, ItemMatcher, MatchResult, PatternCompiler, PatternError};
use crate::types::Location;

/// What a matching rule says about a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    /// The dependency is allowed.
    MayUse,
    /// The dependency is allowed but questionable.
    MayUseWithWarning,
    /// The dependency is forbidden.
    MustNotUse,
}

impl RuleKind {
    /// Returns the arrow used in rule text (`--->`, `---?`, `---!`).
    #[must_use]
    pub fn arrow(self) -> &'static str {
        match self {
            Self::MayUse => "--->",
            Self::MayUseWithWarning => "---?",
            Self::MustNotUse => "---!",
        }
    }

    /// Parses an arrow back into a kind.
    #[must_use]
    pub fn from_arrow(arrow: &str) -> Option<Self> {
        match arrow {
            "--->" => Some(Self::MayUse),
            "---?" => Some(Self::MayUseWithWarning),
            "---!" => Some(Self::MustNotUse),
            _ => None,
        }
    }

    /// Splits `"A ---> B"` into its using pattern, kind and used pattern.
    #[must_use]
    pub fn split_rule(text: &str) -> Option<(&str, Self, &str)> {
        [Self::MayUse, Self::MayUseWithWarning, Self::MustNotUse]
            .into_iter()
            .find_map(|kind| {
                text.split_once(kind.arrow())
                    .map(|(using, used)| (using.trim(), kind, used.trim()))
            })
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MayUse => write!(f, "may-use"),
            Self::MayUseWithWarning => write!(f, "may-use-with-warning"),
            Self::MustNotUse => write!(f, "must-not-use"),
        }
    }
}

impl FromStr for RuleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "may-use" | "allowed" => Ok(Self::MayUse),
            "may-use-with-warning" | "questionable" => Ok(Self::MayUseWithWarning),
            "must-not-use" | "forbidden" => Ok(Self::MustNotUse),
            _ => Err(format!("unknown rule kind: {s}")),
        }
    }
}

/// Input for [`DependencyRule::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDefinition {
    /// Pattern for the using item.
    pub using: String,
    /// Pattern for the used item. May refer to using groups as `\N`.
    pub used: String,
    /// Verdict of the rule.
    pub kind: RuleKind,
    /// Display text. Empty means "derive from the patterns".
    pub text: String,
    /// Where the rule was written.
    pub origin: Option<Location>,
}

impl RuleDefinition {
    /// Creates a definition with text derived from the patterns.
    #[must_use]
    pub fn new(using: impl Into<String>, kind: RuleKind, used: impl Into<String>) -> Self {
        Self {
            using: using.into(),
            used: used.into(),
            kind,
            text: String::new(),
            origin: None,
        }
    }

    /// Sets the rule's origin.
    #[must_use]
    pub fn with_origin(mut self, origin: Location) -> Self {
        self.origin = Some(origin);
        self
    }

    fn display_text(&self) -> String {
        if self.text.is_empty() {
            format!("{} {} {}", self.using, self.kind.arrow(), self.used)
        } else {
            self.text.clone()
        }
    }
}

/// The user-facing identity of a rule, shared by every compiled copy of it.
///
/// The hit counter is shared, so counts from per-worker clones of a
/// rule group add up here.
#[derive(Debug)]
pub struct RuleRepresentation {
    text: String,
    origin: Option<Location>,
    hits: AtomicUsize,
}

impl RuleRepresentation {
    /// Returns the rule text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns where the rule was written.
    #[must_use]
    pub fn origin(&self) -> Option<&Location> {
        self.origin.as_ref()
    }

    /// Returns how often any copy of the rule matched.
    #[must_use]
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }
}

impl fmt::Display for RuleRepresentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Some(origin) => write!(f, "{} ({origin})", self.text),
            None => write!(f, "{}", self.text),
        }
    }
}

/// A compiled rule.
///
/// A clone remembers the hits it started with, so that merging a worker's
/// clone back only adds what the worker counted itself.
#[derive(Debug)]
pub struct DependencyRule {
    using: ItemMatcher,
    used: ItemMatcher,
    kind: RuleKind,
    representation: Arc<RuleRepresentation>,
    hits: usize,
    inherited_hits: usize,
}

impl Clone for DependencyRule {
    fn clone(&self) -> Self {
        Self {
            using: self.using.clone(),
            used: self.used.clone(),
            kind: self.kind,
            representation: Arc::clone(&self.representation),
            hits: self.hits,
            inherited_hits: self.hits,
        }
    }
}

impl DependencyRule {
    /// Compiles a rule for the given item types.
    ///
    /// Groups captured by the using pattern are available to the used
    /// pattern as `\1`, `\2`, ...
    ///
    /// # Errors
    ///
    /// Returns an error if either pattern does not compile.
    pub fn new(
        compiler: &PatternCompiler,
        using_type: &Arc<ItemType>,
        used_type: &Arc<ItemType>,
        definition: RuleDefinition,
    ) -> Result<Self, PatternError> {
        let using = compiler.compile(using_type, &definition.using)?;
        let used = compiler.compile_with(
            used_type,
            &definition.used,
            CompileOptions {
                expected_groups: using.group_count(),
                capture_wildcards: false,
            },
        )?;
        let representation = Arc::new(RuleRepresentation {
            text: definition.display_text(),
            origin: definition.origin,
            hits: AtomicUsize::new(0),
        });

        Ok(Self {
            using,
            used,
            kind: definition.kind,
            representation,
            hits: 0,
            inherited_hits: 0,
        })
    }

    /// Returns the rule's verdict kind.
    #[must_use]
    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    /// Returns the using-side matcher.
    #[must_use]
    pub fn using(&self) -> &ItemMatcher {
        &self.using
    }

    /// Returns the used-side matcher.
    #[must_use]
    pub fn used(&self) -> &ItemMatcher {
        &self.used
    }

    /// Returns the shared representation.
    #[must_use]
    pub fn representation(&self) -> &Arc<RuleRepresentation> {
        &self.representation
    }

    /// Returns how often this copy of the rule matched.
    #[must_use]
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Hits counted since this copy was cloned.
    #[must_use]
    pub fn hits_since_clone(&self) -> usize {
        self.hits - self.inherited_hits
    }

    pub(crate) fn add_hits(&mut self, hits: usize) {
        self.hits += hits;
    }

    /// Whether both rules have the same kind and alike matchers.
    #[must_use]
    pub fn is_alike(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.using.is_alike(&other.using)
            && self.used.is_alike(&other.used)
    }

    /// Tests `dependency` against the rule, counting a hit on success.
    pub fn is_match(&mut self, dependency: &Dependency) -> bool {
        if **dependency.using().item_type() != **self.using.item_type()
            || **dependency.used().item_type() != **self.used.item_type()
        {
            return false;
        }

        let using = self.using.matches(dependency.using(), &MatchResult::empty());
        if !using.is_match() {
            return false;
        }
        if !self.used.matches(dependency.used(), &using).is_match() {
            return false;
        }

        self.hits += 1;
        self.representation.hits.fetch_add(1, Ordering::Relaxed);
        true
    }
}

impl fmt::Display for DependencyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.representation.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Item;

    fn class_type() -> Arc<ItemType> {
        Arc::new(ItemType::new("CLASS", ["NAMESPACE", "CLASS"], false).unwrap())
    }

    fn dep(using: [&str; 2], used: [&str; 2]) -> Dependency {
        let t = class_type();
        Dependency::new(Item::new(&t, using).unwrap(), Item::new(&t, used).unwrap(), 1)
    }

    fn rule(using: &str, kind: RuleKind, used: &str) -> DependencyRule {
        let t = class_type();
        DependencyRule::new(
            &PatternCompiler::default(),
            &t,
            &t,
            RuleDefinition::new(using, kind, used),
        )
        .unwrap()
    }

    #[test]
    fn backreference_correlates_both_sides() {
        let mut r = rule("(*):*", RuleKind::MayUse, r"\1:*");
        assert!(r.is_match(&dep(["Pkg1", "X"], ["Pkg1", "Y"])));
        assert!(!r.is_match(&dep(["Pkg1", "X"], ["Pkg2", "Y"])));
        assert_eq!(r.hits(), 1);
        assert_eq!(r.representation().hits(), 1);
    }

    #[test]
    fn used_side_backreference_without_group_is_rejected() {
        let t = class_type();
        let err = DependencyRule::new(
            &PatternCompiler::default(),
            &t,
            &t,
            RuleDefinition::new("*:*", RuleKind::MayUse, r"\1:*"),
        )
        .unwrap_err();
        assert!(matches!(err, PatternError::InvalidBackreference { .. }));
    }

    #[test]
    fn type_mismatch_does_not_apply() {
        let mut r = rule("**", RuleKind::MayUse, "**");
        let file = Arc::new(ItemType::new("FILE", ["PATH"], false).unwrap());
        let d = Dependency::new(
            Item::new(&file, ["a.rs"]).unwrap(),
            Item::new(&file, ["b.rs"]).unwrap(),
            1,
        );
        assert!(!r.is_match(&d));
        assert_eq!(r.hits(), 0);
    }

    #[test]
    fn clones_share_the_representation_counter() {
        let mut a = rule("**", RuleKind::MayUse, "**");
        let mut b = a.clone();
        a.is_match(&dep(["x", "y"], ["z", "w"]));
        b.is_match(&dep(["x", "y"], ["z", "w"]));
        assert_eq!(a.hits(), 1);
        assert_eq!(b.hits(), 1);
        assert_eq!(a.representation().hits(), 2);
    }

    #[test]
    fn text_defaults_to_arrow_form() {
        let r = rule("a.**", RuleKind::MustNotUse, "b.**");
        assert_eq!(r.to_string(), "a.** ---! b.**");
    }

    #[test]
    fn arrow_shorthand_round_trips() {
        assert_eq!(
            RuleKind::split_rule("a.** ---? b.**"),
            Some(("a.**", RuleKind::MayUseWithWarning, "b.**"))
        );
        assert_eq!(RuleKind::split_rule("a.** -> b.**"), None);
        assert_eq!(RuleKind::from_arrow("---!"), Some(RuleKind::MustNotUse));
        assert_eq!("forbidden".parse::<RuleKind>(), Ok(RuleKind::MustNotUse));
    }

    #[test]
    fn alike_rules() {
        let a = rule("a.**", RuleKind::MayUse, "b.**");
        let b = rule("a.**", RuleKind::MayUse, "b.**");
        let c = rule("a.**", RuleKind::MustNotUse, "b.**");
        assert!(a.is_alike(&b));
        assert!(!a.is_alike(&c));
    }
}
