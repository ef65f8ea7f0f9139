//! Wildcard item patterns compiled into per-field matchers.
//!
//! # Pattern language
//!
//! A pattern is split on `:` into one segment per key of the item type;
//! fields sharing a key are written as `;`-separated parts of one segment.
//! Each part compiles to one [`FieldMatcher`]:
//!
//! ```text
//! -               only the empty value
//! * / ** / blank  any value
//! ^regex          raw regex, anchored at the start
//! regex$          raw regex, matched as `.*regex$`
//! **text**        plain substring test (also `text**`, `**text`)
//! A.*(B*)\1       wildcard expansion into an anchored regex
//! ```
//!
//! Groups captured with `(` on the using side of a rule are handed to the
//! used side as an explicit [`MatchResult`] and referenced there as `\N`.

use std::sync::Arc;

use miette::{Diagnostic, SourceSpan};

use crate::item::{Item, ItemType};

mod compiler;
mod field;
mod filter;

pub use compiler::{CompileOptions, PatternCompiler, DEFAULT_CACHE_CAPACITY};
pub use field::{FieldMatcher, RegexMatcher, TextMatcher};
pub use filter::GroupFilter;

/// Outcome of matching one item, carrying the captured groups in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    /// Whether every field matched.
    pub matched: bool,
    /// Captured groups, numbered continuously across fields.
    pub groups: Vec<String>,
}

impl MatchResult {
    /// A failed match.
    #[must_use]
    pub fn no_match() -> Self {
        Self::default()
    }

    /// A successful match with the given groups.
    #[must_use]
    pub fn with_groups(groups: Vec<String>) -> Self {
        Self {
            matched: true,
            groups,
        }
    }

    /// A successful match capturing nothing. Used as the context of
    /// matchers that take no backreferences.
    #[must_use]
    pub fn empty() -> Self {
        Self::with_groups(Vec::new())
    }

    /// Whether the match succeeded.
    #[must_use]
    pub fn is_match(&self) -> bool {
        self.matched
    }

    /// Returns group `n` (1-based).
    #[must_use]
    pub fn group(&self, n: usize) -> Option<&str> {
        n.checked_sub(1)
            .and_then(|i| self.groups.get(i))
            .map(String::as_str)
    }
}

/// A compiled pattern: one [`FieldMatcher`] per field of an item type.
#[derive(Debug, Clone)]
pub struct ItemMatcher {
    pattern: String,
    item_type: Arc<ItemType>,
    fields: Vec<FieldMatcher>,
    group_count: usize,
}

impl ItemMatcher {
    pub(crate) fn new(pattern: &str, item_type: Arc<ItemType>, fields: Vec<FieldMatcher>) -> Self {
        let group_count = fields.iter().map(FieldMatcher::group_count).sum();
        Self {
            pattern: pattern.to_string(),
            item_type,
            fields,
            group_count,
        }
    }

    /// Returns the pattern text this matcher was compiled from.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the item type this matcher was compiled for.
    #[must_use]
    pub fn item_type(&self) -> &Arc<ItemType> {
        &self.item_type
    }

    /// Returns the per-field matchers.
    #[must_use]
    pub fn fields(&self) -> &[FieldMatcher] {
        &self.fields
    }

    /// Total number of groups a successful match produces.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.group_count
    }

    /// Matches `item` field by field, stopping at the first rejection.
    ///
    /// `context` supplies the groups that `\N` backreferences resolve to.
    /// Items of a different type never match.
    #[must_use]
    pub fn matches(&self, item: &Item, context: &MatchResult) -> MatchResult {
        if **item.item_type() != *self.item_type {
            return MatchResult::no_match();
        }
        let mut groups = Vec::with_capacity(self.group_count);
        for (matcher, value) in self.fields.iter().zip(item.values()) {
            match matcher.matches(value, context) {
                Some(captured) => groups.extend(captured),
                None => return MatchResult::no_match(),
            }
        }
        MatchResult::with_groups(groups)
    }

    /// Shorthand for [`matches`](Self::matches) without a backreference context.
    #[must_use]
    pub fn is_match(&self, item: &Item) -> bool {
        self.matches(item, &MatchResult::empty()).is_match()
    }

    /// Whether both matchers are pairwise structurally equal.
    #[must_use]
    pub fn is_alike(&self, other: &Self) -> bool {
        *self.item_type == *other.item_type && self.fields == other.fields
    }
}

/// Errors compiling a pattern. Each one aborts only the rule or
/// projection that owns the pattern.
#[derive(Debug, Clone, thiserror::Error, Diagnostic)]
pub enum PatternError {
    /// A segment does not compile to a valid regex.
    #[error("invalid pattern segment `{segment}`: {reason}")]
    #[diagnostic(code(dep_lint::pattern::invalid_regex))]
    InvalidRegex {
        /// Full pattern text.
        #[source_code]
        pattern: String,
        /// Offending segment.
        #[label("does not compile")]
        span: SourceSpan,
        /// Segment text.
        segment: String,
        /// Regex engine message.
        reason: String,
    },

    /// A segment has more `;` parts than its key has fields.
    #[error("segment `{segment}` has {parts} part(s) but key `{key}` has {fields} field(s)")]
    #[diagnostic(code(dep_lint::pattern::too_many_subfields))]
    TooManySubfields {
        /// Full pattern text.
        #[source_code]
        pattern: String,
        /// Offending segment.
        #[label("too many `;` parts")]
        span: SourceSpan,
        /// Segment text.
        segment: String,
        /// Key of the field group.
        key: String,
        /// Parts written.
        parts: usize,
        /// Fields available.
        fields: usize,
    },

    /// A `\N` refers to a group that is not available.
    #[error("backreference \\{index} has no group to refer to ({available} available)")]
    #[diagnostic(
        code(dep_lint::pattern::invalid_backreference),
        help("backreferences refer to groups captured with `(` by the using pattern or projection source")
    )]
    InvalidBackreference {
        /// Full pattern text.
        #[source_code]
        pattern: String,
        /// Segment holding the backreference.
        #[label("unresolvable backreference")]
        span: SourceSpan,
        /// Referenced group number.
        index: usize,
        /// Number of groups available.
        available: usize,
    },

    /// A projection lists more target templates than the target type has fields.
    #[error("{targets} target template(s) given but item type `{type_name}` has {arity} field(s)")]
    #[diagnostic(code(dep_lint::pattern::too_many_targets))]
    TooManyTargets {
        /// Target item type.
        type_name: String,
        /// Templates given.
        targets: usize,
        /// Target arity.
        arity: usize,
    },
}
