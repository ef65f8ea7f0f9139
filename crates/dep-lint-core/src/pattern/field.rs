//! Per-field matchers.

use std::borrow::Cow;
use std::fmt;

use moka::sync::Cache;
use regex::{Regex, RegexBuilder};

use super::MatchResult;

/// One piece of a regex source: literal regex text or a backreference
/// to a group captured by another pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RegexPiece {
    Raw(String),
    Backref(usize),
}

/// Regex source with unresolved `\N` backreferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RegexTemplate {
    pieces: Vec<RegexPiece>,
}

impl RegexTemplate {
    pub(crate) fn new(pieces: Vec<RegexPiece>) -> Self {
        // Merge adjacent raw pieces so structurally equal sources compare equal.
        let mut merged: Vec<RegexPiece> = Vec::with_capacity(pieces.len());
        for piece in pieces {
            if let RegexPiece::Raw(text) = &piece {
                if let Some(RegexPiece::Raw(last)) = merged.last_mut() {
                    last.push_str(text);
                    continue;
                }
            }
            merged.push(piece);
        }
        Self { pieces: merged }
    }

    pub(crate) fn backrefs(&self) -> impl Iterator<Item = usize> + '_ {
        self.pieces.iter().filter_map(|p| match p {
            RegexPiece::Backref(n) => Some(*n),
            RegexPiece::Raw(_) => None,
        })
    }

    pub(crate) fn has_backrefs(&self) -> bool {
        self.backrefs().next().is_some()
    }

    /// Renders the template, substituting `values[i]` (regex-escaped) for
    /// the i-th backreference occurrence.
    pub(crate) fn render(&self, values: &[String]) -> String {
        let mut source = String::new();
        let mut next = values.iter();
        for piece in &self.pieces {
            match piece {
                RegexPiece::Raw(text) => source.push_str(text),
                RegexPiece::Backref(_) => {
                    if let Some(value) = next.next() {
                        source.push_str(&regex::escape(value));
                    }
                }
            }
        }
        source
    }
}

impl fmt::Display for RegexTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for piece in &self.pieces {
            match piece {
                RegexPiece::Raw(text) => write!(f, "{text}")?,
                RegexPiece::Backref(n) => write!(f, "\\{n}")?,
            }
        }
        Ok(())
    }
}

/// A plain-string needle for the substring matchers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMatcher {
    needle: String,
    ignore_case: bool,
}

impl TextMatcher {
    pub(crate) fn new(needle: &str, ignore_case: bool) -> Self {
        let needle = if ignore_case {
            needle.to_lowercase()
        } else {
            needle.to_string()
        };
        Self {
            needle,
            ignore_case,
        }
    }

    /// Returns the (case-folded) needle.
    #[must_use]
    pub fn needle(&self) -> &str {
        &self.needle
    }

    fn fold<'a>(&self, value: &'a str) -> Cow<'a, str> {
        if self.ignore_case {
            Cow::Owned(value.to_lowercase())
        } else {
            Cow::Borrowed(value)
        }
    }
}

type CorrelatedKey = (Vec<String>, String);

#[derive(Clone)]
enum Compiled {
    /// No backreferences: one regex, results memoized by value.
    Fixed {
        regex: Regex,
        results: Cache<String, Option<Vec<String>>>,
    },
    /// Backreferences: one regex per distinct set of referenced values.
    Correlated {
        regexes: Cache<Vec<String>, Regex>,
        results: Cache<CorrelatedKey, Option<Vec<String>>>,
    },
}

/// A regex matcher, memoizing results per value.
#[derive(Clone)]
pub struct RegexMatcher {
    template: RegexTemplate,
    ignore_case: bool,
    group_count: usize,
    compiled: Compiled,
}

impl RegexMatcher {
    /// Compiles `template`. A template with backreferences is validated
    /// by compiling it with every backreference rendered empty.
    pub(crate) fn new(
        template: RegexTemplate,
        ignore_case: bool,
        cache_capacity: u64,
    ) -> Result<Self, regex::Error> {
        let probe_values = vec![String::new(); template.backrefs().count()];
        let probe = build_regex(&template.render(&probe_values), ignore_case)?;
        let group_count = probe.captures_len().saturating_sub(1);

        let compiled = if template.has_backrefs() {
            Compiled::Correlated {
                regexes: Cache::new(cache_capacity),
                results: Cache::new(cache_capacity),
            }
        } else {
            Compiled::Fixed {
                regex: probe,
                results: Cache::new(cache_capacity),
            }
        };

        Ok(Self {
            template,
            ignore_case,
            group_count,
            compiled,
        })
    }

    /// Regex source, with backreferences shown as `\N`.
    #[must_use]
    pub fn source(&self) -> String {
        self.template.to_string()
    }

    /// Number of groups this matcher captures.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.group_count
    }

    /// Whether this matcher consumes groups from a match context.
    #[must_use]
    pub fn is_correlated(&self) -> bool {
        matches!(self.compiled, Compiled::Correlated { .. })
    }

    fn matches(&self, value: &str, context: &MatchResult) -> Option<Vec<String>> {
        match &self.compiled {
            Compiled::Fixed { regex, results } => {
                if let Some(hit) = results.get(value) {
                    return hit;
                }
                let result = capture_groups(regex, value, self.group_count);
                results.insert(value.to_string(), result.clone());
                result
            }
            Compiled::Correlated { regexes, results } => {
                let mut referenced = Vec::new();
                for n in self.template.backrefs() {
                    let Some(group) = context.group(n) else {
                        tracing::debug!(
                            "backreference \\{n} in `{}` has no group in context",
                            self.template
                        );
                        return None;
                    };
                    referenced.push(group.to_string());
                }

                let key = (referenced, value.to_string());
                if let Some(hit) = results.get(&key) {
                    return hit;
                }

                let regex = match regexes.get(&key.0) {
                    Some(regex) => regex,
                    None => match build_regex(&self.template.render(&key.0), self.ignore_case) {
                        Ok(regex) => {
                            regexes.insert(key.0.clone(), regex.clone());
                            regex
                        }
                        Err(e) => {
                            tracing::warn!("correlated pattern `{}` failed: {e}", self.template);
                            return None;
                        }
                    },
                };

                let result = capture_groups(&regex, value, self.group_count);
                results.insert(key, result.clone());
                result
            }
        }
    }
}

impl PartialEq for RegexMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.template == other.template && self.ignore_case == other.ignore_case
    }
}

impl fmt::Debug for RegexMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegexMatcher")
            .field("source", &self.template.to_string())
            .field("ignore_case", &self.ignore_case)
            .field("group_count", &self.group_count)
            .finish_non_exhaustive()
    }
}

fn build_regex(source: &str, ignore_case: bool) -> Result<Regex, regex::Error> {
    RegexBuilder::new(source).case_insensitive(ignore_case).build()
}

fn capture_groups(regex: &Regex, value: &str, group_count: usize) -> Option<Vec<String>> {
    let caps = regex.captures(value)?;
    Some(
        (1..=group_count)
            .map(|i| caps.get(i).map_or_else(String::new, |m| m.as_str().to_string()))
            .collect(),
    )
}

/// A compiled matcher for one field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldMatcher {
    /// Matches any value.
    Always,
    /// Matches only the empty value.
    EmptyOnly,
    /// Value contains the needle.
    Contains(TextMatcher),
    /// Value starts with the needle.
    StartsWith(TextMatcher),
    /// Value ends with the needle.
    EndsWith(TextMatcher),
    /// General regex, possibly capturing and possibly correlated.
    Regex(RegexMatcher),
}

impl FieldMatcher {
    /// Matches `value`, returning the captured groups on success.
    ///
    /// `context` resolves `\N` backreferences of correlated matchers.
    #[must_use]
    pub fn matches(&self, value: &str, context: &MatchResult) -> Option<Vec<String>> {
        match self {
            Self::Always => Some(Vec::new()),
            Self::EmptyOnly => value.is_empty().then(Vec::new),
            Self::Contains(t) => t.fold(value).contains(t.needle.as_str()).then(Vec::new),
            Self::StartsWith(t) => t.fold(value).starts_with(t.needle.as_str()).then(Vec::new),
            Self::EndsWith(t) => t.fold(value).ends_with(t.needle.as_str()).then(Vec::new),
            Self::Regex(r) => r.matches(value, context),
        }
    }

    /// Number of groups a successful match produces.
    #[must_use]
    pub fn group_count(&self) -> usize {
        match self {
            Self::Regex(r) => r.group_count(),
            Self::Always
            | Self::EmptyOnly
            | Self::Contains(_)
            | Self::StartsWith(_)
            | Self::EndsWith(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regex(pieces: Vec<RegexPiece>) -> RegexMatcher {
        RegexMatcher::new(RegexTemplate::new(pieces), false, 64).unwrap()
    }

    #[test]
    fn text_matchers() {
        let ctx = MatchResult::empty();
        let contains = FieldMatcher::Contains(TextMatcher::new("acme", false));
        let starts = FieldMatcher::StartsWith(TextMatcher::new("com.", false));
        let ends = FieldMatcher::EndsWith(TextMatcher::new("Impl", false));
        assert!(contains.matches("com.acme.x", &ctx).is_some());
        assert!(contains.matches("com.other", &ctx).is_none());
        assert!(starts.matches("com.acme", &ctx).is_some());
        assert!(starts.matches("org.com.x", &ctx).is_none());
        assert!(ends.matches("ServiceImpl", &ctx).is_some());
        assert!(ends.matches("ImplService", &ctx).is_none());
    }

    #[test]
    fn text_matcher_ignore_case() {
        let ctx = MatchResult::empty();
        let m = FieldMatcher::Contains(TextMatcher::new("ACME", true));
        assert!(m.matches("com.Acme.x", &ctx).is_some());
    }

    #[test]
    fn empty_only_and_always() {
        let ctx = MatchResult::empty();
        assert!(FieldMatcher::EmptyOnly.matches("", &ctx).is_some());
        assert!(FieldMatcher::EmptyOnly.matches("x", &ctx).is_none());
        assert!(FieldMatcher::Always.matches("anything", &ctx).is_some());
    }

    #[test]
    fn fixed_regex_is_memoized_and_stable() {
        let m = regex(vec![RegexPiece::Raw("^(a+)b$".into())]);
        let ctx = MatchResult::empty();
        let first = m.matches("aab", &ctx);
        let second = m.matches("aab", &ctx);
        assert_eq!(first, Some(vec!["aa".to_string()]));
        assert_eq!(first, second);
        assert_eq!(m.matches("b", &ctx), None);
    }

    #[test]
    fn correlated_regex_uses_context_groups() {
        let m = regex(vec![
            RegexPiece::Raw("^".into()),
            RegexPiece::Backref(1),
            RegexPiece::Raw("$".into()),
        ]);
        assert!(m.is_correlated());
        let pkg1 = MatchResult::with_groups(vec!["Pkg1".into()]);
        let pkg2 = MatchResult::with_groups(vec!["Pkg2".into()]);
        assert!(m.matches("Pkg1", &pkg1).is_some());
        assert!(m.matches("Pkg1", &pkg2).is_none());
    }

    #[test]
    fn correlated_values_are_escaped() {
        let m = regex(vec![
            RegexPiece::Raw("^".into()),
            RegexPiece::Backref(1),
            RegexPiece::Raw(r"\..*$".into()),
        ]);
        let ctx = MatchResult::with_groups(vec!["a.b".into()]);
        assert!(m.matches("a.b.c", &ctx).is_some());
        assert!(m.matches("axb.c", &ctx).is_none());
    }

    #[test]
    fn correlated_without_context_group_fails() {
        let m = regex(vec![RegexPiece::Backref(2)]);
        let ctx = MatchResult::with_groups(vec!["only-one".into()]);
        assert!(m.matches("x", &ctx).is_none());
    }

    #[test]
    fn template_merges_raw_pieces() {
        let a = RegexTemplate::new(vec![RegexPiece::Raw("a".into()), RegexPiece::Raw("b".into())]);
        let b = RegexTemplate::new(vec![RegexPiece::Raw("ab".into())]);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "ab");
    }

    #[test]
    fn structural_equality_ignores_caches() {
        let a = regex(vec![RegexPiece::Raw("^x$".into())]);
        let b = regex(vec![RegexPiece::Raw("^x$".into())]);
        let _ = a.matches("x", &MatchResult::empty());
        assert_eq!(FieldMatcher::Regex(a), FieldMatcher::Regex(b));
    }
}
