//! Wildcard pattern compilation.
//!
//! Parts are classified cheapest first: empty-only, always, raw regex
//! anchors, plain substring tests, and finally wildcard expansion into
//! an anchored regex.

use std::sync::Arc;

use miette::SourceSpan;

use super::field::{FieldMatcher, RegexMatcher, RegexPiece, RegexTemplate, TextMatcher};
use super::{ItemMatcher, PatternError};
use crate::item::ItemType;

/// Default bound for each matcher's memo cache.
pub const DEFAULT_CACHE_CAPACITY: u64 = 4096;

/// One or more characters that are not `.`, `/` or `\`.
const NON_SEPARATORS: &str = r"[^./\\]+";
/// Zero or more characters that are not `.`, `/` or `\`.
const ANY_NON_SEPARATORS: &str = r"[^./\\]*";
/// Anything, separators included.
const ANY: &str = ".*";

/// Options for [`PatternCompiler::compile_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Groups available to `\N` backreferences, i.e. captured by the
    /// using pattern of the same rule.
    pub expected_groups: usize,
    /// Make every wildcard a capture group, unless the pattern already
    /// contains a literal `(`. Used for projection sources.
    pub capture_wildcards: bool,
}

/// Compiles wildcard patterns into [`ItemMatcher`]s.
#[derive(Debug, Clone)]
pub struct PatternCompiler {
    cache_capacity: u64,
}

impl Default for PatternCompiler {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl PatternCompiler {
    /// Creates a compiler whose regex matchers memoize up to
    /// `cache_capacity` results each.
    #[must_use]
    pub fn new(cache_capacity: u64) -> Self {
        Self { cache_capacity }
    }

    /// Returns the per-matcher cache bound.
    #[must_use]
    pub fn cache_capacity(&self) -> u64 {
        self.cache_capacity
    }

    /// Compiles `pattern` for `item_type` with default options.
    ///
    /// # Errors
    ///
    /// Returns an error if a segment does not compile.
    pub fn compile(
        &self,
        item_type: &Arc<ItemType>,
        pattern: &str,
    ) -> Result<ItemMatcher, PatternError> {
        self.compile_with(item_type, pattern, CompileOptions::default())
    }

    /// Compiles `pattern` for `item_type`.
    ///
    /// A leading segment equal to the type name is dropped. Segments
    /// beyond the type's keys are ignored; missing segments and parts
    /// match anything.
    ///
    /// # Errors
    ///
    /// Returns an error if a segment has more `;` parts than its key has
    /// fields, a part is not a valid regex, or a backreference has no
    /// group to refer to.
    pub fn compile_with(
        &self,
        item_type: &Arc<ItemType>,
        pattern: &str,
        options: CompileOptions,
    ) -> Result<ItemMatcher, PatternError> {
        let mut segments = split_with_offsets(pattern, ':', 0);
        if segments.len() > 1 && segments[0].1 == item_type.name() {
            segments.remove(0);
        }

        let groups = item_type.key_groups();
        if segments.len() > groups.len() {
            tracing::debug!(
                "pattern `{pattern}` has {} segment(s) for {} key(s) of {}, ignoring the rest",
                segments.len(),
                groups.len(),
                item_type.name()
            );
            segments.truncate(groups.len());
        }

        let parts_compiler = PartCompiler {
            pattern,
            ignore_case: item_type.ignore_case(),
            capture_wildcards: options.capture_wildcards && !pattern.contains('('),
            expected_groups: options.expected_groups,
            cache_capacity: self.cache_capacity,
        };

        let mut fields = Vec::with_capacity(item_type.arity());
        for (index, range) in groups.iter().enumerate() {
            let Some(&(offset, segment)) = segments.get(index) else {
                fields.extend(range.clone().map(|_| FieldMatcher::Always));
                continue;
            };

            let parts = split_with_offsets(segment, ';', offset);
            if parts.len() > range.len() {
                return Err(PatternError::TooManySubfields {
                    pattern: pattern.to_string(),
                    span: span(offset, segment),
                    segment: segment.to_string(),
                    key: item_type.fields()[range.start].key().to_string(),
                    parts: parts.len(),
                    fields: range.len(),
                });
            }

            for slot in 0..range.len() {
                let matcher = match parts.get(slot) {
                    Some(&(part_offset, part)) => parts_compiler.compile(part, part_offset)?,
                    None => FieldMatcher::Always,
                };
                fields.push(matcher);
            }
        }

        Ok(ItemMatcher::new(pattern, Arc::clone(item_type), fields))
    }
}

struct PartCompiler<'a> {
    pattern: &'a str,
    ignore_case: bool,
    capture_wildcards: bool,
    expected_groups: usize,
    cache_capacity: u64,
}

impl PartCompiler<'_> {
    fn compile(&self, part: &str, offset: usize) -> Result<FieldMatcher, PatternError> {
        let regex = match classify(part.trim(), self.capture_wildcards) {
            PartKind::EmptyOnly => return Ok(FieldMatcher::EmptyOnly),
            PartKind::Always => return Ok(FieldMatcher::Always),
            PartKind::Contains(text) => {
                return Ok(FieldMatcher::Contains(TextMatcher::new(text, self.ignore_case)))
            }
            PartKind::StartsWith(text) => {
                return Ok(FieldMatcher::StartsWith(TextMatcher::new(
                    text,
                    self.ignore_case,
                )))
            }
            PartKind::EndsWith(text) => {
                return Ok(FieldMatcher::EndsWith(TextMatcher::new(text, self.ignore_case)))
            }
            PartKind::Regex { body, anchor } => anchor.wrap_full(body),
        };

        let template = RegexTemplate::new(regex);
        if let Some(index) = template
            .backrefs()
            .find(|&n| n == 0 || n > self.expected_groups)
        {
            return Err(PatternError::InvalidBackreference {
                pattern: self.pattern.to_string(),
                span: span(offset, part),
                index,
                available: self.expected_groups,
            });
        }

        RegexMatcher::new(template, self.ignore_case, self.cache_capacity)
            .map(FieldMatcher::Regex)
            .map_err(|e| PatternError::InvalidRegex {
                pattern: self.pattern.to_string(),
                span: span(offset, part),
                segment: part.to_string(),
                reason: e.to_string(),
            })
    }
}

/// How the body of a regex part is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Anchor {
    /// Wildcard expansion: the whole value must match.
    Full,
    /// `^regex`: anchored at the start only.
    Start,
    /// `regex$`: anchored at the end only.
    End,
}

impl Anchor {
    /// Wraps `body` so it is evaluated against a whole field value.
    fn wrap_full(self, body: Vec<RegexPiece>) -> Vec<RegexPiece> {
        let (open, close) = match self {
            Self::Full => ("^(?:", ")$"),
            Self::Start => ("^(?:", ")"),
            Self::End => ("^.*(?:", ")$"),
        };
        let mut pieces = Vec::with_capacity(body.len() + 2);
        pieces.push(RegexPiece::Raw(open.to_string()));
        pieces.extend(body);
        pieces.push(RegexPiece::Raw(close.to_string()));
        pieces
    }
}

/// Classification of one pattern part.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PartKind<'a> {
    EmptyOnly,
    Always,
    Contains(&'a str),
    StartsWith(&'a str),
    EndsWith(&'a str),
    Regex {
        body: Vec<RegexPiece>,
        anchor: Anchor,
    },
}

pub(crate) fn classify(part: &str, capture_wildcards: bool) -> PartKind<'_> {
    if part == "-" {
        return PartKind::EmptyOnly;
    }
    if part.chars().all(|c| c == '*') && !(capture_wildcards && !part.is_empty()) {
        return PartKind::Always;
    }
    if let Some(body) = part.strip_prefix('^') {
        return PartKind::Regex {
            body: split_backrefs(body),
            anchor: Anchor::Start,
        };
    }
    if let Some(body) = part.strip_suffix('$') {
        return PartKind::Regex {
            body: split_backrefs(body),
            anchor: Anchor::End,
        };
    }
    if !capture_wildcards {
        if let Some(kind) = plain_text(part) {
            return kind;
        }
    }
    PartKind::Regex {
        body: expand_wildcards(part, capture_wildcards),
        anchor: Anchor::Full,
    }
}

/// `**text**`, `text**` and `**text` without regex syntax in `text`.
fn plain_text(part: &str) -> Option<PartKind<'_>> {
    let (leading, rest) = match part.strip_prefix("**") {
        Some(rest) => (true, rest),
        None => (false, part),
    };
    let (trailing, text) = match rest.strip_suffix("**") {
        Some(text) => (true, text),
        None => (false, rest),
    };
    if !(leading || trailing)
        || text.is_empty()
        || text.chars().any(|c| c != '.' && is_regex_meta(c))
    {
        return None;
    }
    Some(match (leading, trailing) {
        (true, true) => PartKind::Contains(text),
        (false, true) => PartKind::StartsWith(text),
        _ => PartKind::EndsWith(text),
    })
}

fn is_regex_meta(c: char) -> bool {
    matches!(
        c,
        '\\' | '^' | '$' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '.'
    )
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Expands `*`, `**`, `.` and `\N` into regex pieces.
fn expand_wildcards(part: &str, capture: bool) -> Vec<RegexPiece> {
    let chars: Vec<char> = part.chars().collect();
    let mut pieces = Vec::new();
    let mut raw = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' => {
                let start = i;
                while i < chars.len() && chars[i] == '*' {
                    i += 1;
                }
                let body = if i - start >= 2 {
                    ANY
                } else if (start > 0 && is_word(chars[start - 1]))
                    || (i < chars.len() && is_word(chars[i]))
                {
                    ANY_NON_SEPARATORS
                } else {
                    NON_SEPARATORS
                };
                if capture {
                    raw.push('(');
                    raw.push_str(body);
                    raw.push(')');
                } else {
                    raw.push_str(body);
                }
                continue;
            }
            '.' => raw.push_str(r"\."),
            '\\' => {
                i = push_escape(&chars, i, &mut raw, &mut pieces);
                continue;
            }
            c => raw.push(c),
        }
        i += 1;
    }

    if !raw.is_empty() {
        pieces.push(RegexPiece::Raw(raw));
    }
    pieces
}

/// Splits raw regex text at `\N` backreferences.
fn split_backrefs(text: &str) -> Vec<RegexPiece> {
    let chars: Vec<char> = text.chars().collect();
    let mut pieces = Vec::new();
    let mut raw = String::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '\\' {
            i = push_escape(&chars, i, &mut raw, &mut pieces);
        } else {
            raw.push(chars[i]);
            i += 1;
        }
    }

    if !raw.is_empty() {
        pieces.push(RegexPiece::Raw(raw));
    }
    pieces
}

/// Handles the backslash at `chars[i]`; returns the index after the escape.
fn push_escape(chars: &[char], i: usize, raw: &mut String, pieces: &mut Vec<RegexPiece>) -> usize {
    let digits: String = chars[i + 1..]
        .iter()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if let Ok(n) = digits.parse::<usize>() {
        if !raw.is_empty() {
            pieces.push(RegexPiece::Raw(std::mem::take(raw)));
        }
        pieces.push(RegexPiece::Backref(n));
        return i + 1 + digits.len();
    }
    match chars.get(i + 1) {
        Some(&next) => {
            raw.push('\\');
            raw.push(next);
            i + 2
        }
        None => {
            raw.push_str(r"\\");
            i + 1
        }
    }
}

/// Splits `text` at `sep`, keeping each piece's byte offset (plus `base`).
pub(crate) fn split_with_offsets(text: &str, sep: char, base: usize) -> Vec<(usize, &str)> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if c == sep {
            pieces.push((base + start, &text[start..i]));
            start = i + c.len_utf8();
        }
    }
    pieces.push((base + start, &text[start..]));
    pieces
}

fn span(offset: usize, text: &str) -> SourceSpan {
    SourceSpan::from((offset, text.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Item;
    use crate::pattern::MatchResult;

    fn class_type() -> Arc<ItemType> {
        Arc::new(ItemType::new("CLASS", ["NAMESPACE", "CLASS"], false).unwrap())
    }

    fn item(values: [&str; 2]) -> Item {
        Item::new(&class_type(), values).unwrap()
    }

    fn compile(pattern: &str) -> ItemMatcher {
        PatternCompiler::default()
            .compile(&class_type(), pattern)
            .unwrap()
    }

    // ── classification ──

    #[test]
    fn classifies_cheapest_case_first() {
        assert_eq!(classify("-", false), PartKind::EmptyOnly);
        assert_eq!(classify("", false), PartKind::Always);
        assert_eq!(classify("***", false), PartKind::Always);
        assert_eq!(classify("**acme**", false), PartKind::Contains("acme"));
        assert_eq!(classify("com.acme**", false), PartKind::StartsWith("com.acme"));
        assert_eq!(classify("**Impl", false), PartKind::EndsWith("Impl"));
        assert!(matches!(
            classify("^com", false),
            PartKind::Regex {
                anchor: Anchor::Start,
                ..
            }
        ));
        assert!(matches!(
            classify("Impl$", false),
            PartKind::Regex {
                anchor: Anchor::End,
                ..
            }
        ));
        assert!(matches!(
            classify("A.*", false),
            PartKind::Regex {
                anchor: Anchor::Full,
                ..
            }
        ));
    }

    #[test]
    fn plain_text_requires_no_regex_syntax() {
        assert!(matches!(classify("**a+b**", false), PartKind::Regex { .. }));
        assert!(matches!(classify("**(a)**", false), PartKind::Regex { .. }));
        assert!(matches!(classify("***x", false), PartKind::Regex { .. }));
    }

    #[test]
    fn capture_mode_skips_plain_text() {
        assert!(matches!(
            classify("com.acme**", true),
            PartKind::Regex { .. }
        ));
    }

    // ── wildcard expansion ──

    #[test]
    fn lone_star_needs_at_least_one_character() {
        let m = compile("A.*:**");
        assert!(m.is_match(&item(["A.Foo", "x"])));
        assert!(!m.is_match(&item(["A.", "x"])));
        assert!(!m.is_match(&item(["A.Foo.Bar", "x"])));
    }

    #[test]
    fn star_next_to_letter_may_be_empty() {
        let m = compile("**:Legacy*");
        assert!(m.is_match(&item(["x", "Legacy"])));
        assert!(m.is_match(&item(["x", "LegacyUtil"])));
        assert!(!m.is_match(&item(["x", "OldLegacy"])));
    }

    #[test]
    fn double_star_crosses_separators() {
        let m = compile("com.**.impl:*");
        assert!(m.is_match(&item(["com.acme.billing.impl", "X"])));
        let single = compile("com.*.impl:*");
        assert!(!single.is_match(&item(["com.acme.billing.impl", "X"])));
        assert!(single.is_match(&item(["com.acme.impl", "X"])));
    }

    #[test]
    fn literal_dot_is_escaped() {
        let m = compile("a.b:*");
        assert!(m.is_match(&item(["a.b", "X"])));
        assert!(!m.is_match(&item(["aXb", "X"])));
    }

    #[test]
    fn literal_pattern_is_exact_equality() {
        let m = compile("Foo:Bar");
        assert!(m.is_match(&item(["Foo", "Bar"])));
        assert!(!m.is_match(&item(["Foo2", "Bar"])));
        assert!(!m.is_match(&item(["foo", "Bar"])));
        assert!(!m.is_match(&item(["xFoo", "Bar"])));
    }

    #[test]
    fn literal_pattern_ignores_case_when_type_says_so() {
        let t = Arc::new(ItemType::new("CLASS", ["NAMESPACE", "CLASS"], true).unwrap());
        let m = PatternCompiler::default().compile(&t, "Foo:Bar").unwrap();
        assert!(m.is_match(&Item::new(&t, ["foo", "BAR"]).unwrap()));
        assert!(!m.is_match(&Item::new(&t, ["fooo", "BAR"]).unwrap()));
    }

    #[test]
    fn dash_matches_only_empty() {
        let m = compile("-:*");
        assert!(m.is_match(&item(["", "X"])));
        assert!(!m.is_match(&item(["a", "X"])));
    }

    #[test]
    fn anchored_regex_parts() {
        let start = compile("^com\\.a:*");
        assert!(start.is_match(&item(["com.acme", "X"])));
        assert!(!start.is_match(&item(["org.com.acme", "X"])));
        let end = compile("Impl$:*");
        assert!(end.is_match(&item(["ServiceImpl", "X"])));
        assert!(!end.is_match(&item(["ImplService", "X"])));
    }

    #[test]
    fn example_pattern_matches_namespace_and_class() {
        let m = compile("A.*:B");
        assert!(m.is_match(&item(["A.Foo", "B"])));
        assert!(!m.is_match(&item(["A.Foo", "C"])));
    }

    // ── segments ──

    #[test]
    fn leading_type_name_is_dropped() {
        let m = compile("CLASS:A:B");
        assert!(m.is_match(&item(["A", "B"])));
    }

    #[test]
    fn missing_segments_match_anything() {
        let m = compile("A");
        assert_eq!(m.fields()[1], FieldMatcher::Always);
        assert!(m.is_match(&item(["A", "whatever"])));
    }

    #[test]
    fn excess_segments_are_dropped() {
        let m = compile("A:B:C:D");
        assert_eq!(m.fields().len(), 2);
        assert!(m.is_match(&item(["A", "B"])));
    }

    #[test]
    fn subfields_fill_with_always() {
        let t = Arc::new(
            ItemType::new("ASM", ["CLASS", "ASSEMBLY.NAME", "ASSEMBLY.VERSION"], false).unwrap(),
        );
        let m = PatternCompiler::default().compile(&t, "*:mscorlib").unwrap();
        assert_eq!(m.fields().len(), 3);
        assert_eq!(m.fields()[2], FieldMatcher::Always);
        assert!(m.is_match(&Item::new(&t, ["String", "mscorlib", "4.0"]).unwrap()));

        let both = PatternCompiler::default()
            .compile(&t, "*:mscorlib;4.*")
            .unwrap();
        assert!(both.is_match(&Item::new(&t, ["String", "mscorlib", "4.0"]).unwrap()));
        assert!(!both.is_match(&Item::new(&t, ["String", "mscorlib", "2.0"]).unwrap()));
    }

    #[test]
    fn too_many_subfields_is_an_error() {
        let err = PatternCompiler::default()
            .compile(&class_type(), "a;b:c")
            .unwrap_err();
        assert!(matches!(
            err,
            PatternError::TooManySubfields {
                parts: 2,
                fields: 1,
                ..
            }
        ));
    }

    // ── groups and backreferences ──

    #[test]
    fn literal_parens_count_as_groups() {
        let m = compile("(*).**:(*)");
        assert_eq!(m.group_count(), 2);
    }

    #[test]
    fn backreference_beyond_expected_groups_is_an_error() {
        let compiler = PatternCompiler::default();
        let err = compiler.compile(&class_type(), "\\1:*").unwrap_err();
        assert!(matches!(
            err,
            PatternError::InvalidBackreference {
                index: 1,
                available: 0,
                ..
            }
        ));

        let ok = compiler.compile_with(
            &class_type(),
            "\\1:*",
            CompileOptions {
                expected_groups: 1,
                ..CompileOptions::default()
            },
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn capture_mode_turns_wildcards_into_groups() {
        let options = CompileOptions {
            capture_wildcards: true,
            ..CompileOptions::default()
        };
        let compiler = PatternCompiler::default();
        let m = compiler
            .compile_with(&class_type(), "com.acme.*:**", options)
            .unwrap();
        assert_eq!(m.group_count(), 2);
        let result = m.matches(&item(["com.acme.billing", "Invoice"]), &MatchResult::empty());
        assert_eq!(
            result.groups,
            vec!["billing".to_string(), "Invoice".to_string()]
        );

        // literal parens switch capture mode off
        let explicit = compiler
            .compile_with(&class_type(), "(com).*.*:**", options)
            .unwrap();
        assert_eq!(explicit.group_count(), 1);
    }

    #[test]
    fn capture_mode_captures_star_only_parts() {
        assert!(matches!(
            classify("**", true),
            PartKind::Regex {
                anchor: Anchor::Full,
                ..
            }
        ));
        assert_eq!(classify("", true), PartKind::Always);

        let m = PatternCompiler::default()
            .compile_with(
                &class_type(),
                "**:*",
                CompileOptions {
                    capture_wildcards: true,
                    ..CompileOptions::default()
                },
            )
            .unwrap();
        assert_eq!(m.group_count(), 2);
        let result = m.matches(&item(["com.acme", "Invoice"]), &MatchResult::empty());
        assert_eq!(
            result.groups,
            vec!["com.acme".to_string(), "Invoice".to_string()]
        );
    }

    #[test]
    fn escaped_backslash_is_not_a_backreference() {
        let m = compile(r"a\\1:*");
        assert!(m.is_match(&item([r"a\1", "X"])));
    }

    #[test]
    fn split_keeps_offsets() {
        assert_eq!(
            split_with_offsets("ab:c:", ':', 10),
            vec![(10, "ab"), (13, "c"), (15, "")]
        );
    }
}
