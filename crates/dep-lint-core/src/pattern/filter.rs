//! Rule group filters.

use regex::{RegexSet, RegexSetBuilder};

use super::compiler::{classify, split_with_offsets, Anchor, PartKind};
use super::field::RegexPiece;
use super::PatternError;
use crate::item::Item;

/// Any run of characters inside one field.
const FIELD_TEXT: &str = "[^:;]*";

/// Selects the dependencies a rule group applies to by testing the
/// text form of the using item.
///
/// Each filter is a wildcard pattern over the `:`/`;` separated item
/// text. Fields not mentioned by a filter match anything.
#[derive(Debug, Clone)]
pub struct GroupFilter {
    patterns: Vec<String>,
    set: RegexSet,
}

impl GroupFilter {
    /// Compiles the given filter patterns. A dependency passes when any
    /// of them matches.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern uses a backreference or is not a
    /// valid regex.
    pub fn new<I, S>(patterns: I, ignore_case: bool) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let sources = patterns
            .iter()
            .map(|p| filter_source(p))
            .collect::<Result<Vec<_>, _>>()?;

        let set = RegexSetBuilder::new(&sources)
            .case_insensitive(ignore_case)
            .build()
            .map_err(|e| PatternError::InvalidRegex {
                pattern: patterns.join(", "),
                span: (0, 0).into(),
                segment: patterns.join(", "),
                reason: e.to_string(),
            })?;

        Ok(Self { patterns, set })
    }

    /// Returns the filter patterns as written.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether the using item of a dependency passes this filter.
    #[must_use]
    pub fn matches(&self, using: &Item) -> bool {
        self.set.is_match(&using.to_string())
    }
}

fn filter_source(pattern: &str) -> Result<String, PatternError> {
    let mut source = String::from("^");
    for (i, (offset, segment)) in split_with_offsets(pattern, ':', 0).into_iter().enumerate() {
        if i > 0 {
            source.push(':');
        }
        for (j, (part_offset, part)) in split_with_offsets(segment, ';', offset)
            .into_iter()
            .enumerate()
        {
            if j > 0 {
                source.push(';');
            }
            source.push_str(&fragment(pattern, part.trim(), part_offset)?);
        }
    }
    source.push_str("(?:[:;].*)?$");
    Ok(source)
}

/// Regex fragment for one part, unanchored so it can be embedded.
fn fragment(pattern: &str, part: &str, offset: usize) -> Result<String, PatternError> {
    Ok(match classify(part, false) {
        PartKind::EmptyOnly => String::new(),
        PartKind::Always => FIELD_TEXT.to_string(),
        PartKind::Contains(text) => format!("{FIELD_TEXT}{}{FIELD_TEXT}", regex::escape(text)),
        PartKind::StartsWith(text) => format!("{}{FIELD_TEXT}", regex::escape(text)),
        PartKind::EndsWith(text) => format!("{FIELD_TEXT}{}", regex::escape(text)),
        PartKind::Regex { body, anchor } => {
            let mut inner = String::new();
            for piece in body {
                match piece {
                    RegexPiece::Raw(text) => inner.push_str(&text),
                    RegexPiece::Backref(index) => {
                        return Err(PatternError::InvalidBackreference {
                            pattern: pattern.to_string(),
                            span: (offset, part.len()).into(),
                            index,
                            available: 0,
                        })
                    }
                }
            }
            match anchor {
                Anchor::Full => format!("(?:{inner})"),
                Anchor::Start => format!("(?:{inner}){FIELD_TEXT}"),
                Anchor::End => format!("{FIELD_TEXT}(?:{inner})"),
            }
        }
    })
}
