//! Projections: abstract an item to a coarser one by pattern.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::item::{Item, ItemType};
use crate::pattern::{CompileOptions, ItemMatcher, MatchResult, PatternCompiler, PatternError};
use crate::types::Location;

#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplatePart {
    Literal(String),
    Group(usize),
}

/// Text for one target field, with `\N` referring to source groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTemplate {
    text: String,
    parts: Vec<TemplatePart>,
}

impl TargetTemplate {
    /// Parses a template. `\N` is group N; `\x` is a literal `x`.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '\\' {
                literal.push(c);
                continue;
            }
            let mut digits = String::new();
            while let Some(d) = chars.next_if(char::is_ascii_digit) {
                digits.push(d);
            }
            match digits.parse::<usize>() {
                Ok(n) => {
                    if !literal.is_empty() {
                        parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(TemplatePart::Group(n));
                }
                Err(_) => literal.extend(chars.next()),
            }
        }
        if !literal.is_empty() {
            parts.push(TemplatePart::Literal(literal));
        }

        Self {
            text: text.to_string(),
            parts,
        }
    }

    fn group(n: usize) -> Self {
        Self {
            text: format!("\\{n}"),
            parts: vec![TemplatePart::Group(n)],
        }
    }

    fn empty() -> Self {
        Self {
            text: String::new(),
            parts: Vec::new(),
        }
    }

    /// Returns the template text as written.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    fn groups(&self) -> impl Iterator<Item = usize> + '_ {
        self.parts.iter().filter_map(|p| match p {
            TemplatePart::Group(n) => Some(*n),
            TemplatePart::Literal(_) => None,
        })
    }

    fn render(&self, result: &MatchResult) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                TemplatePart::Literal(text) => out.push_str(text),
                TemplatePart::Group(n) => out.push_str(result.group(*n).unwrap_or_default()),
            }
        }
        out
    }
}

/// Input for [`Projection::new`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionDefinition {
    /// Pattern for source items. Without literal `(`, every wildcard captures.
    pub source: String,
    /// One template per target field. `None` maps field i to `\i+1`.
    pub targets: Option<Vec<String>>,
    /// Whether projected items are inner items of the reduced graph.
    pub inner: bool,
    /// Where the projection was written.
    pub origin: Option<Location>,
}

impl ProjectionDefinition {
    /// Creates a definition with default targets.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// Sets explicit target templates.
    #[must_use]
    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = Some(targets.into_iter().map(Into::into).collect());
        self
    }

    /// Marks the projection as producing inner items.
    #[must_use]
    pub fn inner(mut self) -> Self {
        self.inner = true;
        self
    }
}

/// A compiled projection.
#[derive(Debug)]
pub struct Projection {
    matcher: ItemMatcher,
    target_type: Arc<ItemType>,
    targets: Vec<TargetTemplate>,
    inner: bool,
    origin: Option<Location>,
    matches: AtomicUsize,
}

impl Projection {
    /// Compiles a projection from `source_type` items to `target_type` items.
    ///
    /// # Errors
    ///
    /// Returns an error if the source pattern does not compile, more
    /// templates than target fields are given, or a template refers to a
    /// group the source does not capture.
    pub fn new(
        compiler: &PatternCompiler,
        source_type: &Arc<ItemType>,
        target_type: &Arc<ItemType>,
        definition: ProjectionDefinition,
    ) -> Result<Self, PatternError> {
        let matcher = compiler.compile_with(
            source_type,
            &definition.source,
            CompileOptions {
                expected_groups: 0,
                capture_wildcards: true,
            },
        )?;
        let available = matcher.group_count();
        let arity = target_type.arity();

        let targets = match definition.targets {
            Some(texts) => {
                if texts.len() > arity {
                    return Err(PatternError::TooManyTargets {
                        type_name: target_type.name().to_string(),
                        targets: texts.len(),
                        arity,
                    });
                }
                let mut targets: Vec<TargetTemplate> =
                    texts.iter().map(|t| TargetTemplate::parse(t)).collect();
                targets.resize_with(arity, TargetTemplate::empty);
                targets
            }
            None => (1..=arity)
                .map(|n| {
                    if n <= available {
                        TargetTemplate::group(n)
                    } else {
                        TargetTemplate::empty()
                    }
                })
                .collect(),
        };

        for target in &targets {
            if let Some(index) = target.groups().find(|&n| n == 0 || n > available) {
                return Err(PatternError::InvalidBackreference {
                    pattern: target.text.clone(),
                    span: (0, target.text.len()).into(),
                    index,
                    available,
                });
            }
        }

        Ok(Self {
            matcher,
            target_type: Arc::clone(target_type),
            targets,
            inner: definition.inner,
            origin: definition.origin,
            matches: AtomicUsize::new(0),
        })
    }

    /// Maps `item` to its abstraction, or `None` if the projection does
    /// not apply.
    #[must_use]
    pub fn project(&self, item: &Item) -> Option<Item> {
        let result = self.matcher.matches(item, &MatchResult::empty());
        if !result.is_match() {
            return None;
        }
        let values = self.targets.iter().map(|t| t.render(&result));
        match Item::new(&self.target_type, values) {
            Ok(projected) => {
                self.record_match();
                Some(projected)
            }
            Err(e) => {
                tracing::debug!("projection `{self}` produced no item: {e}");
                None
            }
        }
    }

    /// Returns the source matcher.
    #[must_use]
    pub fn matcher(&self) -> &ItemMatcher {
        &self.matcher
    }

    /// Returns the target item type.
    #[must_use]
    pub fn target_type(&self) -> &Arc<ItemType> {
        &self.target_type
    }

    /// Returns the target templates, one per target field.
    #[must_use]
    pub fn targets(&self) -> &[TargetTemplate] {
        &self.targets
    }

    /// Whether projected items are inner items.
    #[must_use]
    pub fn is_inner(&self) -> bool {
        self.inner
    }

    /// Returns where the projection was written.
    #[must_use]
    pub fn origin(&self) -> Option<&Location> {
        self.origin.as_ref()
    }

    /// Returns how many successful matches this projection has made,
    /// counting an item again each time it is mapped.
    #[must_use]
    pub fn matches(&self) -> usize {
        self.matches.load(Ordering::Relaxed)
    }

    /// Counts a match whose result was reused instead of recomputed.
    pub(crate) fn record_match(&self) {
        self.matches.fetch_add(1, Ordering::Relaxed);
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let targets: Vec<&str> = self.targets.iter().map(TargetTemplate::text).collect();
        write!(f, "{} ---% {}", self.matcher.pattern(), targets.join(":"))
    }
}
