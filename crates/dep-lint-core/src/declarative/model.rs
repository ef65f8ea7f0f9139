//! Validated domain model shared by every file of a rule-set tree.
//!
//! No serde and no I/O here; invariants are enforced at construction.

use std::fmt;
use std::sync::Arc;

use crate::item::{ItemError, ItemType};
use crate::rule::RuleKind;

// ────────────────────────────────────────────
// Item type registry
// ────────────────────────────────────────────

/// Item types known to a rule-set tree, in declaration order.
///
/// Types declared by an included file are visible to the including file.
#[derive(Debug, Clone, Default)]
pub struct ItemTypeRegistry {
    types: Vec<Arc<ItemType>>,
}

impl ItemTypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `item_type` and returns the shared handle.
    ///
    /// Re-declaring a type with the same name and fields returns the
    /// existing handle.
    ///
    /// # Errors
    ///
    /// Returns an error if a type of the same name with other fields exists.
    pub fn register(&mut self, item_type: ItemType) -> Result<Arc<ItemType>, ModelError> {
        if let Some(existing) = self.get(item_type.name()) {
            if **existing == item_type && existing.ignore_case() == item_type.ignore_case() {
                return Ok(Arc::clone(existing));
            }
            return Err(ModelError::ConflictingItemType {
                name: item_type.name().to_string(),
                existing: existing.to_string(),
                declared: item_type.to_string(),
            });
        }
        let item_type = Arc::new(item_type);
        self.types.push(Arc::clone(&item_type));
        Ok(item_type)
    }

    /// Looks up a type by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<ItemType>> {
        self.types.iter().find(|t| t.name() == name)
    }

    /// Resolves an optional type reference; `None` means the first
    /// declared type.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is unknown or no type is declared.
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<ItemType>, ModelError> {
        match name {
            Some(name) => self
                .get(name)
                .cloned()
                .ok_or_else(|| ModelError::UnknownItemType {
                    name: name.to_string(),
                }),
            None => self.types.first().cloned().ok_or(ModelError::NoItemTypes),
        }
    }

    /// Returns all registered types.
    #[must_use]
    pub fn types(&self) -> &[Arc<ItemType>] {
        &self.types
    }
}

// ────────────────────────────────────────────
// Rule text
// ────────────────────────────────────────────

/// Using pattern, kind and used pattern of one rule entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleText {
    /// Using pattern.
    pub using: String,
    /// Verdict kind.
    pub kind: RuleKind,
    /// Used pattern.
    pub used: String,
}

impl RuleText {
    /// Parses the arrow shorthand `"A ---> B"`.
    ///
    /// # Errors
    ///
    /// Returns an error if no arrow is present or a side is empty.
    pub fn parse(text: &str) -> Result<Self, ModelError> {
        match RuleKind::split_rule(text) {
            Some((using, kind, used)) if !using.is_empty() && !used.is_empty() => Ok(Self {
                using: using.to_string(),
                kind,
                used: used.to_string(),
            }),
            _ => Err(ModelError::InvalidRuleText {
                text: text.to_string(),
            }),
        }
    }

    /// Builds a rule from separate fields; a missing kind means `may-use`.
    ///
    /// # Errors
    ///
    /// Returns an error if the kind is not recognized.
    pub fn from_parts(using: &str, kind: Option<&str>, used: &str) -> Result<Self, ModelError> {
        let kind = match kind {
            Some(value) => value.parse().map_err(|_| ModelError::UnknownRuleKind {
                value: value.to_string(),
            })?,
            None => RuleKind::MayUse,
        };
        Ok(Self {
            using: using.to_string(),
            kind,
            used: used.to_string(),
        })
    }
}

impl fmt::Display for RuleText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.using, self.kind.arrow(), self.used)
    }
}

// ────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────

/// Validation errors of the rule-set model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Invalid item type declaration.
    #[error(transparent)]
    Item(#[from] ItemError),

    /// The same type name is declared with different fields.
    #[error("item type `{name}` declared as {declared} but already known as {existing}")]
    ConflictingItemType {
        /// Type name.
        name: String,
        /// Known definition.
        existing: String,
        /// New definition.
        declared: String,
    },

    /// A referenced item type is not declared.
    #[error("unknown item type `{name}`")]
    UnknownItemType {
        /// The referenced name.
        name: String,
    },

    /// A rule or projection needs an item type but none is declared.
    #[error("no item types declared")]
    NoItemTypes,

    /// Arrow shorthand without a recognized arrow.
    #[error("`{text}` is not of the form `USING ---> USED` (arrows: --->, ---?, ---!)")]
    InvalidRuleText {
        /// The rule text.
        text: String,
    },

    /// Unknown `kind` value.
    #[error("unknown rule kind `{value}`, expected: may-use, may-use-with-warning, must-not-use")]
    UnknownRuleKind {
        /// The invalid value.
        value: String,
    },

    /// A rule entry sets both or neither of `rule` and `using`/`used`.
    #[error("exactly one of `rule` or `using` + `used` must be set")]
    AmbiguousRule,
}
