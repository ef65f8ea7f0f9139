//! Item model: item types, interned items, and dependencies between them.
//!
//! Items and dependencies are produced by a reader layer and are
//! read-only to the checking core, except for the dependency counters
//! which classification and graph reduction update.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Range;
use std::sync::Arc;

use crate::types::Location;

/// One field descriptor of an [`ItemType`]: a key with an optional subkey.
///
/// Consecutive fields sharing a key form a group that is written as one
/// `;`-separated pattern segment (e.g. `ASSEMBLY.NAME;ASSEMBLY.VERSION`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    key: String,
    subkey: Option<String>,
}

impl FieldDescriptor {
    /// Parses a `KEY` or `KEY.SUBKEY` descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the key part is empty.
    pub fn parse(descriptor: &str) -> Result<Self, ItemError> {
        let (key, subkey) = match descriptor.split_once('.') {
            Some((key, subkey)) => (key, Some(subkey.to_string())),
            None => (descriptor, None),
        };
        if key.trim().is_empty() {
            return Err(ItemError::EmptyFieldKey {
                descriptor: descriptor.to_string(),
            });
        }
        Ok(Self {
            key: key.to_string(),
            subkey,
        })
    }

    /// Returns the key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the subkey, if any.
    #[must_use]
    pub fn subkey(&self) -> Option<&str> {
        self.subkey.as_deref()
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subkey {
            Some(subkey) => write!(f, "{}.{subkey}", self.key),
            None => write!(f, "{}", self.key),
        }
    }
}

/// The schema of an item: a name and an ordered list of fields.
///
/// Two item types are equal when their field signatures are equal; the
/// name is only a label.
#[derive(Debug, Clone)]
pub struct ItemType {
    name: String,
    fields: Vec<FieldDescriptor>,
    ignore_case: bool,
}

impl ItemType {
    /// Creates a new item type from `KEY` / `KEY.SUBKEY` descriptors.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, no fields are given, or a
    /// descriptor has an empty key.
    pub fn new<I, S>(name: &str, fields: I, ignore_case: bool) -> Result<Self, ItemError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if name.trim().is_empty() {
            return Err(ItemError::EmptyTypeName);
        }
        let fields = fields
            .into_iter()
            .map(|f| FieldDescriptor::parse(f.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        if fields.is_empty() {
            return Err(ItemError::NoFields {
                type_name: name.to_string(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            fields,
            ignore_case,
        })
    }

    /// Returns the type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the field descriptors.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    /// Whether patterns over this type compare case-insensitively.
    #[must_use]
    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }

    /// Returns the field index ranges of consecutive fields sharing a key.
    #[must_use]
    pub fn key_groups(&self) -> Vec<Range<usize>> {
        let mut groups = Vec::new();
        let mut start = 0;
        for i in 1..=self.fields.len() {
            if i == self.fields.len() || self.fields[i].key != self.fields[start].key {
                groups.push(start..i);
                start = i;
            }
        }
        groups
    }
}

impl PartialEq for ItemType {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Eq for ItemType {}

impl Hash for ItemType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fields.hash(state);
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                let sep = if self.fields[i - 1].key == field.key {
                    ';'
                } else {
                    ':'
                };
                write!(f, "{sep}")?;
            }
            write!(f, "{field}")?;
        }
        write!(f, ")")
    }
}

#[derive(Debug)]
struct ItemData {
    item_type: Arc<ItemType>,
    values: Box<[String]>,
}

/// An immutable, typed tuple of field values.
///
/// Cloning is cheap. Items interned through an [`ItemPool`] share one
/// allocation, so equality usually resolves by pointer identity.
#[derive(Debug, Clone)]
pub struct Item(Arc<ItemData>);

impl Item {
    /// Creates a new item.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of values differs from the type's arity.
    pub fn new<I, S>(item_type: &Arc<ItemType>, values: I) -> Result<Self, ItemError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Box<[String]> = values.into_iter().map(Into::into).collect();
        if values.len() != item_type.arity() {
            return Err(ItemError::ArityMismatch {
                type_name: item_type.name().to_string(),
                expected: item_type.arity(),
                actual: values.len(),
            });
        }
        Ok(Self(Arc::new(ItemData {
            item_type: Arc::clone(item_type),
            values,
        })))
    }

    /// Returns the item's type.
    #[must_use]
    pub fn item_type(&self) -> &Arc<ItemType> {
        &self.0.item_type
    }

    /// Returns the field values.
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.0.values
    }

    /// Returns the value of field `index`, if present.
    #[must_use]
    pub fn value(&self, index: usize) -> Option<&str> {
        self.0.values.get(index).map(String::as_str)
    }

    /// Returns true if every field value is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.values.iter().all(String::is_empty)
    }

    /// Returns true if both handles point at the same interned item.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.0.values == other.0.values && self.0.item_type == other.0.item_type)
    }
}

impl Eq for Item {}

impl Hash for Item {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.values.hash(state);
    }
}

/// Text form: key groups joined by `:`, fields within a group by `;`.
impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.0.item_type.fields();
        for (i, value) in self.0.values.iter().enumerate() {
            if i > 0 {
                let sep = if fields[i - 1].key() == fields[i].key() {
                    ';'
                } else {
                    ':'
                };
                write!(f, "{sep}")?;
            }
            write!(f, "{value}")?;
        }
        Ok(())
    }
}

/// Canonicalizes items so that equal items share one allocation.
#[derive(Debug, Default)]
pub struct ItemPool {
    items: HashSet<Item>,
}

impl ItemPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the canonical handle for `item`, adding it if unseen.
    pub fn intern(&mut self, item: Item) -> Item {
        if let Some(existing) = self.items.get(&item) {
            return existing.clone();
        }
        self.items.insert(item.clone());
        item
    }

    /// Creates and interns an item.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of values differs from the type's arity.
    pub fn item<I, S>(&mut self, item_type: &Arc<ItemType>, values: I) -> Result<Item, ItemError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Item::new(item_type, values).map(|item| self.intern(item))
    }

    /// Number of distinct items in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A directed, countable "uses" fact between two items.
#[derive(Debug, Clone)]
pub struct Dependency {
    using: Item,
    used: Item,
    source: Option<Location>,
    count: usize,
    questionable_count: usize,
    bad_count: usize,
    markers: BTreeSet<String>,
    example: Option<String>,
}

impl Dependency {
    /// Creates a dependency with the given occurrence count.
    #[must_use]
    pub fn new(using: Item, used: Item, count: usize) -> Self {
        Self {
            using,
            used,
            source: None,
            count,
            questionable_count: 0,
            bad_count: 0,
            markers: BTreeSet::new(),
            example: None,
        }
    }

    /// Sets where the dependency was found.
    #[must_use]
    pub fn with_source(mut self, source: Location) -> Self {
        self.source = Some(source);
        self
    }

    /// Adds a marker.
    #[must_use]
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.insert(marker.into());
        self
    }

    /// Sets the example text.
    #[must_use]
    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    /// Sets the violation tallies, as carried over from an earlier pass.
    #[must_use]
    pub fn with_tallies(mut self, questionable_count: usize, bad_count: usize) -> Self {
        self.questionable_count = questionable_count;
        self.bad_count = bad_count;
        self
    }

    /// Returns the using item.
    #[must_use]
    pub fn using(&self) -> &Item {
        &self.using
    }

    /// Returns the used item.
    #[must_use]
    pub fn used(&self) -> &Item {
        &self.used
    }

    /// Returns the source location, if known.
    #[must_use]
    pub fn source(&self) -> Option<&Location> {
        self.source.as_ref()
    }

    /// Returns the occurrence count.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Returns how many occurrences are questionable.
    #[must_use]
    pub fn questionable_count(&self) -> usize {
        self.questionable_count
    }

    /// Returns how many occurrences are bad.
    #[must_use]
    pub fn bad_count(&self) -> usize {
        self.bad_count
    }

    /// Returns the markers.
    #[must_use]
    pub fn markers(&self) -> &BTreeSet<String> {
        &self.markers
    }

    /// Returns the example text, if any.
    #[must_use]
    pub fn example(&self) -> Option<&str> {
        self.example.as_deref()
    }

    /// Marks every occurrence as bad.
    pub fn mark_bad(&mut self) {
        self.bad_count = self.bad_count.max(self.count);
    }

    /// Marks every occurrence as questionable.
    pub fn mark_questionable(&mut self) {
        self.questionable_count = self.questionable_count.max(self.count);
    }

    /// Creates a dependency between other endpoints carrying this one's
    /// location, counters, markers and example.
    #[must_use]
    pub fn reattached(&self, using: Item, used: Item) -> Self {
        Self {
            using,
            used,
            ..self.clone()
        }
    }

    /// Adds `other`'s counters and markers into this dependency.
    ///
    /// An example already recorded here is never overwritten.
    pub fn absorb(&mut self, other: &Self) {
        self.count += other.count;
        self.questionable_count += other.questionable_count;
        self.bad_count += other.bad_count;
        self.markers.extend(other.markers.iter().cloned());
        if self.example.is_none() {
            self.example.clone_from(&other.example);
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.using, self.used)
    }
}

/// Errors in item model construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ItemError {
    /// Item type name is empty.
    #[error("item type name must not be empty")]
    EmptyTypeName,

    /// Item type declares no fields.
    #[error("item type `{type_name}` must declare at least one field")]
    NoFields {
        /// The type without fields.
        type_name: String,
    },

    /// A field descriptor has an empty key.
    #[error("invalid field descriptor `{descriptor}`: key must not be empty")]
    EmptyFieldKey {
        /// The invalid descriptor.
        descriptor: String,
    },

    /// Value count differs from the type's arity.
    #[error("item of type `{type_name}` needs {expected} value(s), got {actual}")]
    ArityMismatch {
        /// The item type.
        type_name: String,
        /// Declared arity.
        expected: usize,
        /// Number of values supplied.
        actual: usize,
    },
}
