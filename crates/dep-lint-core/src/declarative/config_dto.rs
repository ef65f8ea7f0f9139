//! TOML deserialization types (DTO layer).
//!
//! These types exist solely for serde deserialization.
//! They are converted to domain model types via the loader.

use serde::Deserialize;

/// Raw TOML representation of one rule-set file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleSetDto {
    /// Rule-set files to include, relative to this file.
    #[serde(default)]
    pub include: Vec<String>,

    /// Item type declarations.
    #[serde(rename = "item-types", default)]
    pub item_types: Vec<ItemTypeDto>,

    /// Rules of the default group.
    #[serde(default)]
    pub rules: Vec<RuleDto>,

    /// Filtered rule groups.
    #[serde(default)]
    pub groups: Vec<GroupDto>,

    /// Projections, in evaluation order.
    #[serde(default)]
    pub projections: Vec<ProjectionDto>,
}

/// TOML representation of an item type.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemTypeDto {
    /// Type name (e.g., "CLASS").
    pub name: String,
    /// Field descriptors, `KEY` or `KEY.SUBKEY`.
    pub fields: Vec<String>,
    /// Case folding; defaults to the engine setting.
    #[serde(rename = "ignore-case", default)]
    pub ignore_case: Option<bool>,
}

/// TOML representation of a rule.
///
/// Either `rule` (arrow shorthand) or `using` + `used` is set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleDto {
    /// Arrow shorthand, e.g. `"a.** ---! b.**"`.
    #[serde(default)]
    pub rule: Option<String>,
    /// Using pattern.
    #[serde(default)]
    pub using: Option<String>,
    /// Used pattern.
    #[serde(default)]
    pub used: Option<String>,
    /// Rule kind (default: "may-use").
    #[serde(default)]
    pub kind: Option<String>,
    /// Item type of the using side (default: first declared type).
    #[serde(rename = "using-type", default)]
    pub using_type: Option<String>,
    /// Item type of the used side (default: the using type).
    #[serde(rename = "used-type", default)]
    pub used_type: Option<String>,
}

/// TOML representation of a filtered rule group.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupDto {
    /// Group name (default: the filter patterns).
    #[serde(default)]
    pub name: Option<String>,
    /// Patterns over the using item; empty means "every dependency".
    #[serde(default)]
    pub filter: Vec<String>,
    /// Case folding of the filter; defaults to the engine setting.
    #[serde(rename = "ignore-case", default)]
    pub ignore_case: Option<bool>,
    /// Rules of the group.
    #[serde(default)]
    pub rules: Vec<RuleDto>,
}

/// TOML representation of a projection.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectionDto {
    /// Source pattern.
    pub source: String,
    /// Target templates, one per target field.
    #[serde(default)]
    pub targets: Option<Vec<String>>,
    /// Source item type (default: first declared type).
    #[serde(rename = "source-type", default)]
    pub source_type: Option<String>,
    /// Target item type (default: the source type).
    #[serde(rename = "target-type", default)]
    pub target_type: Option<String>,
    /// Whether projected items are inner items.
    #[serde(default)]
    pub inner: bool,
}
