//! DTO → Domain model conversion with validation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::item::ItemType;
use crate::pattern::{GroupFilter, PatternCompiler, PatternError};
use crate::projection::{Projection, ProjectionDefinition};
use crate::rule::{DependencyRule, RuleDefinition};
use crate::rule_group::RuleGroup;
use crate::rule_set::{RuleSet, SkippedEntry};
use crate::types::Location;

use super::config_dto::{GroupDto, ItemTypeDto, ProjectionDto, RuleDto, RuleSetDto};
use super::model::{ItemTypeRegistry, ModelError, RuleText};

/// Errors during rule-set loading.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// A rule-set file could not be read.
    #[error("Failed to read rule set {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// A rule-set file is not valid TOML for the rule-set schema.
    #[error("Failed to parse rule set {path}: {source}")]
    Parse {
        /// Path of the file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// A field-level validation error.
    #[error("{context}: {source}")]
    Validation {
        /// Where the error occurred (e.g., "common.toml: rules[0]").
        context: String,
        /// The underlying model error.
        source: ModelError,
    },

    /// A file includes itself, directly or indirectly.
    #[error("include cycle: {}", format_chain(.chain))]
    IncludeCycle {
        /// Files along the cycle, ending with the repeated one.
        chain: Vec<PathBuf>,
    },
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Loads rule-set files into [`RuleSet`] trees.
///
/// Each file is loaded once per loader; a file included along several
/// paths yields one shared [`RuleSet`]. Entries whose patterns do not
/// compile are logged and recorded in [`RuleSet::skipped`] instead of
/// failing the load.
#[derive(Debug)]
pub struct RuleSetLoader {
    compiler: PatternCompiler,
    ignore_case: bool,
    registry: ItemTypeRegistry,
    loaded: HashMap<PathBuf, Arc<RuleSet>>,
    stack: Vec<PathBuf>,
}

impl Default for RuleSetLoader {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl RuleSetLoader {
    /// Creates a loader using the engine settings.
    #[must_use]
    pub fn new(engine: &EngineConfig) -> Self {
        Self {
            compiler: PatternCompiler::new(engine.cache_capacity),
            ignore_case: engine.ignore_case,
            registry: ItemTypeRegistry::new(),
            loaded: HashMap::new(),
            stack: Vec::new(),
        }
    }

    /// Returns the item types seen so far.
    #[must_use]
    pub fn registry(&self) -> &ItemTypeRegistry {
        &self.registry
    }

    /// Loads a rule-set file and everything it includes.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or parsed, an include
    /// cycle exists, or a declaration is invalid.
    pub fn load_file(&mut self, path: &Path) -> Result<Arc<RuleSet>, LoadError> {
        let canonical = std::fs::canonicalize(path).map_err(|e| LoadError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        if self.stack.contains(&canonical) {
            let mut chain = self.stack.clone();
            chain.push(canonical);
            return Err(LoadError::IncludeCycle { chain });
        }
        if let Some(set) = self.loaded.get(&canonical) {
            debug!("Rule set already loaded: {}", canonical.display());
            return Ok(Arc::clone(set));
        }

        let content = std::fs::read_to_string(&canonical).map_err(|e| LoadError::Io {
            path: canonical.clone(),
            source: e,
        })?;
        let dto: RuleSetDto = toml::from_str(&content).map_err(|e| LoadError::Parse {
            path: canonical.clone(),
            source: e,
        })?;

        let base_dir = canonical
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        self.stack.push(canonical.clone());
        let result = self.load_dto(&path.display().to_string(), dto, &base_dir);
        self.stack.pop();

        let set = Arc::new(result?);
        self.loaded.insert(canonical, Arc::clone(&set));
        Ok(set)
    }

    /// Converts a parsed rule set. Includes resolve against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if an include fails to load or a declaration is
    /// invalid.
    pub fn load_dto(
        &mut self,
        name: &str,
        dto: RuleSetDto,
        base_dir: &Path,
    ) -> Result<RuleSet, LoadError> {
        let mut set = RuleSet::new(name);

        for include in &dto.include {
            let included = self.load_file(&base_dir.join(include))?;
            set.add_include(included);
        }

        for (i, item_type) in dto.item_types.iter().enumerate() {
            let item_type = self.convert_item_type(item_type, &format!("{name}: item-types[{i}]"))?;
            set.add_item_type(item_type);
        }

        for (i, rule) in dto.rules.iter().enumerate() {
            let context = format!("{name}: rules[{i}]");
            if let Some(rule) = self.convert_rule(&mut set, rule, name, &context)? {
                set.default_group_mut().add_rule(rule);
            }
        }

        for (i, group) in dto.groups.iter().enumerate() {
            let context = format!("{name}: groups[{i}]");
            if let Some(group) = self.convert_group(&mut set, group, name, &context)? {
                set.add_group(group);
            }
        }

        for (i, projection) in dto.projections.into_iter().enumerate() {
            let context = format!("{name}: projections[{i}]");
            if let Some(projection) = self.convert_projection(&mut set, projection, name, &context)? {
                set.add_projection(projection);
            }
        }

        info!(
            "Loaded rule set {name}: {} rule(s) in {} group(s), {} projection(s), {} skipped",
            set.default_group().len() + set.groups().iter().map(RuleGroup::len).sum::<usize>(),
            set.groups().len() + 1,
            set.projections().len(),
            set.skipped().len()
        );
        Ok(set)
    }

    fn convert_item_type(
        &mut self,
        dto: &ItemTypeDto,
        context: &str,
    ) -> Result<Arc<ItemType>, LoadError> {
        let validation = |source: ModelError| LoadError::Validation {
            context: context.to_string(),
            source,
        };
        let item_type = ItemType::new(
            &dto.name,
            &dto.fields,
            dto.ignore_case.unwrap_or(self.ignore_case),
        )
        .map_err(|e| validation(e.into()))?;
        self.registry.register(item_type).map_err(validation)
    }

    fn resolve_type(&self, name: Option<&str>, context: &str) -> Result<Arc<ItemType>, LoadError> {
        self.registry
            .resolve(name)
            .map_err(|source| LoadError::Validation {
                context: context.to_string(),
                source,
            })
    }

    fn convert_rule(
        &self,
        set: &mut RuleSet,
        dto: &RuleDto,
        file: &str,
        context: &str,
    ) -> Result<Option<DependencyRule>, LoadError> {
        let validation = |source: ModelError| LoadError::Validation {
            context: context.to_string(),
            source,
        };
        let text = match (&dto.rule, &dto.using, &dto.used) {
            (Some(text), None, None) => RuleText::parse(text).map_err(validation)?,
            (None, Some(using), Some(used)) => {
                RuleText::from_parts(using, dto.kind.as_deref(), used).map_err(validation)?
            }
            _ => return Err(validation(ModelError::AmbiguousRule)),
        };

        let using_type = self.resolve_type(dto.using_type.as_deref(), context)?;
        let used_type = match &dto.used_type {
            Some(name) => self.resolve_type(Some(name), context)?,
            None => Arc::clone(&using_type),
        };

        let definition = RuleDefinition::new(&text.using, text.kind, &text.used)
            .with_origin(Location::new(file, 0));
        match DependencyRule::new(&self.compiler, &using_type, &used_type, definition) {
            Ok(rule) => Ok(Some(rule)),
            Err(error) => {
                skip(set, text.to_string(), file, context, error);
                Ok(None)
            }
        }
    }

    fn convert_group(
        &self,
        set: &mut RuleSet,
        dto: &GroupDto,
        file: &str,
        context: &str,
    ) -> Result<Option<RuleGroup>, LoadError> {
        let name = dto
            .name
            .clone()
            .unwrap_or_else(|| dto.filter.join(", "));
        let filter = if dto.filter.is_empty() {
            None
        } else {
            let ignore_case = dto.ignore_case.unwrap_or(self.ignore_case);
            match GroupFilter::new(dto.filter.iter().cloned(), ignore_case) {
                Ok(filter) => Some(filter),
                Err(error) => {
                    skip(set, name, file, context, error);
                    return Ok(None);
                }
            }
        };

        let mut group = RuleGroup::new(name, filter);
        for (i, rule) in dto.rules.iter().enumerate() {
            let context = format!("{context}.rules[{i}]");
            if let Some(rule) = self.convert_rule(set, rule, file, &context)? {
                group.add_rule(rule);
            }
        }
        Ok(Some(group))
    }

    fn convert_projection(
        &self,
        set: &mut RuleSet,
        dto: ProjectionDto,
        file: &str,
        context: &str,
    ) -> Result<Option<Projection>, LoadError> {
        let source_type = self.resolve_type(dto.source_type.as_deref(), context)?;
        let target_type = match &dto.target_type {
            Some(name) => self.resolve_type(Some(name), context)?,
            None => Arc::clone(&source_type),
        };

        let text = dto.source.clone();
        let definition = ProjectionDefinition {
            source: dto.source,
            targets: dto.targets,
            inner: dto.inner,
            origin: Some(Location::new(file, 0)),
        };
        match Projection::new(&self.compiler, &source_type, &target_type, definition) {
            Ok(projection) => Ok(Some(projection)),
            Err(error) => {
                skip(set, text, file, context, error);
                Ok(None)
            }
        }
    }
}

fn skip(set: &mut RuleSet, text: String, file: &str, context: &str, error: PatternError) {
    warn!("{context}: skipping `{text}`: {error}");
    set.record_skipped(SkippedEntry {
        text,
        origin: Some(Location::new(file, 0)),
        error,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPES: &str = r#"
[[item-types]]
name = "CLASS"
fields = ["NAMESPACE", "CLASS"]
"#;

    fn load_str(toml_str: &str) -> Result<RuleSet, LoadError> {
        let dto: RuleSetDto = toml::from_str(toml_str).unwrap();
        RuleSetLoader::default().load_dto("test.toml", dto, Path::new("."))
    }

    // -- Happy path --

    #[test]
    fn load_empty_rule_set() {
        let set = load_str("").unwrap();
        assert!(set.default_group().is_empty());
        assert!(set.projections().is_empty());
    }

    #[test]
    fn load_rules_groups_and_projections() {
        let set = load_str(&format!(
            r#"{TYPES}
[[item-types]]
name = "MODULE"
fields = ["MODULE"]

[[rules]]
rule = "com.acme.** ---> java.**"

[[rules]]
using = "**"
used = "**:Legacy*"
kind = "must-not-use"

[[groups]]
name = "billing"
filter = ["com.acme.billing.**"]

[[groups.rules]]
rule = "** ---! com.acme.shipping.**"

[[projections]]
source = "com.acme.*:**"
target-type = "MODULE"
"#
        ))
        .unwrap();

        assert_eq!(set.item_types().len(), 2);
        assert_eq!(set.default_group().len(), 2);
        assert_eq!(set.groups().len(), 1);
        assert_eq!(set.groups()[0].name(), "billing");
        assert!(set.groups()[0].filter().is_some());
        assert_eq!(set.projections().len(), 1);
        assert_eq!(set.projections()[0].target_type().name(), "MODULE");
        assert!(set.skipped().is_empty());
    }

    #[test]
    fn pattern_errors_skip_only_the_entry() {
        let set = load_str(&format!(
            r#"{TYPES}
[[rules]]
rule = "^com.(:x ---> **"

[[rules]]
rule = "** ---> \\1:*"

[[rules]]
rule = "** ---> **"

[[projections]]
source = "*:*"
targets = ["a", "b", "c"]
"#
        ))
        .unwrap();

        assert_eq!(set.default_group().len(), 1);
        assert_eq!(set.skipped().len(), 3);
        assert!(matches!(
            set.skipped()[1].error,
            PatternError::InvalidBackreference { .. }
        ));
        assert!(matches!(
            set.skipped()[2].error,
            PatternError::TooManyTargets { .. }
        ));
    }

    // -- Error cases --

    #[test]
    fn load_rejects_rules_without_item_types() {
        let result = load_str("[[rules]]\nrule = \"a ---> b\"\n");
        assert!(matches!(
            result,
            Err(LoadError::Validation {
                source: ModelError::NoItemTypes,
                ..
            })
        ));
    }

    #[test]
    fn load_rejects_unknown_item_type() {
        let result = load_str(&format!(
            "{TYPES}\n[[rules]]\nrule = \"a ---> b\"\nused-type = \"DLL\"\n"
        ));
        assert!(matches!(
            result,
            Err(LoadError::Validation {
                source: ModelError::UnknownItemType { .. },
                ..
            })
        ));
    }

    #[test]
    fn load_rejects_ambiguous_rule() {
        let result = load_str(&format!(
            "{TYPES}\n[[rules]]\nrule = \"a ---> b\"\nusing = \"a\"\nused = \"b\"\n"
        ));
        assert!(matches!(
            result,
            Err(LoadError::Validation {
                source: ModelError::AmbiguousRule,
                ..
            })
        ));
    }

    #[test]
    fn load_rejects_unknown_kind() {
        let result = load_str(&format!(
            "{TYPES}\n[[rules]]\nusing = \"a\"\nused = \"b\"\nkind = \"sometimes\"\n"
        ));
        assert!(matches!(
            result,
            Err(LoadError::Validation {
                source: ModelError::UnknownRuleKind { .. },
                ..
            })
        ));
    }

    // -- Includes --

    #[test]
    fn includes_are_loaded_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("types.toml"), TYPES).unwrap();
        std::fs::write(
            dir.path().join("a.toml"),
            "include = [\"types.toml\"]\n[[rules]]\nrule = \"a.** ---> **\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("root.toml"),
            "include = [\"a.toml\", \"types.toml\"]\n[[rules]]\nrule = \"** ---! x.**\"\n",
        )
        .unwrap();

        let mut loader = RuleSetLoader::default();
        let root = loader.load_file(&dir.path().join("root.toml")).unwrap();
        assert_eq!(root.includes().len(), 2);
        assert!(Arc::ptr_eq(&root.includes()[0].includes()[0], &root.includes()[1]));
        assert_eq!(root.all_sets().len(), 3);
        assert_eq!(loader.registry().types().len(), 1);
    }

    #[test]
    fn include_cycles_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.toml"), "include = [\"b.toml\"]\n").unwrap();
        std::fs::write(dir.path().join("b.toml"), "include = [\"a.toml\"]\n").unwrap();

        let result = RuleSetLoader::default().load_file(&dir.path().join("a.toml"));
        match result {
            Err(LoadError::IncludeCycle { chain }) => assert_eq!(chain.len(), 3),
            other => panic!("expected include cycle, got {other:?}"),
        }
    }

    #[test]
    fn missing_include_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.toml"), "include = [\"missing.toml\"]\n").unwrap();
        let result = RuleSetLoader::default().load_file(&dir.path().join("a.toml"));
        assert!(matches!(result, Err(LoadError::Io { .. })));
    }
}
