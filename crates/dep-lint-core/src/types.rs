//! Core types for rule violations and check results.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Severity level for rule violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message, does not fail a check.
    Info,
    /// Warning that should be addressed.
    Warning,
    /// Error that must be fixed.
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            other => Err(format!(
                "unknown severity `{other}`, expected: error, warning, info"
            )),
        }
    }
}

/// Where a dependency (or a rule) was found.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// File the fact was read from.
    pub file: PathBuf,
    /// Line number (1-indexed), 0 when unknown.
    #[serde(default)]
    pub line: usize,
}

impl Location {
    /// Creates a new location.
    #[must_use]
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.file.display())
        } else {
            write!(f, "{}:{}", self.file.display(), self.line)
        }
    }
}

/// How a single dependency was classified by a rule group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// An allowed (`may-use`) rule matched.
    Allowed,
    /// Only a questionable (`may-use-with-warning`) rule matched.
    Questionable,
    /// A forbidden (`must-not-use`) rule matched.
    Forbidden,
    /// No rule of any kind matched.
    Unmatched,
}

impl Outcome {
    /// Returns the severity reported for this outcome, `None` for clean ones.
    #[must_use]
    pub fn severity(self) -> Option<Severity> {
        match self {
            Self::Allowed => None,
            Self::Questionable => Some(Severity::Warning),
            Self::Forbidden | Self::Unmatched => Some(Severity::Error),
        }
    }

    /// Returns the violation code for this outcome.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Allowed => "DL000",
            Self::Forbidden => "DL001",
            Self::Unmatched => "DL002",
            Self::Questionable => "DL003",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allowed => write!(f, "allowed"),
            Self::Questionable => write!(f, "questionable"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::Unmatched => write!(f, "unmatched"),
        }
    }
}

/// A dependency that was not cleanly allowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleViolation {
    /// Violation code (e.g., "DL001").
    pub code: String,
    /// Classification that produced this violation.
    pub outcome: Outcome,
    /// Severity of this violation.
    pub severity: Severity,
    /// Text form of the using item.
    pub using: String,
    /// Text form of the used item.
    pub used: String,
    /// Occurrence count of the dependency.
    pub count: usize,
    /// Text of the rule that matched, absent for unmatched dependencies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    /// Rule group that produced the verdict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Where the dependency was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Human-readable message.
    pub message: String,
}

impl RuleViolation {
    /// Creates a new violation for a non-clean outcome.
    #[must_use]
    pub fn new(
        outcome: Outcome,
        using: impl Into<String>,
        used: impl Into<String>,
        count: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: outcome.code().to_string(),
            outcome,
            severity: outcome.severity().unwrap_or(Severity::Info),
            using: using.into(),
            used: used.into(),
            count,
            rule: None,
            group: None,
            location: None,
            message: message.into(),
        }
    }

    /// Records the rule that produced this violation.
    #[must_use]
    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    /// Records the rule group that produced this violation.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Records where the dependency was found.
    #[must_use]
    pub fn with_location(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }

    /// Formats the violation for terminal output.
    #[must_use]
    pub fn format(&self) -> String {
        use std::fmt::Write;
        let mut output = format!("{} {} -> {}", self.code, self.using, self.used);
        if let Some(location) = &self.location {
            let _ = write!(output, " at {location}");
        }
        output.push('\n');
        let _ = writeln!(output, "  {}: {}", self.severity, self.message);
        if let Some(rule) = &self.rule {
            let _ = writeln!(output, "  = rule: {rule}");
        }
        if let Some(group) = &self.group {
            let _ = writeln!(output, "  = group: {group}");
        }
        output
    }
}

impl std::fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{location}: ")?;
        }
        write!(
            f,
            "{} [{}] {} -> {} ({}x): {}",
            self.severity, self.code, self.using, self.used, self.count, self.message
        )?;
        if let Some(rule) = &self.rule {
            write!(f, " (rule: {rule})")?;
        }
        Ok(())
    }
}

/// Result of checking a dependency stream.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CheckResult {
    /// All violations found.
    pub violations: Vec<RuleViolation>,
    /// Number of dependencies checked.
    pub dependencies_checked: usize,
    /// Number of rules or projections skipped because their pattern failed to compile.
    #[serde(default)]
    pub config_errors: usize,
}

impl CheckResult {
    /// Creates a new empty result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if there are any errors, including configuration errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.config_errors > 0
            || self
                .violations
                .iter()
                .any(|v| v.severity == Severity::Error)
    }

    /// Returns true if there are any warnings or errors.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.violations
            .iter()
            .any(|v| v.severity >= Severity::Warning)
    }

    /// Returns violations with the given outcome.
    #[must_use]
    pub fn by_outcome(&self, outcome: Outcome) -> Vec<&RuleViolation> {
        self.violations
            .iter()
            .filter(|v| v.outcome == outcome)
            .collect()
    }

    /// Counts violations by severity.
    #[must_use]
    pub fn count_by_severity(&self) -> (usize, usize, usize) {
        let errors = self
            .violations
            .iter()
            .filter(|v| v.severity == Severity::Error)
            .count();
        let warnings = self
            .violations
            .iter()
            .filter(|v| v.severity == Severity::Warning)
            .count();
        let infos = self
            .violations
            .iter()
            .filter(|v| v.severity == Severity::Info)
            .count();
        (errors, warnings, infos)
    }

    /// Formats violations at or above `fail_on` as a multi-line report.
    #[must_use]
    pub fn format_report(&self, fail_on: Severity) -> String {
        use std::fmt::Write;

        let failing: Vec<&RuleViolation> = self
            .violations
            .iter()
            .filter(|v| v.severity >= fail_on)
            .collect();

        let mut report = String::new();
        let _ = writeln!(
            report,
            "=== dep-lint: {} violation(s) ===\n",
            failing.len()
        );

        for v in &failing {
            report.push_str(&v.format());
            let _ = writeln!(report);
        }

        let (errors, warnings, infos) = self.count_by_severity();
        let _ = write!(
            report,
            "Total: {} error(s), {} warning(s), {} info(s) in {} dependency(ies)",
            errors, warnings, infos, self.dependencies_checked
        );

        report
    }

    /// Checks if any violations meet or exceed the given severity threshold.
    #[must_use]
    pub fn has_violations_at(&self, severity: Severity) -> bool {
        self.violations.iter().any(|v| v.severity >= severity)
    }

    /// Adds violations from another result.
    pub fn extend(&mut self, other: Self) {
        self.violations.extend(other.violations);
        self.dependencies_checked += other.dependencies_checked;
        self.config_errors += other.config_errors;
    }
}
