//! Core domain models for template findings and validation results
//!
//! Architecture: Rich Domain Models - Findings are values with behavior, not just data
//! - Findings know their kind, severity, source line and how to describe themselves
//! - ValidationReport is an immutable aggregate produced by a single validation run
//! - Errors are reserved for faults; findings are the product of a successful run

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier used for documents validated from memory rather than from a file
pub const ANONYMOUS_DOCUMENT: &str = "<memory>";

/// Severity levels for findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational messages and suggestions
    Info,
    /// Deviations that should be addressed but do not block
    Warning,
    /// Deviations that make the document unusable as-is
    Error,
}

impl Severity {
    /// Whether this severity level should cause validation to fail
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// Discriminant of a [`Finding`], ordered the way reports sort ties on the same line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    MissingSection,
    UnresolvedPlaceholder,
    OutOfOrderSection,
    InsufficientContent,
}

impl FindingKind {
    pub const ALL: [FindingKind; 4] = [
        Self::MissingSection,
        Self::UnresolvedPlaceholder,
        Self::OutOfOrderSection,
        Self::InsufficientContent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingSection => "missing_section",
            Self::UnresolvedPlaceholder => "unresolved_placeholder",
            Self::OutOfOrderSection => "out_of_order_section",
            Self::InsufficientContent => "insufficient_content",
        }
    }

    /// Parse a kind from its snake_case name (dashes are accepted too)
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Default severity for findings of this kind
    pub fn severity(self) -> Severity {
        match self {
            Self::MissingSection | Self::UnresolvedPlaceholder => Severity::Error,
            Self::OutOfOrderSection | Self::InsufficientContent => Severity::Warning,
        }
    }

    /// Long-form explanation used by `template-guardian explain`
    pub fn description(self) -> &'static str {
        match self {
            Self::MissingSection => {
                "A section the schema marks as required has no matching heading in the \
                 document. Headings match case-insensitively with whitespace collapsed."
            }
            Self::UnresolvedPlaceholder => {
                "A bracketed token such as [Project Name] that the schema lists as \
                 must-be-replaced is still present in the section body. Unlisted \
                 brackets, links and task-list boxes are ignored."
            }
            Self::OutOfOrderSection => {
                "A section appears in a different position than the schema declares. \
                 Displacement is computed against the longest common subsequence of the \
                 expected and actual order, so a single swap reports only the two \
                 sections involved."
            }
            Self::InsufficientContent => {
                "A section body is shorter than the minimum length configured for its \
                 rule, which usually means the template text was deleted but never \
                 replaced."
            }
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A 1-indexed position in the source document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// One reported deviation between a document and its schema
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// A required section is absent
    MissingSection { section: String },
    /// A must-be-replaced token is still present
    UnresolvedPlaceholder {
        token: String,
        section: String,
        location: Location,
    },
    /// A section sits outside the schema's declared order
    OutOfOrderSection {
        section: String,
        expected_index: usize,
        actual_index: usize,
        line: usize,
    },
    /// A section body is shorter than its rule's minimum
    InsufficientContent {
        section: String,
        min_length: usize,
        actual_length: usize,
        line: usize,
    },
}

impl Finding {
    pub fn kind(&self) -> FindingKind {
        match self {
            Self::MissingSection { .. } => FindingKind::MissingSection,
            Self::UnresolvedPlaceholder { .. } => FindingKind::UnresolvedPlaceholder,
            Self::OutOfOrderSection { .. } => FindingKind::OutOfOrderSection,
            Self::InsufficientContent { .. } => FindingKind::InsufficientContent,
        }
    }

    pub fn severity(&self) -> Severity {
        self.kind().severity()
    }

    pub fn is_blocking(&self) -> bool {
        self.severity().is_blocking()
    }

    /// Schema heading of the section this finding is about
    pub fn section(&self) -> &str {
        match self {
            Self::MissingSection { section }
            | Self::UnresolvedPlaceholder { section, .. }
            | Self::OutOfOrderSection { section, .. }
            | Self::InsufficientContent { section, .. } => section,
        }
    }

    /// Source line, if the finding points at text that exists in the document
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::MissingSection { .. } => None,
            Self::UnresolvedPlaceholder { location, .. } => Some(location.line),
            Self::OutOfOrderSection { line, .. } | Self::InsufficientContent { line, .. } => {
                Some(*line)
            }
        }
    }

    pub fn column(&self) -> Option<usize> {
        match self {
            Self::UnresolvedPlaceholder { location, .. } => Some(location.column),
            _ => None,
        }
    }

    /// Sort key used by reports: line (absent sections first), then kind
    pub fn sort_key(&self) -> (usize, FindingKind) {
        (self.line().unwrap_or(0), self.kind())
    }

    /// Human-readable description of the finding
    pub fn message(&self) -> String {
        match self {
            Self::MissingSection { section } => {
                format!("required section '{section}' is missing")
            }
            Self::UnresolvedPlaceholder { token, section, .. } => {
                format!("placeholder [{token}] in section '{section}' was never replaced")
            }
            Self::OutOfOrderSection {
                section,
                expected_index,
                actual_index,
                ..
            } => format!(
                "section '{section}' is out of order: expected at position {}, found at position {}",
                expected_index + 1,
                actual_index + 1
            ),
            Self::InsufficientContent {
                section,
                min_length,
                actual_length,
                ..
            } => format!(
                "section '{section}' has {actual_length} characters of content, at least {min_length} required"
            ),
        }
    }
}

/// Count of findings by severity level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub error: usize,
    pub warning: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn total(&self) -> usize {
        self.error + self.warning + self.info
    }

    pub fn has_blocking(&self) -> bool {
        self.error > 0
    }

    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Error => self.error += 1,
            Severity::Warning => self.warning += 1,
            Severity::Info => self.info += 1,
        }
    }

    pub fn merge(&mut self, other: SeverityCounts) {
        self.error += other.error;
        self.warning += other.warning;
        self.info += other.info;
    }
}

/// Result of validating one document against one schema.
///
/// Reports are immutable once built: the findings are sorted at construction
/// and only exposed through shared references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ReportFields")]
pub struct ValidationReport {
    document: String,
    schema: String,
    findings: Vec<Finding>,
}

/// Serialized shape of a report; deserialization goes through [`ValidationReport::new`]
#[derive(Deserialize)]
struct ReportFields {
    document: String,
    schema: String,
    findings: Vec<Finding>,
}

impl From<ReportFields> for ValidationReport {
    fn from(fields: ReportFields) -> Self {
        Self::new(fields.document, fields.schema, fields.findings)
    }
}

impl ValidationReport {
    /// Build a report, ordering findings by line then kind.
    ///
    /// The sort is stable, so findings that tie keep the order the validator
    /// emitted them in.
    pub fn new(
        document: impl Into<String>,
        schema: impl Into<String>,
        mut findings: Vec<Finding>,
    ) -> Self {
        findings.sort_by_key(Finding::sort_key);
        Self {
            document: document.into(),
            schema: schema.into(),
            findings,
        }
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(Finding::is_blocking)
    }

    pub fn counts(&self) -> SeverityCounts {
        let mut counts = SeverityCounts::default();
        for finding in &self.findings {
            counts.add(finding.severity());
        }
        counts
    }

    pub fn findings_of_kind(&self, kind: FindingKind) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.kind() == kind)
    }
}

/// A document that could not be validated during a batch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub file: String,
    pub message: String,
}

/// Results of validating many documents in one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    /// One report per validated document, sorted by document path
    pub reports: Vec<ValidationReport>,
    /// Documents found but not bound to any schema
    pub unbound: Vec<String>,
    /// Documents that failed to load
    pub failures: Vec<FileFailure>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u64,
    /// Fingerprint of the configuration that produced the reports
    pub config_fingerprint: Option<String>,
}

impl BatchReport {
    pub fn files_validated(&self) -> usize {
        self.reports.len()
    }

    pub fn counts(&self) -> SeverityCounts {
        let mut counts = SeverityCounts::default();
        for report in &self.reports {
            counts.merge(report.counts());
        }
        counts
    }

    pub fn has_errors(&self) -> bool {
        self.reports.iter().any(ValidationReport::has_errors)
    }

    pub fn has_findings(&self) -> bool {
        self.reports.iter().any(|r| !r.is_clean())
    }

    pub fn total_findings(&self) -> usize {
        self.reports.iter().map(|r| r.findings().len()).sum()
    }
}

/// Error types that can occur while loading schemas or validating documents
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// No schema is registered under the requested identifier
    #[error("Unknown schema: '{id}'")]
    UnknownSchema { id: String },

    /// Configuration file could not be loaded or parsed
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A schema definition violates its invariants
    #[error("Schema error: {message}")]
    Schema { message: String },

    /// File could not be read or accessed
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Glob or regex compilation failed
    #[error("Pattern error: {message}")]
    Pattern { message: String },

    /// A specific document could not be analyzed
    #[error("Analysis error in {file}: {message}")]
    Analysis { file: String, message: String },
}

impl TemplateError {
    pub fn unknown_schema(id: impl Into<String>) -> Self {
        Self::UnknownSchema { id: id.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    pub fn pattern(message: impl Into<String>) -> Self {
        Self::Pattern {
            message: message.into(),
        }
    }

    pub fn analysis(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Analysis {
            file: file.into(),
            message: message.into(),
        }
    }
}

/// Result type for template-guardian operations
pub type TemplateResult<T> = Result<T, TemplateError>;
