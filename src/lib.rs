//! Template Guardian - Completeness validation for Markdown guideline templates
//!
//! Architecture: Clean Architecture - Library interface serves as the application layer
//! - Pure parsing and validation separated from file system concerns
//! - A read-only schema registry is shared by every validation
//! - Async entry points move blocking batch work off the runtime

pub mod analyzer;
pub mod config;
pub mod domain;
pub mod parser;
pub mod patterns;
pub mod report;
pub mod schema;
pub mod validator;

// Re-export main types for convenient access
pub use domain::findings::{
    BatchReport, FileFailure, Finding, FindingKind, Location, Severity, SeverityCounts,
    TemplateError, TemplateResult, ValidationReport,
};

pub use config::{ConfigBuilder, DocumentBinding, SchemaDefinition, SectionDefinition, TemplateConfig};

pub use analyzer::{AnalysisOptions, Analyzer};

pub use parser::{parse_sections, ParsedSection};

pub use report::{
    FindingRecord, OutputFormat, RenderFormat, Rendered, ReportFormatter, ReportOptions,
};

pub use schema::{DocumentSchema, SchemaRegistry, SectionRule};

pub use validator::Validator;

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Main entry point providing high-level validation operations
pub struct TemplateGuardian {
    analyzer: Arc<Analyzer>,
    report_formatter: ReportFormatter,
}

impl TemplateGuardian {
    /// Create a guardian with the given configuration
    pub fn new_with_config(config: TemplateConfig) -> TemplateResult<Self> {
        let analyzer = Analyzer::new(config)?;
        Ok(Self { analyzer: Arc::new(analyzer), report_formatter: ReportFormatter::default() })
    }

    /// Create a guardian with the bundled default schemas
    pub fn new() -> TemplateResult<Self> {
        Self::new_with_config(TemplateConfig::default())
    }

    /// Create a guardian loading configuration from file
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> TemplateResult<Self> {
        let config = TemplateConfig::load_from_file(path)?;
        Self::new_with_config(config)
    }

    /// Set custom report formatter
    pub fn with_report_formatter(mut self, formatter: ReportFormatter) -> Self {
        self.report_formatter = formatter;
        self
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    pub fn registry(&self) -> &SchemaRegistry {
        self.analyzer.registry()
    }

    /// Validate in-memory document text against a registered schema
    pub fn validate(&self, document_text: &str, schema_id: &str) -> TemplateResult<ValidationReport> {
        self.analyzer.validator().validate(document_text, schema_id)
    }

    /// Render a report as text or as finding records
    pub fn render(&self, report: &ValidationReport, format: RenderFormat) -> Rendered {
        self.report_formatter.render(report, format)
    }

    /// Validate a single file against its bound schema, or `schema` when given.
    ///
    /// Returns `Ok(None)` when no schema applies.
    pub fn validate_file<P: AsRef<Path>>(
        &self,
        file_path: P,
        schema: Option<&str>,
    ) -> TemplateResult<Option<ValidationReport>> {
        self.analyzer.analyze_file(file_path.as_ref(), schema)
    }

    /// Validate files and directories without blocking the async runtime
    pub async fn validate_paths<P: AsRef<Path>>(
        &self,
        paths: Vec<P>,
        options: &AnalysisOptions,
    ) -> TemplateResult<BatchReport> {
        let paths: Vec<PathBuf> = paths.iter().map(|p| p.as_ref().to_path_buf()).collect();
        let analyzer = Arc::clone(&self.analyzer);
        let options = options.clone();

        tokio::task::spawn_blocking(move || analyzer.analyze_paths(&paths, &options))
            .await
            .map_err(|e| TemplateError::config(format!("Validation task failed: {e}")))?
    }

    /// Format a batch report for output
    pub fn format_batch(&self, batch: &BatchReport, format: OutputFormat) -> TemplateResult<String> {
        self.report_formatter.format_batch(batch, format)
    }
}

/// Pre-commit validation of modified documents
///
/// Documents without a bound schema are skipped. Returns an error when any
/// blocking finding is present.
pub async fn pre_commit_check<P: AsRef<Path>>(modified_files: Vec<P>) -> TemplateResult<()> {
    let guardian = TemplateGuardian::new()?;
    let batch = guardian.validate_paths(modified_files, &AnalysisOptions::default()).await?;

    if batch.has_errors() {
        let error_count = batch.counts().error;
        return Err(TemplateError::config(format!(
            "Pre-commit check failed: {} blocking finding{} found",
            error_count,
            if error_count == 1 { "" } else { "s" }
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const COMPLETE_WORKFLOW: &str =
        "# Plan\nScope it.\n# Implement\nWrite it.\n# Test\nRun it.\n# Review\nRead it.\n# Commit\nShip it.\n";

    #[test]
    fn test_guardian_creation() {
        let guardian = TemplateGuardian::new().unwrap();
        assert_eq!(guardian.registry().len(), 5);
        assert!(guardian.registry().contains("security-checklist"));
    }

    #[test]
    fn test_validate_in_memory() {
        let guardian = TemplateGuardian::new().unwrap();

        let report = guardian.validate(COMPLETE_WORKFLOW, "development-workflow").unwrap();
        assert!(report.is_clean());
        assert_eq!(report.document(), domain::findings::ANONYMOUS_DOCUMENT);

        let result = guardian.validate(COMPLETE_WORKFLOW, "release-notes");
        assert!(matches!(result, Err(TemplateError::UnknownSchema { ref id }) if id == "release-notes"));
    }

    #[test]
    fn test_render_text() {
        let guardian = TemplateGuardian::new().unwrap();
        let report = guardian.validate("# Plan\nScope it.\n", "development-workflow").unwrap();

        let Rendered::Text(text) = guardian.render(&report, RenderFormat::Text) else {
            panic!("expected text output");
        };
        assert_eq!(text.lines().count(), 4);
        assert!(text.contains("required section 'Commit' is missing"));
    }

    #[test]
    fn test_single_file_validation() {
        let temp_dir = TempDir::new().unwrap();
        let bound = temp_dir.path().join("WORKFLOW.md");
        let unbound = temp_dir.path().join("NOTES.md");
        fs::write(&bound, COMPLETE_WORKFLOW).unwrap();
        fs::write(&unbound, "# Notes\n").unwrap();

        let guardian = TemplateGuardian::new().unwrap();

        let report = guardian.validate_file(&bound, None).unwrap().unwrap();
        assert_eq!(report.schema(), "development-workflow");
        assert!(report.is_clean());

        assert!(guardian.validate_file(&unbound, None).unwrap().is_none());

        let forced = guardian.validate_file(&unbound, Some("development-workflow")).unwrap().unwrap();
        assert_eq!(forced.counts().error, 5);
    }

    #[tokio::test]
    async fn test_validate_paths() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("WORKFLOW.md"), COMPLETE_WORKFLOW).unwrap();
        fs::write(root.join("SECURITY.md"), "# Authentication\nOAuth.\n").unwrap();

        let guardian = TemplateGuardian::new().unwrap();
        let batch = guardian.validate_paths(vec![root], &AnalysisOptions::default()).await.unwrap();

        assert_eq!(batch.files_validated(), 2);
        assert!(batch.has_errors());
        assert_eq!(batch.counts().error, 3);

        let text = guardian.format_batch(&batch, OutputFormat::Text).unwrap();
        assert!(text.contains("Summary:"));
    }

    #[tokio::test]
    async fn test_pre_commit_check() {
        let temp_dir = TempDir::new().unwrap();
        let clean = temp_dir.path().join("clean");
        let dirty = temp_dir.path().join("dirty");
        fs::create_dir_all(&clean).unwrap();
        fs::create_dir_all(&dirty).unwrap();

        fs::write(clean.join("WORKFLOW.md"), COMPLETE_WORKFLOW).unwrap();
        fs::write(dirty.join("WORKFLOW.md"), "# Plan\n[TBD]\n").unwrap();

        assert!(pre_commit_check(vec![clean.join("WORKFLOW.md")]).await.is_ok());
        assert!(pre_commit_check(vec![dirty.join("WORKFLOW.md")]).await.is_err());
    }
}
