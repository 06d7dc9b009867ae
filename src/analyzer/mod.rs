//! Batch analysis of documents on disk
//!
//! CDD Principle: Domain Services - Analyzer orchestrates discovery, schema resolution and validation
//! - Coordinates path filtering, document bindings and the validator
//! - Validates independent documents in parallel against a shared read-only registry
//! - Handles per-file failures gracefully unless asked to fail fast

use crate::config::TemplateConfig;
use crate::domain::findings::{
    BatchReport, FileFailure, TemplateError, TemplateResult, ValidationReport,
};
use crate::patterns::path_filter::{slash_path, PathFilter};
use crate::schema::SchemaRegistry;
use crate::validator::Validator;
use glob::Pattern;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Main analyzer that turns paths into validation reports
#[derive(Debug)]
pub struct Analyzer {
    config: TemplateConfig,
    validator: Validator,
    path_filter: PathFilter,
    bindings: Vec<CompiledBinding>,
}

/// A document binding with its glob compiled
#[derive(Debug, Clone)]
struct CompiledBinding {
    pattern: Pattern,
    schema: String,
}

/// Options for customizing analysis behavior
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Whether to validate documents in parallel
    pub parallel: bool,
    /// Maximum number of documents to validate
    pub max_files: Option<usize>,
    /// Whether to stop at the first document that fails to load
    pub fail_fast: bool,
    /// Additional patterns to exclude for this run
    pub exclude_patterns: Vec<String>,
    /// Whether to ignore .templateignore files
    pub ignore_ignore_files: bool,
    /// Validate every document against this schema instead of using bindings
    pub schema: Option<String>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            max_files: None,
            fail_fast: false,
            exclude_patterns: Vec::new(),
            ignore_ignore_files: false,
            schema: None,
        }
    }
}

/// Outcome of analyzing one file
enum FileOutcome {
    Validated(ValidationReport),
    Unbound,
}

impl Analyzer {
    /// Create a new analyzer with the given configuration
    pub fn new(config: TemplateConfig) -> TemplateResult<Self> {
        let registry = Arc::new(config.build_registry()?);

        let bindings = config
            .documents
            .iter()
            .map(|binding| {
                let pattern = Pattern::new(&binding.pattern).map_err(|e| {
                    TemplateError::config(format!(
                        "Invalid document pattern '{}': {e}",
                        binding.pattern
                    ))
                })?;
                Ok(CompiledBinding { pattern, schema: binding.schema.clone() })
            })
            .collect::<TemplateResult<Vec<_>>>()?;

        let path_filter = PathFilter::new(
            config.paths.patterns.clone(),
            config.paths.ignore_file.clone(),
        )
        .map_err(|e| TemplateError::config(format!("Failed to create path filter: {e}")))?;

        Ok(Self {
            config,
            validator: Validator::new(registry),
            path_filter,
            bindings,
        })
    }

    /// Create an analyzer with default configuration
    pub fn with_defaults() -> TemplateResult<Self> {
        Self::new(TemplateConfig::default())
    }

    pub fn config(&self) -> &TemplateConfig {
        &self.config
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn registry(&self) -> &SchemaRegistry {
        self.validator.registry()
    }

    pub fn config_fingerprint(&self) -> String {
        self.config.fingerprint()
    }

    /// Schema bound to a path by the first matching document pattern
    pub fn schema_for(&self, path: &Path) -> Option<&str> {
        let candidate = slash_path(path);
        self.bindings
            .iter()
            .find(|binding| binding.pattern.matches(&candidate))
            .map(|binding| binding.schema.as_str())
    }

    /// Validate one file, using `schema` or the path's binding.
    ///
    /// Returns `Ok(None)` when no schema applies to the file.
    pub fn analyze_file(
        &self,
        file_path: &Path,
        schema: Option<&str>,
    ) -> TemplateResult<Option<ValidationReport>> {
        match self.analyze_one(file_path, schema)? {
            FileOutcome::Validated(report) => Ok(Some(report)),
            FileOutcome::Unbound => Ok(None),
        }
    }

    fn analyze_one(&self, file_path: &Path, schema: Option<&str>) -> TemplateResult<FileOutcome> {
        let Some(schema_id) = schema.or_else(|| self.schema_for(file_path)) else {
            tracing::debug!("No schema bound to {}", file_path.display());
            return Ok(FileOutcome::Unbound);
        };

        let content = fs::read_to_string(file_path).map_err(|e| {
            TemplateError::analysis(
                file_path.display().to_string(),
                format!("Failed to read file: {e}"),
            )
        })?;

        let report =
            self.validator
                .validate_document(&slash_path(file_path), &content, schema_id)?;
        Ok(FileOutcome::Validated(report))
    }

    /// Collect the documents named by `paths`, applying filters and limits
    pub fn collect_files<P: AsRef<Path>>(
        &self,
        paths: &[P],
        options: &AnalysisOptions,
    ) -> TemplateResult<Vec<PathBuf>> {
        let mut filter = self.path_filter.clone();
        if options.ignore_ignore_files {
            filter = filter.without_ignore_files();
        }
        for pattern in &options.exclude_patterns {
            filter.add_pattern(pattern)?;
        }

        let mut files = Vec::new();
        for path in paths {
            let path = path.as_ref();
            if path.is_dir() {
                files.extend(filter.find_files(path)?);
            } else if path.is_file() {
                if filter.should_analyze(path)? {
                    files.push(path.to_path_buf());
                }
            } else {
                return Err(TemplateError::analysis(
                    path.display().to_string(),
                    "Path does not exist",
                ));
            }
        }

        files.sort();
        files.dedup();

        if let Some(max_files) = options.max_files {
            files.truncate(max_files);
        }

        Ok(files)
    }

    /// Analyze files and directories into a batch report
    pub fn analyze_paths<P: AsRef<Path>>(
        &self,
        paths: &[P],
        options: &AnalysisOptions,
    ) -> TemplateResult<BatchReport> {
        let start_time = Instant::now();

        // An unknown override is fatal for the whole call, not per file
        if let Some(schema) = &options.schema {
            self.registry().lookup(schema)?;
        }

        let files = self.collect_files(paths, options)?;
        tracing::info!("Validating {} documents", files.len());

        let schema = options.schema.as_deref();
        let outcomes: Vec<(PathBuf, TemplateResult<FileOutcome>)> =
            if options.parallel && files.len() > 1 {
                files
                    .par_iter()
                    .map(|file| (file.clone(), self.analyze_one(file, schema)))
                    .collect()
            } else {
                let mut outcomes = Vec::with_capacity(files.len());
                for file in &files {
                    let outcome = self.analyze_one(file, schema);
                    let failed = outcome.is_err();
                    outcomes.push((file.clone(), outcome));
                    if failed && options.fail_fast {
                        break;
                    }
                }
                outcomes
            };

        let mut batch = BatchReport::default();
        for (file, outcome) in outcomes {
            match outcome {
                Ok(FileOutcome::Validated(report)) => batch.reports.push(report),
                Ok(FileOutcome::Unbound) => batch.unbound.push(slash_path(&file)),
                Err(e) if options.fail_fast => return Err(e),
                Err(e) => {
                    tracing::warn!("Failed to validate {}: {}", file.display(), e);
                    batch.failures.push(FileFailure {
                        file: slash_path(&file),
                        message: e.to_string(),
                    });
                }
            }
        }

        batch.execution_time_ms = start_time.elapsed().as_millis() as u64;
        batch.config_fingerprint = Some(self.config_fingerprint());
        Ok(batch)
    }

    /// Analyze a directory tree
    pub fn analyze_directory<P: AsRef<Path>>(
        &self,
        root: P,
        options: &AnalysisOptions,
    ) -> TemplateResult<BatchReport> {
        self.analyze_paths(&[root.as_ref()], options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigBuilder, SchemaDefinition, SectionDefinition};
    use crate::domain::findings::FindingKind;
    use tempfile::TempDir;

    fn s1_config() -> TemplateConfig {
        let mut security = SectionDefinition::new("Security");
        security.placeholders = vec!["API_KEY".to_string()];

        ConfigBuilder::empty()
            .add_schema(SchemaDefinition {
                id: "s1".to_string(),
                description: None,
                sections: vec![SectionDefinition::new("Overview"), security],
            })
            .bind("**/SECURITY.md", "s1")
            .build()
            .unwrap()
    }

    #[test]
    fn test_schema_resolution() {
        let analyzer = Analyzer::new(s1_config()).unwrap();
        assert_eq!(analyzer.schema_for(Path::new("docs/SECURITY.md")), Some("s1"));
        assert_eq!(analyzer.schema_for(Path::new("SECURITY.md")), Some("s1"));
        assert_eq!(analyzer.schema_for(Path::new("docs/README.md")), None);
    }

    #[test]
    fn test_single_file_analysis() -> TemplateResult<()> {
        let temp_dir = TempDir::new()?;
        let file = temp_dir.path().join("SECURITY.md");
        fs::write(&file, "# Overview\nText\n# Security\n[API_KEY]\n")?;

        let analyzer = Analyzer::new(s1_config())?;
        let report = analyzer.analyze_file(&file, None)?.expect("file is bound to s1");

        assert_eq!(report.schema(), "s1");
        assert_eq!(report.findings().len(), 1);
        assert_eq!(report.findings()[0].kind(), FindingKind::UnresolvedPlaceholder);
        Ok(())
    }

    #[test]
    fn test_directory_analysis() -> TemplateResult<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        fs::create_dir_all(root.join("a"))?;
        fs::create_dir_all(root.join("b"))?;
        fs::write(root.join("a/SECURITY.md"), "# Overview\nText\n# Security\nVault.\n")?;
        fs::write(root.join("b/SECURITY.md"), "# Security\n[API_KEY]\n")?;
        fs::write(root.join("b/README.md"), "# Readme\n")?;

        let analyzer = Analyzer::new(s1_config())?;
        let batch = analyzer.analyze_directory(root, &AnalysisOptions::default())?;

        assert_eq!(batch.files_validated(), 2);
        assert_eq!(batch.unbound.len(), 1);
        assert!(batch.reports[0].is_clean());
        assert!(batch.reports[0].document().ends_with("a/SECURITY.md"));
        assert!(batch.has_errors());
        assert_eq!(batch.counts().error, 2);
        assert!(batch.config_fingerprint.is_some());
        Ok(())
    }

    #[test]
    fn test_parallel_and_sequential_agree() -> TemplateResult<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        for name in ["one", "two", "three"] {
            fs::create_dir_all(root.join(name))?;
            fs::write(root.join(name).join("SECURITY.md"), "# Security\n[API_KEY]\n")?;
        }

        let analyzer = Analyzer::new(s1_config())?;
        let parallel = analyzer.analyze_directory(root, &AnalysisOptions::default())?;
        let sequential = analyzer.analyze_directory(
            root,
            &AnalysisOptions { parallel: false, ..Default::default() },
        )?;

        assert_eq!(parallel.reports, sequential.reports);
        Ok(())
    }

    #[test]
    fn test_schema_override() -> TemplateResult<()> {
        let temp_dir = TempDir::new()?;
        let file = temp_dir.path().join("notes.md");
        fs::write(&file, "# Overview\n")?;

        let analyzer = Analyzer::new(s1_config())?;
        let options = AnalysisOptions { schema: Some("s1".to_string()), ..Default::default() };
        let batch = analyzer.analyze_paths(&[&file], &options)?;
        assert_eq!(batch.reports.len(), 1);
        assert_eq!(batch.counts().error, 1);

        let unknown = AnalysisOptions { schema: Some("nope".to_string()), ..Default::default() };
        let result = analyzer.analyze_paths(&[&file], &unknown);
        assert!(matches!(result, Err(TemplateError::UnknownSchema { .. })));
        Ok(())
    }

    #[test]
    fn test_max_files_and_excludes() -> TemplateResult<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        fs::create_dir_all(root.join("keep"))?;
        fs::create_dir_all(root.join("skip"))?;
        fs::write(root.join("keep/SECURITY.md"), "# Security\n")?;
        fs::write(root.join("skip/SECURITY.md"), "# Security\n")?;

        let analyzer = Analyzer::new(s1_config())?;

        let limited = AnalysisOptions { max_files: Some(1), ..Default::default() };
        assert_eq!(analyzer.analyze_directory(root, &limited)?.files_validated(), 1);

        let excluded = AnalysisOptions {
            exclude_patterns: vec!["skip/**".to_string()],
            ..Default::default()
        };
        let batch = analyzer.analyze_directory(root, &excluded)?;
        assert_eq!(batch.files_validated(), 1);
        assert!(batch.reports[0].document().ends_with("keep/SECURITY.md"));
        Ok(())
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let analyzer = Analyzer::new(s1_config()).unwrap();
        let result =
            analyzer.analyze_paths(&[Path::new("/definitely/not/here")], &AnalysisOptions::default());
        assert!(result.is_err());
    }
}
