//! Configuration loading and management for Template Guardian
//!
//! Architecture: Anti-Corruption Layer - Configuration translates external YAML formats
//! - Raw YAML structures are converted to validated schemas and a read-only registry
//! - Default schemas for the bundled guideline documents are embedded in code
//! - Document bindings map file paths to the schema each document must satisfy

use crate::domain::findings::{TemplateError, TemplateResult};
use crate::schema::{DocumentSchema, SchemaRegistry, SectionRule};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Supported configuration format versions
const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

/// File names searched for when no configuration path is given
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "template_guardian.yaml",
    "template_guardian.yml",
    ".template_guardian.yaml",
];

/// Main configuration structure for Template Guardian
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Configuration format version
    pub version: String,
    /// Path filtering configuration
    #[serde(default)]
    pub paths: PathConfig,
    /// Which schema applies to which documents
    #[serde(default)]
    pub documents: Vec<DocumentBinding>,
    /// Schema definitions
    #[serde(default)]
    pub schemas: Vec<SchemaDefinition>,
}

/// Path filtering configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathConfig {
    /// Include/exclude patterns (gitignore-style)
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Optional .templateignore file name
    #[serde(default)]
    pub ignore_file: Option<String>,
}

/// Glob pattern that assigns a schema to matching documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentBinding {
    pub pattern: String,
    pub schema: String,
}

/// Serialized form of a [`DocumentSchema`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub sections: Vec<SectionDefinition>,
}

/// Serialized form of a [`SectionRule`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDefinition {
    /// Heading text, matched case-insensitively with whitespace collapsed
    pub heading: String,
    /// Alternative case-insensitive regex for the heading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_pattern: Option<String>,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_body_length: Option<usize>,
    /// Tokens that must be replaced before the document is used
    #[serde(default)]
    pub placeholders: Vec<String>,
}

impl SectionDefinition {
    pub fn new(heading: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            heading_pattern: None,
            required: true,
            min_body_length: None,
            placeholders: Vec::new(),
        }
    }

    pub fn to_rule(&self) -> TemplateResult<SectionRule> {
        let mut rule = SectionRule::new(self.heading.clone())
            .required(self.required)
            .with_placeholders(&self.placeholders);

        if let Some(length) = self.min_body_length {
            rule = rule.with_min_body_length(length);
        }
        if let Some(pattern) = &self.heading_pattern {
            rule = rule.with_heading_pattern(pattern)?;
        }

        Ok(rule)
    }
}

impl SchemaDefinition {
    pub fn to_schema(&self) -> TemplateResult<DocumentSchema> {
        let rules = self
            .sections
            .iter()
            .map(SectionDefinition::to_rule)
            .collect::<TemplateResult<Vec<_>>>()?;

        let schema = DocumentSchema::new(self.id.clone(), rules)?;
        Ok(match &self.description {
            Some(description) => schema.with_description(description.clone()),
            None => schema,
        })
    }
}

impl TemplateConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> TemplateResult<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            TemplateError::config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            TemplateError::config(format!(
                "Failed to parse config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from string content
    pub fn load_from_str(content: &str) -> TemplateResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| TemplateError::config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Look for one of [`DEFAULT_CONFIG_FILES`] in `dir`
    pub fn discover<P: AsRef<Path>>(dir: P) -> TemplateResult<Option<(PathBuf, Self)>> {
        for name in DEFAULT_CONFIG_FILES {
            let candidate = dir.as_ref().join(name);
            if candidate.is_file() {
                tracing::debug!("Using configuration file {}", candidate.display());
                let config = Self::load_from_file(&candidate)?;
                return Ok(Some((candidate, config)));
            }
        }
        Ok(None)
    }

    /// Default configuration with the bundled guideline schemas
    pub fn with_defaults() -> Self {
        Self {
            version: "1.0".to_string(),
            paths: PathConfig {
                patterns: vec![
                    "target/**".to_string(),
                    "**/node_modules/**".to_string(),
                    "**/.git/**".to_string(),
                ],
                ignore_file: Some(".templateignore".to_string()),
            },
            documents: default_bindings(),
            schemas: default_schemas(),
        }
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> TemplateResult<()> {
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            return Err(TemplateError::config(format!(
                "Unsupported configuration version: {}. Supported versions: {}",
                self.version,
                SUPPORTED_VERSIONS.join(", ")
            )));
        }

        let registry = self.build_registry().map_err(|e| TemplateError::config(e.to_string()))?;

        for binding in &self.documents {
            if !registry.contains(&binding.schema) {
                return Err(TemplateError::config(format!(
                    "Document pattern '{}' refers to unknown schema '{}'",
                    binding.pattern, binding.schema
                )));
            }
            glob::Pattern::new(&binding.pattern).map_err(|e| {
                TemplateError::config(format!(
                    "Invalid document pattern '{}': {}",
                    binding.pattern, e
                ))
            })?;
        }

        for pattern in &self.paths.patterns {
            let raw = pattern.strip_prefix('!').unwrap_or(pattern);
            glob::Pattern::new(raw).map_err(|e| {
                TemplateError::config(format!("Invalid path pattern '{pattern}': {e}"))
            })?;
        }

        Ok(())
    }

    /// Build the read-only schema registry described by this configuration
    pub fn build_registry(&self) -> TemplateResult<SchemaRegistry> {
        let schemas = self
            .schemas
            .iter()
            .map(SchemaDefinition::to_schema)
            .collect::<TemplateResult<Vec<_>>>()?;
        SchemaRegistry::new(schemas)
    }

    pub fn find_schema(&self, id: &str) -> Option<&SchemaDefinition> {
        self.schemas.iter().find(|schema| schema.id == id)
    }

    /// Convert to JSON for serialization
    pub fn to_json(&self) -> TemplateResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| TemplateError::config(format!("Failed to serialize config: {e}")))
    }

    /// SHA-256 of the canonical JSON form, stable across runs and platforms
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        format!("{:x}", Sha256::digest(&canonical))
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn default_true() -> bool {
    true
}

fn section(heading: &str, placeholders: &[&str]) -> SectionDefinition {
    SectionDefinition {
        placeholders: placeholders.iter().map(|t| t.to_string()).collect(),
        ..SectionDefinition::new(heading)
    }
}

fn optional(mut definition: SectionDefinition) -> SectionDefinition {
    definition.required = false;
    definition
}

fn min_length(mut definition: SectionDefinition, length: usize) -> SectionDefinition {
    definition.min_body_length = Some(length);
    definition
}

fn bind(pattern: &str, schema: &str) -> DocumentBinding {
    DocumentBinding { pattern: pattern.to_string(), schema: schema.to_string() }
}

fn default_bindings() -> Vec<DocumentBinding> {
    vec![
        bind("**/PROJECT_SPEC.md", "project-spec"),
        bind("**/TESTING.md", "testing-standards"),
        bind("**/GIT_CONVENTIONS.md", "git-conventions"),
        bind("**/SECURITY.md", "security-checklist"),
        bind("**/WORKFLOW.md", "development-workflow"),
    ]
}

/// Schemas for the guideline documents shipped with the workflow templates
fn default_schemas() -> Vec<SchemaDefinition> {
    vec![
        SchemaDefinition {
            id: "project-spec".to_string(),
            description: Some("Project specification template".to_string()),
            sections: vec![
                section("Overview", &["Project Name", "Description"]),
                section("Goals", &["Goal"]),
                section("Tech Stack", &["Language", "Framework", "Database"]),
                min_length(section("Architecture", &["Architecture Description"]), 40),
                section("Requirements", &["Requirement"]),
                optional(section("Security", &["API_KEY"])),
                section("Testing Strategy", &["Coverage Target"]),
            ],
        },
        SchemaDefinition {
            id: "testing-standards".to_string(),
            description: Some("Testing standards and coverage thresholds".to_string()),
            sections: vec![
                section("Coverage Requirements", &["Coverage Threshold"]),
                section("Unit Tests", &[]),
                section("Integration Tests", &[]),
                optional(section("Test Naming", &[])),
                section("Running Tests", &["Test Command"]),
            ],
        },
        SchemaDefinition {
            id: "git-conventions".to_string(),
            description: Some("Branching and commit message conventions".to_string()),
            sections: vec![
                section("Branch Naming", &["Main Branch"]),
                min_length(section("Commit Message Format", &[]), 20),
                section("Pull Requests", &["Reviewer"]),
            ],
        },
        SchemaDefinition {
            id: "security-checklist".to_string(),
            description: Some("Security review checklist".to_string()),
            sections: vec![
                section("Authentication", &[]),
                section("Input Validation", &[]),
                section("Secrets Management", &["API_KEY", "SECRET"]),
                section("Dependencies", &[]),
                optional(section("Reporting Vulnerabilities", &["Security Contact"])),
            ],
        },
        SchemaDefinition {
            id: "development-workflow".to_string(),
            description: Some("Five-step development workflow".to_string()),
            sections: vec![
                section("Plan", &[]),
                section("Implement", &[]),
                section("Test", &[]),
                section("Review", &[]),
                section("Commit", &[]),
            ],
        },
    ]
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: TemplateConfig,
}

impl ConfigBuilder {
    /// Start from the default configuration
    pub fn new() -> Self {
        Self { config: TemplateConfig::default() }
    }

    /// Start with no schemas, bindings or path patterns
    pub fn empty() -> Self {
        Self {
            config: TemplateConfig {
                version: "1.0".to_string(),
                paths: PathConfig::default(),
                documents: Vec::new(),
                schemas: Vec::new(),
            },
        }
    }

    pub fn add_path_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.paths.patterns.push(pattern.into());
        self
    }

    pub fn ignore_file(mut self, filename: impl Into<String>) -> Self {
        self.config.paths.ignore_file = Some(filename.into());
        self
    }

    pub fn add_schema(mut self, schema: SchemaDefinition) -> Self {
        self.config.schemas.push(schema);
        self
    }

    pub fn bind(mut self, pattern: impl Into<String>, schema: impl Into<String>) -> Self {
        self.config
            .documents
            .push(DocumentBinding { pattern: pattern.into(), schema: schema.into() });
        self
    }

    pub fn build(self) -> TemplateResult<TemplateConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
