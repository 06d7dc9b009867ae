//! Document schemas and the read-only schema registry
//!
//! Architecture: Repository Pattern - The registry owns every schema for the process lifetime
//! - Schemas are validated once at construction and never mutated afterwards
//! - Lookups hand out shared references; no locking is needed for concurrent readers
//! - Section rules encapsulate heading matching and placeholder normalisation

use crate::domain::findings::{TemplateError, TemplateResult};
use regex::{Regex, RegexBuilder};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Lowercase and collapse whitespace so headings compare loosely
pub fn normalize_heading(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip surrounding brackets and whitespace from a placeholder token
pub fn normalize_token(token: &str) -> String {
    let trimmed = token.trim();
    trimmed
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

/// A single required or optional section in a document type
#[derive(Debug, Clone)]
pub struct SectionRule {
    heading: String,
    normalized: String,
    pattern: Option<Regex>,
    required: bool,
    min_body_length: Option<usize>,
    placeholders: Vec<String>,
}

impl SectionRule {
    /// Create a required rule matching `heading` with no other constraints
    pub fn new(heading: impl Into<String>) -> Self {
        let heading = heading.into();
        let normalized = normalize_heading(&heading);
        Self {
            heading,
            normalized,
            pattern: None,
            required: true,
            min_body_length: None,
            placeholders: Vec::new(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_min_body_length(mut self, length: usize) -> Self {
        self.min_body_length = Some(length);
        self
    }

    /// Add tokens that must not remain in the section body
    pub fn with_placeholders<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for token in tokens {
            let token = normalize_token(token.as_ref());
            if !token.is_empty() && !self.placeholders.contains(&token) {
                self.placeholders.push(token);
            }
        }
        self
    }

    /// Also accept headings matching a case-insensitive regex
    pub fn with_heading_pattern(mut self, pattern: &str) -> TemplateResult<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                TemplateError::pattern(format!(
                    "Invalid heading pattern for section '{}': {e}",
                    self.heading
                ))
            })?;
        self.pattern = Some(regex);
        Ok(self)
    }

    pub fn heading(&self) -> &str {
        &self.heading
    }

    pub fn normalized_heading(&self) -> &str {
        &self.normalized
    }

    pub fn heading_pattern(&self) -> Option<&str> {
        self.pattern.as_ref().map(Regex::as_str)
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn min_body_length(&self) -> Option<usize> {
        self.min_body_length
    }

    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    pub fn forbids(&self, token: &str) -> bool {
        self.placeholders.iter().any(|t| t == token)
    }

    /// Whether a parsed heading satisfies this rule
    pub fn matches(&self, heading: &str) -> bool {
        let normalized = normalize_heading(heading);
        if normalized.is_empty() {
            return false;
        }
        normalized == self.normalized
            || self.pattern.as_ref().is_some_and(|p| p.is_match(&normalized))
    }
}

/// The ordered rules a document type must satisfy
#[derive(Debug, Clone)]
pub struct DocumentSchema {
    id: String,
    description: Option<String>,
    sections: Vec<SectionRule>,
}

impl DocumentSchema {
    /// Build a schema, rejecting empty or duplicate headings
    pub fn new(id: impl Into<String>, sections: Vec<SectionRule>) -> TemplateResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(TemplateError::schema("Schema id must not be empty"));
        }

        let mut seen = HashSet::new();
        for rule in &sections {
            if rule.normalized.is_empty() {
                return Err(TemplateError::schema(format!(
                    "Schema '{id}' contains a section rule with an empty heading"
                )));
            }
            if !seen.insert(rule.normalized.as_str()) {
                return Err(TemplateError::schema(format!(
                    "Duplicate section heading '{}' in schema '{id}'",
                    rule.heading
                )));
            }
        }

        Ok(Self { id, description: None, sections })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn sections(&self) -> &[SectionRule] {
        &self.sections
    }

    pub fn required_sections(&self) -> impl Iterator<Item = &SectionRule> {
        self.sections.iter().filter(|rule| rule.required)
    }
}

/// Read-only map from document type identifier to schema
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Arc<DocumentSchema>>,
}

impl SchemaRegistry {
    /// Build the registry once; duplicate identifiers are rejected
    pub fn new(schemas: impl IntoIterator<Item = DocumentSchema>) -> TemplateResult<Self> {
        let mut map = BTreeMap::new();
        for schema in schemas {
            let id = schema.id.clone();
            if map.insert(id.clone(), Arc::new(schema)).is_some() {
                return Err(TemplateError::schema(format!("Duplicate schema id '{id}'")));
            }
        }

        tracing::debug!("Schema registry initialised with {} schemas", map.len());
        Ok(Self { schemas: map })
    }

    /// Find the schema registered under `id`
    pub fn lookup(&self, id: &str) -> TemplateResult<&DocumentSchema> {
        self.schemas
            .get(id)
            .map(Arc::as_ref)
            .ok_or_else(|| TemplateError::unknown_schema(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.schemas.contains_key(id)
    }

    /// Registered identifiers in sorted order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn schemas(&self) -> impl Iterator<Item = &DocumentSchema> {
        self.schemas.values().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overview_security() -> DocumentSchema {
        DocumentSchema::new(
            "s1",
            vec![
                SectionRule::new("Overview"),
                SectionRule::new("Security").with_placeholders(["[API_KEY]"]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_normalize_heading() {
        assert_eq!(normalize_heading("  Tech   STACK "), "tech stack");
        assert_eq!(normalize_heading(""), "");
    }

    #[test]
    fn test_normalize_token() {
        assert_eq!(normalize_token("[API_KEY]"), "API_KEY");
        assert_eq!(normalize_token(" Project Name "), "Project Name");
        assert_eq!(normalize_token("[ Description ]"), "Description");
    }

    #[test]
    fn test_rule_matching_is_loose() {
        let rule = SectionRule::new("Tech Stack");
        assert!(rule.matches("tech   stack"));
        assert!(rule.matches("TECH STACK"));
        assert!(!rule.matches("Tech"));
        assert!(!rule.matches(""));
    }

    #[test]
    fn test_rule_heading_pattern() {
        let rule = SectionRule::new("Testing")
            .with_heading_pattern(r"^(testing|tests)( strategy)?$")
            .unwrap();
        assert!(rule.matches("Tests Strategy"));
        assert!(rule.matches("testing"));
        assert!(!rule.matches("Integration Tests"));

        assert!(SectionRule::new("Bad").with_heading_pattern("(").is_err());
    }

    #[test]
    fn test_placeholders_are_normalized_and_deduplicated() {
        let rule = SectionRule::new("Security").with_placeholders(["[API_KEY]", "API_KEY", ""]);
        assert_eq!(rule.placeholders(), ["API_KEY".to_string()]);
        assert!(rule.forbids("API_KEY"));
    }

    #[test]
    fn test_schema_rejects_duplicate_headings() {
        let result = DocumentSchema::new(
            "dup",
            vec![SectionRule::new("Overview"), SectionRule::new(" overview ")],
        );
        assert!(matches!(result, Err(TemplateError::Schema { .. })));
    }

    #[test]
    fn test_schema_rejects_empty_heading() {
        let result = DocumentSchema::new("empty", vec![SectionRule::new("   ")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_registry_lookup() {
        let registry = SchemaRegistry::new(vec![overview_security()]).unwrap();

        assert_eq!(registry.lookup("s1").unwrap().sections().len(), 2);
        assert!(matches!(
            registry.lookup("missing"),
            Err(TemplateError::UnknownSchema { id }) if id == "missing"
        ));
    }

    #[test]
    fn test_registry_rejects_duplicate_ids() {
        let result = SchemaRegistry::new(vec![overview_security(), overview_security()]);
        assert!(result.is_err());
    }
}
