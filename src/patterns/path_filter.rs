//! Path filtering using .gitignore-style patterns
//!
//! Architectural Principle: Service Layer - PathFilter decides which documents get validated
//! - Configured patterns are applied in order, later patterns overriding earlier ones
//! - `!pattern` re-includes paths an earlier pattern excluded
//! - `.templateignore` files are honoured relative to the directory that holds them

use crate::domain::findings::{TemplateError, TemplateResult};
use glob::{MatchOptions, Pattern};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File extensions picked up when walking directories
pub const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Decides which documents should be validated
#[derive(Debug, Clone)]
pub struct PathFilter {
    rules: Vec<FilterRule>,
    ignore_filename: Option<String>,
}

/// One include or exclude pattern
#[derive(Debug, Clone)]
struct FilterRule {
    pattern: Pattern,
    include: bool,
    /// Patterns without a slash match the file name only
    basename_only: bool,
}

impl FilterRule {
    fn parse(raw: &str) -> TemplateResult<Self> {
        let (include, body) = match raw.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let body = body.trim_start_matches('/').trim_end_matches('/');
        let body = if raw.trim_start_matches('!').ends_with('/') {
            format!("{body}/**")
        } else {
            body.to_string()
        };

        let pattern = Pattern::new(&body)
            .map_err(|e| TemplateError::pattern(format!("Invalid pattern '{raw}': {e}")))?;

        Ok(Self { pattern, include, basename_only: !body.contains('/') })
    }

    fn matches(&self, path: &Path) -> bool {
        if self.basename_only {
            return path
                .file_name()
                .is_some_and(|name| self.pattern.matches_with(&name.to_string_lossy(), MATCH_OPTIONS));
        }
        self.pattern.matches_with(&slash_path(path), MATCH_OPTIONS)
    }
}

/// Path as a forward-slash string without a leading `./`
pub fn slash_path(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    text.strip_prefix("./").map(str::to_string).unwrap_or(text)
}

/// Whether the path has a Markdown extension
pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MARKDOWN_EXTENSIONS.iter().any(|m| ext.eq_ignore_ascii_case(m)))
}

impl PathFilter {
    pub fn new(patterns: Vec<String>, ignore_filename: Option<String>) -> TemplateResult<Self> {
        let rules = patterns
            .iter()
            .map(|p| FilterRule::parse(p))
            .collect::<TemplateResult<Vec<_>>>()?;
        let ignore_filename = ignore_filename.filter(|name| !name.is_empty());
        Ok(Self { rules, ignore_filename })
    }

    pub fn add_pattern(&mut self, pattern: &str) -> TemplateResult<()> {
        self.rules.push(FilterRule::parse(pattern)?);
        Ok(())
    }

    /// Stop reading ignore files
    pub fn without_ignore_files(mut self) -> Self {
        self.ignore_filename = None;
        self
    }

    /// Check a path against configured patterns and any ignore files above it
    pub fn should_analyze(&self, path: &Path) -> TemplateResult<bool> {
        Ok(!self.excluded_by_rules(path) && !self.ignored_by_files(path)?)
    }

    fn excluded_by_rules(&self, path: &Path) -> bool {
        apply_rules(&self.rules, path)
    }

    /// Walk up from the file, applying each ignore file relative to its directory
    fn ignored_by_files(&self, path: &Path) -> TemplateResult<bool> {
        let Some(ignore_filename) = &self.ignore_filename else {
            return Ok(false);
        };

        let mut ancestors: Vec<&Path> = path.ancestors().skip(1).collect();
        // Outer directories first so nearer ignore files win
        ancestors.reverse();

        let mut ignored = false;
        for dir in ancestors {
            let ignore_file = dir.join(ignore_filename);
            if !ignore_file.is_file() {
                continue;
            }
            let Ok(relative) = path.strip_prefix(dir) else {
                continue;
            };
            for rule in load_ignore_file(&ignore_file)? {
                if rule.matches(relative) {
                    ignored = !rule.include;
                }
            }
        }

        Ok(ignored)
    }

    /// Markdown files under `root` that pass the filter, in sorted order
    pub fn find_files(&self, root: &Path) -> TemplateResult<Vec<PathBuf>> {
        let mut files = Vec::new();

        let walker = WalkDir::new(root).follow_links(false).sort_by_file_name();
        for entry in walker.into_iter() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().is_file() || !is_markdown(path) {
                continue;
            }

            let relative = path.strip_prefix(root).unwrap_or(path);
            if self.excluded_by_rules(relative) || self.ignored_by_files(path)? {
                tracing::debug!("Filtered out {}", path.display());
                continue;
            }

            files.push(path.to_path_buf());
        }

        Ok(files)
    }
}

/// Apply gitignore-style rules in order; the last matching rule wins
fn apply_rules(rules: &[FilterRule], path: &Path) -> bool {
    rules
        .iter()
        .rev()
        .find(|rule| rule.matches(path))
        .is_some_and(|rule| !rule.include)
}

fn load_ignore_file(path: &Path) -> TemplateResult<Vec<FilterRule>> {
    let content = fs::read_to_string(path).map_err(|e| {
        TemplateError::config(format!("Failed to read ignore file '{}': {}", path.display(), e))
    })?;

    let mut rules = Vec::new();
    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match FilterRule::parse(line) {
            Ok(rule) => rules.push(rule),
            Err(e) => tracing::warn!("Ignoring pattern in {}: {}", path.display(), e),
        }
    }

    Ok(rules)
}
