//! Placeholder token scanning
//!
//! Architectural Principle: Service Layer - Token scanning isolates the bracket syntax
//! - PlaceholderScanner finds `[Token]` occurrences with exact line and column
//! - Markdown link labels are flagged, task-list boxes are skipped
//! - Deciding which tokens matter is left to the validator and its section rules

pub mod path_filter;

use crate::domain::findings::Location;
use lazy_static::lazy_static;
use regex::Regex;

pub use path_filter::PathFilter;

lazy_static! {
    /// A bracketed run that does not itself contain brackets
    static ref BRACKET_TOKEN: Regex =
        Regex::new(r"\[([^\[\]\n]+)\]").expect("bracket token pattern is a valid regex");
}

/// A bracketed token found in document text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMatch {
    /// Token text without brackets, trimmed
    pub token: String,
    /// Position of the opening bracket
    pub location: Location,
    /// Shaped like link or image text: `[text](url)`, `[text][ref]`, `![alt]`
    pub link_label: bool,
}

impl TokenMatch {
    /// Bracketed text that is not Markdown link syntax
    pub fn is_bare(&self) -> bool {
        !self.link_label
    }
}

/// Finds bracketed placeholder tokens in Markdown text
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderScanner;

impl PlaceholderScanner {
    pub fn new() -> Self {
        Self
    }

    /// Scan a single line, reporting columns as 1-indexed characters
    pub fn scan_line(&self, line_number: usize, line: &str) -> Vec<TokenMatch> {
        let mut matches = Vec::new();

        for captures in BRACKET_TOKEN.captures_iter(line) {
            let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
                continue;
            };

            let link_label =
                is_link_label(&line[whole.end()..]) || follows_label(&line[..whole.start()]);

            let token = inner.as_str().trim();
            if is_task_box(token) {
                continue;
            }

            let column = line[..whole.start()].chars().count() + 1;
            matches.push(TokenMatch {
                token: token.to_string(),
                location: Location::new(line_number, column),
                link_label,
            });
        }

        matches
    }

    /// Scan numbered lines, preserving their order
    pub fn scan_lines<'a, I>(&self, lines: I) -> Vec<TokenMatch>
    where
        I: IntoIterator<Item = (usize, &'a str)>,
    {
        lines
            .into_iter()
            .flat_map(|(line_number, line)| self.scan_line(line_number, line))
            .collect()
    }
}

/// `[text](url)` or `[text][ref]`
fn is_link_label(after: &str) -> bool {
    after.starts_with('(') || after.starts_with('[')
}

/// `![alt]` image syntax, or the `[ref]` half of a reference link
fn follows_label(before: &str) -> bool {
    before.ends_with('!') || before.ends_with(']')
}

/// `[ ]`, `[x]` and `[X]` checklist boxes
fn is_task_box(token: &str) -> bool {
    token.is_empty() || token.eq_ignore_ascii_case("x")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(line: &str) -> Vec<String> {
        PlaceholderScanner::new()
            .scan_line(1, line)
            .into_iter()
            .filter(TokenMatch::is_bare)
            .map(|m| m.token)
            .collect()
    }

    #[test]
    fn test_finds_bracketed_tokens() {
        assert_eq!(tokens("Name: [Project Name], owner [ Owner ]"), vec!["Project Name", "Owner"]);
    }

    #[test]
    fn test_skips_links_and_images() {
        assert!(tokens("see [the docs](https://example.com)").is_empty());
        assert!(tokens("see [the docs][docs]").is_empty());
        assert!(tokens("![diagram](arch.png)").is_empty());
        assert!(tokens("![diagram]").is_empty());
    }

    #[test]
    fn test_link_labels_are_flagged_not_dropped() {
        let matches = PlaceholderScanner::new().scan_line(2, "Use [API_KEY][SECRET] or [TOKEN](docs)");
        let found: Vec<_> = matches.iter().map(|m| (m.token.as_str(), m.link_label)).collect();
        assert_eq!(found, vec![("API_KEY", true), ("SECRET", true), ("TOKEN", true)]);
        assert_eq!(matches[1].location, Location::new(2, 14));
    }

    #[test]
    fn test_skips_task_boxes() {
        assert!(tokens("- [ ] write tests").is_empty());
        assert!(tokens("- [x] review").is_empty());
        assert_eq!(tokens("- [ ] rotate [API_KEY]"), vec!["API_KEY"]);
    }

    #[test]
    fn test_columns_count_characters() {
        let matches = PlaceholderScanner::new().scan_line(7, "héllo [Token]");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].location, Location::new(7, 7));
    }

    #[test]
    fn test_scan_lines_keeps_line_numbers() {
        let matches = PlaceholderScanner::new().scan_lines(vec![(3, "[A]"), (4, "none"), (5, "x [B]")]);
        let found: Vec<_> = matches.iter().map(|m| (m.token.as_str(), m.location.line)).collect();
        assert_eq!(found, vec![("A", 3), ("B", 5)]);
    }
}
