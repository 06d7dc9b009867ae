//! Markdown section parser
//!
//! Architecture: Domain Service - Turns raw document text into ordered sections
//! - Parsing is total: every input yields at least one section and never an error
//! - Sections carry source line spans so findings can point back into the document
//! - Fenced code blocks are opaque, so `#` lines inside them never open sections

use serde::Serialize;

/// Deepest ATX heading level
const MAX_HEADING_LEVEL: usize = 6;

/// A half-open, 1-indexed range of source lines `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineSpan {
    pub start: usize,
    pub end: usize,
}

impl LineSpan {
    pub fn contains(&self, line: usize) -> bool {
        line >= self.start && line < self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One heading and the body text that follows it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedSection {
    /// Heading level, 0 for the untitled section before the first heading
    pub level: usize,
    /// Heading text without markers
    pub heading: String,
    /// Body text with trailing blank lines trimmed
    pub body: String,
    /// Source lines covered by the heading and its body
    pub lines: LineSpan,
    /// Line of the first body line
    pub body_start: usize,
}

impl ParsedSection {
    pub fn is_untitled(&self) -> bool {
        self.level == 0
    }

    /// Line of the heading, or the first line for the untitled section
    pub fn heading_line(&self) -> usize {
        self.lines.start
    }

    /// Body length in characters, ignoring surrounding whitespace
    pub fn content_length(&self) -> usize {
        self.body.trim().chars().count()
    }

    /// Iterate body lines paired with their 1-indexed document line numbers
    pub fn body_lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.body
            .lines()
            .enumerate()
            .map(move |(offset, line)| (self.body_start + offset, line))
    }
}

/// Split document text into sections in document order
pub fn parse_sections(text: &str) -> Vec<ParsedSection> {
    let mut sections = Vec::new();
    let mut open = OpenSection::untitled(1);
    let mut fence: Option<Fence> = None;
    let mut line_count = 0;

    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;
        line_count = line_number;

        if let Some(active) = fence {
            if active.closes(line) {
                fence = None;
            }
            open.body.push(line);
            continue;
        }

        if let Some(opened) = Fence::opens(line) {
            fence = Some(opened);
            open.body.push(line);
            continue;
        }

        if let Some((level, heading)) = parse_heading(line) {
            let previous = std::mem::replace(
                &mut open,
                OpenSection::titled(level, heading, line_number),
            );
            if let Some(section) = previous.close(line_number) {
                sections.push(section);
            }
            continue;
        }

        open.body.push(line);
    }

    let titled_sections = sections.len();
    if let Some(section) = open.close(line_count + 1) {
        sections.push(section);
    }

    // A document without any heading is still one section
    if sections.is_empty() {
        sections.push(ParsedSection {
            level: 0,
            heading: String::new(),
            body: String::new(),
            lines: LineSpan { start: 1, end: line_count + 1 },
            body_start: 1,
        });
    }

    tracing::debug!(
        "Parsed {} sections ({} closed before end of input) from {} lines",
        sections.len(),
        titled_sections,
        line_count
    );

    sections
}

/// Recognise an ATX heading, returning its level and text
pub fn parse_heading(line: &str) -> Option<(usize, String)> {
    let trimmed = line.trim_start_matches(' ');
    // Four or more spaces of indentation is an indented code block
    if line.len() - trimmed.len() > 3 {
        return None;
    }

    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > MAX_HEADING_LEVEL {
        return None;
    }

    let rest = &trimmed[level..];
    if !rest.is_empty() && !rest.starts_with(|c: char| c.is_whitespace()) {
        return None;
    }

    Some((level, strip_closing_sequence(rest.trim()).to_string()))
}

/// Remove an optional closing run of `#` characters
fn strip_closing_sequence(text: &str) -> &str {
    let without_hashes = text.trim_end_matches('#');
    if without_hashes.is_empty() {
        return without_hashes;
    }
    if without_hashes.len() != text.len() && without_hashes.ends_with(char::is_whitespace) {
        without_hashes.trim_end()
    } else {
        text
    }
}

/// Section being accumulated while scanning
struct OpenSection<'a> {
    level: usize,
    heading: String,
    start: usize,
    body: Vec<&'a str>,
}

impl<'a> OpenSection<'a> {
    fn untitled(start: usize) -> Self {
        Self { level: 0, heading: String::new(), start, body: Vec::new() }
    }

    fn titled(level: usize, heading: String, start: usize) -> Self {
        Self { level, heading, start, body: Vec::new() }
    }

    /// Finish the section at `end` (exclusive).
    ///
    /// Untitled sections made only of blank lines are dropped so that a
    /// leading blank line does not produce a phantom preamble.
    fn close(mut self, end: usize) -> Option<ParsedSection> {
        while self.body.last().is_some_and(|line| line.trim().is_empty()) {
            self.body.pop();
        }

        if self.level == 0 && self.body.iter().all(|line| line.trim().is_empty()) {
            return None;
        }

        let body_start = if self.level == 0 { self.start } else { self.start + 1 };
        Some(ParsedSection {
            level: self.level,
            heading: self.heading,
            body: self.body.join("\n"),
            lines: LineSpan { start: self.start, end },
            body_start,
        })
    }
}

/// An open fenced code block
#[derive(Debug, Clone, Copy)]
struct Fence {
    marker: char,
    width: usize,
}

impl Fence {
    fn opens(line: &str) -> Option<Self> {
        let trimmed = line.trim_start();
        let marker = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
        let width = trimmed.chars().take_while(|c| *c == marker).count();
        (width >= 3).then_some(Self { marker, width })
    }

    fn closes(&self, line: &str) -> bool {
        let trimmed = line.trim();
        let width = trimmed.chars().take_while(|c| *c == self.marker).count();
        width >= self.width && width == trimmed.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("# Overview", Some((1, "Overview")))]
    #[case("### Deep heading ###", Some((3, "Deep heading")))]
    #[case("## C# notes", Some((2, "C# notes")))]
    #[case("#", Some((1, "")))]
    #[case("#NoSpace", None)]
    #[case("####### seven", None)]
    #[case("    # indented code", None)]
    #[case("plain text", None)]
    fn test_parse_heading(#[case] line: &str, #[case] expected: Option<(usize, &str)>) {
        let parsed = parse_heading(line);
        assert_eq!(parsed, expected.map(|(level, text)| (level, text.to_string())));
    }

    #[test]
    fn test_sections_in_document_order() {
        let text = "# Overview\nText\n\n## Goals\nShip it\n\n\n# Security\n[API_KEY]\n";
        let sections = parse_sections(text);

        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].heading, "Overview");
        assert_eq!(sections[0].level, 1);
        assert_eq!(sections[0].body, "Text");
        assert_eq!(sections[0].lines, LineSpan { start: 1, end: 4 });
        assert_eq!(sections[1].heading, "Goals");
        assert_eq!(sections[1].level, 2);
        assert_eq!(sections[1].body, "Ship it");
        assert_eq!(sections[2].heading, "Security");
        assert_eq!(sections[2].body_start, 9);
        assert_eq!(sections[2].body, "[API_KEY]");
    }

    #[test]
    fn test_spans_never_overlap() {
        let text = "intro\n# A\na\n# B\n\n# C\nc\nc2\n";
        let sections = parse_sections(text);

        for pair in sections.windows(2) {
            assert!(pair[0].lines.end <= pair[1].lines.start);
        }
        assert!(sections[0].is_untitled());
        assert_eq!(sections[0].body, "intro");
    }

    #[test]
    fn test_document_without_headings() {
        let sections = parse_sections("just some\ntext\n");
        assert_eq!(sections.len(), 1);
        assert!(sections[0].is_untitled());
        assert_eq!(sections[0].body, "just some\ntext");
        assert_eq!(sections[0].lines, LineSpan { start: 1, end: 3 });
    }

    #[test]
    fn test_empty_document() {
        let sections = parse_sections("");
        assert_eq!(sections.len(), 1);
        assert!(sections[0].is_untitled());
        assert!(sections[0].body.is_empty());
        assert!(sections[0].lines.is_empty());
    }

    #[test]
    fn test_headings_inside_fences_are_body() {
        let text = "# Usage\n```sh\n# not a heading\n```\n# Next\n";
        let sections = parse_sections(text);

        assert_eq!(sections.len(), 2);
        assert!(sections[0].body.contains("# not a heading"));
        assert_eq!(sections[1].heading, "Next");
    }

    #[test]
    fn test_unclosed_fence_swallows_rest() {
        let text = "# Usage\n~~~\n# still code\n";
        let sections = parse_sections(text);
        assert_eq!(sections.len(), 1);
    }

    #[test]
    fn test_body_lines_report_document_lines() {
        let text = "# Overview\n\nfirst\nsecond\n";
        let sections = parse_sections(text);
        let lines: Vec<_> = sections[0].body_lines().collect();
        assert_eq!(lines, vec![(2, ""), (3, "first"), (4, "second")]);
    }

    #[test]
    fn test_leading_blank_lines_do_not_create_preamble() {
        let sections = parse_sections("\n\n# Title\nbody\n");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].heading, "Title");
    }
}
