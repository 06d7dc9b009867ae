//! Document validation against a schema
//!
//! Architecture: Domain Service - The validator is a pure function of (text, schema)
//! - Inputs are borrowed and never mutated; the only output is an immutable report
//! - Schemas are resolved through the shared read-only registry
//! - Ordering is checked against a longest common subsequence so one swap never cascades

use crate::domain::findings::{
    Finding, TemplateResult, ValidationReport, ANONYMOUS_DOCUMENT,
};
use crate::parser::{parse_sections, ParsedSection};
use crate::patterns::PlaceholderScanner;
use crate::schema::{DocumentSchema, SchemaRegistry, SectionRule};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Validates documents against schemas held by a shared registry
#[derive(Debug, Clone)]
pub struct Validator {
    registry: Arc<SchemaRegistry>,
    scanner: PlaceholderScanner,
}

impl Validator {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry, scanner: PlaceholderScanner::new() }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Validate in-memory text against the schema registered as `schema_id`
    pub fn validate(&self, document_text: &str, schema_id: &str) -> TemplateResult<ValidationReport> {
        self.validate_document(ANONYMOUS_DOCUMENT, document_text, schema_id)
    }

    /// Validate text and label the report with a document identifier
    pub fn validate_document(
        &self,
        document: &str,
        document_text: &str,
        schema_id: &str,
    ) -> TemplateResult<ValidationReport> {
        let schema = self.registry.lookup(schema_id)?;
        let sections = parse_sections(document_text);
        Ok(self.check_sections(document, schema, &sections))
    }

    /// Cross-check already parsed sections against a schema
    pub fn check_sections(
        &self,
        document: &str,
        schema: &DocumentSchema,
        sections: &[ParsedSection],
    ) -> ValidationReport {
        let mut findings = Vec::new();
        let mut matched: Vec<SectionMatch> = Vec::new();
        let mut claimed = vec![false; sections.len()];

        for (rule_index, rule) in schema.sections().iter().enumerate() {
            let found = sections
                .iter()
                .enumerate()
                .find(|(index, section)| !claimed[*index] && rule.matches(&section.heading));

            let Some((section_index, section)) = found else {
                if rule.is_required() {
                    findings.push(Finding::MissingSection {
                        section: rule.heading().to_string(),
                    });
                }
                continue;
            };

            claimed[section_index] = true;
            matched.push(SectionMatch { rule_index, section_index });
            findings.extend(self.placeholder_findings(rule, section));
            findings.extend(content_finding(rule, section));
        }

        findings.extend(ordering_findings(schema, sections, &matched));

        tracing::debug!(
            "Validated '{}' against '{}': {} of {} rules matched, {} findings",
            document,
            schema.id(),
            matched.len(),
            schema.sections().len(),
            findings.len()
        );

        ValidationReport::new(document, schema.id(), findings)
    }

    /// Listed tokens count wherever they appear, link-shaped brackets included
    fn placeholder_findings(&self, rule: &SectionRule, section: &ParsedSection) -> Vec<Finding> {
        if rule.placeholders().is_empty() {
            return Vec::new();
        }

        self.scanner
            .scan_lines(section.body_lines())
            .into_iter()
            .filter(|m| rule.forbids(&m.token))
            .map(|m| Finding::UnresolvedPlaceholder {
                token: m.token,
                section: rule.heading().to_string(),
                location: m.location,
            })
            .collect()
    }
}

/// A schema rule paired with the parsed section that satisfied it
#[derive(Debug, Clone, Copy)]
struct SectionMatch {
    rule_index: usize,
    section_index: usize,
}

fn content_finding(rule: &SectionRule, section: &ParsedSection) -> Option<Finding> {
    let min_length = rule.min_body_length()?;
    let actual_length = section.content_length();
    (actual_length < min_length).then(|| Finding::InsufficientContent {
        section: rule.heading().to_string(),
        min_length,
        actual_length,
        line: section.heading_line(),
    })
}

/// Report sections whose relative order differs from the schema.
///
/// `matched` is in schema order. A section is displaced when it falls outside
/// the longest common subsequence of the expected and actual orders. The
/// in-sequence section it swapped places with is displaced too, so a
/// transposition reports both halves while a single move reports only the
/// section that moved.
fn ordering_findings(
    schema: &DocumentSchema,
    sections: &[ParsedSection],
    matched: &[SectionMatch],
) -> Vec<Finding> {
    let expected: Vec<usize> = matched.iter().map(|m| m.rule_index).collect();

    let mut in_document_order = matched.to_vec();
    in_document_order.sort_by_key(|m| m.section_index);
    let actual: Vec<usize> = in_document_order.iter().map(|m| m.rule_index).collect();

    if expected == actual {
        return Vec::new();
    }

    // Position each section should occupy, indexed by where it sits now
    let expected_position: Vec<usize> = actual
        .iter()
        .map(|rule| expected.iter().position(|r| r == rule).unwrap_or_default())
        .collect();

    let kept = common_subsequence(&expected, &actual);
    let mut displaced = BTreeSet::new();

    for position in (0..actual.len()).filter(|p| !kept[*p]) {
        displaced.insert(position);

        let partner = expected_position[position];
        if partner < actual.len() && expected_position[partner] == position {
            displaced.insert(partner);
        }
    }

    displaced
        .into_iter()
        .map(|actual_index| {
            let current = in_document_order[actual_index];
            Finding::OutOfOrderSection {
                section: schema.sections()[current.rule_index].heading().to_string(),
                expected_index: expected_position[actual_index],
                actual_index,
                line: sections[current.section_index].heading_line(),
            }
        })
        .collect()
}

/// Mark which elements of `actual` belong to a longest common subsequence with `expected`.
///
/// Among subsequences of maximal length the one keeping the most elements at
/// their expected position wins, so sections that never moved stay in it.
/// Remaining ties are broken towards advancing `expected`.
fn common_subsequence(expected: &[usize], actual: &[usize]) -> Vec<bool> {
    let (n, m) = (expected.len(), actual.len());
    // (length, elements kept at their own position)
    let mut table = vec![vec![(0usize, 0usize); m + 1]; n + 1];

    let take = |table: &[Vec<(usize, usize)>], i: usize, j: usize| {
        let (length, fixed) = table[i + 1][j + 1];
        (length + 1, fixed + usize::from(i == j))
    };

    for i in (0..n).rev() {
        for j in (0..m).rev() {
            let skip = table[i + 1][j].max(table[i][j + 1]);
            table[i][j] = if expected[i] == actual[j] { skip.max(take(&table, i, j)) } else { skip };
        }
    }

    let mut kept = vec![false; m];
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if expected[i] == actual[j] && table[i][j] == take(&table, i, j) {
            kept[j] = true;
            i += 1;
            j += 1;
        } else if table[i + 1][j] >= table[i][j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::findings::{FindingKind, Location, TemplateError};
    use rstest::rstest;

    const CONFORMING: &str = "\
# Overview
The project does one thing well.

# Goals
Ship a stable release.

# Architecture
Layered services.

# Security
Keys live in the vault.
";

    fn registry() -> Arc<SchemaRegistry> {
        let s1 = DocumentSchema::new(
            "s1",
            vec![
                SectionRule::new("Overview"),
                SectionRule::new("Security").with_placeholders(["[API_KEY]"]),
            ],
        )
        .unwrap();

        let project = DocumentSchema::new(
            "project",
            vec![
                SectionRule::new("Overview").with_placeholders(["Project Name"]),
                SectionRule::new("Goals"),
                SectionRule::new("Architecture"),
                SectionRule::new("Security").with_placeholders(["API_KEY"]),
                SectionRule::new("Appendix").optional(),
            ],
        )
        .unwrap();

        Arc::new(SchemaRegistry::new(vec![s1, project]).unwrap())
    }

    fn validator() -> Validator {
        Validator::new(registry())
    }

    fn kinds(report: &ValidationReport) -> Vec<FindingKind> {
        report.findings().iter().map(Finding::kind).collect()
    }

    #[test]
    fn test_placeholder_scenario() {
        let report = validator()
            .validate("# Overview\nText\n# Security\n[API_KEY]\n", "s1")
            .unwrap();

        assert_eq!(
            report.findings(),
            [Finding::UnresolvedPlaceholder {
                token: "API_KEY".to_string(),
                section: "Security".to_string(),
                location: Location::new(4, 1),
            }]
        );
        assert_eq!(report.findings_of_kind(FindingKind::MissingSection).count(), 0);
    }

    #[test]
    fn test_conforming_document_is_clean() {
        let report = validator().validate(CONFORMING, "project").unwrap();
        assert!(report.is_clean(), "unexpected findings: {:?}", report.findings());
    }

    #[test]
    fn test_validation_is_deterministic() {
        let validator = validator();
        let text = "# Security\n[API_KEY] [Project Name]\n# Goals\n";
        let first = validator.validate(text, "project").unwrap();
        let second = validator.validate(text, "project").unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_removing_section_yields_single_missing_finding() {
        let text = CONFORMING.replace("# Goals\nShip a stable release.\n", "");
        let report = validator().validate(&text, "project").unwrap();

        assert_eq!(
            report.findings(),
            [Finding::MissingSection { section: "Goals".to_string() }]
        );
    }

    #[test]
    fn test_adjacent_swap_yields_two_ordering_findings() {
        let text = "\
# Overview
The project does one thing well.

# Architecture
Layered services.

# Goals
Ship a stable release.

# Security
Keys live in the vault.
";
        let report = validator().validate(text, "project").unwrap();

        assert_eq!(kinds(&report), vec![FindingKind::OutOfOrderSection; 2]);
        let sections: Vec<_> = report.findings().iter().map(Finding::section).collect();
        assert_eq!(sections, vec!["Architecture", "Goals"]);
    }

    #[test]
    fn test_moved_section_does_not_cascade() {
        let text = "\
# Security
Keys live in the vault.

# Overview
The project does one thing well.

# Goals
Ship a stable release.

# Architecture
Layered services.
";
        let report = validator().validate(text, "project").unwrap();

        assert_eq!(kinds(&report), vec![FindingKind::OutOfOrderSection]);
        assert_eq!(report.findings()[0].section(), "Security");
    }

    #[test]
    fn test_empty_document_misses_every_required_section() {
        let report = validator().validate("", "project").unwrap();

        assert_eq!(kinds(&report), vec![FindingKind::MissingSection; 4]);
        let sections: Vec<_> = report.findings().iter().map(Finding::section).collect();
        assert_eq!(sections, vec!["Overview", "Goals", "Architecture", "Security"]);
    }

    #[test]
    fn test_unlisted_brackets_are_ignored() {
        let text = CONFORMING.replace("Layered services.", "Layered [services] and [TBD].");
        let report = validator().validate(&text, "project").unwrap();
        assert!(report.is_clean());
    }

    #[test]
    fn test_placeholders_only_checked_in_their_section() {
        let text = CONFORMING.replace("Ship a stable release.", "Keep [API_KEY] out of git.");
        let report = validator().validate(&text, "project").unwrap();
        assert!(report.is_clean());
    }

    #[test]
    fn test_heading_match_is_loose() {
        let text = CONFORMING.replace("# Goals", "##   GOALS");
        let report = validator().validate(&text, "project").unwrap();
        assert!(report.is_clean());
    }

    #[test]
    fn test_minimum_content_length() {
        let registry = Arc::new(
            SchemaRegistry::new(vec![DocumentSchema::new(
                "short",
                vec![SectionRule::new("Summary").with_min_body_length(20)],
            )
            .unwrap()])
            .unwrap(),
        );
        let report = Validator::new(registry).validate("# Summary\ntiny\n", "short").unwrap();

        assert_eq!(
            report.findings(),
            [Finding::InsufficientContent {
                section: "Summary".to_string(),
                min_length: 20,
                actual_length: 4,
                line: 1,
            }]
        );
    }

    #[test]
    fn test_unknown_schema_fails() {
        let result = validator().validate(CONFORMING, "nope");
        assert!(matches!(result, Err(TemplateError::UnknownSchema { id }) if id == "nope"));
    }

    #[test]
    fn test_common_subsequence_marks_kept_positions() {
        assert_eq!(common_subsequence(&[0, 1, 2, 3], &[0, 2, 1, 3]), vec![true, true, false, true]);
        assert_eq!(common_subsequence(&[0, 1, 2], &[0, 1, 2]), vec![true; 3]);
        assert_eq!(common_subsequence(&[0, 1, 2], &[2, 0, 1]), vec![false, true, true]);
    }

    #[test]
    fn test_common_subsequence_keeps_unmoved_sections() {
        let expected = [0, 1, 2, 3, 4];
        assert_eq!(
            common_subsequence(&expected, &[0, 3, 2, 1, 4]),
            vec![true, false, true, false, true]
        );
    }

    fn five_section_registry() -> Arc<SchemaRegistry> {
        let rules = ["S0", "S1", "S2", "S3", "S4"].into_iter().map(SectionRule::new).collect();
        Arc::new(SchemaRegistry::new(vec![DocumentSchema::new("five", rules).unwrap()]).unwrap())
    }

    fn displaced_sections(order: &[usize]) -> Vec<String> {
        let text: String = order.iter().map(|i| format!("# S{i}\nbody\n")).collect();
        Validator::new(five_section_registry())
            .validate(&text, "five")
            .unwrap()
            .findings()
            .iter()
            .map(|f| f.section().to_string())
            .collect()
    }

    #[rstest]
    #[case(&[0, 2, 1, 3, 4], &["S2", "S1"])]
    #[case(&[0, 1, 2, 4, 3], &["S4", "S3"])]
    #[case(&[0, 3, 2, 1, 4], &["S3", "S1"])]
    #[case(&[0, 1, 4, 2, 3], &["S4"])]
    #[case(&[4, 0, 1, 2, 3], &["S4"])]
    #[case(&[1, 2, 3, 4, 0], &["S0"])]
    fn test_only_moved_sections_are_reported(#[case] order: &[usize], #[case] moved: &[&str]) {
        assert_eq!(displaced_sections(order), moved);
    }

    #[test]
    fn test_placeholders_in_link_shaped_brackets() {
        let registry = Arc::new(
            SchemaRegistry::new(vec![DocumentSchema::new(
                "secrets",
                vec![SectionRule::new("Security").with_placeholders(["API_KEY", "SECRET"])],
            )
            .unwrap()])
            .unwrap(),
        );
        let text = "# Security\nUse [API_KEY][SECRET]\nOr [API_KEY](rotate yearly)\nSee [the runbook](ops.md)\n";
        let report = Validator::new(registry).validate(text, "secrets").unwrap();

        let found: Vec<_> = report
            .findings()
            .iter()
            .map(|f| match f {
                Finding::UnresolvedPlaceholder { token, location, .. } => (token.as_str(), *location),
                other => panic!("unexpected finding {other:?}"),
            })
            .collect();
        assert_eq!(
            found,
            vec![
                ("API_KEY", Location::new(2, 5)),
                ("SECRET", Location::new(2, 14)),
                ("API_KEY", Location::new(3, 4)),
            ]
        );
    }

    #[test]
    fn test_first_duplicate_heading_is_used() {
        let document = |first: &str, second: &str| {
            format!(
                "# Overview\nThe project does one thing well.\n\n# Goals\nShip a stable release.\n\n\
                 # Architecture\nLayered services.\n\n# Security\n{first}\n\n# Security\n{second}\n"
            )
        };

        // The later duplicate is never checked
        let report = validator().validate(&document("Keys live in the vault.", "[API_KEY]"), "project").unwrap();
        assert!(report.is_clean(), "unexpected findings: {:?}", report.findings());

        let report = validator().validate(&document("[API_KEY]", "Keys live in the vault."), "project").unwrap();
        assert_eq!(
            report.findings(),
            [Finding::UnresolvedPlaceholder {
                token: "API_KEY".to_string(),
                section: "Security".to_string(),
                location: Location::new(11, 1),
            }]
        );
    }
}
