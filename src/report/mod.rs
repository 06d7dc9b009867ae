//! Report rendering with multiple output formats
//!
//! CDD Principle: Anti-Corruption Layer - Formatters translate domain objects to external formats
//! - ValidationReport (domain) is converted to text lines or flat finding records
//! - Batch reports additionally render as JSON, GitHub annotations and JUnit XML
//! - Rendering is a pure function of the report and the options

use crate::domain::findings::{
    BatchReport, Finding, FindingKind, Severity, SeverityCounts, TemplateError, TemplateResult,
    ValidationReport,
};
use serde::{Deserialize, Serialize};
use std::io::Write;

#[cfg(feature = "colors")]
use colored::Colorize;

/// Supported output formats for batch reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One line per finding plus a summary
    Text,
    /// JSON format for programmatic consumption
    Json,
    /// GitHub Actions workflow annotations
    GitHub,
    /// JUnit XML format for CI/CD integration
    Junit,
}

impl OutputFormat {
    /// Parse format from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "human" => Some(Self::Text),
            "json" => Some(Self::Json),
            "github" => Some(Self::GitHub),
            "junit" => Some(Self::Junit),
            _ => None,
        }
    }

    /// Get all available format names
    pub fn all_formats() -> &'static [&'static str] {
        &["text", "json", "github", "junit"]
    }
}

/// Shape of a single-report rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFormat {
    Text,
    Structured,
}

/// Result of [`ReportFormatter::render`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Text(String),
    Structured(Vec<FindingRecord>),
}

/// Flat, serializable view of one finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingRecord {
    pub document: String,
    pub schema: String,
    pub kind: FindingKind,
    pub severity: Severity,
    pub section: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub message: String,
}

impl FindingRecord {
    fn from_finding(report: &ValidationReport, finding: &Finding) -> Self {
        Self {
            document: report.document().to_string(),
            schema: report.schema().to_string(),
            kind: finding.kind(),
            severity: finding.severity(),
            section: finding.section().to_string(),
            line: finding.line(),
            column: finding.column(),
            message: finding.message(),
        }
    }
}

/// Options for customizing report output
#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    /// Whether to use colored output (text format only)
    pub use_colors: bool,
    /// Maximum number of findings to include
    pub max_findings: Option<usize>,
    /// Minimum severity level to include
    pub min_severity: Option<Severity>,
}

/// Renders validation reports
#[derive(Debug, Clone, Default)]
pub struct ReportFormatter {
    options: ReportOptions,
}

impl ReportFormatter {
    pub fn new(options: ReportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ReportOptions {
        &self.options
    }

    /// Render one report as text lines or as finding records
    pub fn render(&self, report: &ValidationReport, format: RenderFormat) -> Rendered {
        match format {
            RenderFormat::Text => Rendered::Text(self.render_text(report)),
            RenderFormat::Structured => Rendered::Structured(self.records(report)),
        }
    }

    /// One line per finding, in report order
    pub fn render_text(&self, report: &ValidationReport) -> String {
        let findings = self.filter_findings(report.findings(), self.options.max_findings);
        let mut output = String::new();
        for finding in findings {
            output.push_str(&self.finding_line(report, finding));
            output.push('\n');
        }
        output
    }

    pub fn records(&self, report: &ValidationReport) -> Vec<FindingRecord> {
        self.filter_findings(report.findings(), self.options.max_findings)
            .into_iter()
            .map(|finding| FindingRecord::from_finding(report, finding))
            .collect()
    }

    /// Finding records as pretty-printed JSON
    pub fn render_json(&self, report: &ValidationReport) -> TemplateResult<String> {
        serde_json::to_string_pretty(&self.records(report))
            .map_err(|e| TemplateError::config(format!("JSON serialization failed: {e}")))
    }

    /// Format a batch report in the specified format
    pub fn format_batch(&self, batch: &BatchReport, format: OutputFormat) -> TemplateResult<String> {
        let selected = self.select_batch(batch);

        match format {
            OutputFormat::Text => Ok(self.format_text(batch, &selected)),
            OutputFormat::Json => self.format_json(batch, &selected),
            OutputFormat::GitHub => Ok(self.format_github(&selected)),
            OutputFormat::Junit => Ok(self.format_junit(batch, &selected)),
        }
    }

    /// Write a formatted batch report to a writer
    pub fn write_batch<W: Write>(
        &self,
        batch: &BatchReport,
        format: OutputFormat,
        mut writer: W,
    ) -> TemplateResult<()> {
        let formatted = self.format_batch(batch, format)?;
        writer.write_all(formatted.as_bytes())?;
        Ok(())
    }

    fn filter_findings<'a>(&self, findings: &'a [Finding], limit: Option<usize>) -> Vec<&'a Finding> {
        let mut filtered: Vec<&Finding> = findings
            .iter()
            .filter(|f| self.options.min_severity.map_or(true, |min| f.severity() >= min))
            .collect();

        if let Some(max) = limit {
            filtered.truncate(max);
        }

        filtered
    }

    /// Apply filters across the whole batch; the finding limit is shared by all documents
    fn select_batch<'a>(&self, batch: &'a BatchReport) -> Vec<(&'a ValidationReport, Vec<&'a Finding>)> {
        let mut remaining = self.options.max_findings;
        batch
            .reports
            .iter()
            .map(|report| {
                let findings = self.filter_findings(report.findings(), remaining);
                if let Some(left) = remaining.as_mut() {
                    *left -= findings.len();
                }
                (report, findings)
            })
            .collect()
    }

    fn finding_line(&self, report: &ValidationReport, finding: &Finding) -> String {
        let position = match (finding.line(), finding.column()) {
            (Some(line), Some(column)) => format!("{}:{line}:{column}", report.document()),
            (Some(line), None) => format!("{}:{line}", report.document()),
            _ => report.document().to_string(),
        };
        format!(
            "{position} [{}] {}: {}",
            self.paint(finding.severity().as_str(), finding.severity()),
            finding.kind(),
            finding.message()
        )
    }

    fn format_text(
        &self,
        batch: &BatchReport,
        selected: &[(&ValidationReport, Vec<&Finding>)],
    ) -> String {
        let mut output = String::new();

        for (report, findings) in selected {
            for finding in findings {
                output.push_str(&self.finding_line(report, finding));
                output.push('\n');
            }
        }

        for failure in &batch.failures {
            output.push_str(&format!(
                "{} [{}] {}\n",
                failure.file,
                self.paint("failed", Severity::Error),
                failure.message
            ));
        }

        output.push_str(&self.format_summary(batch));
        output
    }

    fn format_summary(&self, batch: &BatchReport) -> String {
        let counts = batch.counts();
        let execution_time = batch.execution_time_ms as f64 / 1000.0;
        let documents = batch.files_validated();

        let findings = if counts.total() == 0 {
            self.paint("0 findings", Severity::Info)
        } else {
            summary_parts(&counts)
                .into_iter()
                .map(|(text, severity)| self.paint(&text, severity))
                .collect::<Vec<_>>()
                .join(", ")
        };

        format!(
            "Summary: {findings} in {documents} document{} ({execution_time:.1}s)\n",
            plural(documents)
        )
    }

    fn format_json(
        &self,
        batch: &BatchReport,
        selected: &[(&ValidationReport, Vec<&Finding>)],
    ) -> TemplateResult<String> {
        let documents: Vec<serde_json::Value> = selected
            .iter()
            .map(|(report, findings)| {
                let records: Vec<FindingRecord> = findings
                    .iter()
                    .map(|finding| FindingRecord::from_finding(report, finding))
                    .collect();
                serde_json::json!({
                    "document": report.document(),
                    "schema": report.schema(),
                    "findings": records,
                })
            })
            .collect();

        let counts = batch.counts();
        let json_report = serde_json::json!({
            "documents": documents,
            "unbound": batch.unbound,
            "failures": batch.failures,
            "summary": {
                "files_validated": batch.files_validated(),
                "findings_by_severity": counts,
                "execution_time_ms": batch.execution_time_ms,
            },
            "config_fingerprint": batch.config_fingerprint,
        });

        serde_json::to_string_pretty(&json_report)
            .map_err(|e| TemplateError::config(format!("JSON serialization failed: {e}")))
    }

    fn format_github(&self, selected: &[(&ValidationReport, Vec<&Finding>)]) -> String {
        let mut output = String::new();

        for (report, findings) in selected {
            for finding in findings {
                let level = match finding.severity() {
                    Severity::Error => "error",
                    Severity::Warning => "warning",
                    Severity::Info => "notice",
                };

                let position = match (finding.line(), finding.column()) {
                    (Some(line), Some(column)) => format!(",line={line},col={column}"),
                    (Some(line), None) => format!(",line={line}"),
                    _ => String::new(),
                };

                output.push_str(&format!(
                    "::{level} file={}{position},title={}::{}\n",
                    report.document(),
                    finding.kind(),
                    finding.message()
                ));
            }
        }

        output
    }

    /// One test case per document; blocking findings become failures
    fn format_junit(
        &self,
        batch: &BatchReport,
        selected: &[(&ValidationReport, Vec<&Finding>)],
    ) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");

        let failures = selected
            .iter()
            .filter(|(_, findings)| findings.iter().any(|f| f.is_blocking()))
            .count();
        let execution_time = batch.execution_time_ms as f64 / 1000.0;

        xml.push_str(&format!(
            "<testsuite name=\"template-guardian\" tests=\"{}\" failures=\"{failures}\" errors=\"{}\" time=\"{execution_time:.3}\">\n",
            selected.len(),
            batch.failures.len()
        ));

        for (report, findings) in selected {
            xml.push_str(&format!(
                "  <testcase classname=\"{}\" name=\"{}\">\n",
                escape_xml(report.schema()),
                escape_xml(report.document())
            ));

            let blocking: Vec<&&Finding> = findings.iter().filter(|f| f.is_blocking()).collect();
            if !blocking.is_empty() {
                xml.push_str(&format!(
                    "    <failure message=\"{} blocking finding{}\">\n",
                    blocking.len(),
                    plural(blocking.len())
                ));
                for finding in findings {
                    xml.push_str(&format!(
                        "      {}\n",
                        escape_xml(&format!("[{}] {}", finding.severity().as_str(), finding.message()))
                    ));
                }
                xml.push_str("    </failure>\n");
            }

            xml.push_str("  </testcase>\n");
        }

        for failure in &batch.failures {
            xml.push_str(&format!(
                "  <testcase classname=\"template-guardian\" name=\"{}\">\n    <error message=\"{}\"/>\n  </testcase>\n",
                escape_xml(&failure.file),
                escape_xml(&failure.message)
            ));
        }

        xml.push_str("</testsuite>\n");
        xml
    }

    #[cfg(feature = "colors")]
    fn paint(&self, text: &str, severity: Severity) -> String {
        if !self.options.use_colors {
            return text.to_string();
        }
        match severity {
            Severity::Error => text.red().bold().to_string(),
            Severity::Warning => text.yellow().to_string(),
            Severity::Info => text.green().to_string(),
        }
    }

    #[cfg(not(feature = "colors"))]
    fn paint(&self, text: &str, _severity: Severity) -> String {
        text.to_string()
    }
}

fn summary_parts(counts: &SeverityCounts) -> Vec<(String, Severity)> {
    let mut parts = Vec::new();
    if counts.error > 0 {
        parts.push((format!("{} error{}", counts.error, plural(counts.error)), Severity::Error));
    }
    if counts.warning > 0 {
        parts.push((format!("{} warning{}", counts.warning, plural(counts.warning)), Severity::Warning));
    }
    if counts.info > 0 {
        parts.push((format!("{} info", counts.info), Severity::Info));
    }
    parts
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
