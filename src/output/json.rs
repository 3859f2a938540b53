//! JSON output formatter

use super::OutputFormatter;
use crate::diagnostic::Finding;
use crate::linker::{BatchReport, FormOutcome};
use serde::Serialize;

/// JSON formatter for machine-readable output
#[derive(Default)]
pub struct JsonFormatter {
    /// Pretty print with indentation
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable pretty printing
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    fn render<T: Serialize>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    forms: &'a [FormOutcome],
    findings: Vec<Finding>,
    summary: JsonSummary,
}

#[derive(Serialize)]
struct JsonSummary {
    forms_processed: usize,
    forms_failed: usize,
    unresolved_xpaths: usize,
    unmatched_targets: usize,
    missing_logging: usize,
    strict: bool,
    success: bool,
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, report: &BatchReport) -> String {
        let output = JsonOutput {
            forms: &report.forms,
            findings: report.links.findings(report.strict),
            summary: JsonSummary {
                forms_processed: report.forms.len(),
                forms_failed: report.failed_count(),
                unresolved_xpaths: report.links.unresolved.len(),
                unmatched_targets: report.links.unmatched_targets.len(),
                missing_logging: report.links.missing_logging.len(),
                strict: report.strict,
                success: report.is_success(),
            },
        };
        self.render(&output)
    }

    fn format_finding(&self, finding: &Finding) -> String {
        self.render(finding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::InstrumentType;
    use crate::linker::FormState;
    use crate::resolver::UnmatchedTarget;
    use std::path::PathBuf;

    #[test]
    fn test_json_report() {
        let mut report = BatchReport {
            strict: true,
            ..BatchReport::default()
        };
        report.forms.push(FormOutcome {
            path: PathBuf::from("RQ.xml"),
            output: Some(PathBuf::from("RQ.xml")),
            form_id: "RQ-ker5-v2".to_string(),
            instrument: Some(InstrumentType::Reinterview),
            state: FormState::Validated,
            error: None,
        });
        report.links.unmatched_targets.push(UnmatchedTarget {
            source: PathBuf::from("RQ.xml"),
            target: "HQ-ker5-v2".to_string(),
        });

        let out = JsonFormatter::new().format(&report);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();

        assert_eq!(value["forms"][0]["instrument"], "reinterview");
        assert_eq!(value["forms"][0]["state"], "validated");
        assert_eq!(value["findings"][0]["kind"], "unmatched-target");
        assert_eq!(value["findings"][0]["severity"], "error");
        assert_eq!(value["findings"][0]["target"], "HQ-ker5-v2");
        assert_eq!(value["summary"]["unmatched_targets"], 1);
        assert_eq!(value["summary"]["success"], false);
    }

    #[test]
    fn test_pretty() {
        let out = JsonFormatter::new().pretty().format(&BatchReport::default());
        assert!(out.contains("\n  \"forms\": []"));
    }
}
