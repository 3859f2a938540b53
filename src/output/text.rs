//! Human-readable text output formatter

use super::OutputFormatter;
use crate::diagnostic::{Finding, Severity};
use crate::linker::{BatchReport, FormOutcome, FormState};
use colored::*;

/// Text formatter with optional color support
pub struct TextFormatter {
    /// Enable colored output
    pub colored: bool,

    /// Show help text under findings
    pub show_help: bool,

    /// Show the summary line
    pub show_stats: bool,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self {
            colored: true,
            show_help: true,
            show_stats: true,
        }
    }
}

impl TextFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable colors
    pub fn without_color(mut self) -> Self {
        self.colored = false;
        self
    }

    fn severity_str(&self, severity: Severity) -> ColoredString {
        let s = format!("{}", severity);
        if !self.colored {
            return s.normal();
        }
        match severity {
            Severity::Error => s.red().bold(),
            Severity::Warning => s.yellow().bold(),
        }
    }

    fn state_str(&self, state: FormState) -> ColoredString {
        let s = format!("{}", state);
        if !self.colored {
            return s.normal();
        }
        match state {
            FormState::Failed => s.red().bold(),
            FormState::Validated | FormState::Written => s.green(),
            _ => s.normal(),
        }
    }

    fn format_outcome(&self, outcome: &FormOutcome) -> String {
        let mut line = format!(
            "{:>10}  {}",
            self.state_str(outcome.state),
            outcome.path.display()
        );
        if let Some(output) = outcome.output.as_ref().filter(|o| **o != outcome.path) {
            line.push_str(&format!(" -> {}", output.display()));
        }
        if let Some(instrument) = outcome.instrument {
            line.push_str(&format!(" [{}]", instrument));
        }
        if let Some(error) = &outcome.error {
            line.push_str(&format!("\n            {}", error));
        }
        line
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, report: &BatchReport) -> String {
        let mut output = String::new();

        for outcome in &report.forms {
            output.push_str(&self.format_outcome(outcome));
            output.push('\n');
        }

        let findings = report.links.findings(report.strict);
        if !findings.is_empty() {
            output.push('\n');
            for finding in &findings {
                output.push_str(&self.format_finding(finding));
                output.push('\n');
            }
        }

        if self.show_stats {
            let failed = report.failed_count();
            let total = report.forms.len();
            let mut summary = format!(
                "\n{} {} processed",
                total,
                if total == 1 { "form" } else { "forms" }
            );
            if failed > 0 {
                let s = format!("{} failed", failed);
                summary.push_str(", ");
                summary.push_str(&if self.colored { s.red().to_string() } else { s });
            }
            let problems = report.links.problem_count();
            if problems > 0 {
                let s = format!(
                    "{} unresolved {}",
                    problems,
                    if problems == 1 { "link" } else { "links" }
                );
                summary.push_str(", ");
                summary.push_str(&if self.colored { s.yellow().to_string() } else { s });
            }
            output.push_str(&summary);
            output.push('\n');
        }

        output
    }

    fn format_finding(&self, finding: &Finding) -> String {
        let mut output = format!(
            "{}: {}: {} [{}]",
            finding.file.display(),
            self.severity_str(finding.severity),
            finding.message,
            finding.kind
        );
        if self.show_help {
            if let Some(help) = &finding.help {
                let help_line = format!("\n  = help: {}", help);
                output.push_str(&if self.colored {
                    help_line.dimmed().to_string()
                } else {
                    help_line
                });
            }
        }
        output
    }
}
