//! Findings reported by the validation pass

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Severity level for findings
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Warning - reported, batch output kept
    #[default]
    Warning,
    /// Error - batch output removed
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// What a finding is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingKind {
    /// A `save_instance` path found in none of its target instances
    UnresolvedXPath,
    /// A `save_form` id naming no form in the batch
    UnmatchedTarget,
    /// An instance without `meta/logging`
    MissingLogging,
}

impl FindingKind {
    /// Short code shown in reports
    pub fn code(&self) -> &'static str {
        match self {
            FindingKind::UnresolvedXPath => "unresolved-xpath",
            FindingKind::UnmatchedTarget => "unmatched-target",
            FindingKind::MissingLogging => "missing-logging",
        }
    }
}

impl std::fmt::Display for FindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// One validation finding against a source form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub severity: Severity,
    /// Form that declared the reference
    pub file: PathBuf,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl Finding {
    pub fn new(kind: FindingKind, severity: Severity, file: PathBuf, message: &str) -> Self {
        Self {
            kind,
            severity,
            file,
            message: message.to_string(),
            xpath: None,
            target: None,
            help: None,
        }
    }

    pub fn with_xpath(mut self, xpath: &str) -> Self {
        self.xpath = Some(xpath.to_string());
        self
    }

    pub fn with_target(mut self, target: &str) -> Self {
        self.target = Some(target.to_string());
        self
    }

    pub fn with_help(mut self, help: &str) -> Self {
        self.help = Some(help.to_string());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering_and_display() {
        assert!(Severity::Error > Severity::Warning);
        assert_eq!(Severity::default(), Severity::Warning);
        assert_eq!(Severity::Error.to_string(), "error");
        assert_eq!(
            serde_json::to_string(&Severity::Warning).unwrap(),
            "\"warning\""
        );
    }

    #[test]
    fn test_finding_builder() {
        let f = Finding::new(
            FindingKind::UnresolvedXPath,
            Severity::Error,
            PathBuf::from("HHQ.xml"),
            "not found",
        )
        .with_xpath("/FRS/agee")
        .with_target("FQ-ker5-v1");

        assert!(f.is_error());
        assert_eq!(f.xpath.as_deref(), Some("/FRS/agee"));
        assert_eq!(f.kind.to_string(), "unresolved-xpath");
    }

    #[test]
    fn test_finding_json_skips_empty_fields() {
        let f = Finding::new(
            FindingKind::MissingLogging,
            Severity::Warning,
            PathBuf::from("SDP.xml"),
            "no logging",
        );
        let json = serde_json::to_string(&f).unwrap();
        assert!(json.contains("\"kind\":\"missing-logging\""));
        assert!(!json.contains("xpath"));
    }
}
