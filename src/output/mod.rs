//! Report formatters for batch results

mod json;
mod text;

pub use json::JsonFormatter;
pub use text::TextFormatter;

use crate::diagnostic::Finding;
use crate::linker::BatchReport;

/// Output formatter trait
pub trait OutputFormatter: Send + Sync {
    /// Format the whole batch report
    fn format(&self, report: &BatchReport) -> String;

    /// Format a single validation finding
    fn format_finding(&self, finding: &Finding) -> String;
}
