//! Error types

use crate::config::ConfigError;
use crate::linker::BatchReport;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LinkError>;

/// Errors raised while editing or validating a batch of forms
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse XML in {}: {message}", .file.display())]
    Xml { file: PathBuf, message: String },

    #[error("Malformed document {}: {message}", .file.display())]
    MalformedDocument { file: PathBuf, message: String },

    #[error("Unable to find \"{anchor}\" in {}", .file.display())]
    AnchorNotFound { anchor: String, file: PathBuf },

    #[error(
        "Malformed geography block in {}: expected \"{start}\" followed within 20 lines by \"{end}\"",
        .file.display()
    )]
    GeographyBlock {
        file: PathBuf,
        start: String,
        end: String,
    },

    #[error("{} already defines an instanceName; refusing to insert another", .file.display())]
    InstanceNameExists { file: PathBuf },

    #[error("Unrecognized questionnaire type \"{root}\" in {}", .file.display())]
    UnknownInstrument { file: PathBuf, root: String },

    #[error("{0}")]
    BatchConsistency(String),

    #[error("Pre-existing files prevent operation when overwrite not enabled: {}", display_paths(.0))]
    OutputConflict(Vec<PathBuf>),

    #[error("{} declares save_instance without save_form or save_form without save_instance", .file.display())]
    LinkingInconsistency { file: PathBuf },

    #[error("Bad xpath syntax: \"{0}\"")]
    XPathSyntax(String),

    #[error(
        "Unable to locate XML instance \"{form_id}\" in {}. Please confirm instance ID in settings",
        .file.display()
    )]
    InstanceNotFound { file: PathBuf, form_id: String },

    #[error("{} unresolved cross-form reference(s)", .0.links.problem_count())]
    UnresolvedLinks(Box<BatchReport>),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl LinkError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LinkError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        LinkError::MalformedDocument {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Whether the error aborts the whole batch rather than one pairing group
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            LinkError::BatchConsistency(_)
                | LinkError::OutputConflict(_)
                | LinkError::LinkingInconsistency { .. }
                | LinkError::UnresolvedLinks(_)
                | LinkError::Config(_)
        )
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_message_names_file() {
        let err = LinkError::AnchorNotFound {
            anchor: "</meta>".to_string(),
            file: PathBuf::from("HHQ.xml"),
        };
        assert_eq!(err.to_string(), "Unable to find \"</meta>\" in HHQ.xml");
        assert!(!err.is_batch_fatal());
    }

    #[test]
    fn test_batch_fatal() {
        assert!(LinkError::BatchConsistency("x".into()).is_batch_fatal());
        assert!(LinkError::OutputConflict(vec![]).is_batch_fatal());
        assert!(!LinkError::malformed("a.xml", "bad").is_batch_fatal());
    }

    #[test]
    fn test_conflict_lists_paths() {
        let err = LinkError::OutputConflict(vec![PathBuf::from("a.xml"), PathBuf::from("b.xml")]);
        assert!(err.to_string().ends_with("a.xml, b.xml"));
    }
}
