//! xform-link - post-processing for compiled XForm survey instruments
//!
//! Compiled XForm XML is rewritten line by line to follow a fixed set of
//! linking conventions between paired instruments, then re-parsed to check
//! that declared cross-form references resolve.
//!
//! # Architecture
//!
//! ```text
//! files -> FormRecord (LineDocument) -> CrossFormLinker -> write -> LinkResolver
//! ```
//!
//! The linker classifies each form by the root tag of its instance, runs the
//! batch checks, edits each Household/Female pair and each single form with
//! text produced by [`bindings`], writes the results and finally hands the
//! written XML to the [`resolver`].
//!
//! # Example
//!
//! ```no_run
//! use xform_link::{Config, CrossFormLinker, FormMetadata};
//!
//! let linker = CrossFormLinker::new(Config::default());
//! let report = linker.run(vec![
//!     FormMetadata::new("KER5-Household-Questionnaire-v12-jef.xml"),
//!     FormMetadata::new("KER5-Female-Questionnaire-v12-jef.xml"),
//! ])?;
//! assert!(report.is_success());
//! # Ok::<(), xform_link::LinkError>(())
//! ```

pub mod bindings;
pub mod config;
pub mod diagnostic;
pub mod directive;
pub mod document;
pub mod error;
pub mod geography;
pub mod instrument;
pub mod linker;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod resolver;

// Re-export main types
pub use config::Config;
pub use diagnostic::{Finding, FindingKind, Severity};
pub use directive::LinkingDirective;
pub use document::{LineDocument, Position};
pub use error::{LinkError, Result};
pub use instrument::InstrumentType;
pub use linker::{BatchReport, CrossFormLinker, FormOutcome, FormState};
pub use metadata::{FormMetadata, Manifest};
pub use output::{JsonFormatter, OutputFormatter, TextFormatter};
pub use resolver::{CompiledForm, LinkReport, LinkResolver};
