//! Per-form metadata and the batch manifest
//!
//! The compiler that produced the XML knows things the XML alone does not
//! state reliably: the declared linking directives, the instrument type and
//! the country/round. A manifest hands these over:
//!
//! ```yaml
//! forms:
//!   - path: KER5-Household-Questionnaire-v12-jef.xml
//!     form_id: HQ-ker5-v12
//!     xml_root: HHQ
//!     save_form: [FQ-ker5-v12]
//!     save_instance: [/FRS/age, /FRS/firstname]
//! ```
//!
//! Every field but `path` is optional; missing values are derived from the
//! document itself.

use crate::config::ConfigError;
use crate::directive::LinkingDirective;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What the compiler reported about one form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormMetadata {
    pub path: PathBuf,

    #[serde(default)]
    pub form_id: Option<String>,

    /// Root tag of the instance, used to classify the form
    #[serde(default)]
    pub xml_root: Option<String>,

    /// Country and round, e.g. `KER5`
    #[serde(default)]
    pub country_round: Option<String>,

    #[serde(default)]
    pub save_instance: Vec<String>,

    #[serde(default)]
    pub save_form: Vec<String>,
}

impl FormMetadata {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Declared directives; `None` when the manifest declares none
    pub fn directive(&self) -> Option<LinkingDirective> {
        let directive = LinkingDirective::new(self.save_instance.clone(), self.save_form.clone());
        if directive.is_empty() {
            None
        } else {
            Some(directive)
        }
    }
}

/// A list of form metadata entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub forms: Vec<FormMetadata>,
}

impl Manifest {
    /// Load a YAML or JSON manifest. Relative form paths are resolved
    /// against the manifest's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let mut manifest: Self = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown manifest format: {}",
                    ext
                )))
            }
        };

        let base_dir = path.parent().unwrap_or(Path::new("."));
        for form in &mut manifest.forms {
            if form.path.is_relative() {
                form.path = base_dir.join(&form.path);
            }
        }
        log::debug!(
            "Loaded manifest {} with {} form(s)",
            path.display(),
            manifest.forms.len()
        );
        Ok(manifest)
    }

    /// Entry for `path`, matched on the full path first and then on the
    /// file name
    pub fn lookup(&self, path: &Path) -> Option<&FormMetadata> {
        self.forms
            .iter()
            .find(|f| same_file(&f.path, path))
            .or_else(|| {
                let name = path.file_name()?;
                self.forms.iter().find(|f| f.path.file_name() == Some(name))
            })
    }

    /// Metadata for every path, with empty entries for unknown files
    pub fn for_paths(&self, paths: &[PathBuf]) -> Vec<FormMetadata> {
        paths
            .iter()
            .map(|p| {
                let mut meta = self.lookup(p).cloned().unwrap_or_default();
                meta.path = p.clone();
                meta
            })
            .collect()
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_directive_only_when_declared() {
        let mut meta = FormMetadata::new("HHQ.xml");
        assert!(meta.directive().is_none());

        meta.save_form = vec!["FQ-ker5-v1".to_string()];
        let directive = meta.directive().unwrap();
        assert!(!directive.is_consistent());
    }

    #[test]
    fn test_load_yaml_manifest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.yaml");
        std::fs::write(
            &path,
            r#"
forms:
  - path: HHQ.xml
    form_id: HQ-ker5-v12
    xml_root: HHQ
    save_form: [FQ-ker5-v12]
    save_instance: [/FRS/age]
  - path: FRS.xml
"#,
        )
        .unwrap();

        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.forms.len(), 2);
        assert_eq!(manifest.forms[0].path, dir.path().join("HHQ.xml"));
        assert_eq!(manifest.forms[0].xml_root.as_deref(), Some("HHQ"));
        assert!(manifest.forms[1].form_id.is_none());

        let found = manifest.lookup(&dir.path().join("FRS.xml")).unwrap();
        assert_eq!(found.path, dir.path().join("FRS.xml"));
    }

    #[test]
    fn test_load_json_manifest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(
            &path,
            r#"{"forms": [{"path": "/abs/SDP.xml", "country_round": "KER5"}]}"#,
        )
        .unwrap();

        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.forms[0].path, PathBuf::from("/abs/SDP.xml"));
        assert_eq!(manifest.forms[0].country_round.as_deref(), Some("KER5"));
    }

    #[test]
    fn test_lookup_by_file_name() {
        let manifest = Manifest {
            forms: vec![FormMetadata::new("forms/RQ.xml")],
        };
        assert!(manifest.lookup(Path::new("/elsewhere/RQ.xml")).is_some());
        assert!(manifest.lookup(Path::new("SDP.xml")).is_none());

        let metas = manifest.for_paths(&[PathBuf::from("/x/RQ.xml"), PathBuf::from("SDP.xml")]);
        assert_eq!(metas[0].path, PathBuf::from("/x/RQ.xml"));
        assert_eq!(metas[1], FormMetadata::new("SDP.xml"));
    }
}
