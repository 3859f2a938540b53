//! Linking directives
//!
//! A form declares the values it pushes into other instruments with two
//! lists: `save_instance` (paths of the values, such as `/FRS/firstname`)
//! and `save_form` (form ids of the instruments that receive them). The two
//! travel together; a form with one and not the other is inconsistent.

use crate::error::{LinkError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

static SAVE_INSTANCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|\s)saveInstance="([^"]*)""#).expect("saveInstance pattern is valid")
});
static SAVE_FORM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?:^|\s)saveForm="([^"]*)""#).expect("saveForm pattern is valid"));

/// Declared cross-form writes of one form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkingDirective {
    pub save_instance: Vec<String>,
    pub save_form: Vec<String>,
}

impl LinkingDirective {
    pub fn new(save_instance: Vec<String>, save_form: Vec<String>) -> Self {
        Self {
            save_instance,
            save_form,
        }
    }

    /// Read directives from the `saveInstance` and `saveForm` attributes of
    /// compiled XML
    pub fn from_xml(text: &str) -> Self {
        let collect = |re: &Regex| -> Vec<String> {
            re.captures_iter(text)
                .map(|caps| caps[1].trim().to_string())
                .filter(|value| !value.is_empty())
                .collect()
        };
        Self {
            save_instance: collect(&SAVE_INSTANCE_RE),
            save_form: collect(&SAVE_FORM_RE),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.save_instance.is_empty() && self.save_form.is_empty()
    }

    /// Both lists present, or neither
    pub fn is_consistent(&self) -> bool {
        self.save_instance.is_empty() == self.save_form.is_empty()
    }

    pub fn check(&self, file: &Path) -> Result<()> {
        if self.is_consistent() {
            Ok(())
        } else {
            Err(LinkError::LinkingInconsistency {
                file: file.to_path_buf(),
            })
        }
    }

    /// Distinct xpaths in declaration order
    pub fn xpaths(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.save_instance
            .iter()
            .map(String::as_str)
            .filter(|x| seen.insert(*x))
            .collect()
    }

    /// Every target form id, with multi-target entries split apart
    pub fn targets(&self) -> BTreeSet<String> {
        self.save_form
            .iter()
            .flat_map(|entry| split_targets(entry))
            .collect()
    }
}

/// Split a `save_form` value naming several candidate forms
pub fn split_targets(entry: &str) -> Vec<String> {
    entry
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_consistency() {
        assert!(LinkingDirective::default().is_consistent());
        assert!(LinkingDirective::new(strings(&["/FRS/age"]), strings(&["FQ-ker5-v1"])).is_consistent());

        let only_instance = LinkingDirective::new(strings(&["/FRS/age"]), vec![]);
        assert!(!only_instance.is_consistent());
        let err = only_instance.check(Path::new("HHQ.xml")).unwrap_err();
        assert!(matches!(err, LinkError::LinkingInconsistency { .. }));

        let only_form = LinkingDirective::new(vec![], strings(&["FQ-ker5-v1"]));
        assert!(only_form.check(Path::new("HHQ.xml")).is_err());
    }

    #[test]
    fn test_split_targets() {
        assert_eq!(split_targets("FQ-ker5-v1"), vec!["FQ-ker5-v1"]);
        assert_eq!(split_targets("a, b  c"), vec!["a", "b", "c"]);
        assert!(split_targets("  ").is_empty());
    }

    #[test]
    fn test_targets_and_xpaths_deduplicate() {
        let d = LinkingDirective::new(
            strings(&["/FRS/age", "/FRS/firstname", "/FRS/age"]),
            strings(&["FQ-a-v1 FQ-b-v1", "FQ-a-v1"]),
        );
        assert_eq!(d.xpaths(), vec!["/FRS/age", "/FRS/firstname"]);
        assert_eq!(d.targets().into_iter().collect::<Vec<_>>(), vec!["FQ-a-v1", "FQ-b-v1"]);
    }

    #[test]
    fn test_from_xml() {
        let xml = r#"
<bind nodeset="/HHQ/HH_member/FRS_form_name" saveForm="FQ-ker5-v12" type="string"/>
<bind nodeset="/HHQ/HH_member/member_bckgrnd/age" saveInstance="/FRS/age" type="int"/>
<bind nodeset="/HHQ/HH_member/photo_transfer" saveInstance="/FRS/hh_photo_grp/photo_of_home"/>
"#;
        let d = LinkingDirective::from_xml(xml);
        assert_eq!(d.save_form, vec!["FQ-ker5-v12"]);
        assert_eq!(d.save_instance, vec!["/FRS/age", "/FRS/hh_photo_grp/photo_of_home"]);

        assert!(LinkingDirective::from_xml("<bind nodeset=\"/a\"/>").is_empty());
    }
}
