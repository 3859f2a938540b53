//! Cross-form link resolution
//!
//! After the batch is written, every declared `save_instance` path is looked
//! up in the compiled instance of the forms named by `save_form`. Unlike the
//! edit phase this works on a parsed tree, since only structure matters here.
//!
//! A path `/Root/a/b` names the instance element `Root` and the chain of
//! child elements `a`, `b` below it. Every step is qualified with the
//! configured XForms namespace.

use crate::diagnostic::{Finding, FindingKind, Severity};
use crate::directive::LinkingDirective;
use crate::error::{LinkError, Result};
use roxmltree::{Document, Node};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A parsed `/Root/a/b` reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstancePath {
    pub root: String,
    pub steps: Vec<String>,
}

impl InstancePath {
    pub fn parse(xpath: &str) -> Result<Self> {
        let rest = xpath
            .strip_prefix('/')
            .ok_or_else(|| LinkError::XPathSyntax(xpath.to_string()))?;
        let mut segments = rest.split('/');
        let root = segments.next().unwrap_or_default();
        let steps: Vec<String> = segments.map(String::from).collect();

        if root.is_empty() || steps.iter().any(|s| s.is_empty()) {
            return Err(LinkError::XPathSyntax(xpath.to_string()));
        }
        Ok(Self {
            root: root.to_string(),
            steps,
        })
    }
}

/// A written form, ready to be parsed for validation
#[derive(Debug, Clone)]
pub struct CompiledForm {
    pub path: PathBuf,
    pub form_id: String,
    pub directive: LinkingDirective,
    text: String,
}

impl CompiledForm {
    pub fn new(path: impl Into<PathBuf>, form_id: &str, text: String) -> Self {
        Self {
            path: path.into(),
            form_id: form_id.to_string(),
            directive: LinkingDirective::default(),
            text,
        }
    }

    pub fn with_directive(mut self, directive: LinkingDirective) -> Self {
        self.directive = directive;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn parse(&self) -> Result<Document<'_>> {
        Document::parse(&self.text).map_err(|e| LinkError::Xml {
            file: self.path.clone(),
            message: e.to_string(),
        })
    }
}

/// Find the element whose `id` attribute is `form_id`
pub fn find_instance<'a, 'input>(
    doc: &'a Document<'input>,
    form_id: &str,
) -> Option<Node<'a, 'input>> {
    doc.descendants()
        .find(|n| n.is_element() && n.attribute("id") == Some(form_id))
}

/// A `save_instance` path that none of its targets contain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedLink {
    pub source: PathBuf,
    pub xpath: String,
    /// Targets that were present and searched
    pub targets: Vec<String>,
}

/// A `save_form` id that names no form in the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedTarget {
    pub source: PathBuf,
    pub target: String,
}

/// Outcome of the validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkReport {
    pub unresolved: Vec<UnresolvedLink>,
    pub unmatched_targets: Vec<UnmatchedTarget>,
    pub missing_logging: Vec<PathBuf>,
}

impl LinkReport {
    /// Broken references; missing logging markers are not counted
    pub fn problem_count(&self) -> usize {
        self.unresolved.len() + self.unmatched_targets.len()
    }

    pub fn has_problems(&self) -> bool {
        self.problem_count() > 0
    }

    pub fn is_clean(&self) -> bool {
        !self.has_problems() && self.missing_logging.is_empty()
    }

    /// Findings for reporting. Broken references are errors when `strict`.
    pub fn findings(&self, strict: bool) -> Vec<Finding> {
        let severity = if strict {
            Severity::Error
        } else {
            Severity::Warning
        };
        let mut findings = Vec::new();

        for link in &self.unresolved {
            let message = format!(
                "\"{}\" not found in {}",
                link.xpath,
                if link.targets.is_empty() {
                    "any form in the batch".to_string()
                } else {
                    link.targets.join(", ")
                }
            );
            findings.push(
                Finding::new(
                    FindingKind::UnresolvedXPath,
                    severity,
                    link.source.clone(),
                    &message,
                )
                .with_xpath(&link.xpath)
                .with_help("Check save_instance against the target form's field names"),
            );
        }

        for unmatched in &self.unmatched_targets {
            let message = format!("save_form \"{}\" matches no form in the batch", unmatched.target);
            findings.push(
                Finding::new(
                    FindingKind::UnmatchedTarget,
                    severity,
                    unmatched.source.clone(),
                    &message,
                )
                .with_target(&unmatched.target),
            );
        }

        for file in &self.missing_logging {
            findings.push(Finding::new(
                FindingKind::MissingLogging,
                Severity::Warning,
                file.clone(),
                "instance has no meta/logging element",
            ));
        }

        findings
    }
}

/// Resolves instance paths and runs the validation pass
#[derive(Debug, Clone)]
pub struct LinkResolver {
    namespace: String,
    require_logging: bool,
}

impl LinkResolver {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            require_logging: false,
        }
    }

    pub fn with_logging_check(mut self, require_logging: bool) -> Self {
        self.require_logging = require_logging;
        self
    }

    fn is_named(&self, node: &Node, name: &str) -> bool {
        node.is_element()
            && node.tag_name().name() == name
            && node.tag_name().namespace() == Some(self.namespace.as_str())
    }

    /// Whether `xpath` names an element of `instance`. Fails only on syntax.
    pub fn resolve(&self, instance: Node, xpath: &str) -> Result<bool> {
        let path = InstancePath::parse(xpath)?;
        if !self.is_named(&instance, &path.root) {
            return Ok(false);
        }

        let mut current = instance;
        for step in &path.steps {
            match current.children().find(|c| self.is_named(c, step)) {
                Some(child) => current = child,
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Resolve each path in `form`'s instance; bad syntax counts as not found
    pub fn discover_all(&self, form: &CompiledForm, xpaths: &[&str]) -> Result<Vec<bool>> {
        let doc = form.parse()?;
        let instance = self.instance_of(&doc, form)?;
        Ok(xpaths
            .iter()
            .map(|xpath| self.resolve(instance, xpath).unwrap_or(false))
            .collect())
    }

    /// Whether the instance carries `meta/logging`
    pub fn has_logging(&self, form: &CompiledForm) -> Result<bool> {
        let doc = form.parse()?;
        let instance = self.instance_of(&doc, form)?;
        Ok(instance
            .children()
            .filter(|c| self.is_named(c, "meta"))
            .any(|meta| meta.children().any(|c| self.is_named(&c, "logging"))))
    }

    fn instance_of<'a, 'input>(
        &self,
        doc: &'a Document<'input>,
        form: &CompiledForm,
    ) -> Result<Node<'a, 'input>> {
        find_instance(doc, &form.form_id).ok_or_else(|| LinkError::InstanceNotFound {
            file: form.path.clone(),
            form_id: form.form_id.clone(),
        })
    }

    /// Check every declared reference in `forms` against the other forms
    pub fn validate(&self, forms: &[CompiledForm]) -> Result<LinkReport> {
        let by_id: BTreeMap<&str, &CompiledForm> =
            forms.iter().map(|f| (f.form_id.as_str(), f)).collect();
        let mut report = LinkReport::default();

        for source in forms {
            if source.directive.is_empty() {
                continue;
            }

            let mut present = Vec::new();
            for target in source.directive.targets() {
                match by_id.get(target.as_str()) {
                    Some(form) => present.push(*form),
                    None => {
                        log::warn!(
                            "{}: save_form \"{}\" matches no form in the batch",
                            source.path.display(),
                            target
                        );
                        report.unmatched_targets.push(UnmatchedTarget {
                            source: source.path.clone(),
                            target,
                        });
                    }
                }
            }

            let xpaths = source.directive.xpaths();
            let mut found = vec![false; xpaths.len()];
            for target in &present {
                let outcomes = self.discover_all(target, &xpaths)?;
                for (slot, hit) in found.iter_mut().zip(outcomes) {
                    *slot |= hit;
                }
            }

            let target_ids: Vec<String> = present.iter().map(|f| f.form_id.clone()).collect();
            for (xpath, hit) in xpaths.iter().zip(found) {
                if !hit {
                    log::debug!("{}: unresolved {}", source.path.display(), xpath);
                    report.unresolved.push(UnresolvedLink {
                        source: source.path.clone(),
                        xpath: xpath.to_string(),
                        targets: target_ids.clone(),
                    });
                }
            }
        }

        if self.require_logging {
            for form in forms {
                if !self.has_logging(form)? {
                    report.missing_logging.push(form.path.clone());
                }
            }
        }

        Ok(report)
    }
}
