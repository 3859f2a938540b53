//! Line-oriented model of a compiled XForm
//!
//! Edits are anchored on whole trimmed lines so that everything the edit does
//! not touch (comments, indentation, attribute order) is written back byte for
//! byte. Inserted lines borrow the leading and trailing whitespace of the
//! line they land next to.

use crate::error::{LinkError, Result};
use crate::geography;
use crate::instrument::InstrumentType;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

static NODESET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?:^|\s)nodeset="([^"]*)""#).expect("nodeset pattern is valid"));
static ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?:^|\s)id="([^"\s]+)""#).expect("id pattern is valid"));
static OPEN_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<([A-Za-z_][\w.\-]*)").expect("tag pattern is valid"));

/// Escaping artifact left behind by the compiler for character references
const ESCAPED_CHAR_REF: &str = "&amp;#x";

/// Where inserted lines go relative to their anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Above,
    Below,
}

/// Location names found in the instrument's geography block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Geography {
    /// All names between the sentinels, in document order
    pub locations: Vec<String>,
    /// Trailing subset used to build identifiers
    pub relevant: Vec<String>,
}

/// An XML file held as an editable sequence of lines
#[derive(Debug, Clone)]
pub struct LineDocument {
    path: PathBuf,
    /// Every entry keeps its own line terminator
    lines: Vec<String>,
    missing_final_newline: bool,
    geography: Geography,
    destination: Option<PathBuf>,
}

impl LineDocument {
    /// Read a document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| LinkError::io(path, e))?;
        Ok(Self::from_text(path, &text))
    }

    /// Build a document from text already in memory
    pub fn from_text(path: impl Into<PathBuf>, text: &str) -> Self {
        let mut lines: Vec<String> = text.split_inclusive('\n').map(String::from).collect();
        let missing_final_newline = lines.last().is_some_and(|l| !l.ends_with('\n'));
        if let Some(last) = lines.last_mut() {
            if missing_final_newline {
                last.push('\n');
            }
        }

        Self {
            path: path.into(),
            lines,
            missing_final_newline,
            geography: Geography::default(),
            destination: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Full document text as it would be written
    pub fn text(&self) -> String {
        let mut text = self.lines.concat();
        if self.missing_final_newline && text.ends_with('\n') {
            text.pop();
        }
        text
    }

    /// Index of the first line whose trimmed content equals `line`
    pub fn find_exact(&self, line: &str) -> Option<usize> {
        let target = line.trim();
        self.lines.iter().position(|l| l.trim() == target)
    }

    /// Index of the first line whose trimmed content starts with `prefix`
    pub fn find_prefix(&self, prefix: &str) -> Option<usize> {
        self.lines.iter().position(|l| l.trim().starts_with(prefix))
    }

    pub fn contains_line(&self, line: &str) -> bool {
        self.find_exact(line).is_some()
    }

    fn anchor_missing(&self, anchor: &str) -> LinkError {
        LinkError::AnchorNotFound {
            anchor: anchor.to_string(),
            file: self.path.clone(),
        }
    }

    /// Insert `new_lines` next to the line matching `anchor`.
    ///
    /// Below an opening tag or above a closing tag the whitespace is copied
    /// from the line inside the element, so the new content is indented as a
    /// child. Comment anchors always donate their own whitespace.
    pub fn insert_lines<S: AsRef<str>>(
        &mut self,
        new_lines: &[S],
        anchor: &str,
        position: Position,
    ) -> Result<()> {
        let anchor = anchor.trim();
        let anchor_idx = self
            .find_exact(anchor)
            .ok_or_else(|| self.anchor_missing(anchor))?;

        let donor = if is_comment(anchor) {
            anchor_idx
        } else if position == Position::Below && is_opening_tag(anchor) {
            (anchor_idx + 1).min(self.lines.len() - 1)
        } else if position == Position::Above && is_closing_tag(anchor) {
            anchor_idx.saturating_sub(1)
        } else {
            anchor_idx
        };

        let at = match position {
            Position::Above => anchor_idx,
            Position::Below => anchor_idx + 1,
        };
        self.splice_with_whitespace(at, donor, new_lines);
        Ok(())
    }

    /// Insert `new_lines` directly above the first `<bind` line, indented
    /// like the line preceding it.
    pub fn insert_above_first_bind<S: AsRef<str>>(&mut self, new_lines: &[S]) -> Result<()> {
        let first_bind = self
            .find_prefix("<bind")
            .ok_or_else(|| self.anchor_missing("<bind"))?;
        let donor = first_bind.saturating_sub(1);
        self.splice_with_whitespace(first_bind, donor, new_lines);
        Ok(())
    }

    fn splice_with_whitespace<S: AsRef<str>>(&mut self, at: usize, donor: usize, new_lines: &[S]) {
        let (leading, trailing) = whitespace(&self.lines[donor]);
        let trailing = if trailing.contains('\n') {
            trailing.to_string()
        } else {
            format!("{}\n", trailing)
        };
        let prepared: Vec<String> = new_lines
            .iter()
            .map(|l| format!("{}{}{}", leading, l.as_ref(), trailing))
            .collect();
        self.lines.splice(at..at, prepared);
    }

    /// Remove the first `<bind .../>` element whose `nodeset` ends in
    /// `/<name>`. Elements may span several lines. Returns whether anything
    /// was removed.
    pub fn delete_self_closing(&mut self, name: &str) -> bool {
        match self.find_binding(name) {
            Some((begin, end)) => {
                log::debug!(
                    "{}: removed binding for {} (lines {}-{})",
                    self.path.display(),
                    name,
                    begin + 1,
                    end + 1
                );
                self.lines.drain(begin..=end);
                true
            }
            None => false,
        }
    }

    /// Line span of the first binding whose nodeset ends in `/<name>`
    fn find_binding(&self, name: &str) -> Option<(usize, usize)> {
        let suffix = format!("/{}", name);
        let mut start: Option<usize> = None;
        let mut parts: Vec<&str> = Vec::new();

        for (idx, line) in self.lines.iter().enumerate() {
            let trimmed = line.trim();
            if trimmed.starts_with("<bind") {
                start = Some(idx);
                parts.clear();
            }
            let Some(begin) = start else { continue };
            parts.push(trimmed);
            if trimmed.ends_with("/>") {
                let element = parts.join(" ");
                let matched = NODESET_RE
                    .captures(&element)
                    .is_some_and(|caps| caps[1].ends_with(&suffix));
                if matched {
                    return Some((begin, idx));
                }
                start = None;
                parts.clear();
            }
        }
        None
    }

    /// Whether a binding for `/<name>` exists
    pub fn has_binding(&self, name: &str) -> bool {
        self.find_binding(name).is_some()
    }

    /// Apply the fixed character-sequence substitutions and strip
    /// `placeholders` from every line
    pub fn normalize(&mut self, placeholders: &[String]) {
        for line in &mut self.lines {
            if line.contains(ESCAPED_CHAR_REF) {
                *line = line.replace(ESCAPED_CHAR_REF, "&#x");
            }
            for token in placeholders.iter().filter(|t| !t.is_empty()) {
                if line.contains(token.as_str()) {
                    *line = line.replace(token.as_str(), "");
                }
            }
        }
    }

    /// Insert a comment as the second line (after the XML declaration)
    pub fn stamp(&mut self, comment: &str) {
        let at = self.lines.len().min(1);
        self.lines.insert(at, format!("{}\n", comment));
    }

    fn instance_head(&self) -> Option<&str> {
        let idx = self.find_exact("<instance>")?;
        self.lines.get(idx + 1).map(|l| l.trim())
    }

    /// The form identifier: the `id` attribute of the element right after
    /// `<instance>`
    pub fn form_id(&self) -> Result<String> {
        self.instance_head()
            .and_then(|head| ID_RE.captures(head))
            .map(|caps| caps[1].to_string())
            .ok_or_else(|| LinkError::malformed(&self.path, "no form id found after <instance>"))
    }

    /// Tag of the primary instance element, e.g. `HHQ`
    pub fn instance_root(&self) -> Option<String> {
        self.instance_head()
            .and_then(|head| OPEN_TAG_RE.captures(head))
            .map(|caps| caps[1].to_string())
    }

    /// Locate and store the geography block for `instrument`
    pub fn locate_geography(&mut self, instrument: InstrumentType) -> Result<&Geography> {
        let (start, end) = instrument.geography_sentinels();
        let locations =
            geography::extract(&self.lines, start, end).ok_or_else(|| LinkError::GeographyBlock {
                file: self.path.clone(),
                start: start.to_string(),
                end: end.to_string(),
            })?;
        let relevant = geography::relevant_subset(&locations, instrument.relevant_fallback());
        self.geography = Geography {
            locations,
            relevant,
        };
        Ok(&self.geography)
    }

    pub fn geography(&self) -> &Geography {
        &self.geography
    }

    pub fn locations(&self) -> &[String] {
        &self.geography.locations
    }

    pub fn relevant_locations(&self) -> &[String] {
        &self.geography.relevant
    }

    /// Where the document would be written: in place, or `<stem>-<suffix>.<ext>`
    pub fn output_path(&self, suffix: Option<&str>) -> PathBuf {
        match suffix {
            None => self.path.clone(),
            Some(suffix) => {
                let stem = self
                    .path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let file_name = match self.path.extension() {
                    Some(ext) => format!("{}-{}.{}", stem, suffix, ext.to_string_lossy()),
                    None => format!("{}-{}", stem, suffix),
                };
                self.path.with_file_name(file_name)
            }
        }
    }

    /// Write the current lines to `dest`
    pub fn write_to(&mut self, dest: &Path) -> Result<()> {
        std::fs::write(dest, self.text()).map_err(|e| LinkError::io(dest, e))?;
        self.destination = Some(dest.to_path_buf());
        Ok(())
    }

    /// Path the document was last written to
    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }
}

fn is_comment(trimmed: &str) -> bool {
    trimmed.starts_with("<!")
}

fn is_opening_tag(trimmed: &str) -> bool {
    trimmed.starts_with('<')
        && !trimmed.starts_with("</")
        && !trimmed.ends_with("/>")
        && trimmed.ends_with('>')
}

fn is_closing_tag(trimmed: &str) -> bool {
    trimmed.starts_with("</") && !trimmed.ends_with("/>") && trimmed.ends_with('>')
}

/// Leading and trailing whitespace of a line
fn whitespace(line: &str) -> (&str, &str) {
    let content = line.trim_end_matches(['\r', '\n']);
    if content.trim().is_empty() {
        return (content, &line[content.len()..]);
    }
    let leading = &line[..line.len() - line.trim_start().len()];
    let trailing = &line[line.trim_end().len()..];
    (leading, trailing)
}
