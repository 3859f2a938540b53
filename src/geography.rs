//! Geography block extraction
//!
//! Each instrument carries a short run of self-closing location elements
//! (`<region/>`, `<district/>`, `<EA/>`) between two sentinel lines.

/// Largest allowed distance between the two sentinel lines
pub const MAX_BLOCK_SPAN: usize = 20;

/// Location name that marks the start of the relevant tail
pub const EA_MARKER: &str = "EA";

/// Extract the tag names strictly between `start_tag` and `end_tag`.
///
/// Returns `None` when either sentinel is missing or when the block is
/// inverted or longer than [`MAX_BLOCK_SPAN`] lines. Adjacent sentinels give
/// an empty list; callers decide whether that is acceptable.
pub fn extract<S: AsRef<str>>(lines: &[S], start_tag: &str, end_tag: &str) -> Option<Vec<String>> {
    let start = lines.iter().position(|l| l.as_ref().trim() == start_tag)?;
    let end = lines.iter().position(|l| l.as_ref().trim() == end_tag)?;

    if end <= start || end - start > MAX_BLOCK_SPAN {
        return None;
    }

    Some(
        lines[start + 1..end]
            .iter()
            .map(|l| tag_name(l.as_ref()))
            .filter(|name| !name.is_empty())
            .collect(),
    )
}

/// Turn `<tag/>` into `tag`
pub fn tag_name(line: &str) -> String {
    line.trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim_end_matches('/')
        .trim()
        .to_string()
}

/// The most specific administrative levels: everything from `EA` onward, or
/// the last `fallback` entries when there is no `EA`.
pub fn relevant_subset(locations: &[String], fallback: usize) -> Vec<String> {
    match locations.iter().position(|l| l == EA_MARKER) {
        Some(ea) => locations[ea..].to_vec(),
        None => {
            let skip = locations.len().saturating_sub(fallback);
            locations[skip..].to_vec()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(String::from).collect()
    }

    #[test]
    fn test_extract_between_sentinels() {
        let doc = lines(
            "<HHQ id=\"x\">\n  <manual_date/>\n  <region/>\n  <district/>\n  <EA/>\n  <hh_duplicate_check/>\n</HHQ>",
        );
        let locs = extract(&doc, "<manual_date/>", "<hh_duplicate_check/>").unwrap();
        assert_eq!(locs, vec!["region", "district", "EA"]);
    }

    #[test]
    fn test_extract_missing_sentinel() {
        let doc = lines("<manual_date/>\n<region/>\n");
        assert!(extract(&doc, "<manual_date/>", "<hh_duplicate_check/>").is_none());
    }

    #[test]
    fn test_extract_span_too_long() {
        let mut doc = vec!["<manual_date/>".to_string()];
        for i in 0..20 {
            doc.push(format!("<level{}/>", i));
        }
        doc.push("<hh_duplicate_check/>".to_string());
        // 21 lines apart
        assert!(extract(&doc, "<manual_date/>", "<hh_duplicate_check/>").is_none());

        doc.remove(1);
        // exactly 20 lines apart
        assert_eq!(
            extract(&doc, "<manual_date/>", "<hh_duplicate_check/>")
                .unwrap()
                .len(),
            19
        );
    }

    #[test]
    fn test_extract_inverted() {
        let doc = lines("<hh_duplicate_check/>\n<region/>\n<manual_date/>");
        assert!(extract(&doc, "<manual_date/>", "<hh_duplicate_check/>").is_none());
    }

    #[test]
    fn test_extract_adjacent_sentinels() {
        let doc = lines("<manual_date/>\n<hh_duplicate_check/>");
        assert_eq!(
            extract(&doc, "<manual_date/>", "<hh_duplicate_check/>"),
            Some(Vec::new())
        );
    }

    #[test]
    fn test_tag_name() {
        assert_eq!(tag_name("    <region/>\n"), "region");
        assert_eq!(tag_name("<district />"), "district");
    }

    #[test]
    fn test_relevant_subset_with_ea() {
        let locs: Vec<String> = ["country", "region", "EA", "structure"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(relevant_subset(&locs, 3), vec!["EA", "structure"]);
    }

    #[test]
    fn test_relevant_subset_fallback() {
        let locs: Vec<String> = ["a", "b", "c", "d", "e"].iter().map(|s| s.to_string()).collect();
        assert_eq!(relevant_subset(&locs, 3), vec!["c", "d", "e"]);
        assert_eq!(relevant_subset(&locs, 4), vec!["b", "c", "d", "e"]);
        assert_eq!(relevant_subset(&locs[..2], 3), vec!["a", "b"]);
    }
}
