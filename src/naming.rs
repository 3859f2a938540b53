//! Survey naming scheme
//!
//! File names follow `[CC]R[#]-<questionnaire>-v[##]-[SIG]`, for example
//! `CDR1-Household-Questionnaire-v12-jef.xml`. Form ids follow
//! `[code]-[cc]r[#]-v[##]`, for example `HQ-cdr1-v12`.

use crate::instrument::InstrumentType;
use once_cell::sync::Lazy;
use regex::Regex;

/// Country codes accepted in file names
pub const COUNTRY_CODES: &[(&str, &str)] = &[
    ("Burkina Faso", "BF"),
    ("DR Congo", "CD"),
    ("Ethiopia", "ET"),
    ("Ghana", "GH"),
    ("Indonesia", "ID"),
    ("Kenya", "KE"),
    ("Niger", "NE"),
    ("Nigeria", "NG"),
    ("Uganda", "UG"),
];

/// Human-readable model of an approved file name
pub const FILE_NAME_MODEL: &str =
    "[CC]R[#]-[((Household|Female|SDP|Reinterview)-Questionnaire)|Selection|Listing]-v[##]-[SIG]";

static FILE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    let countries = COUNTRY_CODES
        .iter()
        .map(|(_, code)| *code)
        .collect::<Vec<_>>()
        .join("|");
    let titles = InstrumentType::ALL
        .iter()
        .map(|t| t.title())
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(
        r"^(?P<cr>(?:{})R(?P<round>\d))-(?P<title>{})-v(?P<version>\d{{1,2}})-[a-zA-Z]{{2,}}",
        countries, titles
    );
    Regex::new(&pattern).expect("file name pattern is valid")
});

static FORM_ID_RE: Lazy<Regex> = Lazy::new(|| {
    let countries = COUNTRY_CODES
        .iter()
        .map(|(_, code)| code.to_lowercase())
        .collect::<Vec<_>>()
        .join("|");
    let codes = InstrumentType::ALL
        .iter()
        .map(|t| t.code())
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(
        r"^(?P<code>{})-(?P<cr>(?:{})r\d)-v(?P<version>\d{{1,2}})$",
        codes, countries
    );
    Regex::new(&pattern).expect("form id pattern is valid")
});

/// Identifiers encoded in a file name or form id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifiers {
    pub instrument: InstrumentType,
    /// Country and round, upper-cased (`CDR1`)
    pub country_round: String,
    pub version: String,
}

impl Identifiers {
    /// The form id the settings tab is expected to carry
    pub fn expected_form_id(&self) -> String {
        format!(
            "{}-{}-v{}",
            self.instrument.code(),
            self.country_round.to_lowercase(),
            self.version
        )
    }
}

/// Parse a file stem (no extension) against the approved naming scheme
pub fn parse_file_name(stem: &str) -> Option<Identifiers> {
    let caps = FILE_NAME_RE.captures(stem)?;
    Some(Identifiers {
        instrument: InstrumentType::from_title(&caps["title"])?,
        country_round: caps["cr"].to_string(),
        version: caps["version"].to_string(),
    })
}

/// Parse a form id such as `FQ-ker5-v12`
pub fn parse_form_id(form_id: &str) -> Option<Identifiers> {
    let caps = FORM_ID_RE.captures(form_id)?;
    Some(Identifiers {
        instrument: InstrumentType::from_code(&caps["code"])?,
        country_round: caps["cr"].to_uppercase(),
        version: caps["version"].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_name() {
        let ids = parse_file_name("CDR1-Household-Questionnaire-v12-jef").unwrap();
        assert_eq!(ids.instrument, InstrumentType::Household);
        assert_eq!(ids.country_round, "CDR1");
        assert_eq!(ids.version, "12");
        assert_eq!(ids.expected_form_id(), "HQ-cdr1-v12");
    }

    #[test]
    fn test_parse_file_name_listing() {
        let ids = parse_file_name("KER5-Listing-v3-abc").unwrap();
        assert_eq!(ids.instrument, InstrumentType::Listing);
        assert_eq!(ids.expected_form_id(), "listing-ker5-v3");
    }

    #[test]
    fn test_reject_bad_names() {
        assert!(parse_file_name("XXR1-Household-Questionnaire-v12-jef").is_none());
        assert!(parse_file_name("CDR1-Household-Questionnaire-v12").is_none());
        assert!(parse_file_name("HHQ").is_none());
    }

    #[test]
    fn test_parse_form_id() {
        let ids = parse_form_id("FQ-ker5-v12").unwrap();
        assert_eq!(ids.instrument, InstrumentType::Female);
        assert_eq!(ids.country_round, "KER5");
        assert!(parse_form_id("child_form_id").is_none());
    }
}
