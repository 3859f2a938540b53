//! Instrument types and their per-type conventions

use serde::{Deserialize, Serialize};

/// One of the six survey instruments this tool knows how to edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentType {
    /// Household questionnaire, paired with `Female`
    Household,
    /// Female questionnaire, paired with `Household`
    Female,
    /// Service delivery point (facility) questionnaire
    Facility,
    /// Household / facility listing
    Listing,
    /// Household selection
    Selection,
    /// Reinterview questionnaire
    Reinterview,
}

impl InstrumentType {
    pub const ALL: [InstrumentType; 6] = [
        InstrumentType::Household,
        InstrumentType::Female,
        InstrumentType::Facility,
        InstrumentType::Listing,
        InstrumentType::Selection,
        InstrumentType::Reinterview,
    ];

    /// Root element tag of the compiled instance
    pub fn root_tag(&self) -> &'static str {
        match self {
            InstrumentType::Household => "HHQ",
            InstrumentType::Female => "FRS",
            InstrumentType::Facility => "SDP",
            InstrumentType::Listing => "listing",
            InstrumentType::Selection => "Selection",
            InstrumentType::Reinterview => "RQ",
        }
    }

    /// Look up a type by its instance root tag
    pub fn from_root_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.root_tag() == tag)
    }

    /// Questionnaire code used in form ids (`HQ-cdr1-v12`)
    pub fn code(&self) -> &'static str {
        match self {
            InstrumentType::Household => "HQ",
            InstrumentType::Female => "FQ",
            InstrumentType::Facility => "SQ",
            InstrumentType::Listing => "listing",
            InstrumentType::Selection => "sel",
            InstrumentType::Reinterview => "RQ",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Questionnaire name as it appears in file names and form titles
    pub fn title(&self) -> &'static str {
        match self {
            InstrumentType::Household => "Household-Questionnaire",
            InstrumentType::Female => "Female-Questionnaire",
            InstrumentType::Facility => "SDP-Questionnaire",
            InstrumentType::Listing => "Listing",
            InstrumentType::Selection => "Selection",
            InstrumentType::Reinterview => "Reinterview-Questionnaire",
        }
    }

    pub fn from_title(title: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.title() == title)
    }

    /// Sentinel lines bracketing the geography block
    pub fn geography_sentinels(&self) -> (&'static str, &'static str) {
        match self {
            InstrumentType::Household => ("<manual_date/>", "<hh_duplicate_check/>"),
            InstrumentType::Female => ("<geographic_info_unlinked>", "</geographic_info_unlinked>"),
            InstrumentType::Facility => ("<today/>", "<facility_number/>"),
            InstrumentType::Listing => ("<name_typed/>", "<HH_SDP/>"),
            InstrumentType::Selection => ("<manual_date/>", "<RE_name_other/>"),
            InstrumentType::Reinterview => ("<date_time_text/>", "<hh_duplicate_check/>"),
        }
    }

    /// Whether the tool writes the `instanceName` placeholder and calculation
    /// itself. For these types a pre-existing `<instanceName/>` is an error.
    pub fn synthesizes_instance_name(&self) -> bool {
        !matches!(self, InstrumentType::Selection)
    }

    /// Number of trailing locations used when the block has no `EA` entry
    pub fn relevant_fallback(&self) -> usize {
        match self {
            InstrumentType::Facility | InstrumentType::Listing => 4,
            _ => 3,
        }
    }

    /// Suffix carried by geography names in this type's block
    pub fn location_suffix(&self) -> &'static str {
        match self {
            InstrumentType::Female => "_unlinked",
            _ => "",
        }
    }

    /// Whether the type is one half of the Household/Female pair
    pub fn is_paired(&self) -> bool {
        matches!(self, InstrumentType::Household | InstrumentType::Female)
    }

    /// The other half of the pair
    pub fn partner(&self) -> Option<Self> {
        match self {
            InstrumentType::Household => Some(InstrumentType::Female),
            InstrumentType::Female => Some(InstrumentType::Household),
            _ => None,
        }
    }
}

impl std::fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstrumentType::Household => write!(f, "household"),
            InstrumentType::Female => write!(f, "female"),
            InstrumentType::Facility => write!(f, "facility"),
            InstrumentType::Listing => write!(f, "listing"),
            InstrumentType::Selection => write!(f, "selection"),
            InstrumentType::Reinterview => write!(f, "reinterview"),
        }
    }
}

impl std::str::FromStr for InstrumentType {
    type Err = String;

    /// Accepts type names, root tags and questionnaire codes
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let by_name = match s.to_lowercase().as_str() {
            "household" | "hhq" => Some(InstrumentType::Household),
            "female" | "frs" => Some(InstrumentType::Female),
            "facility" | "sdp" => Some(InstrumentType::Facility),
            "listing" => Some(InstrumentType::Listing),
            "selection" => Some(InstrumentType::Selection),
            "reinterview" | "rq" => Some(InstrumentType::Reinterview),
            _ => None,
        };
        by_name
            .or_else(|| Self::from_root_tag(s))
            .or_else(|| Self::from_code(s))
            .ok_or_else(|| format!("Unknown instrument type: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_tag_round_trip() {
        for t in InstrumentType::ALL {
            assert_eq!(InstrumentType::from_root_tag(t.root_tag()), Some(t));
        }
        assert_eq!(InstrumentType::from_root_tag("hhq"), None);
    }

    #[test]
    fn test_partner() {
        assert_eq!(
            InstrumentType::Household.partner(),
            Some(InstrumentType::Female)
        );
        assert_eq!(
            InstrumentType::Female.partner(),
            Some(InstrumentType::Household)
        );
        assert_eq!(InstrumentType::Listing.partner(), None);
        assert!(!InstrumentType::Reinterview.is_paired());
    }

    #[test]
    fn test_parse() {
        assert_eq!("HHQ".parse::<InstrumentType>(), Ok(InstrumentType::Household));
        assert_eq!("sdp".parse::<InstrumentType>(), Ok(InstrumentType::Facility));
        assert_eq!("FQ".parse::<InstrumentType>(), Ok(InstrumentType::Female));
        assert_eq!("sel".parse::<InstrumentType>(), Ok(InstrumentType::Selection));
        assert!("survey".parse::<InstrumentType>().is_err());
    }

    #[test]
    fn test_instance_name_policy() {
        assert!(InstrumentType::Household.synthesizes_instance_name());
        assert!(InstrumentType::Facility.synthesizes_instance_name());
        assert!(!InstrumentType::Selection.synthesizes_instance_name());
    }

    #[test]
    fn test_relevant_fallback_per_type() {
        assert_eq!(InstrumentType::Household.relevant_fallback(), 3);
        assert_eq!(InstrumentType::Reinterview.relevant_fallback(), 3);
        assert_eq!(InstrumentType::Facility.relevant_fallback(), 4);
        assert_eq!(InstrumentType::Listing.relevant_fallback(), 4);
    }
}
