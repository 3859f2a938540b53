//! Binding text for each instrument type
//!
//! Everything here returns plain lines; indentation is added by the document
//! when the lines are inserted. Instance names are built by joining
//! `string(/Root/location)` terms with a literal hyphen.

use crate::document::LineDocument;

/// Comment line that receives the instance-name calculation
pub const ANCHOR_INSTANCE_NAME: &str = "<!-- instanceName -->";
/// Comment line that receives the parent-form-name calculation
pub const ANCHOR_FORM_NAME: &str = "<!-- FRS_form_name -->";
/// Comment line that receives the per-location transfer bindings
pub const ANCHOR_LOCATION_TRANSFER: &str = "<!-- location data to push to FRS -->";

/// Placeholder element for the instance name
pub const INSTANCE_NAME_TAG: &str = "<instanceName/>";

const RULE: &str = "<!-- ......................................... -->";
const BANNER: &str = "<!--    added to XML after XLSFORM output      -->";

/// Optional structure found in the Female form, which changes the shape of
/// the templates on both sides of the pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerMarkers {
    /// Age lives under an `FQA` group (`/FRS/FQA/age`)
    pub grouped_age: bool,
    /// The Female form carries a `region_name` field fed from the Household
    pub region_name: bool,
}

impl PeerMarkers {
    pub const GROUPED_AGE_MARKER: &'static str = "<FQA>";
    pub const REGION_NAME_MARKER: &'static str = "<region_name/>";

    /// Probe the Female document for marker tags
    pub fn probe(female: &LineDocument) -> Self {
        Self {
            grouped_age: female.contains_line(Self::GROUPED_AGE_MARKER),
            region_name: female.contains_line(Self::REGION_NAME_MARKER),
        }
    }

    /// Where the Female form stores age
    pub fn female_age_path(&self) -> &'static str {
        if self.grouped_age {
            "/FRS/FQA/age"
        } else {
            "/FRS/age"
        }
    }
}

/// `string(/ROOT/<prefix>loc<suffix>)` terms joined by `,'-',`
fn concat_locations(base: &str, locations: &[String], suffix: &str) -> String {
    locations
        .iter()
        .map(|loc| format!("string({}/{}{})", base, loc, suffix))
        .collect::<Vec<_>>()
        .join(",'-',")
}

fn lines(block: &[&str]) -> Vec<String> {
    block.iter().map(|l| l.to_string()).collect()
}

/// Boilerplate placed above the first binding of single-instrument forms
pub fn instance_name_block() -> Vec<String> {
    lines(&[RULE, BANNER, RULE, "", ANCHOR_INSTANCE_NAME, "", RULE, RULE])
}

/// Placeholders appended after the Household background-info block
pub fn household_transfer_tags(locations: &[String], markers: PeerMarkers) -> Vec<String> {
    let mut tags = vec!["FRS_form_name".to_string()];
    tags.extend(locations.iter().map(|loc| format!("{}_transfer", loc)));
    if markers.region_name {
        tags.push("region_name_transfer".to_string());
    }
    tags.extend(
        ["photo_transfer", "GPS_transfer", "enumerator_transfer", "san_facility_transfer"]
            .iter()
            .map(|t| t.to_string()),
    );
    tags.into_iter().map(|t| format!("<{}/>", t)).collect()
}

/// Fixed Household bindings: comment anchors plus the firstname, age, photo,
/// GPS, enumerator and sanitation transfers
pub fn household_block(markers: PeerMarkers) -> Vec<String> {
    let age = format!(
        r#"<bind constraint="(. &lt; 130 )" jr:constraintMsg="HQ3: Must be less than 130." nodeset="/HHQ/HH_member/member_bckgrnd/age" saveInstance="{}" relevant=" /HHQ/consent_obtained " required="true()" type="int"/>"#,
        markers.female_age_path()
    );
    let mut block = lines(&[RULE, BANNER, RULE, "", ANCHOR_FORM_NAME, "", ANCHOR_INSTANCE_NAME, "", "<!-- age -->"]);
    block.push(age);
    block.extend(lines(&[
        "",
        "<!-- firstname -->",
        r#"<bind nodeset="/HHQ/HH_member/member_bckgrnd/firstname" saveInstance="/FRS/firstname" relevant=" /HHQ/consent_obtained " required="true()" type="string"/>"#,
        "",
        "<!-- photo transfer -->",
        r#"<bind nodeset="/HHQ/HH_member/photo_transfer" calculate="/HHQ/HH_photo" saveInstance="/FRS/hh_photo_grp/photo_of_home" type="binary"/>"#,
        "",
        ANCHOR_LOCATION_TRANSFER,
        r#"<bind nodeset="/HHQ/HH_member/GPS_transfer" calculate="/HHQ/location" saveInstance="/FRS/HHQ-GPS" type="geopoint"/>"#,
        r#"<bind nodeset="/HHQ/HH_member/enumerator_transfer" calculate="if(/HHQ/name_grp/your_name_check = 'no',/HHQ/name_typed,/HHQ/name_grp/your_name)" saveInstance="/FRS/name_grp/your_name" type="string"/>"#,
        "",
        "<!-- Sanitation facility transfer -->",
        r#"<bind nodeset="/HHQ/HH_member/san_facility_transfer" calculate="if(/HHQ/number_of_sanitation>1, if(string-length(/HHQ/sanitation_main)!=0, jr:choice-name(/HHQ/sanitation_main,'/HHQ/sanitation_main'),'No main facility selected in HHQ'),if(string-length(/HHQ/sanitation_all_grp/sanitation_all)!=0,jr:choice-name(/HHQ/sanitation_all_grp/sanitation_all,' /HHQ/sanitation_all_grp/sanitation_all '),'No facility selected in HHQ'))" saveInstance="/FRS/san_facility" type="string"/>"#,
        RULE,
        RULE,
    ]));
    block
}

/// Name the Household gives each Female form it spawns; `saveForm` points
/// at the Female form id
pub fn household_form_name(relevant: &[String], female_form_id: &str) -> String {
    format!(
        r#"<bind calculate="concat('FR:',{},'-',/HHQ/HH_member/member_bckgrnd/firstname,'-',/HHQ/HH_member/member_bckgrnd/age)" nodeset="/HHQ/HH_member/FRS_form_name" readonly="true()" relevant="/HHQ/HH_member/member_bckgrnd/eligible" saveForm="{}" type="string"/>"#,
        concat_locations("/HHQ", relevant, ""),
        female_form_id
    )
}

pub fn household_instance_name(relevant: &[String]) -> String {
    format!(
        r#"<bind calculate="concat('HH',':',{})" nodeset="/HHQ/meta/instanceName" type="string"/>"#,
        concat_locations("/HHQ", relevant, "")
    )
}

/// One transfer binding per geography level
pub fn household_location_transfers(locations: &[String]) -> Vec<String> {
    locations
        .iter()
        .map(|loc| {
            format!(
                r#"<bind nodeset="/HHQ/HH_member/{0}_transfer" calculate="/HHQ/{0}" saveInstance="/FRS/location_information/{0}" relevant="/HHQ/consent_obtained" required="true()" type="string"/>"#,
                loc
            )
        })
        .collect()
}

/// Pushes the display name of the top geography level into the Female form
pub fn household_region_transfer(top_location: &str) -> String {
    format!(
        r#"<bind nodeset="/HHQ/HH_member/region_name_transfer" calculate="jr:choice-name(/HHQ/{0},'/HHQ/{0}')" saveInstance="/FRS/region_name" type="string"/>"#,
        top_location
    )
}

/// Extra Female placeholders placed after `</meta>`
pub fn female_extra_tags() -> Vec<String> {
    lines(&["<deleteTest/>", "<HHQ-GPS/>"])
}

/// Fixed Female bindings, including the out-of-range age delete trigger
pub fn female_block(markers: PeerMarkers) -> Vec<String> {
    let age = markers.female_age_path();
    let mut block = lines(&[RULE, BANNER, RULE, "", ANCHOR_INSTANCE_NAME, "", "<!-- deleteForm -->"]);
    block.push(format!(
        r#"<bind nodeset="/FRS/deleteTest" relevant="({0} &lt; 15) or ({0} &gt; 49)" deleteForm="true()"/>"#,
        age
    ));
    block.extend(lines(&[RULE, RULE]));
    block
}

/// Female instance name, built from either the linked or the unlinked
/// geography depending on how the form was opened
pub fn female_instance_name(relevant: &[String], markers: PeerMarkers) -> String {
    let unlinked = concat_locations("/FRS/geographic_info_unlinked", relevant, "_unlinked");
    let linked = concat_locations("/FRS/location_information", relevant, "");
    let age = markers.female_age_path();
    format!(
        r#"<bind calculate="if(/FRS/unlinked, concat('FR:',{0},'-',/FRS/firstname,'-',{2}), concat('FR:',{1},'-',/FRS/firstname,'-',{2}))" nodeset="/FRS/meta/instanceName" type="string"/>"#,
        unlinked, linked, age
    )
}

pub fn facility_instance_name(location: &str) -> String {
    format!(
        r#"<bind calculate="concat('SDP',':',string(/SDP/{}),'-',string(/SDP/facility_number))" nodeset="/SDP/meta/instanceName" type="string"/>"#,
        location
    )
}

pub fn listing_instance_name(location: &str) -> String {
    format!(
        r#"<bind calculate="if(/listing/HH_SDP = 'HH',concat('LIST:',/listing/{0},'-HH-',string(/listing/number_structure_HH)),concat('LIST:',/listing/{0},'-SDP-',string(/listing/number_SDP)))" nodeset="/listing/meta/instanceName" type="string"/>"#,
        location
    )
}

pub fn reinterview_instance_name(relevant: &[String]) -> String {
    format!(
        r#"<bind calculate="concat('RQ',':',{})" nodeset="/RQ/meta/instanceName" type="string"/>"#,
        concat_locations("/RQ", relevant, "")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_concat_locations() {
        assert_eq!(
            concat_locations("/HHQ", &locs(&["district", "EA"]), ""),
            "string(/HHQ/district),'-',string(/HHQ/EA)"
        );
        assert_eq!(
            concat_locations("/FRS/g", &locs(&["EA"]), "_unlinked"),
            "string(/FRS/g/EA_unlinked)"
        );
    }

    #[test]
    fn test_household_form_name() {
        let bind = household_form_name(&locs(&["EA"]), "FQ-cdr1-v12");
        assert!(bind.contains(r#"saveForm="FQ-cdr1-v12""#));
        assert!(bind.contains("concat('FR:',string(/HHQ/EA),'-'"));
        assert!(bind.contains(r#"nodeset="/HHQ/HH_member/FRS_form_name""#));
    }

    #[test]
    fn test_household_instance_name() {
        assert_eq!(
            household_instance_name(&locs(&["EA", "structure"])),
            r#"<bind calculate="concat('HH',':',string(/HHQ/EA),'-',string(/HHQ/structure))" nodeset="/HHQ/meta/instanceName" type="string"/>"#
        );
    }

    #[test]
    fn test_transfer_tags_follow_locations() {
        let tags = household_transfer_tags(&locs(&["region", "EA"]), PeerMarkers::default());
        assert_eq!(
            tags,
            vec![
                "<FRS_form_name/>",
                "<region_transfer/>",
                "<EA_transfer/>",
                "<photo_transfer/>",
                "<GPS_transfer/>",
                "<enumerator_transfer/>",
                "<san_facility_transfer/>",
            ]
        );

        let markers = PeerMarkers {
            region_name: true,
            ..PeerMarkers::default()
        };
        let tags = household_transfer_tags(&locs(&["region"]), markers);
        assert!(tags.contains(&"<region_name_transfer/>".to_string()));
    }

    #[test]
    fn test_age_variant_changes_templates() {
        let flat = PeerMarkers::default();
        let grouped = PeerMarkers {
            grouped_age: true,
            ..PeerMarkers::default()
        };

        let flat_block = household_block(flat).join("\n");
        let grouped_block = household_block(grouped).join("\n");
        assert!(flat_block.contains(r#"saveInstance="/FRS/age""#));
        assert!(grouped_block.contains(r#"saveInstance="/FRS/FQA/age""#));

        let delete = female_block(grouped).join("\n");
        assert!(delete.contains("(/FRS/FQA/age &lt; 15) or (/FRS/FQA/age &gt; 49)"));
        assert!(female_instance_name(&locs(&["EA"]), grouped).contains(",'-',/FRS/FQA/age)"));
    }

    #[test]
    fn test_household_block_has_anchors() {
        let block = household_block(PeerMarkers::default());
        for anchor in [ANCHOR_FORM_NAME, ANCHOR_INSTANCE_NAME, ANCHOR_LOCATION_TRANSFER] {
            assert_eq!(block.iter().filter(|l| l.as_str() == anchor).count(), 1);
        }
    }

    #[test]
    fn test_female_instance_name() {
        let bind = female_instance_name(&locs(&["district", "EA"]), PeerMarkers::default());
        assert!(bind.contains(
            "string(/FRS/geographic_info_unlinked/district_unlinked),'-',string(/FRS/geographic_info_unlinked/EA_unlinked)"
        ));
        assert!(bind.contains(
            "string(/FRS/location_information/district),'-',string(/FRS/location_information/EA)"
        ));
        assert!(bind.contains(r#"nodeset="/FRS/meta/instanceName""#));
    }

    #[test]
    fn test_single_instrument_names() {
        assert!(facility_instance_name("EA").contains("string(/SDP/EA)"));
        assert!(listing_instance_name("EA").contains("concat('LIST:',/listing/EA,'-HH-'"));
        assert!(reinterview_instance_name(&locs(&["EA"]))
            .starts_with(r#"<bind calculate="concat('RQ',':',string(/RQ/EA))""#));
    }

    #[test]
    fn test_location_transfers() {
        let binds = household_location_transfers(&locs(&["region", "EA"]));
        assert_eq!(binds.len(), 2);
        assert!(binds[1].contains(r#"saveInstance="/FRS/location_information/EA""#));
        assert!(household_region_transfer("region").contains("jr:choice-name(/HHQ/region,'/HHQ/region')"));
    }
}
