//! Batch pipeline for a set of compiled forms
//!
//! Each form moves through `Loaded → Classified → Edited → Written →
//! Validated`, or ends in `Failed`. Household and Female forms are edited as
//! one group: if either fails, neither is written. Batch-level checks run
//! before any edit, and the validation pass runs after every write.

use crate::bindings::{self, PeerMarkers, INSTANCE_NAME_TAG};
use crate::config::Config;
use crate::directive::LinkingDirective;
use crate::document::{LineDocument, Position};
use crate::error::{LinkError, Result};
use crate::instrument::InstrumentType;
use crate::metadata::FormMetadata;
use crate::naming;
use crate::resolver::{CompiledForm, LinkReport, LinkResolver};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const META_CLOSE: &str = "</meta>";
const BACKGROUND_CLOSE: &str = "</member_bckgrnd>";
const UNRESOLVED: &str = "unresolved cross-form references";

/// Where a form is in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormState {
    Loaded,
    Classified,
    Edited,
    Written,
    Validated,
    Failed,
}

impl std::fmt::Display for FormState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormState::Loaded => write!(f, "loaded"),
            FormState::Classified => write!(f, "classified"),
            FormState::Edited => write!(f, "edited"),
            FormState::Written => write!(f, "written"),
            FormState::Validated => write!(f, "validated"),
            FormState::Failed => write!(f, "failed"),
        }
    }
}

/// One form and everything known about it
#[derive(Debug, Clone)]
pub struct FormRecord {
    pub document: LineDocument,
    pub metadata: FormMetadata,
    pub form_id: String,
    pub instrument: Option<InstrumentType>,
    pub country_round: Option<String>,
    original: String,
    state: FormState,
    failure: Option<String>,
}

impl FormRecord {
    /// Read the form named by `metadata.path`
    pub fn load(metadata: FormMetadata) -> Result<Self> {
        let document = LineDocument::load(&metadata.path)?;
        let original = document.text();
        log::debug!("{}: loaded {} lines", metadata.path.display(), document.len());
        Ok(Self {
            document,
            metadata,
            form_id: String::new(),
            instrument: None,
            country_round: None,
            original,
            state: FormState::Loaded,
            failure: None,
        })
    }

    pub fn path(&self) -> &Path {
        self.document.path()
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    fn advance(&mut self, state: FormState) {
        log::debug!("{}: {} -> {}", self.path().display(), self.state, state);
        self.state = state;
    }

    fn fail(&mut self, reason: impl std::fmt::Display) {
        let reason = reason.to_string();
        log::warn!("{}: {}", self.path().display(), reason);
        self.state = FormState::Failed;
        self.failure = Some(reason);
    }

    fn is_active(&self) -> bool {
        self.state != FormState::Failed
    }

    /// Determine the form id, instrument type and country/round
    pub fn classify(&mut self) -> Result<()> {
        self.form_id = match &self.metadata.form_id {
            Some(id) => id.clone(),
            None => self.document.form_id()?,
        };

        let root = match &self.metadata.xml_root {
            Some(root) => root.clone(),
            None => self.document.instance_root().ok_or_else(|| {
                LinkError::malformed(self.path(), "no instance element after <instance>")
            })?,
        };
        let instrument =
            InstrumentType::from_root_tag(&root).ok_or_else(|| LinkError::UnknownInstrument {
                file: self.path().to_path_buf(),
                root: root.clone(),
            })?;
        self.instrument = Some(instrument);

        let from_name = self
            .path()
            .file_stem()
            .and_then(|stem| naming::parse_file_name(&stem.to_string_lossy()));
        if let Some(ids) = &from_name {
            let expected = ids.expected_form_id();
            if expected != self.form_id {
                log::warn!(
                    "{}: form id \"{}\" does not follow the file name (expected \"{}\")",
                    self.path().display(),
                    self.form_id,
                    expected
                );
            }
        }

        self.country_round = self
            .metadata
            .country_round
            .clone()
            .or_else(|| from_name.map(|ids| ids.country_round))
            .or_else(|| naming::parse_form_id(&self.form_id).map(|ids| ids.country_round))
            .map(|cr| cr.to_uppercase());

        self.advance(FormState::Classified);
        Ok(())
    }

    /// Directives declared in metadata, or read from the current XML
    pub fn directive(&self) -> LinkingDirective {
        self.metadata
            .directive()
            .unwrap_or_else(|| LinkingDirective::from_xml(&self.document.text()))
    }

    /// Undo this form's write: restore the source text in place, or remove
    /// a separate output file
    fn rollback(&mut self) {
        let Some(dest) = self.document.destination().map(Path::to_path_buf) else {
            return;
        };
        let outcome = if dest == self.path() {
            std::fs::write(&dest, &self.original)
        } else {
            std::fs::remove_file(&dest)
        };
        match outcome {
            Ok(()) => log::info!("Rolled back {}", dest.display()),
            Err(e) => log::error!("Failed to roll back {}: {}", dest.display(), e),
        }
    }

    pub fn outcome(&self) -> FormOutcome {
        FormOutcome {
            path: self.path().to_path_buf(),
            output: self.document.destination().map(Path::to_path_buf),
            form_id: self.form_id.clone(),
            instrument: self.instrument,
            state: self.state,
            error: self.failure.clone(),
        }
    }
}

/// Final status of one form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormOutcome {
    pub path: PathBuf,
    pub output: Option<PathBuf>,
    pub form_id: String,
    pub instrument: Option<InstrumentType>,
    pub state: FormState,
    pub error: Option<String>,
}

/// Result of a batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub forms: Vec<FormOutcome>,
    pub links: LinkReport,
    pub strict: bool,
}

impl BatchReport {
    pub fn failed(&self) -> impl Iterator<Item = &FormOutcome> {
        self.forms.iter().filter(|f| f.state == FormState::Failed)
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    pub fn is_success(&self) -> bool {
        self.failed_count() == 0 && !(self.strict && self.links.has_problems())
    }
}

/// Forms edited and written together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Group {
    Pair { household: usize, female: usize },
    Single(usize),
}

impl Group {
    fn members(&self) -> Vec<usize> {
        match *self {
            Group::Pair { household, female } => vec![household, female],
            Group::Single(idx) => vec![idx],
        }
    }
}

/// Drives a batch of forms through editing, writing and validation
pub struct CrossFormLinker {
    config: Config,
}

impl CrossFormLinker {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn resolver(&self) -> LinkResolver {
        LinkResolver::new(&self.config.namespace)
            .with_logging_check(self.config.linking.require_logging)
    }

    /// Load and classify every form. Unreadable files abort the batch;
    /// forms that cannot be classified are marked failed and skipped.
    pub fn load(&self, forms: Vec<FormMetadata>) -> Result<Vec<FormRecord>> {
        let mut records = forms
            .into_iter()
            .map(FormRecord::load)
            .collect::<Result<Vec<_>>>()?;

        for record in &mut records {
            if let Err(e) = record.classify() {
                record.fail(e);
            }
        }
        Ok(records)
    }

    /// Edit, write and validate a batch
    pub fn run(&self, forms: Vec<FormMetadata>) -> Result<BatchReport> {
        let mut records = self.load(forms)?;
        self.precheck(&records)?;

        let groups = pair_groups(&records);
        for group in &groups {
            self.edit_group(&mut records, group);
        }
        for group in &groups {
            self.write_group(&mut records, group);
        }

        let links = match self.validate_written(&records) {
            Ok(links) => links,
            Err(e) => {
                rollback_all(&mut records, "validation failed");
                return Err(e);
            }
        };

        if links.has_problems() && self.config.linking.strict {
            rollback_all(&mut records, UNRESOLVED);
            return Err(self.unresolved(&records, links));
        }
        if links.has_problems() {
            log::warn!(
                "{} unresolved cross-form reference(s); output kept",
                links.problem_count()
            );
        }

        for record in records.iter_mut().filter(|r| r.state == FormState::Written) {
            record.advance(FormState::Validated);
        }

        Ok(BatchReport {
            forms: records.iter().map(FormRecord::outcome).collect(),
            links,
            strict: self.config.linking.strict,
        })
    }

    /// Validate forms as they are on disk without editing them
    pub fn check(&self, forms: Vec<FormMetadata>) -> Result<BatchReport> {
        let mut records = self.load(forms)?;
        for record in records.iter().filter(|r| r.is_active()) {
            if let Some(directive) = record.metadata.directive() {
                directive.check(record.path())?;
            }
        }

        let compiled: Vec<CompiledForm> = records
            .iter()
            .filter(|r| r.is_active())
            .map(|r| {
                CompiledForm::new(r.path(), &r.form_id, r.document.text())
                    .with_directive(r.directive())
            })
            .collect();
        let links = self.resolver().validate(&compiled)?;

        if links.has_problems() && self.config.linking.strict {
            for record in records.iter_mut().filter(|r| r.is_active()) {
                record.fail(UNRESOLVED);
            }
            return Err(self.unresolved(&records, links));
        }

        for record in records.iter_mut().filter(|r| r.is_active()) {
            record.advance(FormState::Validated);
        }
        Ok(BatchReport {
            forms: records.iter().map(FormRecord::outcome).collect(),
            links,
            strict: self.config.linking.strict,
        })
    }

    /// Strict failure carrying every form's final status
    fn unresolved(&self, records: &[FormRecord], links: LinkReport) -> LinkError {
        LinkError::UnresolvedLinks(Box::new(BatchReport {
            forms: records.iter().map(FormRecord::outcome).collect(),
            links,
            strict: true,
        }))
    }

    /// Checks that fail the whole batch before anything is edited
    pub fn precheck(&self, records: &[FormRecord]) -> Result<()> {
        let active: Vec<&FormRecord> = records.iter().filter(|r| r.is_active()).collect();

        let mut rounds: BTreeMap<String, Vec<&Path>> = BTreeMap::new();
        for record in &active {
            let round = record
                .country_round
                .clone()
                .unwrap_or_else(|| "unknown".to_string());
            rounds.entry(round).or_default().push(record.path());
        }
        if rounds.len() > 1 {
            let found = rounds
                .iter()
                .map(|(round, paths)| format!("{} ({})", round, join_paths(paths)))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(LinkError::BatchConsistency(format!(
                "All forms in a batch must share one country and round; found {}",
                found
            )));
        }

        let mut by_type: BTreeMap<InstrumentType, Vec<&Path>> = BTreeMap::new();
        for record in &active {
            if let Some(instrument) = record.instrument {
                by_type.entry(instrument).or_default().push(record.path());
            }
        }
        for (instrument, paths) in &by_type {
            if paths.len() > 1 {
                return Err(LinkError::BatchConsistency(format!(
                    "Only one {} form may be edited at a time; found {}",
                    instrument,
                    join_paths(paths)
                )));
            }
        }
        for instrument in [InstrumentType::Household, InstrumentType::Female] {
            let Some(partner) = instrument.partner() else {
                continue;
            };
            if let Some(paths) = by_type.get(&instrument) {
                if !by_type.contains_key(&partner) {
                    return Err(LinkError::BatchConsistency(format!(
                        "Household and Female forms must be edited together; found {} form {} without a {} form",
                        instrument,
                        join_paths(paths),
                        partner
                    )));
                }
            }
        }

        for record in &active {
            if let Some(directive) = record.metadata.directive() {
                directive.check(record.path())?;
            }
        }

        if let (Some(suffix), false) = (&self.config.output.suffix, self.config.output.overwrite) {
            let conflicts: Vec<PathBuf> = active
                .iter()
                .map(|r| r.document.output_path(Some(suffix.as_str())))
                .filter(|p| p.exists())
                .collect();
            if !conflicts.is_empty() {
                return Err(LinkError::OutputConflict(conflicts));
            }
        }

        Ok(())
    }

    fn edit_group(&self, records: &mut [FormRecord], group: &Group) {
        let placeholders = &self.config.normalize.placeholders;
        match *group {
            Group::Pair { household, female } => {
                let mut hh = records[household].document.clone();
                let mut fe = records[female].document.clone();
                let female_id = records[female].form_id.clone();

                match edit_pair(&mut hh, &mut fe, &female_id, placeholders) {
                    Ok(()) => {
                        records[household].document = hh;
                        records[female].document = fe;
                        records[household].advance(FormState::Edited);
                        records[female].advance(FormState::Edited);
                    }
                    Err(e) => {
                        let reason = e.to_string();
                        records[household].fail(&reason);
                        records[female].fail(&reason);
                    }
                }
            }
            Group::Single(idx) => {
                let Some(instrument) = records[idx].instrument else {
                    return;
                };
                let mut doc = records[idx].document.clone();
                match edit_single(&mut doc, instrument, placeholders) {
                    Ok(()) => {
                        records[idx].document = doc;
                        records[idx].advance(FormState::Edited);
                    }
                    Err(e) => records[idx].fail(e),
                }
            }
        }
    }

    fn write_group(&self, records: &mut [FormRecord], group: &Group) {
        let members = group.members();
        if members.iter().any(|&i| records[i].state != FormState::Edited) {
            return;
        }

        let suffix = self.config.output.suffix.as_deref();
        let stamp = self
            .config
            .output
            .stamp_version
            .then(|| format!("<!-- xform-link v{} -->", env!("CARGO_PKG_VERSION")));

        for &idx in &members {
            let record = &mut records[idx];
            if let Some(stamp) = &stamp {
                record.document.stamp(stamp);
            }
            let dest = record.document.output_path(suffix);
            match record.document.write_to(&dest) {
                Ok(()) => {
                    log::info!("Wrote {}", dest.display());
                    record.advance(FormState::Written);
                }
                Err(e) => {
                    let reason = e.to_string();
                    for &other in &members {
                        records[other].rollback();
                        records[other].fail(&reason);
                    }
                    return;
                }
            }
        }
    }

    fn validate_written(&self, records: &[FormRecord]) -> Result<LinkReport> {
        let compiled: Vec<CompiledForm> = records
            .iter()
            .filter(|r| r.state == FormState::Written)
            .map(|r| {
                let path = r.document.destination().unwrap_or(r.path());
                CompiledForm::new(path, &r.form_id, r.document.text()).with_directive(r.directive())
            })
            .collect();
        self.resolver().validate(&compiled)
    }
}

/// Pair the Household and Female forms; every other form stands alone
fn pair_groups(records: &[FormRecord]) -> Vec<Group> {
    let mut by_type: BTreeMap<InstrumentType, usize> = BTreeMap::new();
    for (idx, record) in records.iter().enumerate() {
        if let (true, Some(instrument)) = (record.is_active(), record.instrument) {
            by_type.insert(instrument, idx);
        }
    }

    let mut groups = Vec::new();
    if let (Some(&household), Some(&female)) = (
        by_type.get(&InstrumentType::Household),
        by_type.get(&InstrumentType::Female),
    ) {
        groups.push(Group::Pair { household, female });
    }
    groups.extend(
        by_type
            .iter()
            .filter(|(instrument, _)| !instrument.is_paired())
            .map(|(_, &idx)| Group::Single(idx)),
    );
    groups
}

fn rollback_all(records: &mut [FormRecord], reason: &str) {
    for record in records.iter_mut().filter(|r| r.state == FormState::Written) {
        record.rollback();
        record.fail(reason);
    }
}

fn join_paths(paths: &[&Path]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Add the `<instanceName/>` placeholder at the end of `<meta>`. A
/// placeholder already present is trusted only for types that do not
/// synthesize their own instance name.
fn insert_instance_placeholder(doc: &mut LineDocument, instrument: InstrumentType) -> Result<()> {
    if doc.contains_line(INSTANCE_NAME_TAG) {
        if instrument.synthesizes_instance_name() {
            return Err(LinkError::InstanceNameExists {
                file: doc.path().to_path_buf(),
            });
        }
        return Ok(());
    }
    doc.insert_lines(&[INSTANCE_NAME_TAG], META_CLOSE, Position::Above)
}

/// Relevant locations of a located geography block, which must not be empty
fn require_relevant(doc: &LineDocument) -> Result<Vec<String>> {
    if doc.relevant_locations().is_empty() {
        return Err(LinkError::malformed(doc.path(), "geography block is empty"));
    }
    Ok(doc.relevant_locations().to_vec())
}

/// Require the Female geography, minus its suffix, to match the Household's
pub fn check_pair_geography(household: &LineDocument, female: &LineDocument) -> Result<()> {
    let suffix = InstrumentType::Female.location_suffix();
    let female_names: Vec<&str> = female
        .locations()
        .iter()
        .map(|l| l.strip_suffix(suffix).unwrap_or(l))
        .collect();
    let household_names: Vec<&str> = household.locations().iter().map(String::as_str).collect();

    if household_names != female_names {
        return Err(LinkError::malformed(
            female.path(),
            format!(
                "geography ({}) does not match {} ({})",
                female_names.join(", "),
                household.path().display(),
                household_names.join(", ")
            ),
        ));
    }
    Ok(())
}

/// Edit a Household form and its Female partner
pub fn edit_pair(
    household: &mut LineDocument,
    female: &mut LineDocument,
    female_form_id: &str,
    placeholders: &[String],
) -> Result<()> {
    household.locate_geography(InstrumentType::Household)?;
    female.locate_geography(InstrumentType::Female)?;
    let relevant = require_relevant(household)?;
    check_pair_geography(household, female)?;

    let markers = PeerMarkers::probe(female);
    log::debug!(
        "{}: grouped age {}, region name {}",
        female.path().display(),
        markers.grouped_age,
        markers.region_name
    );

    let locations = household.locations().to_vec();
    edit_household(household, &locations, &relevant, female_form_id, markers, placeholders)?;
    edit_female(female, &relevant, markers, placeholders)
}

fn edit_household(
    doc: &mut LineDocument,
    locations: &[String],
    relevant: &[String],
    female_form_id: &str,
    markers: PeerMarkers,
    placeholders: &[String],
) -> Result<()> {
    insert_instance_placeholder(doc, InstrumentType::Household)?;
    for name in ["firstname", "age"] {
        if !doc.delete_self_closing(name) {
            log::debug!("{}: no {} binding to remove", doc.path().display(), name);
        }
    }
    doc.insert_lines(
        &bindings::household_transfer_tags(locations, markers),
        BACKGROUND_CLOSE,
        Position::Below,
    )?;
    doc.normalize(placeholders);

    doc.insert_above_first_bind(&bindings::household_block(markers))?;
    doc.insert_lines(
        &[bindings::household_form_name(relevant, female_form_id)],
        bindings::ANCHOR_FORM_NAME,
        Position::Below,
    )?;
    if !doc.has_binding("instanceName") {
        doc.insert_lines(
            &[bindings::household_instance_name(relevant)],
            bindings::ANCHOR_INSTANCE_NAME,
            Position::Below,
        )?;
    }

    let mut transfers = bindings::household_location_transfers(locations);
    if markers.region_name {
        if let Some(top) = locations.first() {
            transfers.push(bindings::household_region_transfer(top));
        }
    }
    doc.insert_lines(&transfers, bindings::ANCHOR_LOCATION_TRANSFER, Position::Below)
}

fn edit_female(
    doc: &mut LineDocument,
    relevant: &[String],
    markers: PeerMarkers,
    placeholders: &[String],
) -> Result<()> {
    insert_instance_placeholder(doc, InstrumentType::Female)?;
    doc.insert_lines(&bindings::female_extra_tags(), META_CLOSE, Position::Below)?;
    doc.normalize(placeholders);

    doc.delete_self_closing("san_facility");
    if markers.region_name {
        doc.delete_self_closing("region_name");
    }

    doc.insert_above_first_bind(&bindings::female_block(markers))?;
    doc.insert_lines(
        &[bindings::female_instance_name(relevant, markers)],
        bindings::ANCHOR_INSTANCE_NAME,
        Position::Below,
    )
}

/// Edit a form that is not part of the Household/Female pair
pub fn edit_single(
    doc: &mut LineDocument,
    instrument: InstrumentType,
    placeholders: &[String],
) -> Result<()> {
    if instrument.is_paired() {
        return Err(LinkError::BatchConsistency(format!(
            "Household and Female forms must be edited together; {} was given alone",
            doc.path().display()
        )));
    }

    if !instrument.synthesizes_instance_name() {
        doc.normalize(placeholders);
        return Ok(());
    }

    doc.locate_geography(instrument)?;
    let relevant = require_relevant(doc)?;
    let first = relevant[0].clone();

    insert_instance_placeholder(doc, instrument)?;
    doc.insert_above_first_bind(&bindings::instance_name_block())?;

    let bind = match instrument {
        InstrumentType::Facility => bindings::facility_instance_name(&first),
        InstrumentType::Listing => bindings::listing_instance_name(&first),
        _ => bindings::reinterview_instance_name(&relevant),
    };
    doc.insert_lines(&[bind], bindings::ANCHOR_INSTANCE_NAME, Position::Below)?;
    doc.normalize(placeholders);
    Ok(())
}
