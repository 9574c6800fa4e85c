//! Drug and condition eras.
//!
//! An era is one continuous period that a person was exposed to a drug, or had a condition
//! diagnosed. Eras for the same person and concept are assumed not to overlap; we don't check
//! this.
use crate::{
    util::{describe_era, optional_date, optional_id},
    ConceptId, PersonId,
};
use chrono::NaiveDate;
use itertools::Itertools;
use qu::ick_use::*;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, ops::Deref, sync::Arc};

/// A row in an era table, before validation.
///
/// Column names can be the generic `concept_id`, `start_date`, `end_date`, or those of the OMOP
/// `drug_era` and `condition_era` tables. Other columns are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EraRaw {
    #[serde(default, deserialize_with = "optional_id")]
    pub person_id: Option<PersonId>,
    #[serde(
        default,
        alias = "drug_concept_id",
        alias = "condition_concept_id",
        deserialize_with = "optional_id"
    )]
    pub concept_id: Option<ConceptId>,
    #[serde(
        default,
        alias = "drug_era_start_date",
        alias = "condition_era_start_date",
        deserialize_with = "optional_date"
    )]
    pub start_date: Option<NaiveDate>,
    #[serde(
        default,
        alias = "drug_era_end_date",
        alias = "condition_era_end_date",
        deserialize_with = "optional_date"
    )]
    pub end_date: Option<NaiveDate>,
}

/// Header names accepted for the person column.
pub const PERSON_COLUMNS: [&str; 1] = ["person_id"];
/// Header names accepted for the concept column.
pub const CONCEPT_COLUMNS: [&str; 3] = ["concept_id", "drug_concept_id", "condition_concept_id"];
/// Header names accepted for the start date column.
pub const START_COLUMNS: [&str; 3] = ["start_date", "drug_era_start_date", "condition_era_start_date"];

/// A validated era.
///
/// `end_date` is `None` when the era is ongoing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Era {
    pub person_id: PersonId,
    pub concept_id: ConceptId,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl Era {
    pub fn new(
        person_id: PersonId,
        concept_id: ConceptId,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    ) -> Result<Self> {
        if let Some(end_date) = end_date {
            ensure!(
                start_date <= end_date,
                "era starts ({}) after it ends ({})",
                start_date,
                end_date
            );
        }
        Ok(Era {
            person_id,
            concept_id,
            start_date,
            end_date,
        })
    }

    /// The date used when comparing this era with others.
    pub fn reference_date(&self) -> NaiveDate {
        self.start_date
    }
}

impl TryFrom<EraRaw> for Era {
    type Error = Error;

    fn try_from(raw: EraRaw) -> Result<Self, Self::Error> {
        let label = describe_era(raw.person_id, raw.concept_id);
        let person_id = raw
            .person_id
            .with_context(|| format!("{}: missing person ID", label))?;
        let concept_id = raw
            .concept_id
            .with_context(|| format!("{}: missing concept ID", label))?;
        let start_date = raw
            .start_date
            .with_context(|| format!("{}: missing start date", label))?;
        Era::new(person_id, concept_id, start_date, raw.end_date)
            .with_context(|| format!("{}: invalid era", label))
    }
}

/// A record that was dropped while loading, and why.
#[derive(Debug)]
pub struct SkippedRecord {
    /// 1-based record number, not counting the header.
    pub record: u64,
    pub reason: Error,
}

impl fmt::Display for SkippedRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "record {}: {:#}", self.record, self.reason)
    }
}

/// A list of eras, ordered by person, then start date, then concept.
#[derive(Debug, Clone, Default)]
pub struct EraSet {
    els: Arc<Vec<Era>>,
}

impl EraSet {
    pub fn new(mut els: Vec<Era>) -> Self {
        els.sort_by_key(|era| (era.person_id, era.start_date, era.concept_id, era.end_date));
        EraSet { els: Arc::new(els) }
    }

    /// Number of distinct people with at least one era.
    pub fn person_count(&self) -> usize {
        self.els.iter().map(|era| era.person_id).dedup().count()
    }

    /// Get an `EraSet` containing only eras that match the filter.
    pub fn filter(&self, f: impl Fn(&Era) -> bool) -> Self {
        Self::new(self.els.iter().filter(|era| f(*era)).copied().collect())
    }

    /// Get an `EraSet` containing only eras of the given concepts.
    pub fn filter_by_concepts(&self, concept_ids: &BTreeSet<ConceptId>) -> Self {
        self.filter(|era| concept_ids.contains(&era.concept_id))
    }
}

impl Deref for EraSet {
    type Target = [Era];
    fn deref(&self) -> &Self::Target {
        &*self.els
    }
}

impl<'a> IntoIterator for &'a EraSet {
    type IntoIter = <&'a [Era] as IntoIterator>::IntoIter;
    type Item = &'a Era;
    fn into_iter(self) -> Self::IntoIter {
        self.els.iter()
    }
}

impl FromIterator<Era> for EraSet {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = Era>,
    {
        Self::new(iter.into_iter().collect())
    }
}
