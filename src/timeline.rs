//! Reference days of each concept, indexed by person.
//!
//! Counting only ever compares the reference dates of eras belonging to the same person, so we
//! index eras by concept and then by person up front. This means a pair of concepts only looks at
//! the people who have both, rather than crossing every era with every other era.
use crate::{era::Era, ConceptId, PersonId};
use chrono::{Datelike, NaiveDate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{hash_map, BTreeMap, HashMap};

/// A date as a count of days, so that gaps are plain integer subtraction.
pub type Day = i64;

pub fn day(date: NaiveDate) -> Day {
    Day::from(date.num_days_from_ce())
}

/// Which eras provide reference dates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EraReference {
    /// The start of every era. A person qualifies if any of their drug eras and any of their
    /// condition eras are in the right order.
    #[default]
    AllEras,
    /// Only the start of the earliest era of each concept for each person.
    FirstOccurrence,
}

/// Sorted, de-duplicated reference days by person.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    days: HashMap<PersonId, Vec<Day>>,
}

impl Timeline {
    /// The days for `person`, or `None` if they aren't on this timeline.
    pub fn days(&self, person: PersonId) -> Option<&[Day]> {
        self.days.get(&person).map(Vec::as_slice)
    }

    pub fn contains(&self, person: PersonId) -> bool {
        self.days.contains_key(&person)
    }

    /// Number of distinct people on this timeline.
    pub fn person_count(&self) -> usize {
        self.days.len()
    }

    pub fn par_persons(&self) -> impl ParallelIterator<Item = PersonId> + '_ {
        self.days.par_iter().map(|(person, _)| *person)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PersonId, &[Day])> + '_ {
        self.days.iter().map(|(person, days)| (*person, days.as_slice()))
    }

    /// Union of two timelines.
    pub fn merge(mut self, other: Timeline) -> Timeline {
        if self.days.len() < other.days.len() {
            return other.merge(self);
        }
        for (person, days) in other.days {
            match self.days.entry(person) {
                hash_map::Entry::Vacant(entry) => {
                    entry.insert(days);
                }
                hash_map::Entry::Occupied(mut entry) => {
                    let merged = entry.get_mut();
                    merged.extend(days);
                    merged.sort_unstable();
                    merged.dedup();
                }
            }
        }
        self
    }

    fn push(&mut self, person: PersonId, day: Day) {
        self.days.entry(person).or_insert_with(Vec::new).push(day);
    }

    /// Keep only the earliest day, or insert if missing.
    fn push_earliest(&mut self, person: PersonId, day: Day) {
        let days = self.days.entry(person).or_insert_with(|| vec![day]);
        if days[0] > day {
            days[0] = day;
        }
    }

    fn normalize(&mut self) {
        for days in self.days.values_mut() {
            days.sort_unstable();
            days.dedup();
        }
    }
}

/// One timeline per concept.
#[derive(Debug, Clone, Default)]
pub struct Timelines {
    concepts: BTreeMap<ConceptId, Timeline>,
}

impl Timelines {
    /// Index eras by concept, then person.
    ///
    /// The result does not depend on the order of the eras.
    pub fn from_eras<'a>(eras: impl IntoIterator<Item = &'a Era>, reference: EraReference) -> Self {
        let mut concepts: BTreeMap<ConceptId, Timeline> = BTreeMap::new();
        for era in eras {
            let timeline = concepts.entry(era.concept_id).or_default();
            let day = day(era.reference_date());
            match reference {
                EraReference::AllEras => timeline.push(era.person_id, day),
                EraReference::FirstOccurrence => timeline.push_earliest(era.person_id, day),
            }
        }
        for timeline in concepts.values_mut() {
            timeline.normalize();
        }
        Timelines { concepts }
    }

    /// The timeline of a concept, if it has any eras.
    pub fn get(&self, concept: ConceptId) -> Option<&Timeline> {
        self.concepts.get(&concept)
    }

    /// Merge the timelines of all concepts into one ("any drug" / "any condition").
    pub fn union(&self) -> Timeline {
        self.par_iter()
            .map(|(_, timeline)| timeline.clone())
            .reduce(Timeline::default, Timeline::merge)
    }
}

impl<'a> IntoParallelIterator for &'a Timelines {
    type Item = (&'a ConceptId, &'a Timeline);
    type Iter = rayon::collections::btree_map::Iter<'a, ConceptId, Timeline>;
    fn into_par_iter(self) -> Self::Iter {
        (&self.concepts).into_par_iter()
    }
}
