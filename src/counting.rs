//! The twelve counts for a drug/condition pair.
//!
//! Every count is a count of distinct people. Timelines are keyed by person, so each person is
//! visited once per count and can add at most 1 to it, however many eras they have.
//!
//! Counts that involve only one side of a pair (`ct_d`, `ct_d_bef_anyc`, `ct_d_anyc` for drugs,
//! `ct_c`, `ct_anyd_bef_c`, `ct_anyd_c` for conditions) and the population size `ct_ppl` are the
//! same for every pair sharing that drug or condition. They are computed once, up front, as
//! [`BackgroundAggregates`], and looked up when counting each pair.
use crate::{
    timeline::{Day, Timeline, Timelines},
    window::WindowPolicy,
    ConceptId,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counts of people for one drug/condition pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairCounts {
    pub drug: ConceptId,
    pub cond: ConceptId,
    /// People having the drug before the condition.
    pub ct_d_bef_c: u64,
    /// People having the condition before the drug.
    pub ct_c_bef_d: u64,
    /// People having the drug and the condition, in any order.
    pub ct_d_c: u64,
    /// People having the drug before any requested condition.
    pub ct_d_bef_anyc: u64,
    /// People having the drug and any requested condition.
    pub ct_d_anyc: u64,
    /// People having any requested drug before the condition.
    pub ct_anyd_bef_c: u64,
    /// People having any requested drug and the condition.
    pub ct_anyd_c: u64,
    /// People having the drug.
    pub ct_d: u64,
    /// People having the condition.
    pub ct_c: u64,
    /// People having any requested drug or condition.
    pub ct_ppl: u64,
}

/// Counts between two timelines, taken over the people on both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct JointCounts {
    before: u64,
    after: u64,
    both: u64,
}

impl JointCounts {
    fn count(drug: &Timeline, cond: &Timeline, policy: &WindowPolicy) -> Self {
        let mut counts = JointCounts::default();
        let mut tally = |drug_days: &[Day], cond_days: &[Day]| {
            counts.both += 1;
            if policy.any_drug_before_condition(drug_days, cond_days) {
                counts.before += 1;
            }
            if policy.any_condition_before_drug(drug_days, cond_days) {
                counts.after += 1;
            }
        };
        // walk the smaller side, look up the larger
        if drug.person_count() <= cond.person_count() {
            for (person, drug_days) in drug.iter() {
                if let Some(cond_days) = cond.days(person) {
                    tally(drug_days, cond_days);
                }
            }
        } else {
            for (person, cond_days) in cond.iter() {
                if let Some(drug_days) = drug.days(person) {
                    tally(drug_days, cond_days);
                }
            }
        }
        counts
    }
}

/// Counts that depend only on the drug.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrugBackground {
    pub ct_d: u64,
    pub ct_d_bef_anyc: u64,
    pub ct_d_anyc: u64,
}

impl DrugBackground {
    pub fn count(drug: &Timeline, any_cond: &Timeline, policy: &WindowPolicy) -> Self {
        let joint = JointCounts::count(drug, any_cond, policy);
        DrugBackground {
            ct_d: drug.person_count() as u64,
            ct_d_bef_anyc: joint.before,
            ct_d_anyc: joint.both,
        }
    }
}

/// Counts that depend only on the condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionBackground {
    pub ct_c: u64,
    pub ct_anyd_bef_c: u64,
    pub ct_anyd_c: u64,
}

impl ConditionBackground {
    pub fn count(cond: &Timeline, any_drug: &Timeline, policy: &WindowPolicy) -> Self {
        let joint = JointCounts::count(any_drug, cond, policy);
        ConditionBackground {
            ct_c: cond.person_count() as u64,
            ct_anyd_bef_c: joint.before,
            ct_anyd_c: joint.both,
        }
    }
}

/// Everything about a run that doesn't depend on a particular pair.
///
/// Built once, then shared read-only between all pair counts.
#[derive(Debug, Clone, Default)]
pub struct BackgroundAggregates {
    drugs: BTreeMap<ConceptId, DrugBackground>,
    conds: BTreeMap<ConceptId, ConditionBackground>,
    ct_ppl: u64,
}

impl BackgroundAggregates {
    /// `drugs` and `conds` should hold the timelines of exactly the requested concepts; they
    /// define what "any drug" and "any condition" mean.
    pub fn build(drugs: &Timelines, conds: &Timelines, policy: &WindowPolicy) -> Self {
        let (any_drug, any_cond) = rayon::join(|| drugs.union(), || conds.union());
        let ct_ppl = population(&any_drug, &any_cond);
        let (drug_counts, cond_counts) = rayon::join(
            || {
                drugs
                    .par_iter()
                    .map(|(id, timeline)| (*id, DrugBackground::count(timeline, &any_cond, policy)))
                    .collect::<BTreeMap<_, _>>()
            },
            || {
                conds
                    .par_iter()
                    .map(|(id, timeline)| {
                        (*id, ConditionBackground::count(timeline, &any_drug, policy))
                    })
                    .collect::<BTreeMap<_, _>>()
            },
        );
        BackgroundAggregates {
            drugs: drug_counts,
            conds: cond_counts,
            ct_ppl,
        }
    }

    /// Background counts for a drug, all zero if it has no eras.
    pub fn drug(&self, drug: ConceptId) -> DrugBackground {
        self.drugs.get(&drug).copied().unwrap_or_default()
    }

    /// Background counts for a condition, all zero if it has no eras.
    pub fn condition(&self, cond: ConceptId) -> ConditionBackground {
        self.conds.get(&cond).copied().unwrap_or_default()
    }

    pub fn ct_ppl(&self) -> u64 {
        self.ct_ppl
    }
}

/// Number of distinct people on either timeline.
fn population(any_drug: &Timeline, any_cond: &Timeline) -> u64 {
    any_drug
        .par_persons()
        .filter(|person| !any_cond.contains(*person))
        .count() as u64
        + any_cond.person_count() as u64
}

/// Count one drug/condition pair.
///
/// A drug or condition without eras is not an error: counts that need it are 0.
pub fn count_pair(
    drug: ConceptId,
    cond: ConceptId,
    drugs: &Timelines,
    conds: &Timelines,
    background: &BackgroundAggregates,
    policy: &WindowPolicy,
) -> PairCounts {
    let joint = match (drugs.get(drug), conds.get(cond)) {
        (Some(drug_timeline), Some(cond_timeline)) => {
            JointCounts::count(drug_timeline, cond_timeline, policy)
        }
        _ => JointCounts::default(),
    };
    let drug_bg = background.drug(drug);
    let cond_bg = background.condition(cond);
    PairCounts {
        drug,
        cond,
        ct_d_bef_c: joint.before,
        ct_c_bef_d: joint.after,
        ct_d_c: joint.both,
        ct_d_bef_anyc: drug_bg.ct_d_bef_anyc,
        ct_d_anyc: drug_bg.ct_d_anyc,
        ct_anyd_bef_c: cond_bg.ct_anyd_bef_c,
        ct_anyd_c: cond_bg.ct_anyd_c,
        ct_d: drug_bg.ct_d,
        ct_c: cond_bg.ct_c,
        ct_ppl: background.ct_ppl(),
    }
}

#[cfg(test)]
mod test {
    use super::{count_pair, BackgroundAggregates, PairCounts};
    use crate::{
        era::Era,
        score::score,
        timeline::{EraReference, Timelines},
        window::WindowPolicy,
    };
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    const DRUG: u64 = 1;
    const COND: u64 = 10;

    fn era(person: u64, concept: u64, start: i64, end: i64) -> Era {
        let base = NaiveDate::from_ymd_opt(2002, 2, 20).unwrap();
        Era::new(
            person,
            concept,
            base + chrono::Duration::days(start),
            Some(base + chrono::Duration::days(end)),
        )
        .unwrap()
    }

    /// Split eras into drugs (concepts < 10) and conditions, and count every pair.
    fn count_all(eras: &[Era], reference: EraReference, policy: &WindowPolicy) -> Vec<PairCounts> {
        let drugs = Timelines::from_eras(eras.iter().filter(|e| e.concept_id < 10), reference);
        let conds = Timelines::from_eras(eras.iter().filter(|e| e.concept_id >= 10), reference);
        let background = BackgroundAggregates::build(&drugs, &conds, policy);
        let mut out = vec![];
        for drug in [1, 2] {
            for cond in [10, 11] {
                out.push(count_pair(drug, cond, &drugs, &conds, &background, policy));
            }
        }
        out
    }

    fn count_one(eras: &[Era], policy: &WindowPolicy) -> PairCounts {
        count_all(eras, EraReference::AllEras, policy)[0]
    }

    #[test]
    fn drug_then_condition() {
        let eras = [era(1, DRUG, 0, 5), era(1, COND, 10, 15)];
        let counts = count_one(&eras, &WindowPolicy::default());
        assert_eq!(counts.drug, DRUG);
        assert_eq!(counts.cond, COND);
        assert_eq!(counts.ct_d_bef_c, 1);
        assert_eq!(counts.ct_c_bef_d, 0);
        assert_eq!(counts.ct_d_c, 1);
        assert_eq!(counts.ct_d, 1);
        assert_eq!(counts.ct_c, 1);
        assert_eq!(counts.ct_ppl, 1);
    }

    #[test]
    fn gap_outside_window() {
        let eras = [era(1, DRUG, 0, 5), era(1, COND, 10, 15)];
        let counts = count_one(&eras, &WindowPolicy::new(0, 0, 3).unwrap());
        assert_eq!(counts.ct_d_bef_c, 0);
        assert_eq!(counts.ct_c_bef_d, 0);
        // co-occurrence ignores the window
        assert_eq!(counts.ct_d_c, 1);
    }

    #[test]
    fn drug_without_eras() {
        let eras = [era(1, 2, 0, 5), era(1, COND, 10, 15)];
        let counts = count_one(&eras, &WindowPolicy::default());
        assert_eq!(counts.ct_d_bef_c, 0);
        assert_eq!(counts.ct_c_bef_d, 0);
        assert_eq!(counts.ct_d_c, 0);
        assert_eq!(counts.ct_d_bef_anyc, 0);
        assert_eq!(counts.ct_d_anyc, 0);
        assert_eq!(counts.ct_d, 0);
        // the condition's background still comes from the other drug
        assert_eq!(counts.ct_anyd_bef_c, 1);
        assert_eq!(counts.ct_c, 1);
        assert_eq!(counts.ct_ppl, 1);
        assert!(score(&counts, 1.).is_finite());
    }

    #[test]
    fn nothing_at_all() {
        let counts = count_one(&[], &WindowPolicy::default());
        assert_eq!(
            counts,
            PairCounts {
                drug: DRUG,
                cond: COND,
                ..PairCounts::default()
            }
        );
        assert!(score(&counts, 1.).is_finite());
    }

    #[test]
    fn both_orders() {
        let eras = [
            era(1, DRUG, 0, 5),
            era(1, COND, 10, 15),
            era(2, COND, 0, 5),
            era(2, DRUG, 10, 15),
        ];
        let counts = count_one(&eras, &WindowPolicy::default());
        assert_eq!(counts.ct_d_bef_c, 1);
        assert_eq!(counts.ct_c_bef_d, 1);
        assert_eq!(counts.ct_d_c, 2);
        assert_eq!(counts.ct_ppl, 2);
    }

    #[test]
    fn people_not_eras() {
        // three drug eras before two condition eras, all for one person
        let eras = [
            era(1, DRUG, 0, 1),
            era(1, DRUG, 2, 3),
            era(1, DRUG, 4, 5),
            era(1, COND, 10, 11),
            era(1, COND, 20, 21),
        ];
        let counts = count_one(&eras, &WindowPolicy::default());
        assert_eq!(counts.ct_d_bef_c, 1);
        assert_eq!(counts.ct_d_c, 1);
        assert_eq!(counts.ct_d, 1);
    }

    #[test]
    fn all_eras_vs_first_occurrence() {
        // the condition is first recorded before the drug, then again after it
        let eras = [era(1, COND, 0, 1), era(1, DRUG, 5, 6), era(1, COND, 10, 11)];
        let policy = WindowPolicy::default();
        let all = count_all(&eras, EraReference::AllEras, &policy)[0];
        assert_eq!((all.ct_d_bef_c, all.ct_c_bef_d), (1, 1));
        let first = count_all(&eras, EraReference::FirstOccurrence, &policy)[0];
        assert_eq!((first.ct_d_bef_c, first.ct_c_bef_d), (0, 1));
    }

    #[test]
    fn background_population() {
        let eras = [
            era(1, DRUG, 0, 5),
            era(2, 11, 0, 5),
            era(3, 2, 0, 5),
            era(3, COND, 3, 5),
        ];
        let counts = count_one(&eras, &WindowPolicy::default());
        assert_eq!(counts.ct_ppl, 3);
        assert_eq!(counts.ct_d_anyc, 0);
        assert_eq!(counts.ct_anyd_c, 1);
        assert_eq!(counts.ct_anyd_bef_c, 1);
    }

    /// Cross every drug era with every condition era of the same person.
    fn naive(eras: &[Era], drug: u64, cond: u64, policy: &WindowPolicy) -> (u64, u64, u64) {
        let persons: BTreeSet<u64> = eras.iter().map(|e| e.person_id).collect();
        let (mut before, mut after, mut both) = (0, 0, 0);
        for person in persons {
            let d: Vec<_> = eras
                .iter()
                .filter(|e| e.person_id == person && e.concept_id == drug)
                .collect();
            let c: Vec<_> = eras
                .iter()
                .filter(|e| e.person_id == person && e.concept_id == cond)
                .collect();
            if d.is_empty() || c.is_empty() {
                continue;
            }
            both += 1;
            let pairs = || d.iter().flat_map(|d| c.iter().map(move |c| (d, c)));
            if pairs().any(|(d, c)| policy.drug_before_condition(d.start_date, c.start_date)) {
                before += 1;
            }
            if pairs().any(|(d, c)| policy.condition_before_drug(d.start_date, c.start_date)) {
                after += 1;
            }
        }
        (before, after, both)
    }

    fn arb_eras() -> impl Strategy<Value = Vec<Era>> {
        prop::collection::vec(
            (
                0u64..6,
                prop::sample::select(vec![1u64, 2, 10, 11]),
                0i64..60,
                0i64..10,
            )
                .prop_map(|(person, concept, start, len)| era(person, concept, start, start + len)),
            0..40,
        )
    }

    fn arb_policy() -> impl Strategy<Value = WindowPolicy> {
        (-5i64..5, -30i64..30, 0i64..40).prop_map(|(offset, start, len)| {
            WindowPolicy::new(offset, start, start + len).unwrap()
        })
    }

    proptest! {
        #[test]
        fn counts_are_bounded(eras in arb_eras(), policy in arb_policy()) {
            for reference in [EraReference::AllEras, EraReference::FirstOccurrence] {
                for c in count_all(&eras, reference, &policy) {
                    prop_assert!(c.ct_d_bef_c <= c.ct_d);
                    prop_assert!(c.ct_d_bef_c <= c.ct_c);
                    prop_assert!(c.ct_d_c >= c.ct_d_bef_c.max(c.ct_c_bef_d));
                    prop_assert!(c.ct_d_c <= c.ct_d.min(c.ct_c));
                    prop_assert!(c.ct_d_bef_c <= c.ct_d_bef_anyc);
                    prop_assert!(c.ct_d_bef_anyc <= c.ct_d_anyc);
                    prop_assert!(c.ct_d_anyc <= c.ct_d);
                    prop_assert!(c.ct_d_bef_c <= c.ct_anyd_bef_c);
                    prop_assert!(c.ct_anyd_bef_c <= c.ct_anyd_c);
                    prop_assert!(c.ct_anyd_c <= c.ct_c);
                    prop_assert!(c.ct_d.max(c.ct_c) <= c.ct_ppl);
                }
            }
        }

        #[test]
        fn order_does_not_matter(
            (eras, shuffled) in arb_eras().prop_flat_map(|eras| (Just(eras.clone()), Just(eras).prop_shuffle())),
            policy in arb_policy(),
        ) {
            for reference in [EraReference::AllEras, EraReference::FirstOccurrence] {
                prop_assert_eq!(
                    count_all(&eras, reference, &policy),
                    count_all(&shuffled, reference, &policy)
                );
            }
        }

        #[test]
        fn matches_cross_join(eras in arb_eras(), policy in arb_policy()) {
            for c in count_all(&eras, EraReference::AllEras, &policy) {
                let (before, after, both) = naive(&eras, c.drug, c.cond, &policy);
                prop_assert_eq!((c.ct_d_bef_c, c.ct_c_bef_d, c.ct_d_c), (before, after, both));
            }
        }
    }
}
