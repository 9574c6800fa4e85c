//! Turning pair counts into a temporal score.
//!
//! Every ratio is smoothed with a pseudocount `p`, so a score exists for any counts as long as
//! `p > 0`. Scores above 1 (for [`ScoreMethod::Ratio`]) or above 0 (for [`ScoreMethod::LogOdds`])
//! mean the drug tends to come before the condition more than the drug and condition come before
//! anything else.
use crate::counting::PairCounts;
use serde::{Deserialize, Serialize};

/// Something that can score a pair.
pub trait ScoreFunction {
    fn score(&self, counts: &PairCounts, pseudocount: f64) -> f64;
}

impl<F> ScoreFunction for F
where
    F: Fn(&PairCounts, f64) -> f64,
{
    fn score(&self, counts: &PairCounts, pseudocount: f64) -> f64 {
        self(counts, pseudocount)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMethod {
    /// The fraction of co-occurrences where the drug comes first, divided by the same fraction
    /// for the drug against any condition times the fraction for any drug against the condition.
    #[default]
    Ratio,
    /// Log odds of drug-first over condition-first, less the mean log odds of the two background
    /// orderings.
    LogOdds,
}

impl ScoreFunction for ScoreMethod {
    fn score(&self, counts: &PairCounts, pseudocount: f64) -> f64 {
        match self {
            ScoreMethod::Ratio => score(counts, pseudocount),
            ScoreMethod::LogOdds => log_odds(counts, pseudocount),
        }
    }
}

/// The default temporal score.
///
/// ```text
///            (d_bef_c + p) / (d_c + 2p)
/// ---------------------------------------------------------------
/// (d_bef_anyc + p) / (d_anyc + 2p) * (anyd_bef_c + p) / (anyd_c + 2p)
/// ```
pub fn score(counts: &PairCounts, pseudocount: f64) -> f64 {
    let p = pseudocount;
    let frac = |before: u64, all: u64| (before as f64 + p) / (all as f64 + 2. * p);
    let pair = frac(counts.ct_d_bef_c, counts.ct_d_c);
    let drug = frac(counts.ct_d_bef_anyc, counts.ct_d_anyc);
    let cond = frac(counts.ct_anyd_bef_c, counts.ct_anyd_c);
    pair / (drug * cond)
}

fn log_odds(counts: &PairCounts, pseudocount: f64) -> f64 {
    let p = pseudocount;
    let odds = |before: u64, other: u64| ((before as f64 + p) / (other as f64 + p)).ln();
    let pair = odds(counts.ct_d_bef_c, counts.ct_c_bef_d);
    let drug = odds(
        counts.ct_d_bef_anyc,
        counts.ct_d_anyc.saturating_sub(counts.ct_d_bef_anyc),
    );
    let cond = odds(
        counts.ct_anyd_bef_c,
        counts.ct_anyd_c.saturating_sub(counts.ct_anyd_bef_c),
    );
    pair - 0.5 * (drug + cond)
}
