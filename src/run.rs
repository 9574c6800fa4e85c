//! Driving a whole run: fetch eras, count every pair, score.
use crate::{
    config::Config,
    counting::{count_pair, BackgroundAggregates},
    report::ReportRow,
    repo::EraRepository,
    score::{ScoreFunction, ScoreMethod},
    timeline::{EraReference, Timelines},
    window::WindowPolicy,
    ConceptId,
};
use itertools::iproduct;
use qu::ick_use::*;
use rayon::prelude::*;
use std::{
    collections::BTreeSet,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// Shared flag to stop a run early.
///
/// Clones share the flag, so one can be handed to a signal handler or another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn check(&self) -> Result {
        if self.is_cancelled() {
            return Err(Cancelled.into());
        }
        Ok(())
    }
}

/// The error returned when a run is stopped by its [`CancelToken`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("run cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// Everything needed to turn eras into report rows. Fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Engine {
    policy: WindowPolicy,
    reference: EraReference,
    pseudocount: f64,
    method: ScoreMethod,
}

impl Engine {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Engine {
            policy: config.window_policy()?,
            reference: config.era_reference,
            pseudocount: config.pseudocount,
            method: config.score_method,
        })
    }

    /// Count and score every (drug, condition) pair.
    ///
    /// Duplicate IDs are ignored. Rows come back sorted by drug, then condition. If the run is
    /// cancelled no rows are returned, and the error downcasts to [`Cancelled`].
    pub fn run(
        &self,
        drug_repo: &impl EraRepository,
        cond_repo: &impl EraRepository,
        drug_ids: &[ConceptId],
        cond_ids: &[ConceptId],
        cancel: &CancelToken,
    ) -> Result<Vec<ReportRow>> {
        let drug_ids: BTreeSet<ConceptId> = drug_ids.iter().copied().collect();
        let cond_ids: BTreeSet<ConceptId> = cond_ids.iter().copied().collect();

        cancel.check()?;
        let drug_eras = drug_repo.fetch_eras(&drug_ids).context("fetching drug eras")?;
        cancel.check()?;
        let cond_eras = cond_repo
            .fetch_eras(&cond_ids)
            .context("fetching condition eras")?;
        event!(
            Level::INFO,
            "{} drug eras for {} people, {} condition eras for {} people",
            drug_eras.len(),
            drug_eras.person_count(),
            cond_eras.len(),
            cond_eras.person_count()
        );

        let (drugs, conds) = rayon::join(
            || Timelines::from_eras(&drug_eras, self.reference),
            || Timelines::from_eras(&cond_eras, self.reference),
        );
        self.score_timelines(&drugs, &conds, &drug_ids, &cond_ids, cancel)
    }

    /// Count and score every pair from already indexed timelines.
    ///
    /// `drugs` and `conds` should not hold any concepts beyond those requested.
    pub fn score_timelines(
        &self,
        drugs: &Timelines,
        conds: &Timelines,
        drug_ids: &BTreeSet<ConceptId>,
        cond_ids: &BTreeSet<ConceptId>,
        cancel: &CancelToken,
    ) -> Result<Vec<ReportRow>> {
        cancel.check()?;
        let background = BackgroundAggregates::build(drugs, conds, &self.policy);
        event!(
            Level::INFO,
            "{} people in population, counting {} pairs",
            background.ct_ppl(),
            drug_ids.len() * cond_ids.len()
        );

        let pairs: Vec<(ConceptId, ConceptId)> = iproduct!(drug_ids, cond_ids)
            .map(|(drug, cond)| (*drug, *cond))
            .collect();
        let rows = pairs
            .par_iter()
            .map(|&(drug, cond)| -> Result<ReportRow> {
                cancel.check()?;
                let counts = count_pair(drug, cond, drugs, conds, &background, &self.policy);
                let score = self.method.score(&counts, self.pseudocount);
                Ok(ReportRow::new(&counts, score))
            })
            .collect::<Result<Vec<_>>>()?;
        event!(Level::INFO, "scored {} pairs", rows.len());
        Ok(rows)
    }
}
