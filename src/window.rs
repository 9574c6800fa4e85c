//! When does one event count as "before" another?
//!
//! The drug's reference date is first shifted by `offset_days` (to model a lag in recording the
//! drug). The gap is then `condition - shifted drug`, in days. A pair of dates qualifies as
//!
//!  - *drug before condition* when the gap is positive and lies in
//!    `[window_start_days, window_end_days]`;
//!  - *condition before drug* when the gap is zero or negative and the mirrored gap (the drug
//!    measured from the condition) lies in the same window.
//!
//! All bounds are inclusive. A same-day pair counts as the condition coming first.
use crate::timeline::{day, Day};
use chrono::NaiveDate;
use qu::ick_use::*;

/// Built only through [`WindowPolicy::new`], so the window is never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    offset_days: i64,
    window_start_days: i64,
    window_end_days: i64,
}

/// An inclusive range of allowed gaps.
type Gaps = (i64, i64);

impl WindowPolicy {
    pub fn new(offset_days: i64, window_start_days: i64, window_end_days: i64) -> Result<Self> {
        ensure!(
            window_start_days <= window_end_days,
            "window start ({}) is after window end ({})",
            window_start_days,
            window_end_days
        );
        Ok(WindowPolicy {
            offset_days,
            window_start_days,
            window_end_days,
        })
    }

    pub fn offset_days(&self) -> i64 {
        self.offset_days
    }

    pub fn window_start_days(&self) -> i64 {
        self.window_start_days
    }

    pub fn window_end_days(&self) -> i64 {
        self.window_end_days
    }

    /// Signed days from the shifted drug date to the condition date.
    pub fn gap(&self, drug: Day, cond: Day) -> i64 {
        cond.saturating_sub(drug.saturating_add(self.offset_days))
    }

    pub fn drug_before_condition(&self, drug: NaiveDate, cond: NaiveDate) -> bool {
        in_range(self.gap(day(drug), day(cond)), self.before_gaps())
    }

    pub fn condition_before_drug(&self, drug: NaiveDate, cond: NaiveDate) -> bool {
        in_range(self.gap(day(drug), day(cond)), self.after_gaps())
    }

    /// Whether any drug day comes before any condition day.
    ///
    /// Both slices must be sorted ascending.
    pub fn any_drug_before_condition(&self, drug: &[Day], cond: &[Day]) -> bool {
        self.any_pair_within(drug, cond, self.before_gaps())
    }

    /// Whether any condition day comes before any drug day.
    ///
    /// Both slices must be sorted ascending.
    pub fn any_condition_before_drug(&self, drug: &[Day], cond: &[Day]) -> bool {
        self.any_pair_within(drug, cond, self.after_gaps())
    }

    /// Gaps qualifying as drug before condition, or `None` if the window excludes them all.
    fn before_gaps(&self) -> Option<Gaps> {
        let lo = self.window_start_days.max(1);
        let hi = self.window_end_days;
        (lo <= hi).then(|| (lo, hi))
    }

    /// Gaps qualifying as condition before drug: `start <= -gap <= end` and `gap <= 0`.
    fn after_gaps(&self) -> Option<Gaps> {
        let lo = self.window_end_days.saturating_neg();
        let hi = self.window_start_days.saturating_neg().min(0);
        (lo <= hi).then(|| (lo, hi))
    }

    /// For each drug day, binary search the condition days for one whose gap is in range.
    fn any_pair_within(&self, drug: &[Day], cond: &[Day], gaps: Option<Gaps>) -> bool {
        let Some((lo, hi)) = gaps else {
            return false
        };
        if drug.is_empty() || cond.is_empty() {
            return false;
        }
        drug.iter().any(|&d| {
            let base = d.saturating_add(self.offset_days);
            let first = base.saturating_add(lo);
            let last = base.saturating_add(hi);
            let idx = cond.partition_point(|&c| c < first);
            matches!(cond.get(idx), Some(&c) if c <= last)
        })
    }
}

impl Default for WindowPolicy {
    fn default() -> Self {
        WindowPolicy {
            offset_days: 0,
            window_start_days: -100_000,
            window_end_days: 100_000,
        }
    }
}

fn in_range(gap: i64, gaps: Option<Gaps>) -> bool {
    matches!(gaps, Some((lo, hi)) if lo <= gap && gap <= hi)
}
