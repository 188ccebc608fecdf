//! Duty distribution metrics (KPIs).
//!
//! Summarizes how evenly a duty is spread over a roster. Every duty
//! schedule reduces to per-fellow counts; fellows with no assignment
//! count as zero so the spread reflects the whole cohort.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Total | Sum of counts |
//! | Min / Max | Lightest and heaviest fellow |
//! | Spread | Max − Min |
//! | Mean | Total / roster size |
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 1.2: Performance Measures

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{CallSchedule, ClinicSchedule, Fellow, HfSchedule, JeopardySchedule};

/// Distribution of one duty over a roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DutyKpi {
    /// fellow id → count (days or sessions).
    pub per_fellow: BTreeMap<String, u32>,
    /// Sum of counts.
    pub total: u32,
    /// Smallest count.
    pub min: u32,
    /// Largest count.
    pub max: u32,
    /// `max - min`.
    pub spread: u32,
    /// Mean count per fellow.
    pub mean: f64,
}

impl DutyKpi {
    /// Computes the KPI from `(fellow id, count)` pairs.
    pub fn from_counts<K: Into<String>>(counts: impl IntoIterator<Item = (K, u32)>) -> Self {
        let per_fellow: BTreeMap<String, u32> =
            counts.into_iter().map(|(k, n)| (k.into(), n)).collect();
        let total: u32 = per_fellow.values().sum();
        let min = per_fellow.values().copied().min().unwrap_or(0);
        let max = per_fellow.values().copied().max().unwrap_or(0);
        let mean = if per_fellow.is_empty() {
            0.0
        } else {
            total as f64 / per_fellow.len() as f64
        };
        Self {
            per_fellow,
            total,
            min,
            max,
            spread: max - min,
            mean,
        }
    }

    /// Primary-call days per fellow.
    pub fn primary_call(schedule: &CallSchedule, fellows: &[&Fellow]) -> Self {
        Self::from_counts(fellows.iter().map(|f| (f.id.as_str(), schedule.count(&f.id) as u32)))
    }

    /// Jeopardy days per fellow.
    pub fn jeopardy(schedule: &JeopardySchedule, fellows: &[&Fellow]) -> Self {
        Self::from_counts(
            fellows
                .iter()
                .map(|f| (f.id.as_str(), schedule.counters_for(&f.id).total())),
        )
    }

    /// HF days per fellow.
    pub fn hf(schedule: &HfSchedule, fellows: &[&Fellow]) -> Self {
        Self::from_counts(
            fellows
                .iter()
                .map(|f| (f.id.as_str(), schedule.counters_for(&f.id).total())),
        )
    }

    /// Clinic sessions per fellow.
    pub fn clinic(schedule: &ClinicSchedule, fellows: &[&Fellow]) -> Self {
        Self::from_counts(fellows.iter().map(|f| (f.id.as_str(), schedule.count(&f.id))))
    }

    /// Whether the spread is within `max_spread` and nobody is below `min_per_fellow`.
    pub fn meets_thresholds(&self, max_spread: u32, min_per_fellow: u32) -> bool {
        self.spread <= max_spread && self.min >= min_per_fellow
    }
}
