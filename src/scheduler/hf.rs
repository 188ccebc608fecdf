//! Heart-failure (HF) weekend/holiday coverage solver.
//!
//! Same eligibility-filter-then-score shape as jeopardy, over fewer units:
//! only the holiday runs and weekends of the coverage partition. A fellow
//! is excluded by level, quota, disqualifying rotations, same-day primary
//! call, primary call on the Friday before a weekend, and another HF unit
//! starting within `min_days_between_units` days.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::eligibility::{
    days_since_nearest, fairness_score, partition_fellows, IneligibleFellow, IneligibleReason,
    UncoveredUnit,
};
use super::retry::{RetryPolicy, Shuffler};
use super::DutyContext;
use crate::config::{BucketQuota, HfConfig};
use crate::error::{EditError, EditResult};
use crate::models::{CoverageBlock, CoveragePartition, CoverageType, Fellow, HfSchedule};

/// Result of an HF build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HfOutcome {
    /// Best-effort schedule.
    pub schedule: HfSchedule,
    /// Whether every unit is covered.
    pub success: bool,
    /// Units left uncovered.
    pub uncovered: Vec<UncoveredUnit>,
    /// One message per uncovered unit.
    pub errors: Vec<String>,
}

/// Whether a coverage block is an HF unit.
pub fn is_hf_unit(block: &CoverageBlock) -> bool {
    block.coverage_type != CoverageType::Weekday
}

/// HF units in processing order: holidays first, then weekends.
pub fn hf_units(partition: &CoveragePartition) -> Vec<&CoverageBlock> {
    partition
        .in_priority_order()
        .into_iter()
        .filter(|b| is_hf_unit(b))
        .collect()
}

/// The Friday right before a unit, if the unit starts on a weekend day.
fn friday_before(block: &CoverageBlock) -> Option<NaiveDate> {
    let start = block.start();
    let back = match start.weekday() {
        Weekday::Sat => 1,
        Weekday::Sun => 2,
        _ => return None,
    };
    start.checked_sub_days(Days::new(back))
}

/// Every reason `fellow` cannot take HF `block`.
///
/// The block must already be released in `schedule`.
pub fn hf_ineligibility(
    schedule: &HfSchedule,
    ctx: &DutyContext<'_>,
    config: &HfConfig,
    block: &CoverageBlock,
    fellow: &Fellow,
) -> Vec<IneligibleReason> {
    let Some(quota) = config.quotas.get(&fellow.level) else {
        return vec![IneligibleReason::LevelNotEligible(fellow.level)];
    };
    let mut reasons = Vec::new();

    for &date in &block.dates {
        if let Some(rotation) = ctx.rotation_on(fellow, date) {
            let already = reasons.iter().any(
                |r| matches!(r, IneligibleReason::OnRotation { rotation: seen, .. } if *seen == rotation),
            );
            if config.excluded_rotations.contains(&rotation) && !already {
                reasons.push(IneligibleReason::OnRotation { date, rotation });
            }
        }
        if ctx.on_call(&fellow.id, date) {
            reasons.push(IneligibleReason::PrimaryCallSameDay(date));
        }
    }

    if config.exclude_after_friday_call {
        if let Some(friday) = friday_before(block) {
            if ctx.on_call(&fellow.id, friday) {
                reasons.push(IneligibleReason::FridayCall(friday));
            }
        }
    }

    let bucket = block.coverage_type;
    let used = schedule.counters_for(&fellow.id).get(bucket);
    if used + block.len_days() > quota.get(bucket) {
        reasons.push(IneligibleReason::QuotaReached {
            bucket,
            used,
            quota: quota.get(bucket),
        });
    }

    if let Some(other) = schedule.unit_starts_for(&fellow.id).into_iter().find(|s| {
        *s != block.start() && (block.start() - *s).num_days().abs() <= config.min_days_between_units
    }) {
        reasons.push(IneligibleReason::TooSoon {
            other,
            min_days: config.min_days_between_units,
        });
    }
    reasons
}

fn score(
    schedule: &HfSchedule,
    ctx: &DutyContext<'_>,
    config: &HfConfig,
    block: &CoverageBlock,
    fellow: &Fellow,
) -> f64 {
    let quota = config
        .quotas
        .get(&fellow.level)
        .map(BucketQuota::total)
        .unwrap_or(0);
    let used = schedule.counters_for(&fellow.id).total();
    let fallback = ctx.calendar.day_offset(block.start());
    let days = days_since_nearest(&schedule.unit_starts_for(&fellow.id), block.start(), fallback);
    fairness_score(used, quota, days)
}

/// Builds the HF schedule for the year.
pub fn build_hf(
    ctx: &DutyContext<'_>,
    partition: &CoveragePartition,
    config: &HfConfig,
    policy: &RetryPolicy,
) -> HfOutcome {
    info!(fellows = ctx.fellows.len(), "building HF coverage schedule");
    let (outcome, attempts) = policy.best_of(
        |shuffler| attempt(ctx, partition, config, shuffler),
        |o| o.uncovered.len(),
    );
    if outcome.success {
        info!(attempts, units = outcome.schedule.units.len(), "HF coverage schedule built");
    } else {
        warn!(attempts, uncovered = outcome.uncovered.len(), "HF coverage incomplete");
    }
    outcome
}

fn attempt(
    ctx: &DutyContext<'_>,
    partition: &CoveragePartition,
    config: &HfConfig,
    shuffler: &mut Shuffler,
) -> HfOutcome {
    let mut schedule = HfSchedule::new();
    let mut uncovered = Vec::new();
    let mut roster: Vec<&Fellow> = ctx
        .fellows
        .iter()
        .filter(|f| config.quotas.contains_key(&f.level))
        .collect();
    roster.sort_by(|a, b| a.id.cmp(&b.id));

    for block in hf_units(partition) {
        let mut order = roster.clone();
        shuffler.fellows(&mut order);

        let mut best: Option<(&Fellow, f64)> = None;
        let mut rejected = Vec::new();
        for fellow in order {
            let reasons = hf_ineligibility(&schedule, ctx, config, block, fellow);
            if !reasons.is_empty() {
                rejected.push(IneligibleFellow {
                    fellow: fellow.clone(),
                    reasons,
                });
                continue;
            }
            let s = score(&schedule, ctx, config, block, fellow);
            if best.map_or(true, |(_, b)| s > b) {
                best = Some((fellow, s));
            }
        }
        match best {
            Some((fellow, _)) => {
                debug!(unit = %block.describe(), fellow = %fellow.id, "HF unit assigned");
                schedule.assign(block, &fellow.id);
            }
            None => uncovered.push(UncoveredUnit::new(block, &rejected)),
        }
    }

    uncovered.sort_by_key(|u| u.start);
    HfOutcome {
        success: uncovered.is_empty(),
        errors: uncovered.iter().map(|u| u.reason.clone()).collect(),
        schedule,
        uncovered,
    }
}

fn unit_for<'p>(partition: &'p CoveragePartition, date: NaiveDate) -> EditResult<&'p CoverageBlock> {
    let block = partition
        .block_for(date)
        .ok_or(EditError::DateOutOfRange(date))?;
    if is_hf_unit(block) {
        Ok(block)
    } else {
        Err(EditError::NotAUnit(date))
    }
}

/// Assigns (`Some`) or clears (`None`) the HF unit containing `date`.
///
/// Returns the new schedule; the input is never modified.
pub fn apply_hf_assignment(
    schedule: &HfSchedule,
    ctx: &DutyContext<'_>,
    partition: &CoveragePartition,
    config: &HfConfig,
    date: NaiveDate,
    fellow_id: Option<&str>,
) -> EditResult<HfSchedule> {
    let block = unit_for(partition, date)?;
    let mut next = schedule.clone();
    next.release(block.start());
    let Some(fellow_id) = fellow_id else {
        return Ok(next);
    };
    let fellow = ctx
        .fellow(fellow_id)
        .ok_or_else(|| EditError::UnknownFellow(fellow_id.to_string()))?;
    let reasons = hf_ineligibility(&next, ctx, config, block, fellow);
    if !reasons.is_empty() {
        return Err(EditError::Ineligible {
            fellow: fellow.id.clone(),
            reasons,
        });
    }
    next.assign(block, &fellow.id);
    Ok(next)
}

fn split<'a>(
    schedule: &HfSchedule,
    ctx: &DutyContext<'a>,
    partition: &CoveragePartition,
    config: &HfConfig,
    date: NaiveDate,
) -> (Vec<&'a Fellow>, Vec<IneligibleFellow>) {
    let Ok(block) = unit_for(partition, date) else {
        return (Vec::new(), Vec::new());
    };
    let mut released = schedule.clone();
    released.release(block.start());
    partition_fellows(ctx.fellows, |f| hf_ineligibility(&released, ctx, config, block, f))
}

/// Fellows who may take the HF unit containing `date`.
pub fn eligible_hf_fellows<'a>(
    schedule: &HfSchedule,
    ctx: &DutyContext<'a>,
    partition: &CoveragePartition,
    config: &HfConfig,
    date: NaiveDate,
) -> Vec<&'a Fellow> {
    split(schedule, ctx, partition, config, date).0
}

/// Fellows who may not take the HF unit containing `date`, with reasons.
pub fn ineligible_hf_fellows_with_reasons(
    schedule: &HfSchedule,
    ctx: &DutyContext<'_>,
    partition: &CoveragePartition,
    config: &HfConfig,
    date: NaiveDate,
) -> Vec<IneligibleFellow> {
    split(schedule, ctx, partition, config, date).1
}
