//! Jeopardy (backup call) solver.
//!
//! # Algorithm
//! 1. The year is split into coverage blocks (holiday runs, weekends,
//!    single weekdays); see [`CoveragePartition`].
//! 2. Quotas: base quotas per level, with the holiday quota of the
//!    holiday level recomputed as ⌈holiday days / cohort size⌉. A holiday
//!    block is admitted while the fellow is under that quota, so the last
//!    run taken may overshoot it.
//! 3. Blocks are processed holidays first, then weekends, then weekdays,
//!    chronologically within each tier.
//! 4. Eligible fellows are scored
//!    `(1 − used/quota) × 100 + days_since_last`; the highest score takes
//!    the whole block. Ties go to the lower id.
//! 5. A fellow holding the day before or after a block is excluded from
//!    it, unless both are holiday blocks or both are weekend blocks; see
//!    [`blocks_may_abut`].
//! 6. A block with no eligible fellow is left uncovered and reported.
//!
//! # Complexity
//! O(B · F · D) for B blocks, F fellows and D assigned days.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::eligibility::{
    days_since_nearest, fairness_score, partition_fellows, IneligibleFellow, IneligibleReason,
    UncoveredUnit,
};
use super::retry::{RetryPolicy, Shuffler};
use super::DutyContext;
use crate::config::{BucketQuota, JeopardyConfig};
use crate::error::{EditError, EditResult};
use crate::models::{
    cohort, CoverageBlock, CoveragePartition, CoverageType, Fellow, JeopardySchedule,
    TrainingLevel,
};

/// Holiday quota of the holiday level: ⌈`holiday_days` / `fellows`⌉, or 0
/// with no fellows.
///
/// Holiday runs are several days long and rarely divide the quota, so the
/// solver admits a run while a fellow is still under it. A holiday left
/// uncovered would then need every fellow at or above the quota, which
/// already sums to at least `holiday_days`.
pub fn dynamic_holiday_quota(holiday_days: u32, fellows: usize) -> u32 {
    if fellows == 0 {
        return 0;
    }
    holiday_days.div_ceil(fellows as u32)
}

/// Per-level quotas with the dynamic holiday quota applied.
///
/// Only `config.holiday_level` receives a holiday quota; every other level
/// gets zero.
pub fn compute_dynamic_quotas(
    config: &JeopardyConfig,
    fellows: &[Fellow],
    holiday_days: u32,
) -> BTreeMap<TrainingLevel, BucketQuota> {
    config
        .base_quotas
        .iter()
        .map(|(level, base)| {
            let holiday = if *level == config.holiday_level {
                dynamic_holiday_quota(holiday_days, cohort(fellows, *level).len())
            } else {
                0
            };
            (*level, BucketQuota { holiday, ..*base })
        })
        .collect()
}

/// Result of a jeopardy build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JeopardyOutcome {
    /// Best-effort schedule.
    pub schedule: JeopardySchedule,
    /// Quotas used, per level.
    pub quotas: BTreeMap<TrainingLevel, BucketQuota>,
    /// Whether every block is covered.
    pub success: bool,
    /// Blocks left uncovered.
    pub uncovered: Vec<UncoveredUnit>,
    /// One message per uncovered block.
    pub errors: Vec<String>,
}

/// Scope of a manual jeopardy edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditScope {
    /// Only the given date; valid for one-day blocks.
    Date,
    /// The whole coverage block containing the date.
    Block,
}

/// Jeopardy rules bound to one context.
#[derive(Debug, Clone)]
pub struct JeopardySolver<'a> {
    ctx: &'a DutyContext<'a>,
    partition: &'a CoveragePartition,
    config: &'a JeopardyConfig,
    quotas: BTreeMap<TrainingLevel, BucketQuota>,
    junior_start: Option<NaiveDate>,
}

impl<'a> JeopardySolver<'a> {
    /// Binds the rules and computes the dynamic quotas.
    pub fn new(
        ctx: &'a DutyContext<'a>,
        partition: &'a CoveragePartition,
        config: &'a JeopardyConfig,
    ) -> Self {
        Self {
            ctx,
            partition,
            config,
            quotas: compute_dynamic_quotas(config, ctx.fellows, partition.holiday_days()),
            junior_start: config.junior_start.resolve(ctx.calendar),
        }
    }

    /// Quotas in use.
    pub fn quotas(&self) -> &BTreeMap<TrainingLevel, BucketQuota> {
        &self.quotas
    }

    /// Every reason `fellow` cannot take `block`, given `schedule`.
    ///
    /// The block itself must already be released in `schedule`.
    pub fn ineligibility(
        &self,
        schedule: &JeopardySchedule,
        block: &CoverageBlock,
        fellow: &Fellow,
    ) -> Vec<IneligibleReason> {
        let Some(quota) = self.quotas.get(&fellow.level) else {
            return vec![IneligibleReason::LevelNotEligible(fellow.level)];
        };
        let mut reasons = Vec::new();

        if block.coverage_type == CoverageType::Holiday && fellow.level != self.config.holiday_level {
            reasons.push(IneligibleReason::HolidayLevel {
                required: self.config.holiday_level,
            });
        }
        if fellow.level == self.config.junior_level {
            if let Some(starts) = self.junior_start {
                if block.start() < starts {
                    reasons.push(IneligibleReason::BeforeStart { starts });
                }
            }
        }

        let mut post_call_seen = false;
        for &date in &block.dates {
            if self.ctx.on_call(&fellow.id, date) {
                reasons.push(IneligibleReason::PrimaryCallSameDay(date));
            }
            if let Some(rotation) = self.ctx.rotation_on(fellow, date) {
                let already = reasons.iter().any(
                    |r| matches!(r, IneligibleReason::OnRotation { rotation: seen, .. } if *seen == rotation),
                );
                if self.config.excluded_rotations.contains(&rotation) && !already {
                    reasons.push(IneligibleReason::OnRotation { date, rotation });
                }
            }
            if !post_call_seen {
                if let Some(call_date) =
                    self.ctx.recent_call(&fellow.id, date, self.config.post_call_days)
                {
                    reasons.push(IneligibleReason::PostCall { date, call_date });
                    post_call_seen = true;
                }
            }
            if self.ctx.on_hf(&fellow.id, date) {
                reasons.push(IneligibleReason::HfCoverage(date));
            }
        }

        let bucket = block.coverage_type;
        let used = schedule.counters_for(&fellow.id).get(bucket);
        let over = match bucket {
            CoverageType::Holiday => used >= quota.get(bucket),
            CoverageType::Weekend | CoverageType::Weekday => {
                used + block.len_days() > quota.get(bucket)
            }
        };
        if over {
            reasons.push(IneligibleReason::QuotaReached {
                bucket,
                used,
                quota: quota.get(bucket),
            });
        }

        for neighbour in neighbours(block) {
            let held = schedule.fellow_on(neighbour) == Some(fellow.id.as_str());
            let abuts = self
                .partition
                .type_of(neighbour)
                .is_some_and(|t| blocks_may_abut(t, bucket));
            if held && !abuts {
                reasons.push(IneligibleReason::ConsecutiveBlock { neighbour });
            }
        }
        reasons
    }

    fn score(&self, schedule: &JeopardySchedule, block: &CoverageBlock, fellow: &Fellow) -> f64 {
        let quota = self
            .quotas
            .get(&fellow.level)
            .map(BucketQuota::total)
            .unwrap_or(0);
        let used = schedule.counters_for(&fellow.id).total();
        let fallback = self.ctx.calendar.day_offset(block.start()) + self.config.never_assigned_bonus;
        let days = days_since_nearest(&schedule.dates_for(&fellow.id), block.start(), fallback);
        fairness_score(used, quota, days)
    }

    /// Splits the roster for the block containing `date`.
    fn split(
        &self,
        schedule: &JeopardySchedule,
        date: NaiveDate,
    ) -> Option<(Vec<&'a Fellow>, Vec<IneligibleFellow>)> {
        let block = self.partition.block_for(date)?;
        let mut released = schedule.clone();
        released.release_block(block);
        Some(partition_fellows(self.ctx.fellows, |f| {
            self.ineligibility(&released, block, f)
        }))
    }

    /// Fellows who may take the block containing `date`.
    pub fn eligible(&self, schedule: &JeopardySchedule, date: NaiveDate) -> Vec<&'a Fellow> {
        self.split(schedule, date).map(|s| s.0).unwrap_or_default()
    }

    /// Fellows who may not take the block containing `date`, with reasons.
    pub fn ineligible(&self, schedule: &JeopardySchedule, date: NaiveDate) -> Vec<IneligibleFellow> {
        self.split(schedule, date).map(|s| s.1).unwrap_or_default()
    }

    /// Builds the schedule from scratch.
    pub fn build(&self, policy: &RetryPolicy) -> JeopardyOutcome {
        info!(
            blocks = self.partition.blocks().len(),
            fellows = self.ctx.fellows.len(),
            "building jeopardy schedule"
        );
        let (outcome, attempts) =
            policy.best_of(|shuffler| self.attempt(shuffler), |o| o.uncovered.len());
        if outcome.success {
            info!(attempts, "jeopardy schedule built");
        } else {
            warn!(attempts, uncovered = outcome.uncovered.len(), "jeopardy schedule incomplete");
        }
        outcome
    }

    fn attempt(&self, shuffler: &mut Shuffler) -> JeopardyOutcome {
        let mut schedule = JeopardySchedule::new();
        let mut uncovered = Vec::new();
        let mut roster: Vec<&Fellow> = self.ctx.fellows.iter().collect();
        roster.sort_by(|a, b| a.id.cmp(&b.id));

        for block in self.partition.in_priority_order() {
            let mut order = roster.clone();
            shuffler.fellows(&mut order);

            let mut best: Option<(&Fellow, f64)> = None;
            let mut rejected = Vec::new();
            for fellow in order {
                let reasons = self.ineligibility(&schedule, block, fellow);
                if !reasons.is_empty() {
                    rejected.push(IneligibleFellow {
                        fellow: fellow.clone(),
                        reasons,
                    });
                    continue;
                }
                let score = self.score(&schedule, block, fellow);
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((fellow, score));
                }
            }

            match best {
                Some((fellow, score)) => {
                    debug!(block = %block.describe(), fellow = %fellow.id, score, "jeopardy assigned");
                    schedule.assign_block(block, &fellow.id);
                }
                None => {
                    debug!(block = %block.describe(), "jeopardy block uncovered");
                    uncovered.push(UncoveredUnit::new(block, &rejected));
                }
            }
        }

        uncovered.sort_by_key(|u| u.start);
        JeopardyOutcome {
            schedule,
            quotas: self.quotas.clone(),
            success: uncovered.is_empty(),
            errors: uncovered.iter().map(|u| u.reason.clone()).collect(),
            uncovered,
        }
    }

    /// Applies a manual edit; see [`apply_jeopardy_assignment`].
    pub fn apply(
        &self,
        schedule: &JeopardySchedule,
        date: NaiveDate,
        fellow_id: Option<&str>,
        scope: EditScope,
    ) -> EditResult<JeopardySchedule> {
        let block = self
            .partition
            .block_for(date)
            .ok_or(EditError::DateOutOfRange(date))?;
        if scope == EditScope::Date && block.len_days() > 1 {
            return Err(EditError::MultiDayBlock {
                date,
                days: block.len_days(),
            });
        }

        let mut next = schedule.clone();
        next.release_block(block);
        let Some(fellow_id) = fellow_id else {
            return Ok(next);
        };
        let fellow = self
            .ctx
            .fellow(fellow_id)
            .ok_or_else(|| EditError::UnknownFellow(fellow_id.to_string()))?;
        let reasons = self.ineligibility(&next, block, fellow);
        if !reasons.is_empty() {
            return Err(EditError::Ineligible {
                fellow: fellow.id.clone(),
                reasons,
            });
        }
        next.assign_block(block, &fellow.id);
        Ok(next)
    }
}

/// Whether one fellow may hold two adjacent blocks of these types.
///
/// Only holiday next to holiday and weekend next to weekend are allowed;
/// two weekday blocks never abut for the same fellow.
pub fn blocks_may_abut(a: CoverageType, b: CoverageType) -> bool {
    a == b && a != CoverageType::Weekday
}

/// The day before and the day after a block.
fn neighbours(block: &CoverageBlock) -> impl Iterator<Item = NaiveDate> {
    let before = block.start().checked_sub_days(Days::new(1));
    let after = block.end().checked_add_days(Days::new(1));
    before.into_iter().chain(after)
}

// ================================
// Entry points
// ================================

/// Builds the jeopardy schedule for the year.
pub fn build_jeopardy(
    ctx: &DutyContext<'_>,
    partition: &CoveragePartition,
    config: &JeopardyConfig,
    policy: &RetryPolicy,
) -> JeopardyOutcome {
    JeopardySolver::new(ctx, partition, config).build(policy)
}

/// Assigns (`Some`) or clears (`None`) the jeopardy unit containing `date`.
///
/// [`EditScope::Date`] is rejected for multi-day blocks so blocks stay
/// atomic. Returns the new schedule; the input is never modified.
pub fn apply_jeopardy_assignment(
    schedule: &JeopardySchedule,
    ctx: &DutyContext<'_>,
    partition: &CoveragePartition,
    config: &JeopardyConfig,
    date: NaiveDate,
    fellow_id: Option<&str>,
    scope: EditScope,
) -> EditResult<JeopardySchedule> {
    JeopardySolver::new(ctx, partition, config).apply(schedule, date, fellow_id, scope)
}

/// Fellows who may take the jeopardy block containing `date`.
pub fn eligible_jeopardy_fellows<'a>(
    schedule: &JeopardySchedule,
    ctx: &'a DutyContext<'a>,
    partition: &'a CoveragePartition,
    config: &'a JeopardyConfig,
    date: NaiveDate,
) -> Vec<&'a Fellow> {
    JeopardySolver::new(ctx, partition, config).eligible(schedule, date)
}

/// Fellows who may not take the jeopardy block containing `date`, with reasons.
pub fn ineligible_jeopardy_fellows_with_reasons(
    schedule: &JeopardySchedule,
    ctx: &DutyContext<'_>,
    partition: &CoveragePartition,
    config: &JeopardyConfig,
    date: NaiveDate,
) -> Vec<IneligibleFellow> {
    JeopardySolver::new(ctx, partition, config).ineligible(schedule, date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CallConfig;
    use crate::models::{AcademicCalendar, CallSchedule, HfSchedule, Rotation, RotationSchedule};
    use crate::scheduler::build_primary_call;
    use crate::validation::audit_jeopardy;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn roster() -> Vec<Fellow> {
        vec![
            Fellow::new("a1", TrainingLevel::Pgy4),
            Fellow::new("a2", TrainingLevel::Pgy4),
            Fellow::new("b1", TrainingLevel::Pgy5),
            Fellow::new("b2", TrainingLevel::Pgy5),
            Fellow::new("b3", TrainingLevel::Pgy5),
            Fellow::new("c1", TrainingLevel::Pgy6),
            Fellow::new("c2", TrainingLevel::Pgy6),
        ]
    }

    #[test]
    fn test_dynamic_holiday_quota() {
        assert_eq!(dynamic_holiday_quota(120, 4), 30);
        assert_eq!(dynamic_holiday_quota(17, 3), 6);
        assert_eq!(dynamic_holiday_quota(17, 0), 0);
    }

    #[test]
    fn test_dynamic_quota_updates_level_total() {
        let config = JeopardyConfig::default();
        let fellows: Vec<Fellow> = (1..=4)
            .map(|i| Fellow::new(format!("b{i}"), TrainingLevel::Pgy5))
            .collect();
        let quotas = compute_dynamic_quotas(&config, &fellows, 120);
        let pgy5 = quotas[&TrainingLevel::Pgy5];
        assert_eq!(pgy5.holiday, 30);
        assert_eq!(pgy5.total(), 20 + 8 + 30);
        assert_eq!(quotas[&TrainingLevel::Pgy4].holiday, 0);
    }

    #[test]
    fn test_post_call_window_excludes_fellow() {
        let cal = AcademicCalendar::for_year(2024);
        let partition = CoveragePartition::for_calendar(&cal).unwrap();
        let fellows = vec![
            Fellow::new("X", TrainingLevel::Pgy5),
            Fellow::new("Z", TrainingLevel::Pgy5),
        ];
        let mut call = CallSchedule::new();
        call.assign(date(2024, 12, 24), "X");
        let ctx = DutyContext::new(&fellows, &cal).with_call(&call);
        let config = JeopardyConfig::default();
        let schedule = JeopardySchedule::new();

        for day in [25, 26] {
            let d = date(2024, 12, day);
            let ineligible =
                ineligible_jeopardy_fellows_with_reasons(&schedule, &ctx, &partition, &config, d);
            let x = ineligible.iter().find(|i| i.fellow.id == "X").unwrap();
            assert!(x.reasons.contains(&IneligibleReason::PostCall {
                date: d,
                call_date: date(2024, 12, 24)
            }));
            let eligible: Vec<&str> = eligible_jeopardy_fellows(&schedule, &ctx, &partition, &config, d)
                .iter()
                .map(|f| f.id.as_str())
                .collect();
            assert_eq!(eligible, vec!["Z"]);
        }

        let d = date(2024, 12, 27);
        assert!(ineligible_jeopardy_fellows_with_reasons(&schedule, &ctx, &partition, &config, d)
            .is_empty());
    }

    #[test]
    fn test_hf_weekend_excludes_fellow() {
        let cal = AcademicCalendar::for_year(2024);
        let partition = CoveragePartition::for_calendar(&cal).unwrap();
        let fellows = vec![
            Fellow::new("Y", TrainingLevel::Pgy5),
            Fellow::new("Z", TrainingLevel::Pgy6),
        ];
        let mut hf = HfSchedule::new();
        hf.assign(partition.block_for(date(2024, 8, 10)).unwrap(), "Y");
        let ctx = DutyContext::new(&fellows, &cal).with_hf(&hf);
        let config = JeopardyConfig::default()
            .with_quota(TrainingLevel::Pgy5, BucketQuota::new(20, 60, 0))
            .with_quota(TrainingLevel::Pgy6, BucketQuota::new(20, 60, 0));

        let ineligible = ineligible_jeopardy_fellows_with_reasons(
            &JeopardySchedule::new(),
            &ctx,
            &partition,
            &config,
            date(2024, 8, 11),
        );
        assert_eq!(ineligible.len(), 1);
        assert!(ineligible[0]
            .reasons
            .contains(&IneligibleReason::HfCoverage(date(2024, 8, 10))));

        let outcome = build_jeopardy(&ctx, &partition, &config, &RetryPolicy::deterministic());
        assert_eq!(outcome.schedule.fellow_on(date(2024, 8, 10)), Some("Z"));
        assert_eq!(outcome.schedule.fellow_on(date(2024, 8, 11)), Some("Z"));
    }

    #[test]
    fn test_build_keeps_blocks_atomic_and_rules() {
        let cal = AcademicCalendar::for_year(2024);
        let partition = CoveragePartition::for_calendar(&cal).unwrap();
        let fellows = roster();
        let mut pgy5 = RotationSchedule::new(TrainingLevel::Pgy5);
        pgy5.set("b1", "DEC2", Rotation::Ccu);
        let mut call_config = CallConfig::default();
        for level in TrainingLevel::ALL {
            call_config = call_config
                .with_max_calls(level, 100)
                .with_max_weekend_holiday(level, 40);
        }
        let base = DutyContext::new(&fellows, &cal).with_rotations([&pgy5]);
        let call = build_primary_call(&base, &call_config, &RetryPolicy::deterministic()).schedule;
        let ctx = base.clone().with_call(&call);
        let config = JeopardyConfig::default();

        let outcome = build_jeopardy(&ctx, &partition, &config, &RetryPolicy::deterministic());
        assert!(audit_jeopardy(&outcome.schedule, &partition, &ctx, &outcome.quotas).is_empty());
        assert_eq!(outcome.uncovered.len(), outcome.errors.len());
        assert_eq!(outcome.success, outcome.uncovered.is_empty());

        let covered = partition
            .blocks()
            .iter()
            .filter(|b| outcome.schedule.fellow_on(b.start()).is_some())
            .count();
        assert_eq!(covered + outcome.uncovered.len(), partition.blocks().len());

        for block in partition.of_type(CoverageType::Holiday) {
            if let Some(f) = outcome.schedule.fellow_on(block.start()) {
                assert!(f.starts_with('b'), "{f} on {}", block.describe());
            }
        }
        for (d, f) in &outcome.schedule.days {
            if f.starts_with('a') {
                assert!(*d >= date(2024, 9, 1));
            }
            if f == "b1" {
                assert!(cal.block_for_date(*d).unwrap().key != "DEC2");
            }
        }
        let quota = outcome.quotas[&TrainingLevel::Pgy5].holiday;
        assert_eq!(quota, dynamic_holiday_quota(17, 3));
    }

    #[test]
    fn test_deterministic_build_is_repeatable() {
        let cal = AcademicCalendar::for_year(2024);
        let partition = CoveragePartition::for_calendar(&cal).unwrap();
        let fellows = roster();
        let ctx = DutyContext::new(&fellows, &cal);
        let config = JeopardyConfig::default();
        let a = build_jeopardy(&ctx, &partition, &config, &RetryPolicy::deterministic());
        let b = build_jeopardy(&ctx, &partition, &config, &RetryPolicy::deterministic());
        assert_eq!(
            serde_json::to_string(&a.schedule).unwrap(),
            serde_json::to_string(&b.schedule).unwrap()
        );
    }

    #[test]
    fn test_date_scope_rejected_on_weekend() {
        let cal = AcademicCalendar::for_year(2024);
        let partition = CoveragePartition::for_calendar(&cal).unwrap();
        let fellows = roster();
        let ctx = DutyContext::new(&fellows, &cal);
        let config = JeopardyConfig::default();
        let schedule = JeopardySchedule::new();

        let err = apply_jeopardy_assignment(
            &schedule,
            &ctx,
            &partition,
            &config,
            date(2024, 8, 10),
            Some("b1"),
            EditScope::Date,
        )
        .unwrap_err();
        assert_eq!(
            err,
            EditError::MultiDayBlock {
                date: date(2024, 8, 10),
                days: 2
            }
        );

        let next = apply_jeopardy_assignment(
            &schedule,
            &ctx,
            &partition,
            &config,
            date(2024, 8, 10),
            Some("b1"),
            EditScope::Block,
        )
        .unwrap();
        assert_eq!(next.fellow_on(date(2024, 8, 11)), Some("b1"));
        assert_eq!(next.counters_for("b1").weekend, 2);
        assert!(next.counters_consistent(|d| partition.type_of(d)));

        let cleared = apply_jeopardy_assignment(
            &next,
            &ctx,
            &partition,
            &config,
            date(2024, 8, 11),
            None,
            EditScope::Block,
        )
        .unwrap();
        assert!(cleared.days.is_empty());
        assert!(cleared.counters.is_empty());
    }

    #[test]
    fn test_consecutive_blocks_of_different_type() {
        let cal = AcademicCalendar::for_year(2024);
        let partition = CoveragePartition::for_calendar(&cal).unwrap();
        let fellows = roster();
        let ctx = DutyContext::new(&fellows, &cal);
        let config = JeopardyConfig::default();

        let friday = apply_jeopardy_assignment(
            &JeopardySchedule::new(),
            &ctx,
            &partition,
            &config,
            date(2024, 8, 9),
            Some("b2"),
            EditScope::Date,
        )
        .unwrap();
        let err = apply_jeopardy_assignment(
            &friday,
            &ctx,
            &partition,
            &config,
            date(2024, 8, 10),
            Some("b2"),
            EditScope::Block,
        )
        .unwrap_err();
        match err {
            EditError::Ineligible { reasons, .. } => assert_eq!(
                reasons,
                vec![IneligibleReason::ConsecutiveBlock {
                    neighbour: date(2024, 8, 9)
                }]
            ),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(friday.days.len(), 1);
    }

    #[test]
    fn test_holiday_and_junior_rules() {
        let cal = AcademicCalendar::for_year(2024);
        let partition = CoveragePartition::for_calendar(&cal).unwrap();
        let fellows = roster();
        let ctx = DutyContext::new(&fellows, &cal);
        let config = JeopardyConfig::default();
        let schedule = JeopardySchedule::new();

        let july4 = ineligible_jeopardy_fellows_with_reasons(
            &schedule,
            &ctx,
            &partition,
            &config,
            date(2024, 7, 4),
        );
        let ids: Vec<&str> = july4.iter().map(|i| i.fellow.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2", "c1", "c2"]);
        assert!(july4[2].reasons.contains(&IneligibleReason::HolidayLevel {
            required: TrainingLevel::Pgy5
        }));

        let aug = ineligible_jeopardy_fellows_with_reasons(
            &schedule,
            &ctx,
            &partition,
            &config,
            date(2024, 8, 14),
        );
        assert_eq!(aug.len(), 2);
        assert_eq!(
            aug[0].reasons,
            vec![IneligibleReason::BeforeStart {
                starts: date(2024, 9, 1)
            }]
        );
    }

    #[test]
    fn test_holiday_blocks_always_covered() {
        let config = JeopardyConfig::default();
        for year in 2020..=2031 {
            let cal = AcademicCalendar::for_year(year);
            let partition = CoveragePartition::for_calendar(&cal).unwrap();
            for n in 1..=6 {
                let fellows: Vec<Fellow> = (1..=n)
                    .map(|i| Fellow::new(format!("b{i}"), TrainingLevel::Pgy5))
                    .collect();
                let ctx = DutyContext::new(&fellows, &cal);
                let outcome = build_jeopardy(&ctx, &partition, &config, &RetryPolicy::deterministic());
                let missed: Vec<String> = outcome
                    .uncovered
                    .iter()
                    .filter(|u| partition.type_of(u.start) == Some(CoverageType::Holiday))
                    .map(|u| u.start.to_string())
                    .collect();
                assert!(missed.is_empty(), "{year} with {n} fellows: {missed:?}");
                for block in partition.of_type(CoverageType::Holiday) {
                    assert!(outcome.schedule.fellow_on(block.start()).is_some());
                }
                assert!(audit_jeopardy(&outcome.schedule, &partition, &ctx, &outcome.quotas).is_empty());
            }
        }
    }

    #[test]
    fn test_adjacent_weekdays_rejected() {
        let cal = AcademicCalendar::for_year(2024);
        let partition = CoveragePartition::for_calendar(&cal).unwrap();
        let fellows = roster();
        let ctx = DutyContext::new(&fellows, &cal);
        let config = JeopardyConfig::default();

        let tuesday = apply_jeopardy_assignment(
            &JeopardySchedule::new(),
            &ctx,
            &partition,
            &config,
            date(2024, 8, 6),
            Some("b1"),
            EditScope::Date,
        )
        .unwrap();
        let err = apply_jeopardy_assignment(
            &tuesday,
            &ctx,
            &partition,
            &config,
            date(2024, 8, 7),
            Some("b1"),
            EditScope::Date,
        )
        .unwrap_err();
        assert_eq!(
            err,
            EditError::Ineligible {
                fellow: "b1".into(),
                reasons: vec![IneligibleReason::ConsecutiveBlock {
                    neighbour: date(2024, 8, 6)
                }],
            }
        );
        let ineligible = ineligible_jeopardy_fellows_with_reasons(
            &tuesday,
            &ctx,
            &partition,
            &config,
            date(2024, 8, 7),
        );
        assert!(ineligible.iter().any(|i| i.fellow.id == "b1"));
    }

    #[test]
    fn test_block_adjacency_rule() {
        assert!(blocks_may_abut(CoverageType::Holiday, CoverageType::Holiday));
        assert!(blocks_may_abut(CoverageType::Weekend, CoverageType::Weekend));
        assert!(!blocks_may_abut(CoverageType::Weekday, CoverageType::Weekday));
        assert!(!blocks_may_abut(CoverageType::Weekday, CoverageType::Weekend));
        assert!(!blocks_may_abut(CoverageType::Holiday, CoverageType::Weekend));
    }

    #[test]
    fn test_build_never_gives_adjacent_weekdays() {
        let cal = AcademicCalendar::for_year(2024);
        let partition = CoveragePartition::for_calendar(&cal).unwrap();
        let fellows = roster();
        let ctx = DutyContext::new(&fellows, &cal);
        let config = JeopardyConfig::default();
        let outcome = build_jeopardy(&ctx, &partition, &config, &RetryPolicy::deterministic());

        for block in partition.of_type(CoverageType::Weekday) {
            let Some(holder) = outcome.schedule.fellow_on(block.start()) else {
                continue;
            };
            let next = block.end().succ_opt().unwrap();
            if partition.type_of(next) == Some(CoverageType::Weekday) {
                assert_ne!(outcome.schedule.fellow_on(next), Some(holder), "{}", block.describe());
            }
        }
    }
}
