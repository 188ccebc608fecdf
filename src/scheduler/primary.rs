//! Primary call solver.
//!
//! Assigns one fellow per calendar day. The result is ground truth for
//! every downstream duty: same-day primary call excludes a fellow from
//! jeopardy, HF coverage and clinic.
//!
//! # Algorithm
//! Dates are walked chronologically. Candidates passing every rule are
//! ranked by (calls so far, weekend/holiday load on weekend/holiday dates,
//! days since last call descending, id); the first wins. A date with no
//! candidate is left uncovered. Randomized runs shuffle tie order and keep
//! the attempt with the fewest uncovered dates.
//!
//! [`optimize_weekend_equity`] then evens weekend/holiday load inside a
//! subgroup by swapping dates without changing anyone's total.

use std::cmp::Reverse;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::eligibility::{days_since_nearest, partition_fellows, IneligibleFellow, IneligibleReason};
use super::retry::{RetryPolicy, Shuffler};
use super::DutyContext;
use crate::config::CallConfig;
use crate::error::{EditError, EditResult};
use crate::models::{AcademicCalendar, CallSchedule, CoverageType, Fellow};

/// Result of a primary-call build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallOutcome {
    /// Best-effort schedule.
    pub schedule: CallSchedule,
    /// Whether every date is covered.
    pub success: bool,
    /// Dates left without a fellow.
    pub uncovered: Vec<NaiveDate>,
    /// One message per uncovered date.
    pub errors: Vec<String>,
    /// Attempts made.
    pub attempts: usize,
}

/// Quota bucket of a single day: holiday, Saturday/Sunday, or weekday.
pub fn day_bucket(calendar: &AcademicCalendar, date: NaiveDate) -> CoverageType {
    if calendar.is_holiday(date) {
        CoverageType::Holiday
    } else if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        CoverageType::Weekend
    } else {
        CoverageType::Weekday
    }
}

fn heavy_load(schedule: &CallSchedule, calendar: &AcademicCalendar, fellow_id: &str) -> u32 {
    schedule
        .dates_for(fellow_id)
        .into_iter()
        .filter(|d| day_bucket(calendar, *d) != CoverageType::Weekday)
        .count() as u32
}

/// Every reason `fellow` cannot take primary call on `date`.
///
/// Whoever currently holds `date` is ignored, so the check also serves
/// reassignment.
pub fn call_ineligibility(
    schedule: &CallSchedule,
    ctx: &DutyContext<'_>,
    config: &CallConfig,
    fellow: &Fellow,
    date: NaiveDate,
) -> Vec<IneligibleReason> {
    let mut reasons = Vec::new();
    let Some(&max) = config.max_calls.get(&fellow.level) else {
        return vec![IneligibleReason::LevelNotEligible(fellow.level)];
    };

    if let Some(starts) = config
        .earliest_start
        .get(&fellow.level)
        .and_then(|s| s.resolve(ctx.calendar))
    {
        if date < starts {
            reasons.push(IneligibleReason::BeforeStart { starts });
        }
    }
    if let Some(rotation) = ctx.rotation_on(fellow, date) {
        if config.excluded_rotations.contains(&rotation) {
            reasons.push(IneligibleReason::OnRotation { date, rotation });
        }
    }
    if ctx.on_hf(&fellow.id, date) {
        reasons.push(IneligibleReason::HfCoverage(date));
    }

    let mine: Vec<NaiveDate> = schedule
        .dates_for(&fellow.id)
        .into_iter()
        .filter(|d| *d != date)
        .collect();
    if let Some(other) = mine
        .iter()
        .find(|d| (date - **d).num_days().abs() < config.min_days_between)
    {
        reasons.push(IneligibleReason::TooSoon {
            other: *other,
            min_days: config.min_days_between,
        });
    }

    let bucket = day_bucket(ctx.calendar, date);
    let used = mine.len() as u32;
    if used >= max {
        reasons.push(IneligibleReason::QuotaReached {
            bucket,
            used,
            quota: max,
        });
    } else if bucket != CoverageType::Weekday {
        let heavy_max = config
            .max_weekend_holiday
            .get(&fellow.level)
            .copied()
            .unwrap_or(max);
        let heavy = mine
            .iter()
            .filter(|d| day_bucket(ctx.calendar, **d) != CoverageType::Weekday)
            .count() as u32;
        if heavy >= heavy_max {
            reasons.push(IneligibleReason::QuotaReached {
                bucket,
                used: heavy,
                quota: heavy_max,
            });
        }
    }
    reasons
}

/// Fellows who may take primary call on `date`.
pub fn eligible_call_fellows<'a>(
    schedule: &CallSchedule,
    ctx: &DutyContext<'a>,
    config: &CallConfig,
    date: NaiveDate,
) -> Vec<&'a Fellow> {
    partition_fellows(ctx.fellows, |f| call_ineligibility(schedule, ctx, config, f, date)).0
}

/// Fellows who may not take primary call on `date`, with every reason.
pub fn ineligible_call_fellows_with_reasons(
    schedule: &CallSchedule,
    ctx: &DutyContext<'_>,
    config: &CallConfig,
    date: NaiveDate,
) -> Vec<IneligibleFellow> {
    partition_fellows(ctx.fellows, |f| call_ineligibility(schedule, ctx, config, f, date)).1
}

/// Builds the primary-call schedule for the whole year.
pub fn build_primary_call(
    ctx: &DutyContext<'_>,
    config: &CallConfig,
    policy: &RetryPolicy,
) -> CallOutcome {
    info!(fellows = ctx.fellows.len(), "building primary call schedule");
    let (mut outcome, attempts) = policy.best_of(
        |shuffler| attempt(ctx, config, shuffler),
        |o| o.uncovered.len(),
    );
    outcome.attempts = attempts;
    info!(
        covered = outcome.schedule.days.len(),
        uncovered = outcome.uncovered.len(),
        attempts,
        "primary call schedule built"
    );
    outcome
}

fn attempt(ctx: &DutyContext<'_>, config: &CallConfig, shuffler: &mut Shuffler) -> CallOutcome {
    let mut schedule = CallSchedule::new();
    let mut uncovered = Vec::new();
    let mut errors = Vec::new();

    for date in ctx.calendar.dates() {
        let mut candidates: Vec<&Fellow> = ctx
            .fellows
            .iter()
            .filter(|f| call_ineligibility(&schedule, ctx, config, f, date).is_empty())
            .collect();
        if candidates.is_empty() {
            debug!(%date, "no eligible fellow for primary call");
            uncovered.push(date);
            errors.push(format!("{date}: no eligible fellow for primary call"));
            continue;
        }

        candidates.sort_by(|a, b| a.id.cmp(&b.id));
        shuffler.fellows(&mut candidates);
        let heavy = day_bucket(ctx.calendar, date) != CoverageType::Weekday;
        let fallback = ctx.calendar.day_offset(date) + 1;
        candidates.sort_by_cached_key(|f| {
            let dates = schedule.dates_for(&f.id);
            let load = if heavy {
                heavy_load(&schedule, ctx.calendar, &f.id)
            } else {
                0
            };
            (
                dates.len(),
                load,
                Reverse(days_since_nearest(&dates, date, fallback)),
            )
        });
        schedule.assign(date, &candidates[0].id);
    }

    CallOutcome {
        success: uncovered.is_empty(),
        schedule,
        uncovered,
        errors,
        attempts: 1,
    }
}

/// Evens weekend/holiday call load inside `subgroup`.
///
/// Repeatedly moves a weekend/holiday date from the most-loaded member to
/// the least-loaded one in exchange for one of that member's weekdays,
/// as long as both stay eligible. Per-fellow totals never change.
/// Returns the new schedule and the number of swaps made.
pub fn optimize_weekend_equity(
    schedule: &CallSchedule,
    subgroup: &[&str],
    ctx: &DutyContext<'_>,
    config: &CallConfig,
) -> (CallSchedule, usize) {
    let mut current = schedule.clone();
    let mut swaps = 0;
    let members: Vec<&Fellow> = subgroup.iter().filter_map(|id| ctx.fellow(id)).collect();
    if members.len() < 2 {
        return (current, 0);
    }

    // Each swap narrows the gap between two members; the bound stops cycling.
    let max_swaps = current.days.len();
    while swaps < max_swaps {
        let mut loads: Vec<(u32, &Fellow)> = members
            .iter()
            .map(|f| (heavy_load(&current, ctx.calendar, &f.id), *f))
            .collect();
        loads.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        let (low, high) = (loads[0], loads[loads.len() - 1]);
        if high.0 <= low.0 + 1 {
            break;
        }
        match find_swap(&current, ctx, config, high.1, low.1) {
            Some((heavy_date, weekday)) => {
                debug!(from = %high.1.id, to = %low.1.id, %heavy_date, %weekday, "weekend equity swap");
                current.assign(heavy_date, &low.1.id);
                current.assign(weekday, &high.1.id);
                swaps += 1;
            }
            None => break,
        }
    }
    if swaps > 0 {
        info!(swaps, "weekend equity optimized");
    }
    (current, swaps)
}

fn find_swap(
    schedule: &CallSchedule,
    ctx: &DutyContext<'_>,
    config: &CallConfig,
    high: &Fellow,
    low: &Fellow,
) -> Option<(NaiveDate, NaiveDate)> {
    let heavy_dates: Vec<NaiveDate> = schedule
        .dates_for(&high.id)
        .into_iter()
        .filter(|d| day_bucket(ctx.calendar, *d) != CoverageType::Weekday)
        .collect();
    let weekdays: Vec<NaiveDate> = schedule
        .dates_for(&low.id)
        .into_iter()
        .filter(|d| day_bucket(ctx.calendar, *d) == CoverageType::Weekday)
        .collect();

    for heavy_date in &heavy_dates {
        for weekday in &weekdays {
            let mut trial = schedule.clone();
            trial.unassign(*heavy_date);
            trial.unassign(*weekday);
            if !call_ineligibility(&trial, ctx, config, low, *heavy_date).is_empty() {
                continue;
            }
            trial.assign(*heavy_date, &low.id);
            if call_ineligibility(&trial, ctx, config, high, *weekday).is_empty() {
                return Some((*heavy_date, *weekday));
            }
        }
    }
    None
}

/// Assigns (`Some`) or clears (`None`) primary call on one date.
///
/// Returns the new schedule; the input is never modified.
pub fn apply_call_assignment(
    schedule: &CallSchedule,
    ctx: &DutyContext<'_>,
    config: &CallConfig,
    date: NaiveDate,
    fellow_id: Option<&str>,
) -> EditResult<CallSchedule> {
    if !ctx.calendar.contains(date) {
        return Err(EditError::DateOutOfRange(date));
    }
    let mut next = schedule.clone();
    next.unassign(date);
    let Some(fellow_id) = fellow_id else {
        return Ok(next);
    };
    let fellow = ctx
        .fellow(fellow_id)
        .ok_or_else(|| EditError::UnknownFellow(fellow_id.to_string()))?;
    let reasons = call_ineligibility(&next, ctx, config, fellow, date);
    if !reasons.is_empty() {
        return Err(EditError::Ineligible {
            fellow: fellow.id.clone(),
            reasons,
        });
    }
    next.assign(date, &fellow.id);
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AcademicCalendar, Rotation, RotationSchedule, TrainingLevel};
    use crate::validation::audit_call;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn roster() -> Vec<Fellow> {
        vec![
            Fellow::new("a1", TrainingLevel::Pgy4),
            Fellow::new("a2", TrainingLevel::Pgy4),
            Fellow::new("b1", TrainingLevel::Pgy5),
            Fellow::new("b2", TrainingLevel::Pgy5),
            Fellow::new("c1", TrainingLevel::Pgy6),
            Fellow::new("c2", TrainingLevel::Pgy6),
        ]
    }

    fn roomy() -> CallConfig {
        let mut config = CallConfig::default();
        for level in TrainingLevel::ALL {
            config = config
                .with_max_calls(level, 100)
                .with_max_weekend_holiday(level, 40);
        }
        config
    }

    #[test]
    fn test_day_bucket() {
        let cal = AcademicCalendar::for_year(2024);
        assert_eq!(day_bucket(&cal, date(2024, 7, 4)), CoverageType::Holiday);
        assert_eq!(day_bucket(&cal, date(2024, 7, 6)), CoverageType::Weekend);
        assert_eq!(day_bucket(&cal, date(2024, 7, 8)), CoverageType::Weekday);
    }

    #[test]
    fn test_build_covers_year_and_respects_rules() {
        let cal = AcademicCalendar::for_year(2024);
        let fellows = roster();
        let ctx = DutyContext::new(&fellows, &cal);
        let config = roomy();

        let outcome = build_primary_call(&ctx, &config, &RetryPolicy::deterministic());
        assert!(outcome.success, "{:?}", outcome.errors);
        assert_eq!(outcome.schedule.days.len(), 365);
        assert!(audit_call(&outcome.schedule, &ctx, &config).is_empty());
        assert_eq!(outcome.schedule.fellow_on(date(2024, 7, 1)), Some("a1"));
    }

    #[test]
    fn test_build_reports_uncovered_dates() {
        let cal = AcademicCalendar::for_year(2024);
        let fellows = vec![Fellow::new("a1", TrainingLevel::Pgy4)];
        let ctx = DutyContext::new(&fellows, &cal);
        let config = CallConfig::default();

        let outcome = build_primary_call(&ctx, &config, &RetryPolicy::deterministic());
        assert!(!outcome.success);
        assert_eq!(outcome.uncovered.len(), 365 - outcome.schedule.days.len());
        assert_eq!(outcome.uncovered.len(), outcome.errors.len());
        assert!(outcome.schedule.count("a1") <= 60);
        assert!(audit_call(&outcome.schedule, &ctx, &config).is_empty());
    }

    #[test]
    fn test_excluded_rotation_blocks_call() {
        let cal = AcademicCalendar::for_year(2024);
        let fellows = roster();
        let mut pgy4 = RotationSchedule::new(TrainingLevel::Pgy4);
        pgy4.set("a1", "JUL1", Rotation::Vacation);
        let ctx = DutyContext::new(&fellows, &cal).with_rotations([&pgy4]);
        let config = roomy();

        let outcome = build_primary_call(&ctx, &config, &RetryPolicy::deterministic());
        for day in 1..=15 {
            assert_ne!(outcome.schedule.fellow_on(date(2024, 7, day)), Some("a1"));
        }
        let ineligible =
            ineligible_call_fellows_with_reasons(&CallSchedule::new(), &ctx, &config, date(2024, 7, 3));
        assert_eq!(ineligible.len(), 1);
        assert_eq!(ineligible[0].fellow.id, "a1");
        assert!(matches!(
            ineligible[0].reasons[0],
            IneligibleReason::OnRotation { rotation: Rotation::Vacation, .. }
        ));
    }

    #[test]
    fn test_apply_call_assignment() {
        let cal = AcademicCalendar::for_year(2024);
        let fellows = roster();
        let ctx = DutyContext::new(&fellows, &cal);
        let config = CallConfig::default();
        let mut s = CallSchedule::new();
        s.assign(date(2024, 7, 10), "b1");

        let err = apply_call_assignment(&s, &ctx, &config, date(2024, 7, 11), Some("b1")).unwrap_err();
        assert!(matches!(err, EditError::Ineligible { .. }));
        assert_eq!(s.days.len(), 1);

        let next = apply_call_assignment(&s, &ctx, &config, date(2024, 7, 13), Some("b1")).unwrap();
        assert_eq!(next.count("b1"), 2);

        let next = apply_call_assignment(&next, &ctx, &config, date(2024, 7, 10), None).unwrap();
        assert_eq!(next.dates_for("b1"), vec![date(2024, 7, 13)]);

        assert_eq!(
            apply_call_assignment(&s, &ctx, &config, date(2024, 7, 12), Some("zz")),
            Err(EditError::UnknownFellow("zz".into()))
        );
        assert_eq!(
            apply_call_assignment(&s, &ctx, &config, date(2025, 7, 1), Some("b1")),
            Err(EditError::DateOutOfRange(date(2025, 7, 1)))
        );
        assert_eq!(
            eligible_call_fellows(&s, &ctx, &config, date(2024, 7, 11))
                .iter()
                .map(|f| f.id.as_str())
                .collect::<Vec<_>>(),
            vec!["a1", "a2", "b2", "c1", "c2"]
        );
    }

    #[test]
    fn test_weekend_equity_swaps_keep_totals() {
        let cal = AcademicCalendar::for_year(2024);
        let fellows = vec![
            Fellow::new("x", TrainingLevel::Pgy5),
            Fellow::new("y", TrainingLevel::Pgy5),
        ];
        let ctx = DutyContext::new(&fellows, &cal);
        let config = CallConfig::default();

        let mut s = CallSchedule::new();
        // x: four Saturdays; y: four Wednesdays.
        for d in [6, 13, 20, 27] {
            s.assign(date(2024, 7, d), "x");
        }
        for d in [3, 10, 17, 24] {
            s.assign(date(2024, 7, d), "y");
        }

        let (balanced, swaps) = optimize_weekend_equity(&s, &["x", "y"], &ctx, &config);
        assert!(swaps >= 1);
        assert_eq!(balanced.count("x"), 4);
        assert_eq!(balanced.count("y"), 4);
        let hx = heavy_load(&balanced, &cal, "x");
        let hy = heavy_load(&balanced, &cal, "y");
        assert!(hx.abs_diff(hy) <= 1, "{hx} vs {hy}");
        assert!(audit_call(&balanced, &ctx, &config).is_empty());
    }
}
