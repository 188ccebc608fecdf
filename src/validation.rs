//! Input validation and schedule audits.
//!
//! [`validate_setup`] checks the roster and calendar before any solver runs.
//! Detects:
//! - Duplicate fellow IDs
//! - Blank IDs or names
//! - Preferred vacation keys that are not block keys
//! - Empty rosters and invalid calendars
//!
//! The `audit_*` functions re-check a whole produced schedule against its
//! hard rules. Solvers place units one at a time, so a local decision can
//! still break a global rule; the audits are the final word.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{Days, NaiveDate};

use crate::config::{BucketQuota, CallConfig, Grouping, HfConfig, RotationConfig};
use crate::models::{
    AcademicCalendar, CallSchedule, ClinicSchedule, CoveragePartition, CoverageType, Fellow,
    HfSchedule, JeopardySchedule, Rotation, RotationSchedule, TrainingLevel, Violation,
    ViolationType,
};
use crate::scheduler::{blocks_may_abut, day_bucket, DutyContext};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two fellows share the same ID.
    DuplicateId,
    /// A fellow has a blank ID or a whitespace-only name.
    BlankField,
    /// A preferred vacation key is not a block key of the year.
    UnknownBlockKey,
    /// The roster is empty.
    EmptyRoster,
    /// The calendar start date is not July 1.
    InvalidCalendar,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates the roster and calendar.
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_setup(fellows: &[Fellow], calendar: &AcademicCalendar) -> ValidationResult {
    let mut errors = Vec::new();

    if !calendar.is_valid() {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidCalendar,
            format!("Academic year must start on July 1, got {}", calendar.start()),
        ));
    }
    if fellows.is_empty() {
        errors.push(ValidationError::new(
            ValidationErrorKind::EmptyRoster,
            "Roster has no fellows",
        ));
    }

    let mut ids = HashSet::new();
    for fellow in fellows {
        if fellow.id.trim().is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::BlankField,
                "Fellow with blank ID",
            ));
        } else if !ids.insert(fellow.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate fellow ID: {}", fellow.id),
            ));
        }

        if !fellow.name.is_empty() && fellow.name.trim().is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::BlankField,
                format!("Fellow '{}' has a blank name", fellow.id),
            ));
        }

        // An invalid calendar has no keys; that is already reported above.
        if calendar.is_valid() {
            for key in &fellow.vacation_preferences {
                if calendar.block(key).is_none() {
                    errors.push(ValidationError::new(
                        ValidationErrorKind::UnknownBlockKey,
                        format!("Fellow '{}' prefers unknown block '{key}'", fellow.id),
                    ));
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// ================================
// Rotation audit
// ================================

/// Audits a cohort's rotation schedule.
///
/// Checks:
/// 1. Every block of every fellow is assigned
/// 2. Capacity one per (block, label), across levels for cross-level labels
/// 3. Vacation cap per block across levels
/// 4. Vacation count, spacing and blackout
/// 5. Requirement counts, non-consecutive months, second half, adjacency
///    and whole-month grouping
/// 6. Exactly one early placement per fellow
pub fn audit_rotations(
    schedule: &RotationSchedule,
    fellows: &[&Fellow],
    calendar: &AcademicCalendar,
    config: &RotationConfig,
    other_levels: &[&RotationSchedule],
) -> Vec<Violation> {
    let mut violations = Vec::new();
    let table = config.table(schedule.level);
    let month_of = |key: &str| calendar.block(key).map(|b| b.month_index);
    let others_holding = |key: &str, rotation: Rotation| -> usize {
        other_levels
            .iter()
            .filter(|s| s.level != schedule.level)
            .map(|s| s.holders(key, rotation).len())
            .sum()
    };

    for block in calendar.blocks() {
        let mut by_rotation: BTreeMap<Rotation, usize> = BTreeMap::new();
        for fellow in fellows {
            if let Some(rotation) = schedule.get(&fellow.id, &block.key) {
                *by_rotation.entry(rotation).or_default() += 1;
            }
        }
        for (rotation, n) in by_rotation {
            if rotation.is_fill() {
                continue;
            }
            if rotation == Rotation::Vacation {
                let total = n + others_holding(block.key.as_str(), rotation);
                if total > config.vacation.max_per_block {
                    violations.push(Violation::capacity_exceeded(
                        &block.key,
                        format!(
                            "{total} fellows on vacation in {} (max {})",
                            block.key, config.vacation.max_per_block
                        ),
                    ));
                }
                continue;
            }
            let total = if config.is_cross_level(rotation) {
                n + others_holding(block.key.as_str(), rotation)
            } else {
                n
            };
            if total > 1 {
                violations.push(Violation::capacity_exceeded(
                    &block.key,
                    format!("{total} fellows on {rotation} in {}", block.key),
                ));
            }
        }
    }

    for fellow in fellows {
        let id = fellow.id.as_str();
        let unassigned = calendar
            .blocks()
            .iter()
            .filter(|b| schedule.get(id, &b.key).is_none())
            .count();
        if unassigned > 0 {
            violations.push(Violation::new(
                ViolationType::Custom("unassigned".into()),
                id,
                format!("{id} has {unassigned} unassigned block(s)"),
            ));
        }

        let vacation: Vec<usize> = schedule
            .blocks_with(id, Rotation::Vacation)
            .iter()
            .filter_map(|k| calendar.block_index(k))
            .collect();
        if vacation.len() != config.vacation.blocks_per_fellow {
            violations.push(Violation::new(
                ViolationType::QuotaMismatch,
                id,
                format!(
                    "{id} has {} vacation block(s), expected {}",
                    vacation.len(),
                    config.vacation.blocks_per_fellow
                ),
            ));
        }
        for (n, a) in vacation.iter().enumerate() {
            for b in &vacation[n + 1..] {
                if a.abs_diff(*b) < config.vacation.min_spacing_blocks {
                    violations.push(Violation::spacing(
                        id,
                        format!("{id} has vacation blocks {a} and {b} closer than {}", config.vacation.min_spacing_blocks),
                    ));
                }
            }
        }

        let Some(table) = table else {
            continue;
        };
        for key in schedule.blocks_with(id, Rotation::Vacation) {
            if table.vacation_blackout.iter().any(|k| k == key) {
                violations.push(Violation::new(
                    ViolationType::Custom("blackout".into()),
                    id,
                    format!("{id} has vacation in protected block {key}"),
                ));
            }
        }

        for requirement in &table.requirements {
            let rotation = requirement.rotation;
            let keys = schedule.blocks_with(id, rotation);
            if keys.len() != requirement.blocks {
                violations.push(Violation::new(
                    ViolationType::QuotaMismatch,
                    id,
                    format!(
                        "{id} has {} {rotation} block(s), expected {}",
                        keys.len(),
                        requirement.blocks
                    ),
                ));
            }
            let whole = requirement.grouping == Grouping::WholeMonths;
            let months: BTreeSet<usize> = keys.iter().filter_map(|&k| month_of(k)).collect();
            if requirement.non_consecutive {
                // Both halves of one month are a single placement only for whole months.
                let mut sorted: Vec<usize> = if whole {
                    months.iter().copied().collect()
                } else {
                    keys.iter().filter_map(|&k| month_of(k)).collect()
                };
                sorted.sort_unstable();
                if sorted.windows(2).any(|w| w[1] - w[0] <= 1) {
                    violations.push(Violation::new(
                        ViolationType::NonConsecutive,
                        id,
                        format!("{id} has {rotation} in consecutive months"),
                    ));
                }
            }
            if requirement.second_half_only && months.iter().any(|m| *m < 6) {
                violations.push(Violation::new(
                    ViolationType::Custom("second_half".into()),
                    id,
                    format!("{id} has {rotation} before January"),
                ));
            }
            if let Some(other) = requirement.not_adjacent_to {
                let other_months: BTreeSet<usize> = schedule
                    .blocks_with(id, other)
                    .iter()
                    .filter_map(|&k| month_of(k))
                    .collect();
                let adjacent = months
                    .iter()
                    .any(|m| other_months.iter().any(|o| m.abs_diff(*o) <= 1));
                if adjacent {
                    violations.push(Violation::new(
                        ViolationType::NonConsecutive,
                        id,
                        format!("{id} has {rotation} next to {other}"),
                    ));
                }
            }
            if whole {
                let split = keys.iter().find(|&&k| {
                    calendar
                        .block_index(k)
                        .and_then(|i| calendar.blocks().get(i ^ 1))
                        .is_some_and(|partner| schedule.get(id, &partner.key) != Some(rotation))
                });
                if let Some(key) = split {
                    violations.push(Violation::new(
                        ViolationType::Custom("split_month".into()),
                        id,
                        format!("{id} has {rotation} in a split month ({key})"),
                    ));
                }
            }
        }

        if let Some(early) = &table.early {
            let held = early
                .keys
                .iter()
                .filter(|k| schedule.get(id, k) == Some(early.rotation))
                .count();
            if held != 1 {
                violations.push(Violation::new(
                    ViolationType::QuotaMismatch,
                    id,
                    format!(
                        "{id} holds {held} early {} placement(s), expected 1",
                        early.rotation
                    ),
                ));
            }
        }
    }

    violations
}

// ================================
// Duty audits
// ================================

/// Audits a primary-call schedule: yearly and weekend/holiday maxima,
/// spacing between calls and excluded rotations.
pub fn audit_call(schedule: &CallSchedule, ctx: &DutyContext<'_>, config: &CallConfig) -> Vec<Violation> {
    let mut violations = Vec::new();
    for fellow in ctx.fellows {
        let dates = schedule.dates_for(&fellow.id);
        if dates.is_empty() {
            continue;
        }
        let max = config.max_calls.get(&fellow.level).copied().unwrap_or(0);
        if dates.len() as u32 > max {
            violations.push(Violation::capacity_exceeded(
                &fellow.id,
                format!("{} has {} calls (max {max})", fellow.id, dates.len()),
            ));
        }
        let heavy = dates
            .iter()
            .filter(|d| day_bucket(ctx.calendar, **d) != CoverageType::Weekday)
            .count() as u32;
        let heavy_max = config.max_weekend_holiday.get(&fellow.level).copied().unwrap_or(max);
        if heavy > heavy_max {
            violations.push(Violation::capacity_exceeded(
                &fellow.id,
                format!("{} has {heavy} weekend/holiday calls (max {heavy_max})", fellow.id),
            ));
        }
        for pair in dates.windows(2) {
            if (pair[1] - pair[0]).num_days() < config.min_days_between {
                violations.push(Violation::spacing(
                    &fellow.id,
                    format!("{} has calls on {} and {}", fellow.id, pair[0], pair[1]),
                ));
            }
        }
        for date in &dates {
            if let Some(rotation) = ctx.rotation_on(fellow, *date) {
                if config.excluded_rotations.contains(&rotation) {
                    violations.push(Violation::new(
                        ViolationType::DoubleBooked,
                        &fellow.id,
                        format!("{} is on call {date} during {rotation}", fellow.id),
                    ));
                }
            }
        }
    }
    violations
}

/// Audits a jeopardy schedule: atomic blocks, counter ledger, quotas,
/// adjacent blocks and same-day conflicts with primary call and HF coverage.
pub fn audit_jeopardy(
    schedule: &JeopardySchedule,
    partition: &CoveragePartition,
    ctx: &DutyContext<'_>,
    quotas: &BTreeMap<TrainingLevel, BucketQuota>,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    for block in partition.blocks() {
        let holders: Vec<Option<&str>> = block.dates.iter().map(|d| schedule.fellow_on(*d)).collect();
        let assigned = holders.iter().flatten().collect::<BTreeSet<_>>();
        let partial = holders.iter().any(Option::is_none) && !assigned.is_empty();
        if partial || assigned.len() > 1 {
            violations.push(Violation::new(
                ViolationType::PartialBlock,
                block.start().to_string(),
                format!("{} is not assigned as one unit", block.describe()),
            ));
        }
    }

    if !schedule.counters_consistent(|d| partition.type_of(d)) {
        violations.push(Violation::new(
            ViolationType::QuotaMismatch,
            "counters",
            "jeopardy counters disagree with assigned days",
        ));
    }

    for (fellow_id, counters) in &schedule.counters {
        let Some(fellow) = ctx.fellow(fellow_id) else {
            violations.push(Violation::new(
                ViolationType::Custom("unknown_fellow".into()),
                fellow_id,
                format!("{fellow_id} is not on the roster"),
            ));
            continue;
        };
        let quota = quotas.get(&fellow.level).copied().unwrap_or_default();
        // The last holiday run admitted under the quota may overshoot it.
        let longest_holiday = partition
            .of_type(CoverageType::Holiday)
            .filter(|b| schedule.fellow_on(b.start()) == Some(fellow_id.as_str()))
            .map(|b| b.len_days())
            .max()
            .unwrap_or(0);
        for bucket in [CoverageType::Holiday, CoverageType::Weekend, CoverageType::Weekday] {
            let used = counters.get(bucket);
            let over = match bucket {
                CoverageType::Holiday => {
                    used > quota.get(bucket)
                        && used.saturating_sub(longest_holiday) >= quota.get(bucket)
                }
                CoverageType::Weekend | CoverageType::Weekday => used > quota.get(bucket),
            };
            if over {
                violations.push(Violation::capacity_exceeded(
                    fellow_id,
                    format!(
                        "{fellow_id} has {used} {bucket} jeopardy days (quota {})",
                        quota.get(bucket)
                    ),
                ));
            }
        }
    }

    for block in partition.blocks() {
        let Some(holder) = schedule.fellow_on(block.start()) else {
            continue;
        };
        let after = block.end().checked_add_days(Days::new(1));
        let Some(next) = after.and_then(|d| partition.block_for(d)) else {
            continue;
        };
        if schedule.fellow_on(next.start()) == Some(holder)
            && !blocks_may_abut(block.coverage_type, next.coverage_type)
        {
            violations.push(Violation::spacing(
                holder,
                format!("{holder} holds {} and {}", block.describe(), next.describe()),
            ));
        }
    }

    for (date, fellow_id) in &schedule.days {
        if ctx.on_call(fellow_id, *date) || ctx.on_hf(fellow_id, *date) {
            violations.push(double_booked(fellow_id, *date, "jeopardy"));
        }
    }
    violations
}

/// Audits an HF schedule: units match coverage blocks, quotas, unit spacing
/// and same-day conflicts with primary call.
pub fn audit_hf(
    schedule: &HfSchedule,
    partition: &CoveragePartition,
    ctx: &DutyContext<'_>,
    config: &HfConfig,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    for (start, unit) in &schedule.units {
        let matches = partition
            .block_for(*start)
            .is_some_and(|b| b.dates == unit.dates && b.coverage_type != CoverageType::Weekday);
        if !matches {
            violations.push(Violation::new(
                ViolationType::PartialBlock,
                start.to_string(),
                format!("HF unit starting {start} is not a weekend or holiday block"),
            ));
        }
        for date in &unit.dates {
            if ctx.on_call(&unit.fellow, *date) {
                violations.push(double_booked(&unit.fellow, *date, "HF"));
            }
        }
    }

    for fellow in ctx.fellows {
        let starts = schedule.unit_starts_for(&fellow.id);
        if starts.is_empty() {
            continue;
        }
        let quota = config.quotas.get(&fellow.level).copied().unwrap_or_default();
        let used = schedule.counters_for(&fellow.id);
        if used.weekend > quota.weekend || used.holiday > quota.holiday {
            violations.push(Violation::capacity_exceeded(
                &fellow.id,
                format!(
                    "{} has {}/{} weekend and {}/{} holiday HF days",
                    fellow.id, used.weekend, quota.weekend, used.holiday, quota.holiday
                ),
            ));
        }
        for pair in starts.windows(2) {
            if (pair[1] - pair[0]).num_days() <= config.min_days_between_units {
                violations.push(Violation::spacing(
                    &fellow.id,
                    format!("{} has HF units starting {} and {}", fellow.id, pair[0], pair[1]),
                ));
            }
        }
    }
    violations
}

/// Audits a clinic schedule: one clinic per fellow per day and no clinic on
/// a primary-call day.
pub fn audit_clinic(schedule: &ClinicSchedule, ctx: &DutyContext<'_>) -> Vec<Violation> {
    let mut violations = Vec::new();
    for (date, sessions) in &schedule.sessions {
        let mut seen = HashSet::new();
        for session in sessions.values() {
            if !seen.insert(session.fellow.as_str()) {
                violations.push(double_booked(&session.fellow, *date, "two clinics"));
            }
            if ctx.on_call(&session.fellow, *date) {
                violations.push(double_booked(&session.fellow, *date, "clinic"));
            }
        }
    }
    violations
}

fn double_booked(fellow_id: &str, date: NaiveDate, duty: &str) -> Violation {
    Violation::new(
        ViolationType::DoubleBooked,
        fellow_id,
        format!("{fellow_id} is double-booked on {date} ({duty})"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CoverageBlock, TrainingLevel};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_valid_setup() {
        let cal = AcademicCalendar::for_year(2024);
        let fellows = vec![
            Fellow::new("F1", TrainingLevel::Pgy4).with_vacation_preference("DEC2"),
            Fellow::new("F2", TrainingLevel::Pgy5).with_name("Dr. B"),
        ];
        assert!(validate_setup(&fellows, &cal).is_ok());
    }

    #[test]
    fn test_duplicate_fellow_id() {
        let cal = AcademicCalendar::for_year(2024);
        let fellows = vec![
            Fellow::new("F1", TrainingLevel::Pgy4),
            Fellow::new("F1", TrainingLevel::Pgy5),
        ];
        let errors = validate_setup(&fellows, &cal).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::DuplicateId));
    }

    #[test]
    fn test_unknown_vacation_key() {
        let cal = AcademicCalendar::for_year(2024);
        let fellows = vec![Fellow::new("F1", TrainingLevel::Pgy4).with_vacation_preference("DEC3")];
        let errors = validate_setup(&fellows, &cal).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::UnknownBlockKey && e.message.contains("DEC3")));
    }

    #[test]
    fn test_multiple_errors() {
        let cal = AcademicCalendar::new(date(2024, 8, 1));
        let errors = validate_setup(&[], &cal).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::InvalidCalendar));

        let cal = AcademicCalendar::for_year(2024);
        let fellows = vec![
            Fellow::new(" ", TrainingLevel::Pgy4),
            Fellow::new("F2", TrainingLevel::Pgy4).with_name("  "),
        ];
        let errors = validate_setup(&fellows, &cal).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.kind == ValidationErrorKind::BlankField));
    }

    #[test]
    fn test_rotation_audit_flags_capacity_and_spacing() {
        let cal = AcademicCalendar::for_year(2024);
        let config = RotationConfig::default();
        let a = Fellow::new("a", TrainingLevel::Pgy5);
        let b = Fellow::new("b", TrainingLevel::Pgy5);
        let mut s = RotationSchedule::new(TrainingLevel::Pgy5);
        s.set("a", "OCT1", Rotation::Cath);
        s.set("b", "OCT1", Rotation::Cath);
        s.set("a", "JAN1", Rotation::Vacation);
        s.set("a", "JAN2", Rotation::Vacation);

        let v = audit_rotations(&s, &[&a, &b], &cal, &config, &[]);
        assert!(v
            .iter()
            .any(|x| x.violation_type == ViolationType::CapacityExceeded && x.entity_id == "OCT1"));
        assert!(v
            .iter()
            .any(|x| x.violation_type == ViolationType::SpacingViolation && x.entity_id == "a"));
        assert!(v
            .iter()
            .any(|x| x.violation_type == ViolationType::QuotaMismatch && x.entity_id == "b"));
    }

    #[test]
    fn test_rotation_audit_cross_level() {
        let cal = AcademicCalendar::for_year(2024);
        let config = RotationConfig::default();
        let a = Fellow::new("a", TrainingLevel::Pgy5);
        let mut s = RotationSchedule::new(TrainingLevel::Pgy5);
        s.set("a", "NOV1", Rotation::Ccu);
        let mut other = RotationSchedule::new(TrainingLevel::Pgy4);
        other.set("x", "NOV1", Rotation::Ccu);
        other.set("y", "NOV1", Rotation::Cath);
        s.set("a", "DEC1", Rotation::Cath);
        other.set("y", "DEC1", Rotation::Cath);

        let v = audit_rotations(&s, &[&a], &cal, &config, &[&other]);
        let capacity: Vec<&str> = v
            .iter()
            .filter(|x| x.violation_type == ViolationType::CapacityExceeded)
            .map(|x| x.entity_id.as_str())
            .collect();
        assert_eq!(capacity, vec!["NOV1"]);
    }

    #[test]
    fn test_rotation_audit_same_month_singles() {
        let cal = AcademicCalendar::for_year(2024);
        let config = RotationConfig::default();
        let c = Fellow::new("c", TrainingLevel::Pgy6);
        let mut s = RotationSchedule::new(TrainingLevel::Pgy6);
        s.set("c", "OCT1", Rotation::Consults);
        s.set("c", "OCT2", Rotation::Consults);

        let v = audit_rotations(&s, &[&c], &cal, &config, &[]);
        assert!(v.iter().any(|x| x.violation_type == ViolationType::NonConsecutive
            && x.message == "c has consults in consecutive months"));

        let a = Fellow::new("a", TrainingLevel::Pgy4);
        let mut s = RotationSchedule::new(TrainingLevel::Pgy4);
        s.set("a", "MAR1", Rotation::Echo);
        s.set("a", "MAR2", Rotation::Echo);
        let v = audit_rotations(&s, &[&a], &cal, &config, &[]);
        assert!(!v.iter().any(|x| x.violation_type == ViolationType::NonConsecutive));
    }

    #[test]
    fn test_rotation_audit_split_month() {
        let cal = AcademicCalendar::for_year(2024);
        let config = RotationConfig::default();
        let a = Fellow::new("a", TrainingLevel::Pgy5);
        let b = Fellow::new("b", TrainingLevel::Pgy5);
        let mut s = RotationSchedule::new(TrainingLevel::Pgy5);
        s.set("a", "FEB1", Rotation::Cath);
        s.set("a", "MAR2", Rotation::Cath);
        s.set("b", "APR1", Rotation::Cath);
        s.set("b", "APR2", Rotation::Cath);

        let v = audit_rotations(&s, &[&a, &b], &cal, &config, &[]);
        let split: Vec<&str> = v
            .iter()
            .filter(|x| x.violation_type == ViolationType::Custom("split_month".into()))
            .map(|x| x.entity_id.as_str())
            .collect();
        assert_eq!(split, vec!["a"]);
    }

    #[test]
    fn test_jeopardy_audit_adjacent_weekdays() {
        let cal = AcademicCalendar::for_year(2024);
        let partition = CoveragePartition::for_calendar(&cal).unwrap();
        let fellows = vec![Fellow::new("X", TrainingLevel::Pgy5)];
        let ctx = DutyContext::new(&fellows, &cal);
        let quotas = BTreeMap::from([(TrainingLevel::Pgy5, BucketQuota::new(20, 8, 4))]);

        let mut s = JeopardySchedule::new();
        s.assign_block(partition.block_for(date(2024, 8, 6)).unwrap(), "X");
        assert!(audit_jeopardy(&s, &partition, &ctx, &quotas).is_empty());
        s.assign_block(partition.block_for(date(2024, 8, 7)).unwrap(), "X");
        let v = audit_jeopardy(&s, &partition, &ctx, &quotas);
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].violation_type, ViolationType::SpacingViolation);
        assert_eq!(v[0].entity_id, "X");
    }

    #[test]
    fn test_jeopardy_audit_holiday_overshoot() {
        let cal = AcademicCalendar::for_year(2024);
        let partition = CoveragePartition::for_calendar(&cal).unwrap();
        let fellows = vec![Fellow::new("X", TrainingLevel::Pgy5)];
        let ctx = DutyContext::new(&fellows, &cal);
        let quotas = BTreeMap::from([(TrainingLevel::Pgy5, BucketQuota::new(20, 8, 1))]);
        let holidays: Vec<&CoverageBlock> = partition.of_type(CoverageType::Holiday).collect();

        let mut s = JeopardySchedule::new();
        s.assign_block(holidays[0], "X");
        assert!(audit_jeopardy(&s, &partition, &ctx, &quotas).is_empty());

        s.assign_block(holidays[1], "X");
        let v = audit_jeopardy(&s, &partition, &ctx, &quotas);
        assert!(v
            .iter()
            .any(|x| x.violation_type == ViolationType::CapacityExceeded && x.entity_id == "X"));
    }

    #[test]
    fn test_jeopardy_audit_partial_block() {
        let cal = AcademicCalendar::for_year(2024);
        let partition = CoveragePartition::for_calendar(&cal).unwrap();
        let fellows = vec![Fellow::new("X", TrainingLevel::Pgy5)];
        let ctx = DutyContext::new(&fellows, &cal);
        let quotas = BTreeMap::from([(TrainingLevel::Pgy5, BucketQuota::new(20, 8, 4))]);

        let mut s = JeopardySchedule::new();
        s.days.insert(date(2024, 8, 10), "X".into());
        s.recount(|d| partition.type_of(d));
        let v = audit_jeopardy(&s, &partition, &ctx, &quotas);
        assert!(v.iter().any(|x| x.violation_type == ViolationType::PartialBlock));

        let weekend = CoverageBlock {
            coverage_type: CoverageType::Weekend,
            dates: vec![date(2024, 8, 10), date(2024, 8, 11)],
            label: None,
        };
        let mut s = JeopardySchedule::new();
        s.assign_block(&weekend, "X");
        assert!(audit_jeopardy(&s, &partition, &ctx, &quotas).is_empty());
    }

    #[test]
    fn test_call_audit_spacing_and_quota() {
        let cal = AcademicCalendar::for_year(2024);
        let fellows = vec![Fellow::new("X", TrainingLevel::Pgy6)];
        let ctx = DutyContext::new(&fellows, &cal);
        let config = CallConfig::default().with_max_calls(TrainingLevel::Pgy6, 1);

        let mut s = CallSchedule::new();
        s.assign(date(2024, 7, 8), "X");
        s.assign(date(2024, 7, 9), "X");
        let v = audit_call(&s, &ctx, &config);
        assert!(v.iter().any(|x| x.violation_type == ViolationType::SpacingViolation));
        assert!(v.iter().any(|x| x.violation_type == ViolationType::CapacityExceeded));
    }

    #[test]
    fn test_clinic_audit_double_booking() {
        use crate::models::ClinicSession;
        use chrono::Weekday;

        let cal = AcademicCalendar::for_year(2024);
        let fellows = vec![Fellow::new("X", TrainingLevel::Pgy5)];
        let mut call = CallSchedule::new();
        call.assign(date(2024, 7, 9), "X");
        let ctx = DutyContext::new(&fellows, &cal).with_call(&call);

        let mut s = ClinicSchedule::new();
        s.assign(
            date(2024, 7, 9),
            ClinicSession {
                fellow: "X".into(),
                clinic_type: "general".into(),
                weekday: Weekday::Tue,
                block_key: "JUL1".into(),
            },
        );
        let v = audit_clinic(&s, &ctx);
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].violation_type, ViolationType::DoubleBooked);
    }
}
