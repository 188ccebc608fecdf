//! Rule parameters for every duty type.
//!
//! Spacing days, quotas, protected keys and retry counts live here and are
//! passed into the solvers, so solver logic stays rule-agnostic and can be
//! tested against varied configurations. Every struct has a `Default`
//! matching a standard three-level cardiology fellowship and `with_*`
//! builders for overrides. The whole bundle round-trips through JSON.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{AcademicCalendar, Rotation, TrainingLevel};

/// A month/day inside the academic year (July–June).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearDate {
    /// Calendar month (1-12).
    pub month: u32,
    /// Day of month.
    pub day: u32,
}

impl YearDate {
    /// Creates a month/day.
    pub fn new(month: u32, day: u32) -> Self {
        Self { month, day }
    }

    /// Resolves to a date: July–December fall in the start year,
    /// January–June in the following one.
    pub fn resolve(&self, calendar: &AcademicCalendar) -> Option<NaiveDate> {
        let year = if self.month >= 7 {
            calendar.start().year()
        } else {
            calendar.start().year() + 1
        };
        NaiveDate::from_ymd_opt(year, self.month, self.day)
    }
}

/// Per-bucket day quota.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketQuota {
    /// Weekday days.
    pub weekday: u32,
    /// Weekend days.
    pub weekend: u32,
    /// Holiday days.
    pub holiday: u32,
}

impl BucketQuota {
    /// Creates a quota.
    pub fn new(weekday: u32, weekend: u32, holiday: u32) -> Self {
        Self {
            weekday,
            weekend,
            holiday,
        }
    }

    /// Quota for one bucket.
    pub fn get(&self, bucket: crate::models::CoverageType) -> u32 {
        use crate::models::CoverageType;
        match bucket {
            CoverageType::Weekday => self.weekday,
            CoverageType::Weekend => self.weekend,
            CoverageType::Holiday => self.holiday,
        }
    }

    /// Sum over all buckets.
    pub fn total(&self) -> u32 {
        self.weekday + self.weekend + self.holiday
    }
}

// ================================
// Rotations and vacation
// ================================

/// How a rotation's blocks are grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    /// Both halves of a month together.
    WholeMonths,
    /// Independent half-month blocks.
    Singles,
}

/// "N blocks of a rotation" for every fellow of a level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationRequirement {
    /// Rotation label.
    pub rotation: Rotation,
    /// Blocks per fellow.
    pub blocks: usize,
    /// Grouping rule.
    pub grouping: Grouping,
    /// No two placements in the same or adjacent months.
    pub non_consecutive: bool,
    /// Only January–June.
    pub second_half_only: bool,
    /// Never in a month adjacent to this rotation (same fellow).
    pub not_adjacent_to: Option<Rotation>,
}

impl RotationRequirement {
    /// Requirement placed as whole months.
    pub fn months(rotation: Rotation, blocks: usize) -> Self {
        Self {
            rotation,
            blocks,
            grouping: Grouping::WholeMonths,
            non_consecutive: false,
            second_half_only: false,
            not_adjacent_to: None,
        }
    }

    /// Requirement placed as single blocks.
    pub fn singles(rotation: Rotation, blocks: usize) -> Self {
        Self {
            grouping: Grouping::Singles,
            ..Self::months(rotation, blocks)
        }
    }

    /// Forbids consecutive months.
    pub fn non_consecutive(mut self) -> Self {
        self.non_consecutive = true;
        self
    }

    /// Restricts to the second half of the year.
    pub fn second_half_only(mut self) -> Self {
        self.second_half_only = true;
        self
    }

    /// Forbids months adjacent to another rotation.
    pub fn not_adjacent_to(mut self, other: Rotation) -> Self {
        self.not_adjacent_to = Some(other);
        self
    }
}

/// Early protected placement: every fellow gets exactly one of `keys`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarlyPlacement {
    /// Rotation placed early (counts toward its requirement).
    pub rotation: Rotation,
    /// Protected block keys.
    pub keys: Vec<String>,
}

/// Requirement table of one training level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationTable {
    /// Optional early protected placement.
    pub early: Option<EarlyPlacement>,
    /// Block keys where vacation may not be placed.
    pub vacation_blackout: Vec<String>,
    /// Requirements in placement priority order.
    pub requirements: Vec<RotationRequirement>,
}

impl RotationTable {
    /// Adds a requirement at the end of the priority order.
    pub fn with_requirement(mut self, requirement: RotationRequirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Sets the early placement.
    pub fn with_early(mut self, rotation: Rotation, keys: &[&str]) -> Self {
        self.early = Some(EarlyPlacement {
            rotation,
            keys: keys.iter().map(|k| k.to_string()).collect(),
        });
        self
    }

    /// Sets the vacation blackout keys.
    pub fn with_vacation_blackout(mut self, keys: &[&str]) -> Self {
        self.vacation_blackout = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Requirement for a rotation.
    pub fn requirement(&self, rotation: Rotation) -> Option<&RotationRequirement> {
        self.requirements.iter().find(|r| r.rotation == rotation)
    }
}

/// Vacation rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacationRules {
    /// Vacation blocks per fellow.
    pub blocks_per_fellow: usize,
    /// Minimum distance (in blocks) between a fellow's vacation blocks.
    pub min_spacing_blocks: usize,
    /// Maximum fellows on vacation in one block, across all levels.
    pub max_per_block: usize,
}

impl Default for VacationRules {
    fn default() -> Self {
        Self {
            blocks_per_fellow: 2,
            min_spacing_blocks: 6,
            max_per_block: 2,
        }
    }
}

/// Rotation/vacation solver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Vacation rules.
    pub vacation: VacationRules,
    /// Labels with capacity one across all levels.
    pub cross_level_exclusive: Vec<Rotation>,
    /// Requirement table per level.
    pub tables: BTreeMap<TrainingLevel, RotationTable>,
}

/// Protected early keys of the first-year table.
pub const EARLY_KEYS: [&str; 5] = ["JUL1", "JUL2", "AUG1", "AUG2", "SEP1"];

impl Default for RotationConfig {
    fn default() -> Self {
        use Rotation::*;

        let pgy4 = RotationTable::default()
            .with_early(Consults, &EARLY_KEYS)
            .with_vacation_blackout(&EARLY_KEYS)
            .with_requirement(RotationRequirement::months(Ccu, 2).non_consecutive())
            .with_requirement(RotationRequirement::singles(Consults, 3).non_consecutive())
            .with_requirement(RotationRequirement::months(Echo, 2).non_consecutive())
            .with_requirement(RotationRequirement::months(Cath, 2))
            .with_requirement(RotationRequirement::months(Nuclear, 2))
            .with_requirement(RotationRequirement::months(HeartFailure, 2).not_adjacent_to(Ccu))
            .with_requirement(
                RotationRequirement::singles(Ep, 2)
                    .second_half_only()
                    .non_consecutive(),
            );

        let pgy5 = RotationTable::default()
            .with_requirement(RotationRequirement::singles(Ccu, 2).non_consecutive())
            .with_requirement(RotationRequirement::months(Cath, 2))
            .with_requirement(RotationRequirement::months(Echo, 2))
            .with_requirement(RotationRequirement::months(Imaging, 2))
            .with_requirement(RotationRequirement::months(Ep, 2))
            .with_requirement(RotationRequirement::months(HeartFailure, 2));

        let pgy6 = RotationTable::default()
            .with_requirement(RotationRequirement::singles(Consults, 2).non_consecutive())
            .with_requirement(RotationRequirement::months(Research, 4).non_consecutive())
            .with_requirement(RotationRequirement::months(Imaging, 2));

        Self {
            vacation: VacationRules::default(),
            cross_level_exclusive: vec![Ccu],
            tables: BTreeMap::from([
                (TrainingLevel::Pgy4, pgy4),
                (TrainingLevel::Pgy5, pgy5),
                (TrainingLevel::Pgy6, pgy6),
            ]),
        }
    }
}

impl RotationConfig {
    /// Table for a level.
    pub fn table(&self, level: TrainingLevel) -> Option<&RotationTable> {
        self.tables.get(&level)
    }

    /// Replaces the table for a level.
    pub fn with_table(mut self, level: TrainingLevel, table: RotationTable) -> Self {
        self.tables.insert(level, table);
        self
    }

    /// Replaces the vacation rules.
    pub fn with_vacation(mut self, vacation: VacationRules) -> Self {
        self.vacation = vacation;
        self
    }

    /// Whether a label is capped across levels.
    pub fn is_cross_level(&self, rotation: Rotation) -> bool {
        self.cross_level_exclusive.contains(&rotation)
    }
}

// ================================
// Primary call
// ================================

/// Primary-call solver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallConfig {
    /// Yearly maximum calls per level. Missing level = not eligible.
    pub max_calls: BTreeMap<TrainingLevel, u32>,
    /// Yearly maximum weekend/holiday calls per level.
    pub max_weekend_holiday: BTreeMap<TrainingLevel, u32>,
    /// Minimum days between two calls of one fellow.
    pub min_days_between: i64,
    /// Rotations that make a fellow ineligible.
    pub excluded_rotations: Vec<Rotation>,
    /// Earliest call date per level.
    pub earliest_start: BTreeMap<TrainingLevel, YearDate>,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            max_calls: BTreeMap::from([
                (TrainingLevel::Pgy4, 60),
                (TrainingLevel::Pgy5, 45),
                (TrainingLevel::Pgy6, 30),
            ]),
            max_weekend_holiday: BTreeMap::from([
                (TrainingLevel::Pgy4, 16),
                (TrainingLevel::Pgy5, 12),
                (TrainingLevel::Pgy6, 8),
            ]),
            min_days_between: 3,
            excluded_rotations: vec![Rotation::Vacation, Rotation::Ccu],
            earliest_start: BTreeMap::new(),
        }
    }
}

impl CallConfig {
    /// Sets the yearly maximum for a level.
    pub fn with_max_calls(mut self, level: TrainingLevel, max: u32) -> Self {
        self.max_calls.insert(level, max);
        self
    }

    /// Sets the weekend/holiday maximum for a level.
    pub fn with_max_weekend_holiday(mut self, level: TrainingLevel, max: u32) -> Self {
        self.max_weekend_holiday.insert(level, max);
        self
    }

    /// Sets the minimum days between calls.
    pub fn with_min_days_between(mut self, days: i64) -> Self {
        self.min_days_between = days;
        self
    }

    /// Sets the earliest call date for a level.
    pub fn with_earliest_start(mut self, level: TrainingLevel, start: YearDate) -> Self {
        self.earliest_start.insert(level, start);
        self
    }
}

// ================================
// Jeopardy
// ================================

/// Jeopardy solver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JeopardyConfig {
    /// Base quotas per level. Missing level = not eligible.
    pub base_quotas: BTreeMap<TrainingLevel, BucketQuota>,
    /// The only level that may cover holidays.
    pub holiday_level: TrainingLevel,
    /// Level barred from jeopardy before `junior_start`.
    pub junior_level: TrainingLevel,
    /// First date the junior level may cover.
    pub junior_start: YearDate,
    /// Rotations that disqualify a fellow.
    pub excluded_rotations: Vec<Rotation>,
    /// Days after a primary call during which a fellow is ineligible.
    pub post_call_days: i64,
    /// Score used for `days_since_last` when a fellow has no jeopardy yet,
    /// added to the days elapsed since the year start.
    pub never_assigned_bonus: i64,
}

impl Default for JeopardyConfig {
    fn default() -> Self {
        Self {
            base_quotas: BTreeMap::from([
                (TrainingLevel::Pgy4, BucketQuota::new(20, 8, 0)),
                (TrainingLevel::Pgy5, BucketQuota::new(20, 8, 0)),
                (TrainingLevel::Pgy6, BucketQuota::new(15, 6, 0)),
            ]),
            holiday_level: TrainingLevel::Pgy5,
            junior_level: TrainingLevel::Pgy4,
            junior_start: YearDate::new(9, 1),
            excluded_rotations: vec![Rotation::Vacation, Rotation::HeartFailure, Rotation::Ccu],
            post_call_days: 2,
            never_assigned_bonus: 0,
        }
    }
}

impl JeopardyConfig {
    /// Sets the base quota of a level.
    pub fn with_quota(mut self, level: TrainingLevel, quota: BucketQuota) -> Self {
        self.base_quotas.insert(level, quota);
        self
    }

    /// Sets the holiday-eligible level.
    pub fn with_holiday_level(mut self, level: TrainingLevel) -> Self {
        self.holiday_level = level;
        self
    }

    /// Sets the junior cutoff date.
    pub fn with_junior_start(mut self, start: YearDate) -> Self {
        self.junior_start = start;
        self
    }
}

// ================================
// HF coverage
// ================================

/// HF coverage solver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HfConfig {
    /// Per-level quotas (weekend and holiday buckets). Missing level = not eligible.
    pub quotas: BTreeMap<TrainingLevel, BucketQuota>,
    /// Rotations that disqualify a fellow.
    pub excluded_rotations: Vec<Rotation>,
    /// Exclude a weekend when the fellow has primary call the Friday before.
    pub exclude_after_friday_call: bool,
    /// Two units of one fellow whose start dates are this close or closer conflict.
    pub min_days_between_units: i64,
}

impl Default for HfConfig {
    fn default() -> Self {
        Self {
            quotas: BTreeMap::from([
                (TrainingLevel::Pgy5, BucketQuota::new(0, 12, 4)),
                (TrainingLevel::Pgy6, BucketQuota::new(0, 12, 4)),
            ]),
            excluded_rotations: vec![Rotation::Vacation, Rotation::Ccu],
            exclude_after_friday_call: true,
            min_days_between_units: 7,
        }
    }
}

impl HfConfig {
    /// Sets the quota of a level.
    pub fn with_quota(mut self, level: TrainingLevel, quota: BucketQuota) -> Self {
        self.quotas.insert(level, quota);
        self
    }

    /// Sets the unit spacing.
    pub fn with_min_days_between_units(mut self, days: i64) -> Self {
        self.min_days_between_units = days;
        self
    }
}

// ================================
// Clinic
// ================================

/// A clinic type and its eligibility lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicType {
    /// Clinic type name (schedule key).
    pub name: String,
    /// Day of week the clinic runs.
    pub weekday: Weekday,
    /// Levels that may staff the clinic.
    pub eligible_levels: Vec<TrainingLevel>,
    /// Rotations during which a fellow may attend. Empty = any rotation
    /// not listed in `excluded_rotations`.
    pub eligible_rotations: Vec<Rotation>,
    /// Rotations that always disqualify.
    pub excluded_rotations: Vec<Rotation>,
}

impl ClinicType {
    /// Creates a clinic type open to every level and rotation except vacation.
    pub fn new(name: impl Into<String>, weekday: Weekday) -> Self {
        Self {
            name: name.into(),
            weekday,
            eligible_levels: TrainingLevel::ALL.to_vec(),
            eligible_rotations: Vec::new(),
            excluded_rotations: vec![Rotation::Vacation],
        }
    }

    /// Restricts levels.
    pub fn with_levels(mut self, levels: &[TrainingLevel]) -> Self {
        self.eligible_levels = levels.to_vec();
        self
    }

    /// Restricts rotations.
    pub fn with_rotations(mut self, rotations: &[Rotation]) -> Self {
        self.eligible_rotations = rotations.to_vec();
        self
    }

    /// Adds an excluded rotation.
    pub fn excluding(mut self, rotation: Rotation) -> Self {
        self.excluded_rotations.push(rotation);
        self
    }
}

/// Clinic solver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicConfig {
    /// Clinic types.
    pub clinic_types: Vec<ClinicType>,
    /// Skip sessions that fall on a holiday.
    pub skip_holidays: bool,
    /// Exclude the day after a primary call.
    pub exclude_post_call: bool,
}

impl Default for ClinicConfig {
    fn default() -> Self {
        use TrainingLevel::*;
        Self {
            clinic_types: vec![
                ClinicType::new("general", Weekday::Tue).excluding(Rotation::Ccu),
                ClinicType::new("heart_failure", Weekday::Thu)
                    .with_levels(&[Pgy5, Pgy6])
                    .with_rotations(&[Rotation::HeartFailure, Rotation::Elective, Rotation::Research]),
                ClinicType::new("device", Weekday::Wed)
                    .with_levels(&[Pgy5, Pgy6])
                    .with_rotations(&[Rotation::Ep, Rotation::Elective]),
            ],
            skip_holidays: true,
            exclude_post_call: true,
        }
    }
}

impl ClinicConfig {
    /// Clinic type by name.
    pub fn clinic(&self, name: &str) -> Option<&ClinicType> {
        self.clinic_types.iter().find(|c| c.name == name)
    }
}

// ================================
// Bundle
// ================================

/// Configuration for every solver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Rotation/vacation rules.
    pub rotation: RotationConfig,
    /// Primary-call rules.
    pub call: CallConfig,
    /// Jeopardy rules.
    pub jeopardy: JeopardyConfig,
    /// HF coverage rules.
    pub hf: HfConfig,
    /// Clinic rules.
    pub clinic: ClinicConfig,
}

impl ScheduleConfig {
    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serializes the configuration to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
