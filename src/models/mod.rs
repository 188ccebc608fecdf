//! Scheduling domain models.
//!
//! Provides the data types shared by every solver: the academic calendar
//! and its half-month blocks, fellows, rotation schedules, coverage
//! blocks, and the duty schedules each solver produces.
//!
//! # Duty Mappings
//!
//! | Duty | Unit | Schedule | Keyed by |
//! |------|------|----------|----------|
//! | Rotation / vacation | Block | `RotationSchedule` | fellow → block key |
//! | Primary call | Day | `CallSchedule` | ISO date |
//! | Jeopardy | Coverage block | `JeopardySchedule` | ISO date |
//! | HF coverage | Weekend / holiday run | `HfSchedule` | unit start date |
//! | Clinic | Session day | `ClinicSchedule` | ISO date → clinic type |

mod calendar;
mod coverage;
mod fellow;
mod rotation;
mod schedule;

pub use calendar::{
    academic_month_index, academic_year_blocks, block_key, last_day_of_month,
    last_weekday_of_month, nth_weekday_of_month, year_holidays, AcademicCalendar, Block, Holiday,
    HolidayKind, BLOCKS_PER_YEAR, MONTH_ABBREVIATIONS,
};
pub use coverage::{
    generate_holiday_blocks, partition_year, verify_partition, CoverageBlock, CoveragePartition,
    CoverageType, PartitionError,
};
pub use fellow::{cohort, Fellow, TrainingLevel};
pub use rotation::{Rotation, RotationSchedule};
pub use schedule::{
    CallSchedule, ClinicSchedule, ClinicSession, DutyCounters, HfAssignment, HfSchedule,
    JeopardySchedule, Violation, ViolationType,
};
