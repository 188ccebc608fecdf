//! Coverage blocks: indivisible groups of dates assigned as one unit.
//!
//! The year is partitioned into holiday runs, weekends and single
//! weekdays. A coverage block is always assigned to one fellow as a whole
//! (or left uncovered as a whole).
//!
//! # Holiday runs
//! | Holiday falls on | Run |
//! |---|---|
//! | Thanksgiving | Thu–Sun (fixed 4 days) |
//! | Monday | Sat–Mon |
//! | Friday | Fri–Sun |
//! | Saturday / Sunday | Sat–Sun |
//! | Tue / Wed / Thu | the day itself |
//!
//! Neighbouring-block checks look only at the single day before and after
//! a block; that is sound because [`verify_partition`] guarantees blocks are
//! contiguous and never overlap.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::{AcademicCalendar, Holiday};

/// Coverage block type, used for quota buckets and adjacency rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageType {
    /// Holiday run.
    Holiday,
    /// Saturday/Sunday not absorbed into a holiday run.
    Weekend,
    /// Single weekday.
    Weekday,
}

impl fmt::Display for CoverageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverageType::Holiday => f.write_str("holiday"),
            CoverageType::Weekend => f.write_str("weekend"),
            CoverageType::Weekday => f.write_str("weekday"),
        }
    }
}

/// A group of 1–4 contiguous dates assigned as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageBlock {
    /// Block type.
    pub coverage_type: CoverageType,
    /// Dates in ascending order.
    pub dates: Vec<NaiveDate>,
    /// Holiday name for holiday runs.
    pub label: Option<String>,
}

impl CoverageBlock {
    fn new(coverage_type: CoverageType, dates: Vec<NaiveDate>) -> Self {
        Self {
            coverage_type,
            dates,
            label: None,
        }
    }

    /// First date.
    pub fn start(&self) -> NaiveDate {
        self.dates[0]
    }

    /// Last date.
    pub fn end(&self) -> NaiveDate {
        self.dates[self.dates.len() - 1]
    }

    /// Number of days.
    pub fn len_days(&self) -> u32 {
        self.dates.len() as u32
    }

    /// Whether the block covers a date.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.binary_search(&date).is_ok()
    }

    /// Human-readable description, e.g. `"weekend 2024-08-10..2024-08-11"`.
    pub fn describe(&self) -> String {
        let kind = match &self.label {
            Some(label) => format!("{} ({label})", self.coverage_type),
            None => self.coverage_type.to_string(),
        };
        if self.dates.len() == 1 {
            format!("{kind} {}", self.start())
        } else {
            format!("{kind} {}..{}", self.start(), self.end())
        }
    }
}

/// A problem found while verifying a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionError {
    /// A date is claimed by two blocks.
    Overlap(NaiveDate),
    /// A date of the year is not covered by any block.
    Gap(NaiveDate),
    /// A block's dates are not consecutive.
    NonContiguous(NaiveDate),
    /// A block has no dates or more than four.
    BadLength(usize),
}

impl fmt::Display for PartitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionError::Overlap(d) => write!(f, "date {d} belongs to more than one coverage block"),
            PartitionError::Gap(d) => write!(f, "date {d} is not covered by any coverage block"),
            PartitionError::NonContiguous(d) => write!(f, "coverage block starting {d} is not contiguous"),
            PartitionError::BadLength(n) => write!(f, "coverage block has {n} days (expected 1-4)"),
        }
    }
}

/// Holiday runs of the year, clipped to the academic year.
pub fn generate_holiday_blocks(calendar: &AcademicCalendar) -> Vec<CoverageBlock> {
    let mut runs: Vec<CoverageBlock> = calendar
        .holidays()
        .iter()
        .filter_map(|h| holiday_run(h, calendar))
        .collect();
    runs.sort_by_key(|b| b.start());

    // Merge runs that touch the same dates so the partition stays disjoint.
    let mut merged: Vec<CoverageBlock> = Vec::with_capacity(runs.len());
    for run in runs {
        match merged.last_mut() {
            Some(prev) if run.start() <= prev.end() => {
                let dates: BTreeSet<NaiveDate> =
                    prev.dates.iter().chain(run.dates.iter()).copied().collect();
                prev.dates = dates.into_iter().collect();
                if let (Some(a), Some(b)) = (&prev.label, &run.label) {
                    prev.label = Some(format!("{a} / {b}"));
                }
            }
            _ => merged.push(run),
        }
    }
    merged
}

fn holiday_run(holiday: &Holiday, calendar: &AcademicCalendar) -> Option<CoverageBlock> {
    let d = holiday.date;
    let (first, len) = match holiday.fixed_span {
        Some(span) => (d, span as u64),
        None => match d.weekday() {
            Weekday::Mon => (d.checked_sub_days(Days::new(2))?, 3),
            Weekday::Fri => (d, 3),
            Weekday::Sat => (d, 2),
            Weekday::Sun => (d.checked_sub_days(Days::new(1))?, 2),
            _ => (d, 1),
        },
    };

    let dates: Vec<NaiveDate> = (0..len)
        .filter_map(|i| first.checked_add_days(Days::new(i)))
        .filter(|day| calendar.contains(*day))
        .collect();
    if dates.is_empty() {
        return None;
    }
    Some(CoverageBlock {
        coverage_type: CoverageType::Holiday,
        dates,
        label: Some(holiday.name.clone()),
    })
}

/// Partitions the whole year into holiday runs, weekends and weekdays.
///
/// Result is sorted by start date.
pub fn partition_year(calendar: &AcademicCalendar) -> Vec<CoverageBlock> {
    let holidays = generate_holiday_blocks(calendar);
    let claimed: BTreeSet<NaiveDate> = holidays.iter().flat_map(|b| b.dates.clone()).collect();

    let mut blocks = holidays;
    let mut pending_weekend: Vec<NaiveDate> = Vec::new();

    for day in calendar.dates() {
        let is_weekend = matches!(day.weekday(), Weekday::Sat | Weekday::Sun);
        if claimed.contains(&day) || !is_weekend {
            if !pending_weekend.is_empty() {
                blocks.push(CoverageBlock::new(
                    CoverageType::Weekend,
                    std::mem::take(&mut pending_weekend),
                ));
            }
            if !claimed.contains(&day) {
                blocks.push(CoverageBlock::new(CoverageType::Weekday, vec![day]));
            }
            continue;
        }
        // Sunday closes a weekend; a Saturday never follows a pending day.
        pending_weekend.push(day);
        if day.weekday() == Weekday::Sun {
            blocks.push(CoverageBlock::new(
                CoverageType::Weekend,
                std::mem::take(&mut pending_weekend),
            ));
        }
    }
    if !pending_weekend.is_empty() {
        blocks.push(CoverageBlock::new(CoverageType::Weekend, pending_weekend));
    }

    blocks.sort_by_key(|b| b.start());
    blocks
}

/// Checks that blocks are contiguous, 1–4 days long, disjoint, and cover
/// every date of the year exactly once.
pub fn verify_partition(
    blocks: &[CoverageBlock],
    calendar: &AcademicCalendar,
) -> Result<(), Vec<PartitionError>> {
    let mut errors = Vec::new();
    let mut seen: BTreeSet<NaiveDate> = BTreeSet::new();

    for block in blocks {
        if block.dates.is_empty() || block.dates.len() > 4 {
            errors.push(PartitionError::BadLength(block.dates.len()));
            continue;
        }
        for pair in block.dates.windows(2) {
            if pair[0].succ_opt() != Some(pair[1]) {
                errors.push(PartitionError::NonContiguous(block.start()));
                break;
            }
        }
        for d in &block.dates {
            if !seen.insert(*d) {
                errors.push(PartitionError::Overlap(*d));
            }
        }
    }

    for d in calendar.dates() {
        if !seen.contains(&d) {
            errors.push(PartitionError::Gap(d));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// A verified partition with a date → block index.
#[derive(Debug, Clone)]
pub struct CoveragePartition {
    blocks: Vec<CoverageBlock>,
    index: BTreeMap<NaiveDate, usize>,
}

impl CoveragePartition {
    /// Partitions and verifies the year.
    pub fn for_calendar(calendar: &AcademicCalendar) -> Result<Self, Vec<PartitionError>> {
        let blocks = partition_year(calendar);
        verify_partition(&blocks, calendar)?;
        Ok(Self::from_blocks(blocks))
    }

    fn from_blocks(blocks: Vec<CoverageBlock>) -> Self {
        let index = blocks
            .iter()
            .enumerate()
            .flat_map(|(i, b)| b.dates.iter().map(move |d| (*d, i)))
            .collect();
        Self { blocks, index }
    }

    /// All blocks in chronological order.
    pub fn blocks(&self) -> &[CoverageBlock] {
        &self.blocks
    }

    /// Block containing a date.
    pub fn block_for(&self, date: NaiveDate) -> Option<&CoverageBlock> {
        self.index.get(&date).map(|&i| &self.blocks[i])
    }

    /// Coverage type of a date.
    pub fn type_of(&self, date: NaiveDate) -> Option<CoverageType> {
        self.block_for(date).map(|b| b.coverage_type)
    }

    /// Blocks of one type, chronological.
    pub fn of_type(&self, coverage_type: CoverageType) -> impl Iterator<Item = &CoverageBlock> {
        self.blocks
            .iter()
            .filter(move |b| b.coverage_type == coverage_type)
    }

    /// Total days in holiday runs.
    pub fn holiday_days(&self) -> u32 {
        self.of_type(CoverageType::Holiday).map(|b| b.len_days()).sum()
    }

    /// Blocks in solver priority order: holidays, weekends, weekdays,
    /// chronological within each tier.
    pub fn in_priority_order(&self) -> Vec<&CoverageBlock> {
        let mut ordered: Vec<&CoverageBlock> = self.blocks.iter().collect();
        ordered.sort_by_key(|b| (b.coverage_type, b.start()));
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_monday_holiday_spans_weekend() {
        // Labor Day 2024 is Monday, September 2.
        let cal = AcademicCalendar::for_year(2024);
        let runs = generate_holiday_blocks(&cal);
        let labor = runs.iter().find(|b| b.contains(date(2024, 9, 2))).unwrap();
        assert_eq!(
            labor.dates,
            vec![date(2024, 8, 31), date(2024, 9, 1), date(2024, 9, 2)]
        );
        assert_eq!(labor.coverage_type, CoverageType::Holiday);
    }

    #[test]
    fn test_holiday_run_lengths_2024() {
        let cal = AcademicCalendar::for_year(2024);
        let runs = generate_holiday_blocks(&cal);
        let lens: Vec<u32> = runs.iter().map(|b| b.len_days()).collect();
        // Jul 4 (Thu), Labor Day, Thanksgiving, Christmas (Wed), New Year (Wed),
        // MLK, Memorial Day, Juneteenth (Thu).
        assert_eq!(lens, vec![1, 3, 4, 1, 1, 3, 3, 1]);
        let thanksgiving = &runs[2];
        assert_eq!(thanksgiving.start(), date(2024, 11, 28));
        assert_eq!(thanksgiving.end(), date(2024, 12, 1));
    }

    #[test]
    fn test_friday_and_weekend_holidays() {
        // July 4, 2025 is a Friday; June 19, 2027 is a Saturday.
        let cal = AcademicCalendar::for_year(2025);
        let runs = generate_holiday_blocks(&cal);
        let july4 = runs.iter().find(|b| b.contains(date(2025, 7, 4))).unwrap();
        assert_eq!(july4.dates, vec![date(2025, 7, 4), date(2025, 7, 5), date(2025, 7, 6)]);

        let cal = AcademicCalendar::for_year(2026);
        let runs = generate_holiday_blocks(&cal);
        let june19 = runs.iter().find(|b| b.contains(date(2027, 6, 19))).unwrap();
        assert_eq!(june19.dates, vec![date(2027, 6, 19), date(2027, 6, 20)]);
    }

    #[test]
    fn test_partition_is_verified() {
        for year in 2020..2032 {
            let cal = AcademicCalendar::for_year(year);
            let blocks = partition_year(&cal);
            assert!(verify_partition(&blocks, &cal).is_ok(), "year {year}");
        }
    }

    #[test]
    fn test_partition_types() {
        let cal = AcademicCalendar::for_year(2024);
        let p = CoveragePartition::for_calendar(&cal).unwrap();
        assert_eq!(p.type_of(date(2024, 7, 6)), Some(CoverageType::Weekend));
        assert_eq!(p.type_of(date(2024, 7, 8)), Some(CoverageType::Weekday));
        assert_eq!(p.type_of(date(2024, 8, 31)), Some(CoverageType::Holiday));
        assert_eq!(p.holiday_days(), 17);

        let weekend = p.block_for(date(2024, 7, 7)).unwrap();
        assert_eq!(weekend.dates, vec![date(2024, 7, 6), date(2024, 7, 7)]);
    }

    #[test]
    fn test_priority_order() {
        let cal = AcademicCalendar::for_year(2024);
        let p = CoveragePartition::for_calendar(&cal).unwrap();
        let ordered = p.in_priority_order();
        assert_eq!(ordered[0].coverage_type, CoverageType::Holiday);
        assert_eq!(ordered[0].start(), date(2024, 7, 4));
        let first_weekend = ordered
            .iter()
            .position(|b| b.coverage_type == CoverageType::Weekend)
            .unwrap();
        assert_eq!(first_weekend, 8);
        assert_eq!(ordered.last().unwrap().coverage_type, CoverageType::Weekday);
    }

    #[test]
    fn test_verify_detects_overlap_and_gap() {
        let cal = AcademicCalendar::for_year(2024);
        let mut blocks = partition_year(&cal);
        let dup = blocks[0].clone();
        blocks.push(dup);
        blocks.remove(1);
        let errors = verify_partition(&blocks, &cal).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, PartitionError::Overlap(_))));
        assert!(errors.iter().any(|e| matches!(e, PartitionError::Gap(_))));
    }

    #[test]
    fn test_empty_calendar_partition() {
        let cal = AcademicCalendar::new(date(2024, 3, 1));
        assert!(partition_year(&cal).is_empty());
        assert!(generate_holiday_blocks(&cal).is_empty());
    }
}
