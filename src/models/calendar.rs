//! Academic calendar, half-month blocks and holidays.
//!
//! An academic year runs July 1 through June 30 and is cut into 24
//! half-month blocks. Block keys are a month abbreviation plus the half
//! index: `JUL1` covers July 1–15, `JUL2` covers July 16–31.
//!
//! # Holidays
//! Fixed-date holidays (Independence Day, Christmas, New Year's Day,
//! Juneteenth) plus floating ones derived from weekday rules (Labor Day,
//! Thanksgiving, Martin Luther King Jr. Day, Memorial Day).
//!
//! All functions here are pure. An invalid start date (anything other
//! than July 1) yields an empty calendar rather than an error.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Month abbreviations in academic order (index 0 = July).
pub const MONTH_ABBREVIATIONS: [&str; 12] = [
    "JUL", "AUG", "SEP", "OCT", "NOV", "DEC", "JAN", "FEB", "MAR", "APR", "MAY", "JUN",
];

/// Number of blocks in a full academic year.
pub const BLOCKS_PER_YEAR: usize = 24;

/// A half-month scheduling block.
///
/// Inclusive date range: `start..=end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block key, e.g. `"SEP2"`.
    pub key: String,
    /// Academic month index (0 = July … 11 = June).
    pub month_index: usize,
    /// Half of the month (1 or 2).
    pub half: u8,
    /// First date (inclusive).
    pub start: NaiveDate,
    /// Last date (inclusive).
    pub end: NaiveDate,
}

impl Block {
    /// Whether a date falls within this block.
    #[inline]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of days in this block.
    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Whether this block lies in the second half of the year (January onward).
    pub fn is_second_half(&self) -> bool {
        self.month_index >= 6
    }
}

/// Builds a block key from an academic month index and a half (1 or 2).
pub fn block_key(month_index: usize, half: u8) -> String {
    format!("{}{}", MONTH_ABBREVIATIONS[month_index % 12], half)
}

/// Fixed-date or rule-derived holiday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolidayKind {
    /// Same calendar date every year.
    Fixed,
    /// Derived from a weekday rule ("third Monday of January").
    Floating,
}

/// A holiday observed in the academic year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    /// Holiday name.
    pub name: String,
    /// Calendar date of the holiday itself.
    pub date: NaiveDate,
    /// Fixed or floating.
    pub kind: HolidayKind,
    /// Fixed coverage span in days starting at `date` (Thanksgiving = 4).
    /// `None` means the span follows the weekday rule.
    pub fixed_span: Option<u32>,
}

/// The calendar of one academic year.
#[derive(Debug, Clone)]
pub struct AcademicCalendar {
    start: NaiveDate,
    blocks: Vec<Block>,
    holidays: Vec<Holiday>,
}

impl AcademicCalendar {
    /// Builds the calendar for the academic year starting on `start`.
    ///
    /// `start` must be July 1; any other date produces an empty calendar.
    pub fn new(start: NaiveDate) -> Self {
        let blocks = academic_year_blocks(start);
        let holidays = if blocks.is_empty() {
            Vec::new()
        } else {
            year_holidays(start.year())
        };
        Self {
            start,
            blocks,
            holidays,
        }
    }

    /// Calendar for the academic year beginning July 1 of `year`.
    pub fn for_year(year: i32) -> Self {
        match NaiveDate::from_ymd_opt(year, 7, 1) {
            Some(start) => Self::new(start),
            None => Self {
                start: NaiveDate::MIN,
                blocks: Vec::new(),
                holidays: Vec::new(),
            },
        }
    }

    /// Whether the start date was valid.
    pub fn is_valid(&self) -> bool {
        !self.blocks.is_empty()
    }

    /// First day of the academic year.
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the academic year (`None` for an empty calendar).
    pub fn end_date(&self) -> Option<NaiveDate> {
        self.blocks.last().map(|b| b.end)
    }

    /// Ordered blocks of the year.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Holidays of the year, sorted by date.
    pub fn holidays(&self) -> &[Holiday] {
        &self.holidays
    }

    /// Whether the date is inside the academic year.
    pub fn contains(&self, date: NaiveDate) -> bool {
        match self.end_date() {
            Some(end) => date >= self.start && date <= end,
            None => false,
        }
    }

    /// Block containing a date.
    pub fn block_for_date(&self, date: NaiveDate) -> Option<&Block> {
        if !self.contains(date) {
            return None;
        }
        let month_index = academic_month_index(date);
        let half = if date.day() <= 15 { 0 } else { 1 };
        self.blocks.get(month_index * 2 + half)
    }

    /// Block by key.
    pub fn block(&self, key: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.key == key)
    }

    /// Position of a block key in the year (0..24).
    pub fn block_index(&self, key: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.key == key)
    }

    /// Every date of the year in order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        match self.end_date() {
            Some(end) => self.start.iter_days().take_while(|d| *d <= end).collect(),
            None => Vec::new(),
        }
    }

    /// Whether a date is one of the year's holidays.
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.iter().any(|h| h.date == date)
    }

    /// Days elapsed since the start of the academic year.
    pub fn day_offset(&self, date: NaiveDate) -> i64 {
        (date - self.start).num_days()
    }
}

/// Builds the 24 half-month blocks for an academic year.
///
/// Returns an empty list when `start` is not July 1.
pub fn academic_year_blocks(start: NaiveDate) -> Vec<Block> {
    if start.month() != 7 || start.day() != 1 {
        return Vec::new();
    }

    let mut blocks = Vec::with_capacity(BLOCKS_PER_YEAR);
    for month_index in 0..12 {
        let (year, month) = calendar_month(start.year(), month_index);
        let (Some(first), Some(mid), Some(mid_next)) = (
            NaiveDate::from_ymd_opt(year, month, 1),
            NaiveDate::from_ymd_opt(year, month, 15),
            NaiveDate::from_ymd_opt(year, month, 16),
        ) else {
            return Vec::new();
        };
        let Some(last) = last_day_of_month(year, month) else {
            return Vec::new();
        };

        blocks.push(Block {
            key: block_key(month_index, 1),
            month_index,
            half: 1,
            start: first,
            end: mid,
        });
        blocks.push(Block {
            key: block_key(month_index, 2),
            month_index,
            half: 2,
            start: mid_next,
            end: last,
        });
    }
    blocks
}

/// Academic month index of a date (0 = July … 11 = June).
pub fn academic_month_index(date: NaiveDate) -> usize {
    ((date.month() as usize) + 5) % 12
}

/// Calendar (year, month) of an academic month index.
fn calendar_month(start_year: i32, month_index: usize) -> (i32, u32) {
    let month = ((month_index + 6) % 12) as u32 + 1;
    let year = if month_index < 6 {
        start_year
    } else {
        start_year + 1
    };
    (year, month)
}

/// Last day of a calendar month.
pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

/// The `n`-th (1-based) given weekday of a month.
pub fn nth_weekday_of_month(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

/// The last given weekday of a month.
pub fn last_weekday_of_month(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let last = last_day_of_month(year, month)?;
    let back = (7 + last.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    last.checked_sub_days(Days::new(back as u64))
}

/// Computes the holidays of the academic year starting July 1 of `start_year`.
pub fn year_holidays(start_year: i32) -> Vec<Holiday> {
    let next = start_year + 1;
    let fixed = |name: &str, year: i32, month: u32, day: u32| {
        NaiveDate::from_ymd_opt(year, month, day).map(|date| Holiday {
            name: name.to_string(),
            date,
            kind: HolidayKind::Fixed,
            fixed_span: None,
        })
    };
    let floating = |name: &str, date: Option<NaiveDate>, fixed_span: Option<u32>| {
        date.map(|date| Holiday {
            name: name.to_string(),
            date,
            kind: HolidayKind::Floating,
            fixed_span,
        })
    };

    let mut holidays: Vec<Holiday> = [
        fixed("Independence Day", start_year, 7, 4),
        floating(
            "Labor Day",
            nth_weekday_of_month(start_year, 9, Weekday::Mon, 1),
            None,
        ),
        floating(
            "Thanksgiving",
            nth_weekday_of_month(start_year, 11, Weekday::Thu, 4),
            Some(4),
        ),
        fixed("Christmas Day", start_year, 12, 25),
        fixed("New Year's Day", next, 1, 1),
        floating(
            "Martin Luther King Jr. Day",
            nth_weekday_of_month(next, 1, Weekday::Mon, 3),
            None,
        ),
        floating(
            "Memorial Day",
            last_weekday_of_month(next, 5, Weekday::Mon),
            None,
        ),
        fixed("Juneteenth", next, 6, 19),
    ]
    .into_iter()
    .flatten()
    .collect();

    holidays.sort_by_key(|h| h.date);
    holidays
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_blocks_for_standard_year() {
        let cal = AcademicCalendar::for_year(2024);
        assert!(cal.is_valid());
        assert_eq!(cal.blocks().len(), BLOCKS_PER_YEAR);

        let first = &cal.blocks()[0];
        assert_eq!(first.key, "JUL1");
        assert_eq!(first.start, date(2024, 7, 1));
        assert_eq!(first.end, date(2024, 7, 15));

        let last = &cal.blocks()[23];
        assert_eq!(last.key, "JUN2");
        assert_eq!(last.month_index, 11);
        assert_eq!(last.end, date(2025, 6, 30));
    }

    #[test]
    fn test_february_leap_year() {
        let cal = AcademicCalendar::for_year(2023);
        let feb2 = cal.block("FEB2").unwrap();
        assert_eq!(feb2.end, date(2024, 2, 29));
        assert_eq!(feb2.len_days(), 14);
        assert_eq!(cal.dates().len(), 366);
    }

    #[test]
    fn test_invalid_start_is_empty() {
        let cal = AcademicCalendar::new(date(2024, 7, 2));
        assert!(!cal.is_valid());
        assert!(cal.blocks().is_empty());
        assert!(cal.holidays().is_empty());
        assert!(cal.block_for_date(date(2024, 7, 3)).is_none());
        assert!(cal.dates().is_empty());
        assert!(academic_year_blocks(date(2024, 1, 1)).is_empty());
    }

    #[test]
    fn test_block_for_date() {
        let cal = AcademicCalendar::for_year(2024);
        assert_eq!(cal.block_for_date(date(2024, 7, 15)).unwrap().key, "JUL1");
        assert_eq!(cal.block_for_date(date(2024, 7, 16)).unwrap().key, "JUL2");
        assert_eq!(cal.block_for_date(date(2025, 1, 20)).unwrap().key, "JAN2");
        assert!(cal.block_for_date(date(2025, 7, 1)).is_none());
        assert_eq!(cal.block_index("SEP1"), Some(4));
        assert!(cal.block("JAN1").unwrap().is_second_half());
    }

    #[test]
    fn test_holidays_2024() {
        let cal = AcademicCalendar::for_year(2024);
        let dates: Vec<NaiveDate> = cal.holidays().iter().map(|h| h.date).collect();
        assert_eq!(
            dates,
            vec![
                date(2024, 7, 4),
                date(2024, 9, 2),
                date(2024, 11, 28),
                date(2024, 12, 25),
                date(2025, 1, 1),
                date(2025, 1, 20),
                date(2025, 5, 26),
                date(2025, 6, 19),
            ]
        );
        let thanksgiving = cal
            .holidays()
            .iter()
            .find(|h| h.name == "Thanksgiving")
            .unwrap();
        assert_eq!(thanksgiving.fixed_span, Some(4));
        assert_eq!(thanksgiving.kind, HolidayKind::Floating);
        assert!(cal.is_holiday(date(2024, 12, 25)));
    }

    #[test]
    fn test_weekday_rules() {
        assert_eq!(
            last_weekday_of_month(2025, 5, Weekday::Mon),
            Some(date(2025, 5, 26))
        );
        assert_eq!(
            last_weekday_of_month(2024, 6, Weekday::Sun),
            Some(date(2024, 6, 30))
        );
        assert_eq!(
            nth_weekday_of_month(2025, 1, Weekday::Mon, 3),
            Some(date(2025, 1, 20))
        );
    }

    proptest! {
        #[test]
        fn prop_every_date_maps_to_its_block(year in 1990i32..2100, offset in 0u64..365) {
            let cal = AcademicCalendar::for_year(year);
            let d = cal.start().checked_add_days(Days::new(offset)).unwrap();
            let block = cal.block_for_date(d).unwrap();
            prop_assert!(block.contains(d));
            prop_assert_eq!(block.month_index, academic_month_index(d));
        }

        #[test]
        fn prop_blocks_tile_the_year(year in 1990i32..2100) {
            let cal = AcademicCalendar::for_year(year);
            let blocks = cal.blocks();
            prop_assert_eq!(blocks.len(), BLOCKS_PER_YEAR);
            for pair in blocks.windows(2) {
                prop_assert_eq!(pair[0].end.succ_opt().unwrap(), pair[1].start);
            }
            let total: i64 = blocks.iter().map(|b| b.len_days()).sum();
            prop_assert_eq!(total as usize, cal.dates().len());
        }
    }
}
