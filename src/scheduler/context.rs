//! Solver context: the upstream schedules a solver reads.
//!
//! Solvers never fetch upstream state themselves; the caller (usually
//! [`crate::workflow::Workflow`]) builds a context from the repository
//! and passes it in.

use chrono::{Days, NaiveDate};

use crate::models::{
    AcademicCalendar, CallSchedule, Fellow, HfSchedule, Rotation, RotationSchedule,
};

/// Read-only upstream state shared by the call, jeopardy, HF and clinic solvers.
#[derive(Debug, Clone)]
pub struct DutyContext<'a> {
    /// Whole roster.
    pub fellows: &'a [Fellow],
    /// Academic calendar.
    pub calendar: &'a AcademicCalendar,
    /// Rotation schedules of every level available.
    pub rotations: Vec<&'a RotationSchedule>,
    /// Primary-call schedule, if built.
    pub call: Option<&'a CallSchedule>,
    /// HF coverage schedule, if built.
    pub hf: Option<&'a HfSchedule>,
}

impl<'a> DutyContext<'a> {
    /// Creates a context with no upstream schedules.
    pub fn new(fellows: &'a [Fellow], calendar: &'a AcademicCalendar) -> Self {
        Self {
            fellows,
            calendar,
            rotations: Vec::new(),
            call: None,
            hf: None,
        }
    }

    /// Adds rotation schedules.
    pub fn with_rotations(mut self, rotations: impl IntoIterator<Item = &'a RotationSchedule>) -> Self {
        self.rotations.extend(rotations);
        self
    }

    /// Sets the primary-call schedule.
    pub fn with_call(mut self, call: &'a CallSchedule) -> Self {
        self.call = Some(call);
        self
    }

    /// Sets the HF schedule.
    pub fn with_hf(mut self, hf: &'a HfSchedule) -> Self {
        self.hf = Some(hf);
        self
    }

    /// Fellow by id.
    pub fn fellow(&self, fellow_id: &str) -> Option<&'a Fellow> {
        self.fellows.iter().find(|f| f.id == fellow_id)
    }

    /// Rotation a fellow is on for a date.
    pub fn rotation_on(&self, fellow: &Fellow, date: NaiveDate) -> Option<Rotation> {
        let block = self.calendar.block_for_date(date)?;
        self.rotations
            .iter()
            .filter(|s| s.level == fellow.level)
            .find_map(|s| s.get(&fellow.id, &block.key))
    }

    /// Whether a fellow has primary call on a date.
    pub fn on_call(&self, fellow_id: &str, date: NaiveDate) -> bool {
        self.call.is_some_and(|c| c.is_on_call(fellow_id, date))
    }

    /// Most recent primary call of a fellow within `days` before `date`.
    pub fn recent_call(&self, fellow_id: &str, date: NaiveDate, days: i64) -> Option<NaiveDate> {
        (1..=days.max(0) as u64)
            .filter_map(|back| date.checked_sub_days(Days::new(back)))
            .find(|d| self.on_call(fellow_id, *d))
    }

    /// Whether a fellow covers HF on a date.
    pub fn on_hf(&self, fellow_id: &str, date: NaiveDate) -> bool {
        self.hf.is_some_and(|h| h.is_covering(fellow_id, date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrainingLevel;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_rotation_lookup_by_date() {
        let cal = AcademicCalendar::for_year(2024);
        let fellows = vec![Fellow::new("X", TrainingLevel::Pgy5)];
        let mut rot = RotationSchedule::new(TrainingLevel::Pgy5);
        rot.set("X", "DEC2", Rotation::Vacation);
        let other = RotationSchedule::new(TrainingLevel::Pgy4);

        let ctx = DutyContext::new(&fellows, &cal).with_rotations([&other, &rot]);
        let x = ctx.fellow("X").unwrap();
        assert_eq!(ctx.rotation_on(x, date(2024, 12, 20)), Some(Rotation::Vacation));
        assert_eq!(ctx.rotation_on(x, date(2024, 12, 10)), None);
        assert!(ctx.fellow("nobody").is_none());
    }

    #[test]
    fn test_recent_call_window() {
        let cal = AcademicCalendar::for_year(2024);
        let fellows = vec![Fellow::new("X", TrainingLevel::Pgy5)];
        let mut call = CallSchedule::new();
        call.assign(date(2024, 12, 24), "X");
        let ctx = DutyContext::new(&fellows, &cal).with_call(&call);

        assert_eq!(ctx.recent_call("X", date(2024, 12, 25), 2), Some(date(2024, 12, 24)));
        assert_eq!(ctx.recent_call("X", date(2024, 12, 26), 2), Some(date(2024, 12, 24)));
        assert_eq!(ctx.recent_call("X", date(2024, 12, 27), 2), None);
        assert!(ctx.on_call("X", date(2024, 12, 24)));
        assert!(!ctx.on_hf("X", date(2024, 12, 24)));
    }
}
