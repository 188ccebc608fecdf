//! Duty schedules (solutions) and constraint violations.
//!
//! Every persisted schedule is a plain nested map keyed by ISO date (or
//! block key) plus a `version` schema tag. Per-fellow counters are the
//! quota-consumption ledger and are kept consistent with the date maps
//! by the mutation methods here.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{CoverageBlock, CoverageType};
use crate::SCHEMA_VERSION;

// ================================
// Counters
// ================================

/// Per-fellow day counts split into quota buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutyCounters {
    /// Weekday days.
    pub weekday: u32,
    /// Weekend days.
    pub weekend: u32,
    /// Holiday days.
    pub holiday: u32,
}

impl DutyCounters {
    /// Count in one bucket.
    pub fn get(&self, bucket: CoverageType) -> u32 {
        match bucket {
            CoverageType::Weekday => self.weekday,
            CoverageType::Weekend => self.weekend,
            CoverageType::Holiday => self.holiday,
        }
    }

    /// Adds days to a bucket.
    pub fn add(&mut self, bucket: CoverageType, days: u32) {
        match bucket {
            CoverageType::Weekday => self.weekday += days,
            CoverageType::Weekend => self.weekend += days,
            CoverageType::Holiday => self.holiday += days,
        }
    }

    /// Removes days from a bucket (saturating).
    pub fn sub(&mut self, bucket: CoverageType, days: u32) {
        match bucket {
            CoverageType::Weekday => self.weekday = self.weekday.saturating_sub(days),
            CoverageType::Weekend => self.weekend = self.weekend.saturating_sub(days),
            CoverageType::Holiday => self.holiday = self.holiday.saturating_sub(days),
        }
    }

    /// Sum over all buckets.
    pub fn total(&self) -> u32 {
        self.weekday + self.weekend + self.holiday
    }
}

fn recount_days(
    days: &BTreeMap<NaiveDate, String>,
    type_of: impl Fn(NaiveDate) -> Option<CoverageType>,
) -> BTreeMap<String, DutyCounters> {
    let mut counters: BTreeMap<String, DutyCounters> = BTreeMap::new();
    for (date, fellow) in days {
        if let Some(bucket) = type_of(*date) {
            counters.entry(fellow.clone()).or_default().add(bucket, 1);
        }
    }
    counters
}

// ================================
// Primary call
// ================================

/// One fellow per covered day; absence means uncovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSchedule {
    /// Schema version tag.
    pub version: u32,
    /// date → fellow id.
    pub days: BTreeMap<NaiveDate, String>,
}

impl CallSchedule {
    /// Creates an empty schedule.
    pub fn new() -> Self {
        Self {
            version: SCHEMA_VERSION,
            days: BTreeMap::new(),
        }
    }

    /// Fellow on call for a date.
    pub fn fellow_on(&self, date: NaiveDate) -> Option<&str> {
        self.days.get(&date).map(String::as_str)
    }

    /// Whether a fellow is on call for a date.
    pub fn is_on_call(&self, fellow_id: &str, date: NaiveDate) -> bool {
        self.fellow_on(date) == Some(fellow_id)
    }

    /// Assigns a date.
    pub fn assign(&mut self, date: NaiveDate, fellow_id: &str) {
        self.days.insert(date, fellow_id.to_string());
    }

    /// Clears a date.
    pub fn unassign(&mut self, date: NaiveDate) -> Option<String> {
        self.days.remove(&date)
    }

    /// Dates a fellow is on call, ascending.
    pub fn dates_for(&self, fellow_id: &str) -> Vec<NaiveDate> {
        self.days
            .iter()
            .filter(|(_, f)| f.as_str() == fellow_id)
            .map(|(d, _)| *d)
            .collect()
    }

    /// Number of calls held by a fellow.
    pub fn count(&self, fellow_id: &str) -> usize {
        self.days.values().filter(|f| f.as_str() == fellow_id).count()
    }
}

impl Default for CallSchedule {
    fn default() -> Self {
        Self::new()
    }
}

// ================================
// Jeopardy
// ================================

/// Backup-call schedule with per-fellow bucket counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JeopardySchedule {
    /// Schema version tag.
    pub version: u32,
    /// date → fellow id.
    pub days: BTreeMap<NaiveDate, String>,
    /// fellow id → days consumed per bucket.
    pub counters: BTreeMap<String, DutyCounters>,
}

impl JeopardySchedule {
    /// Creates an empty schedule.
    pub fn new() -> Self {
        Self {
            version: SCHEMA_VERSION,
            days: BTreeMap::new(),
            counters: BTreeMap::new(),
        }
    }

    /// Fellow covering a date.
    pub fn fellow_on(&self, date: NaiveDate) -> Option<&str> {
        self.days.get(&date).map(String::as_str)
    }

    /// Counters of a fellow (zero if absent).
    pub fn counters_for(&self, fellow_id: &str) -> DutyCounters {
        self.counters.get(fellow_id).copied().unwrap_or_default()
    }

    /// Assigns every date of a block to a fellow and charges the bucket.
    ///
    /// Dates already held by someone else are released first.
    pub fn assign_block(&mut self, block: &CoverageBlock, fellow_id: &str) {
        self.release_block(block);
        for d in &block.dates {
            self.days.insert(*d, fellow_id.to_string());
        }
        self.counters
            .entry(fellow_id.to_string())
            .or_default()
            .add(block.coverage_type, block.len_days());
    }

    /// Clears every date of a block and refunds the holders' buckets.
    pub fn release_block(&mut self, block: &CoverageBlock) {
        for d in &block.dates {
            if let Some(prev) = self.days.remove(d) {
                if let Some(c) = self.counters.get_mut(&prev) {
                    c.sub(block.coverage_type, 1);
                }
            }
        }
        self.counters.retain(|_, c| c.total() > 0);
    }

    /// Dates covered by a fellow, ascending.
    pub fn dates_for(&self, fellow_id: &str) -> Vec<NaiveDate> {
        self.days
            .iter()
            .filter(|(_, f)| f.as_str() == fellow_id)
            .map(|(d, _)| *d)
            .collect()
    }

    /// Rebuilds counters from `days`.
    pub fn recount(&mut self, type_of: impl Fn(NaiveDate) -> Option<CoverageType>) {
        self.counters = recount_days(&self.days, type_of);
    }

    /// Whether counters agree with `days`.
    pub fn counters_consistent(&self, type_of: impl Fn(NaiveDate) -> Option<CoverageType>) -> bool {
        recount_days(&self.days, type_of) == self.counters
    }
}

impl Default for JeopardySchedule {
    fn default() -> Self {
        Self::new()
    }
}

// ================================
// Heart-failure coverage
// ================================

/// One HF coverage unit (weekend or holiday run) held by a fellow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HfAssignment {
    /// Fellow id.
    pub fellow: String,
    /// Covered dates, ascending.
    pub dates: Vec<NaiveDate>,
    /// Unit type (weekend or holiday).
    pub kind: CoverageType,
}

/// HF weekend/holiday schedule keyed by unit start date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HfSchedule {
    /// Schema version tag.
    pub version: u32,
    /// unit start date → assignment.
    pub units: BTreeMap<NaiveDate, HfAssignment>,
    /// fellow id → days consumed per bucket.
    pub counters: BTreeMap<String, DutyCounters>,
}

impl HfSchedule {
    /// Creates an empty schedule.
    pub fn new() -> Self {
        Self {
            version: SCHEMA_VERSION,
            units: BTreeMap::new(),
            counters: BTreeMap::new(),
        }
    }

    /// Fellow covering HF on a date.
    pub fn fellow_on(&self, date: NaiveDate) -> Option<&str> {
        self.units
            .range(..=date)
            .next_back()
            .filter(|(_, a)| a.dates.contains(&date))
            .map(|(_, a)| a.fellow.as_str())
    }

    /// Whether a fellow covers HF on a date.
    pub fn is_covering(&self, fellow_id: &str, date: NaiveDate) -> bool {
        self.fellow_on(date) == Some(fellow_id)
    }

    /// Counters of a fellow (zero if absent).
    pub fn counters_for(&self, fellow_id: &str) -> DutyCounters {
        self.counters.get(fellow_id).copied().unwrap_or_default()
    }

    /// Assigns a unit, replacing any previous holder.
    pub fn assign(&mut self, block: &CoverageBlock, fellow_id: &str) {
        self.release(block.start());
        self.units.insert(
            block.start(),
            HfAssignment {
                fellow: fellow_id.to_string(),
                dates: block.dates.clone(),
                kind: block.coverage_type,
            },
        );
        self.counters
            .entry(fellow_id.to_string())
            .or_default()
            .add(block.coverage_type, block.len_days());
    }

    /// Clears the unit starting on `start`.
    pub fn release(&mut self, start: NaiveDate) -> Option<HfAssignment> {
        let prev = self.units.remove(&start)?;
        if let Some(c) = self.counters.get_mut(&prev.fellow) {
            c.sub(prev.kind, prev.dates.len() as u32);
        }
        self.counters.retain(|_, c| c.total() > 0);
        Some(prev)
    }

    /// Start dates of units held by a fellow.
    pub fn unit_starts_for(&self, fellow_id: &str) -> Vec<NaiveDate> {
        self.units
            .iter()
            .filter(|(_, a)| a.fellow == fellow_id)
            .map(|(d, _)| *d)
            .collect()
    }

    /// Flattened date → fellow view.
    pub fn days(&self) -> BTreeMap<NaiveDate, String> {
        self.units
            .values()
            .flat_map(|a| a.dates.iter().map(move |d| (*d, a.fellow.clone())))
            .collect()
    }
}

impl Default for HfSchedule {
    fn default() -> Self {
        Self::new()
    }
}

// ================================
// Clinic
// ================================

/// A clinic session held by a fellow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicSession {
    /// Fellow id.
    pub fellow: String,
    /// Clinic type name.
    pub clinic_type: String,
    /// Day of week of the session.
    pub weekday: Weekday,
    /// Block containing the session.
    pub block_key: String,
}

/// Clinic schedule: date → clinic type → session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicSchedule {
    /// Schema version tag.
    pub version: u32,
    /// date → clinic type → session.
    pub sessions: BTreeMap<NaiveDate, BTreeMap<String, ClinicSession>>,
    /// fellow id → number of sessions.
    pub counters: BTreeMap<String, u32>,
}

impl ClinicSchedule {
    /// Creates an empty schedule.
    pub fn new() -> Self {
        Self {
            version: SCHEMA_VERSION,
            sessions: BTreeMap::new(),
            counters: BTreeMap::new(),
        }
    }

    /// Session of a clinic type on a date.
    pub fn session(&self, date: NaiveDate, clinic_type: &str) -> Option<&ClinicSession> {
        self.sessions.get(&date).and_then(|m| m.get(clinic_type))
    }

    /// Clinic type a fellow attends on a date, if any.
    pub fn clinic_of(&self, fellow_id: &str, date: NaiveDate) -> Option<&str> {
        self.sessions.get(&date).and_then(|m| {
            m.values()
                .find(|s| s.fellow == fellow_id)
                .map(|s| s.clinic_type.as_str())
        })
    }

    /// Adds or replaces a session.
    pub fn assign(&mut self, date: NaiveDate, session: ClinicSession) {
        self.remove(date, &session.clinic_type.clone());
        *self.counters.entry(session.fellow.clone()).or_insert(0) += 1;
        self.sessions
            .entry(date)
            .or_default()
            .insert(session.clinic_type.clone(), session);
    }

    /// Removes a session.
    pub fn remove(&mut self, date: NaiveDate, clinic_type: &str) -> Option<ClinicSession> {
        let day = self.sessions.get_mut(&date)?;
        let prev = day.remove(clinic_type)?;
        if day.is_empty() {
            self.sessions.remove(&date);
        }
        if let Some(n) = self.counters.get_mut(&prev.fellow) {
            *n = n.saturating_sub(1);
        }
        self.counters.retain(|_, n| *n > 0);
        Some(prev)
    }

    /// Number of sessions held by a fellow.
    pub fn count(&self, fellow_id: &str) -> u32 {
        self.counters.get(fellow_id).copied().unwrap_or(0)
    }

    /// Total number of sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.values().map(BTreeMap::len).sum()
    }
}

impl Default for ClinicSchedule {
    fn default() -> Self {
        Self::new()
    }
}

// ================================
// Violations
// ================================

/// A constraint violation found by an audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Type of violation.
    pub violation_type: ViolationType,
    /// Related entity (fellow id, block key or date).
    pub entity_id: String,
    /// Human-readable description.
    pub message: String,
    /// Severity (0-100, higher = worse).
    pub severity: i32,
}

/// Classification of constraint violations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationType {
    /// More fellows hold a (block, label) pair than its capacity.
    CapacityExceeded,
    /// Two placements are closer than the minimum spacing.
    SpacingViolation,
    /// A rotation lands in consecutive months for one fellow.
    NonConsecutive,
    /// A fellow's count differs from its configured quota.
    QuotaMismatch,
    /// A coverage block is only partly assigned or split between fellows.
    PartialBlock,
    /// A fellow holds conflicting duties on the same date.
    DoubleBooked,
    /// Domain-specific violation.
    Custom(String),
}

impl Violation {
    /// Creates a violation.
    pub fn new(
        violation_type: ViolationType,
        entity_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let severity = match violation_type {
            ViolationType::CapacityExceeded | ViolationType::DoubleBooked => 95,
            ViolationType::PartialBlock => 90,
            ViolationType::QuotaMismatch => 80,
            ViolationType::SpacingViolation | ViolationType::NonConsecutive => 70,
            ViolationType::Custom(_) => 50,
        };
        Self {
            violation_type,
            entity_id: entity_id.into(),
            message: message.into(),
            severity,
        }
    }

    /// Creates a capacity violation.
    pub fn capacity_exceeded(entity_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ViolationType::CapacityExceeded, entity_id, message)
    }

    /// Creates a spacing violation.
    pub fn spacing(entity_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ViolationType::SpacingViolation, entity_id, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn weekend(sat: NaiveDate) -> CoverageBlock {
        CoverageBlock {
            coverage_type: CoverageType::Weekend,
            dates: vec![sat, sat.succ_opt().unwrap()],
            label: None,
        }
    }

    #[test]
    fn test_call_schedule_queries() {
        let mut s = CallSchedule::new();
        s.assign(date(2024, 7, 1), "F1");
        s.assign(date(2024, 7, 4), "F1");
        s.assign(date(2024, 7, 2), "F2");
        assert_eq!(s.count("F1"), 2);
        assert_eq!(s.dates_for("F1"), vec![date(2024, 7, 1), date(2024, 7, 4)]);
        assert!(s.is_on_call("F2", date(2024, 7, 2)));
        assert_eq!(s.unassign(date(2024, 7, 2)).as_deref(), Some("F2"));
        assert!(s.fellow_on(date(2024, 7, 2)).is_none());
    }

    #[test]
    fn test_jeopardy_counters_follow_days() {
        let mut s = JeopardySchedule::new();
        let w = weekend(date(2024, 7, 6));
        s.assign_block(&w, "F1");
        assert_eq!(s.counters_for("F1").weekend, 2);

        // Reassigning moves the charge.
        s.assign_block(&w, "F2");
        assert_eq!(s.counters_for("F1").total(), 0);
        assert!(!s.counters.contains_key("F1"));
        assert_eq!(s.counters_for("F2").weekend, 2);
        assert!(s.counters_consistent(|_| Some(CoverageType::Weekend)));

        s.release_block(&w);
        assert!(s.days.is_empty());
        assert!(s.counters.is_empty());
    }

    #[test]
    fn test_hf_lookup_by_date() {
        let mut s = HfSchedule::new();
        s.assign(&weekend(date(2024, 7, 6)), "Y");
        assert_eq!(s.fellow_on(date(2024, 7, 7)), Some("Y"));
        assert_eq!(s.fellow_on(date(2024, 7, 8)), None);
        assert_eq!(s.counters_for("Y").weekend, 2);
        assert_eq!(s.days().len(), 2);
        assert!(s.release(date(2024, 7, 6)).is_some());
        assert!(s.counters.is_empty());
    }

    #[test]
    fn test_clinic_assign_replace_remove() {
        let mut s = ClinicSchedule::new();
        let d = date(2024, 7, 2);
        let session = |fellow: &str| ClinicSession {
            fellow: fellow.to_string(),
            clinic_type: "general".to_string(),
            weekday: Weekday::Tue,
            block_key: "JUL1".to_string(),
        };
        s.assign(d, session("F1"));
        assert_eq!(s.clinic_of("F1", d), Some("general"));
        s.assign(d, session("F2"));
        assert_eq!(s.count("F1"), 0);
        assert_eq!(s.count("F2"), 1);
        assert_eq!(s.session_count(), 1);
        assert!(s.remove(d, "general").is_some());
        assert!(s.sessions.is_empty());
    }

    #[test]
    fn test_violation_severity() {
        let v = Violation::capacity_exceeded("JUL1", "two fellows on CCU");
        assert_eq!(v.violation_type, ViolationType::CapacityExceeded);
        assert_eq!(v.severity, 95);
        assert_eq!(Violation::spacing("F1", "too close").severity, 70);
    }

    #[test]
    fn test_date_keys_serialize_as_iso() {
        let mut s = CallSchedule::new();
        s.assign(date(2024, 12, 24), "X");
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, r#"{"version":1,"days":{"2024-12-24":"X"}}"#);
    }
}
