//! Outpatient clinic solver.
//!
//! # Algorithm
//! Each clinic type runs on one weekday. Session dates are every matching
//! weekday of the year, minus holidays when `skip_holidays` is set. Dates
//! are walked chronologically; for each session a rotating cursor over the
//! clinic's eligible-level roster (sorted by id) advances until the first
//! eligible fellow is found, who takes the session. Every clinic type keeps
//! its own cursor, so load spreads round-robin within a clinic.
//!
//! Sessions nobody can staff are reported, not treated as failure of the
//! whole build; manual edits fill them later.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::eligibility::{partition_fellows, IneligibleFellow, IneligibleReason};
use super::DutyContext;
use crate::config::{ClinicConfig, ClinicType};
use crate::error::{EditError, EditResult};
use crate::models::{AcademicCalendar, ClinicSchedule, ClinicSession, Fellow};

/// A session no fellow could staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnstaffedSession {
    /// Session date.
    pub date: NaiveDate,
    /// Clinic type name.
    pub clinic: String,
    /// Human-readable reason.
    pub reason: String,
}

/// Result of a clinic build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicOutcome {
    /// Built schedule.
    pub schedule: ClinicSchedule,
    /// Whether every session is staffed.
    pub success: bool,
    /// Sessions left empty.
    pub unstaffed: Vec<UnstaffedSession>,
}

/// Whether `clinic` runs on `date`.
pub fn is_session_date(
    calendar: &AcademicCalendar,
    config: &ClinicConfig,
    clinic: &ClinicType,
    date: NaiveDate,
) -> bool {
    calendar.contains(date)
        && date.weekday() == clinic.weekday
        && !(config.skip_holidays && calendar.is_holiday(date))
}

/// Every session date of `clinic` in the year.
pub fn session_dates(
    calendar: &AcademicCalendar,
    config: &ClinicConfig,
    clinic: &ClinicType,
) -> Vec<NaiveDate> {
    calendar
        .dates()
        .into_iter()
        .filter(|d| is_session_date(calendar, config, clinic, *d))
        .collect()
}

/// Every reason `fellow` cannot staff `clinic` on `date`.
///
/// The session itself must already be removed from `schedule`.
pub fn clinic_ineligibility(
    schedule: &ClinicSchedule,
    ctx: &DutyContext<'_>,
    config: &ClinicConfig,
    clinic: &ClinicType,
    date: NaiveDate,
    fellow: &Fellow,
) -> Vec<IneligibleReason> {
    if !clinic.eligible_levels.contains(&fellow.level) {
        return vec![IneligibleReason::LevelNotEligible(fellow.level)];
    }
    let mut reasons = Vec::new();

    let rotation = ctx.rotation_on(fellow, date);
    match rotation {
        Some(r) if clinic.excluded_rotations.contains(&r) => {
            reasons.push(IneligibleReason::OnRotation { date, rotation: r });
        }
        _ if !clinic.eligible_rotations.is_empty()
            && !rotation.is_some_and(|r| clinic.eligible_rotations.contains(&r)) =>
        {
            reasons.push(IneligibleReason::RotationNotAllowed { date, rotation });
        }
        _ => {}
    }

    if ctx.on_call(&fellow.id, date) {
        reasons.push(IneligibleReason::PrimaryCallSameDay(date));
    }
    if config.exclude_post_call {
        if let Some(call_date) = ctx.recent_call(&fellow.id, date, 1) {
            reasons.push(IneligibleReason::PostCall { date, call_date });
        }
    }
    if ctx.on_hf(&fellow.id, date) {
        reasons.push(IneligibleReason::HfCoverage(date));
    }
    if let Some(other) = schedule.clinic_of(&fellow.id, date) {
        if other != clinic.name {
            reasons.push(IneligibleReason::ClinicSameDay {
                date,
                clinic: other.to_string(),
            });
        }
    }
    reasons
}

fn session_for(
    calendar: &AcademicCalendar,
    clinic: &ClinicType,
    date: NaiveDate,
    fellow: &Fellow,
) -> Option<ClinicSession> {
    let block = calendar.block_for_date(date)?;
    Some(ClinicSession {
        fellow: fellow.id.clone(),
        clinic_type: clinic.name.clone(),
        weekday: clinic.weekday,
        block_key: block.key.clone(),
    })
}

/// Builds the clinic schedule for the year.
pub fn build_clinic(ctx: &DutyContext<'_>, config: &ClinicConfig) -> ClinicOutcome {
    info!(clinics = config.clinic_types.len(), "building clinic schedule");
    let mut schedule = ClinicSchedule::new();
    let mut unstaffed = Vec::new();

    let rosters: HashMap<&str, Vec<&Fellow>> = config
        .clinic_types
        .iter()
        .map(|clinic| {
            let mut roster: Vec<&Fellow> = ctx
                .fellows
                .iter()
                .filter(|f| clinic.eligible_levels.contains(&f.level))
                .collect();
            roster.sort_by(|a, b| a.id.cmp(&b.id));
            (clinic.name.as_str(), roster)
        })
        .collect();
    let mut cursors: HashMap<&str, usize> = HashMap::new();

    for date in ctx.calendar.dates() {
        for clinic in &config.clinic_types {
            if !is_session_date(ctx.calendar, config, clinic, date) {
                continue;
            }
            let roster = rosters.get(clinic.name.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            let cursor = cursors.entry(clinic.name.as_str()).or_insert(0);
            let total = roster.len();

            let chosen = (0..total).find_map(|_| {
                let fellow = roster[*cursor];
                *cursor = (*cursor + 1) % total;
                clinic_ineligibility(&schedule, ctx, config, clinic, date, fellow)
                    .is_empty()
                    .then_some(fellow)
            });

            match chosen.and_then(|f| session_for(ctx.calendar, clinic, date, f)) {
                Some(session) => {
                    debug!(%date, clinic = %clinic.name, fellow = %session.fellow, "clinic session assigned");
                    schedule.assign(date, session);
                }
                None => unstaffed.push(UnstaffedSession {
                    date,
                    clinic: clinic.name.clone(),
                    reason: format!("{date}: no eligible fellow for {} clinic", clinic.name),
                }),
            }
        }
    }

    if unstaffed.is_empty() {
        info!(sessions = schedule.session_count(), "clinic schedule built");
    } else {
        warn!(
            sessions = schedule.session_count(),
            unstaffed = unstaffed.len(),
            "clinic schedule has unstaffed sessions"
        );
    }
    ClinicOutcome {
        success: unstaffed.is_empty(),
        schedule,
        unstaffed,
    }
}

fn resolve<'c>(
    calendar: &AcademicCalendar,
    config: &'c ClinicConfig,
    clinic_name: &str,
    date: NaiveDate,
) -> EditResult<&'c ClinicType> {
    let clinic = config
        .clinic(clinic_name)
        .ok_or_else(|| EditError::UnknownClinic(clinic_name.to_string()))?;
    if !calendar.contains(date) {
        return Err(EditError::DateOutOfRange(date));
    }
    if !is_session_date(calendar, config, clinic, date) {
        return Err(EditError::NoSession {
            date,
            clinic: clinic.name.clone(),
        });
    }
    Ok(clinic)
}

/// Assigns (`Some`) or removes (`None`) the `clinic_name` session on `date`.
///
/// Returns the new schedule; the input is never modified.
pub fn apply_clinic_assignment(
    schedule: &ClinicSchedule,
    ctx: &DutyContext<'_>,
    config: &ClinicConfig,
    date: NaiveDate,
    clinic_name: &str,
    fellow_id: Option<&str>,
) -> EditResult<ClinicSchedule> {
    let clinic = resolve(ctx.calendar, config, clinic_name, date)?;
    let mut next = schedule.clone();
    next.remove(date, &clinic.name);
    let Some(fellow_id) = fellow_id else {
        return Ok(next);
    };
    let fellow = ctx
        .fellow(fellow_id)
        .ok_or_else(|| EditError::UnknownFellow(fellow_id.to_string()))?;
    let reasons = clinic_ineligibility(&next, ctx, config, clinic, date, fellow);
    if !reasons.is_empty() {
        return Err(EditError::Ineligible {
            fellow: fellow.id.clone(),
            reasons,
        });
    }
    let session =
        session_for(ctx.calendar, clinic, date, fellow).ok_or(EditError::DateOutOfRange(date))?;
    next.assign(date, session);
    Ok(next)
}

fn split<'a>(
    schedule: &ClinicSchedule,
    ctx: &DutyContext<'a>,
    config: &ClinicConfig,
    date: NaiveDate,
    clinic_name: &str,
) -> (Vec<&'a Fellow>, Vec<IneligibleFellow>) {
    let Ok(clinic) = resolve(ctx.calendar, config, clinic_name, date) else {
        return (Vec::new(), Vec::new());
    };
    let mut released = schedule.clone();
    released.remove(date, &clinic.name);
    partition_fellows(ctx.fellows, |f| {
        clinic_ineligibility(&released, ctx, config, clinic, date, f)
    })
}

/// Fellows who may staff the `clinic_name` session on `date`.
pub fn eligible_clinic_fellows<'a>(
    schedule: &ClinicSchedule,
    ctx: &DutyContext<'a>,
    config: &ClinicConfig,
    date: NaiveDate,
    clinic_name: &str,
) -> Vec<&'a Fellow> {
    split(schedule, ctx, config, date, clinic_name).0
}

/// Fellows who may not staff the `clinic_name` session on `date`, with reasons.
pub fn ineligible_clinic_fellows_with_reasons(
    schedule: &ClinicSchedule,
    ctx: &DutyContext<'_>,
    config: &ClinicConfig,
    date: NaiveDate,
    clinic_name: &str,
) -> Vec<IneligibleFellow> {
    split(schedule, ctx, config, date, clinic_name).1
}
