//! Duty solvers and KPI evaluation.
//!
//! One solver per duty, run in dependency order:
//!
//! 1. **Rotations** (`build_rotations`): per training level, vacation then
//!    clinical blocks, by randomized backtracking with restarts.
//! 2. **Primary call** (`build_primary_call`): chronological greedy with
//!    load-balanced candidate ordering.
//! 3. **HF coverage** (`build_hf`) and **jeopardy** (`build_jeopardy`):
//!    coverage-block allocation by fairness score.
//! 4. **Clinic** (`build_clinic`): rotating-cursor first-eligible selection.
//!
//! Every solver reads upstream schedules through a [`DutyContext`], returns
//! an outcome value (infeasibility is never an `Err`), and exposes an
//! `apply_*` edit plus eligible / ineligible-with-reasons queries that share
//! the bulk build's rule set.
//!
//! # KPI
//!
//! `DutyKpi` reports per-fellow totals, min, max, spread and mean for any duty.
//!
//! # References
//!
//! - Burke et al. (2004), "The State of the Art of Nurse Rostering"
//! - Ernst et al. (2004), "Staff scheduling and rostering: A review of applications, methods and models"

mod clinic;
mod context;
mod eligibility;
mod hf;
mod jeopardy;
mod kpi;
mod primary;
mod retry;
mod rotation;

pub use clinic::{
    apply_clinic_assignment, build_clinic, clinic_ineligibility, eligible_clinic_fellows,
    ineligible_clinic_fellows_with_reasons, is_session_date, session_dates, ClinicOutcome,
    UnstaffedSession,
};
pub use context::DutyContext;
pub use eligibility::{
    days_since_nearest, fairness_score, IneligibleFellow, IneligibleReason, UncoveredUnit,
};
pub use hf::{
    apply_hf_assignment, build_hf, eligible_hf_fellows, hf_ineligibility, hf_units,
    ineligible_hf_fellows_with_reasons, is_hf_unit, HfOutcome,
};
pub use jeopardy::{
    apply_jeopardy_assignment, blocks_may_abut, build_jeopardy, compute_dynamic_quotas,
    dynamic_holiday_quota, eligible_jeopardy_fellows, ineligible_jeopardy_fellows_with_reasons,
    EditScope, JeopardyOutcome, JeopardySolver,
};
pub use kpi::DutyKpi;
pub use primary::{
    apply_call_assignment, build_primary_call, call_ineligibility, day_bucket,
    eligible_call_fellows, ineligible_call_fellows_with_reasons, optimize_weekend_equity,
    CallOutcome,
};
pub use retry::{RetryOutcome, RetryPolicy, ShuffleStrategy, Shuffler, DEFAULT_MAX_ATTEMPTS};
pub use rotation::{
    apply_rotation_assignment, build_rotations, eligible_rotation_fellows,
    ineligible_rotation_fellows_with_reasons, RotationOutcome, RotationRequest,
};
