//! Duty scheduling for medical fellowship programs.
//!
//! Assigns fellows to the duties of a July-to-June academic year: rotation
//! and vacation blocks, primary call, jeopardy (backup) call, heart-failure
//! weekend/holiday coverage and outpatient clinic sessions.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `AcademicCalendar`, `Block`, `Fellow`,
//!   `CoverageBlock`, and the per-duty schedules
//! - **`config`**: Per-duty rules with defaults, loadable from JSON
//! - **`scheduler`**: One solver per duty, eligibility queries, edits, KPIs
//! - **`validation`**: Setup checks and whole-schedule audits
//! - **`repository`**: Keyed, versioned schedule storage
//! - **`workflow`**: Downstream build order and load-validate-save edits
//!
//! # Architecture
//!
//! Solvers are pure functions of their inputs: they receive upstream
//! schedules through a `DutyContext` and return an outcome value. Only the
//! workflow touches the repository. Infeasibility is reported as data
//! (uncovered units with reasons), never as an error.
//!
//! # References
//!
//! - Burke et al. (2004), "The State of the Art of Nurse Rostering"
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"

pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod scheduler;
pub mod validation;
pub mod workflow;

/// Schema version written into every stored schedule.
pub const SCHEMA_VERSION: u32 = 1;
