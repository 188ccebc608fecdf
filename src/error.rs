//! Error types.
//!
//! Infeasible bulk builds are *not* errors: they come back as outcome
//! values with uncovered units and reasons. Errors cover rejected manual
//! edits and orchestration problems (missing prerequisites, storage).

use chrono::NaiveDate;

use crate::repository::RepositoryError;
use crate::scheduler::IneligibleReason;

/// A rejected single-unit edit. The caller's schedule is untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditError {
    #[error("unknown fellow: {0}")]
    UnknownFellow(String),

    #[error("date {0} is outside the academic year")]
    DateOutOfRange(NaiveDate),

    #[error("{fellow} is not eligible: {}", join_reasons(.reasons))]
    Ineligible {
        fellow: String,
        reasons: Vec<IneligibleReason>,
    },

    #[error("{date} belongs to a {days}-day coverage block; edit the whole block")]
    MultiDayBlock { date: NaiveDate, days: u32 },

    #[error("{0} is not an assignable unit for this duty")]
    NotAUnit(NaiveDate),

    #[error("unknown clinic type: {0}")]
    UnknownClinic(String),

    #[error("no {clinic} clinic runs on {date}")]
    NoSession { date: NaiveDate, clinic: String },

    #[error("unknown block key: {0}")]
    UnknownBlock(String),
}

fn join_reasons(reasons: &[IneligibleReason]) -> String {
    reasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result of a single-unit edit: the new schedule or the reason it was rejected.
pub type EditResult<T> = Result<T, EditError>;

/// Orchestration error.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("prerequisite missing: {0}")]
    PrerequisiteMissing(String),

    #[error("invalid setup: {}", .0.join("; "))]
    InvalidSetup(Vec<String>),

    #[error("invalid coverage partition: {}", .0.join("; "))]
    InvalidPartition(Vec<String>),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;
