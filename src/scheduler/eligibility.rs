//! Ineligibility reasons shared by every duty solver.
//!
//! Each solver's eligibility check returns the full list of reasons a
//! fellow cannot take a unit (empty = eligible). Bulk builds use the
//! empty/non-empty split; editing dialogs show the reasons verbatim.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{CoverageBlock, CoverageType, Fellow, Rotation, TrainingLevel};

/// Why a fellow cannot take a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IneligibleReason {
    /// The fellow's level does not take this duty at all.
    LevelNotEligible(TrainingLevel),
    /// Holiday units are restricted to another level.
    HolidayLevel { required: TrainingLevel },
    /// The fellow's level may not start this duty until `starts`.
    BeforeStart { starts: NaiveDate },
    /// The fellow's rotation on `date` disqualifies them.
    OnRotation { date: NaiveDate, rotation: Rotation },
    /// The fellow's rotation on `date` is not on the clinic's list.
    RotationNotAllowed { date: NaiveDate, rotation: Option<Rotation> },
    /// The fellow has primary call that day.
    PrimaryCallSameDay(NaiveDate),
    /// The fellow is inside the post-call window of `call_date`.
    PostCall { date: NaiveDate, call_date: NaiveDate },
    /// The fellow has primary call the Friday before an HF weekend.
    FridayCall(NaiveDate),
    /// The fellow covers HF that day.
    HfCoverage(NaiveDate),
    /// The fellow already attends another clinic that day.
    ClinicSameDay { date: NaiveDate, clinic: String },
    /// The unit would exceed the fellow's quota for a bucket.
    QuotaReached {
        bucket: CoverageType,
        used: u32,
        quota: u32,
    },
    /// The fellow already holds a unit too close to this one.
    TooSoon { other: NaiveDate, min_days: i64 },
    /// An adjacent coverage block is held by the fellow and the pair may not abut.
    ConsecutiveBlock { neighbour: NaiveDate },
    /// Another fellow already holds the rotation in the block.
    BlockTaken {
        block: String,
        rotation: Rotation,
        holder: String,
    },
    /// The block already has the most fellows on vacation allowed.
    VacationFull { block: String, max: usize },
    /// The fellow already has every vacation block.
    VacationLimit { max: usize },
    /// Another vacation block of the fellow is too close.
    VacationSpacing { block: String, min_blocks: usize },
    /// Vacation is not allowed in a protected block.
    VacationBlackout { block: String },
    /// The fellow already holds the early slot elsewhere.
    EarlySlotHeld { block: String, rotation: Rotation },
    /// The fellow already has every block the requirement asks for.
    RequirementMet { rotation: Rotation, blocks: usize },
    /// The rotation may only be placed January to June.
    SecondHalfOnly { rotation: Rotation },
    /// The fellow holds the same rotation in the same or an adjacent month.
    ConsecutiveMonths { rotation: Rotation, block: String },
    /// The fellow holds a rotation that may not sit next to this one.
    AdjacentRotation {
        rotation: Rotation,
        other: Rotation,
        block: String,
    },
}

impl fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LevelNotEligible(level) => write!(f, "{level} fellows do not take this duty"),
            Self::HolidayLevel { required } => write!(f, "holiday coverage is limited to {required}"),
            Self::BeforeStart { starts } => write!(f, "not eligible before {starts}"),
            Self::OnRotation { date, rotation } => write!(f, "on {rotation} on {date}"),
            Self::RotationNotAllowed { date, rotation } => match rotation {
                Some(r) => write!(f, "rotation {r} on {date} is not eligible for this clinic"),
                None => write!(f, "no rotation assigned on {date}"),
            },
            Self::PrimaryCallSameDay(d) => write!(f, "on primary call {d}"),
            Self::PostCall { date, call_date } => {
                write!(f, "post-call on {date} (primary call {call_date})")
            }
            Self::FridayCall(d) => write!(f, "primary call on Friday {d}"),
            Self::HfCoverage(d) => write!(f, "covering HF on {d}"),
            Self::ClinicSameDay { date, clinic } => write!(f, "already in {clinic} clinic on {date}"),
            Self::QuotaReached { bucket, used, quota } => {
                write!(f, "{bucket} quota reached ({used}/{quota})")
            }
            Self::TooSoon { other, min_days } => {
                write!(f, "within {min_days} days of assignment on {other}")
            }
            Self::ConsecutiveBlock { neighbour } => {
                write!(f, "consecutive with an assignment on {neighbour}")
            }
            Self::BlockTaken {
                block,
                rotation,
                holder,
            } => write!(f, "{rotation} in {block} is held by {holder}"),
            Self::VacationFull { block, max } => {
                write!(f, "{block} already has {max} fellow(s) on vacation")
            }
            Self::VacationLimit { max } => write!(f, "already has {max} vacation block(s)"),
            Self::VacationSpacing { block, min_blocks } => {
                write!(f, "vacation in {block} is within {min_blocks} blocks")
            }
            Self::VacationBlackout { block } => write!(f, "no vacation allowed in {block}"),
            Self::EarlySlotHeld { block, rotation } => {
                write!(f, "already holds the early {rotation} slot in {block}")
            }
            Self::RequirementMet { rotation, blocks } => {
                write!(f, "already has all {blocks} {rotation} block(s)")
            }
            Self::SecondHalfOnly { rotation } => write!(f, "{rotation} only runs January to June"),
            Self::ConsecutiveMonths { rotation, block } => {
                write!(f, "{rotation} in {block} is in the same or an adjacent month")
            }
            Self::AdjacentRotation {
                rotation,
                other,
                block,
            } => write!(f, "{rotation} may not sit next to {other} in {block}"),
        }
    }
}

/// A fellow who cannot take a unit, with every reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IneligibleFellow {
    /// The fellow.
    pub fellow: Fellow,
    /// Reasons, in check order.
    pub reasons: Vec<IneligibleReason>,
}

/// A coverage unit no fellow could take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncoveredUnit {
    /// First date of the unit.
    pub start: NaiveDate,
    /// Last date of the unit.
    pub end: NaiveDate,
    /// Unit type.
    pub coverage_type: CoverageType,
    /// Human-readable reason.
    pub reason: String,
}

impl UncoveredUnit {
    /// Builds the record for `block`, summarizing each fellow's first reason.
    pub(crate) fn new(block: &CoverageBlock, ineligible: &[IneligibleFellow]) -> Self {
        let detail = ineligible
            .iter()
            .filter_map(|i| i.reasons.first().map(|r| format!("{}: {r}", i.fellow.id)))
            .collect::<Vec<_>>()
            .join("; ");
        let reason = if detail.is_empty() {
            format!("{}: no eligible fellow", block.describe())
        } else {
            format!("{}: no eligible fellow ({detail})", block.describe())
        };
        Self {
            start: block.start(),
            end: block.end(),
            coverage_type: block.coverage_type,
            reason,
        }
    }
}

/// Splits a roster by a reason-returning check.
pub(crate) fn partition_fellows<'f>(
    fellows: impl IntoIterator<Item = &'f Fellow>,
    mut check: impl FnMut(&Fellow) -> Vec<IneligibleReason>,
) -> (Vec<&'f Fellow>, Vec<IneligibleFellow>) {
    let mut eligible = Vec::new();
    let mut ineligible = Vec::new();
    for fellow in fellows {
        let reasons = check(fellow);
        if reasons.is_empty() {
            eligible.push(fellow);
        } else {
            ineligible.push(IneligibleFellow {
                fellow: fellow.clone(),
                reasons,
            });
        }
    }
    (eligible, ineligible)
}

/// Fairness score: `(1 − used/quota) × 100 + days_since_last`.
///
/// A zero quota scores as fully used.
pub fn fairness_score(used: u32, quota: u32, days_since_last: i64) -> f64 {
    let utilization = if quota == 0 {
        1.0
    } else {
        used as f64 / quota as f64
    };
    (1.0 - utilization) * 100.0 + days_since_last as f64
}

/// Days from `date` to the nearest of `assigned`, or `fallback` if none.
pub fn days_since_nearest(assigned: &[NaiveDate], date: NaiveDate, fallback: i64) -> i64 {
    assigned
        .iter()
        .map(|d| (date - *d).num_days().abs())
        .min()
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fairness_score() {
        assert!((fairness_score(0, 10, 5) - 105.0).abs() < 1e-9);
        assert!((fairness_score(5, 10, 0) - 50.0).abs() < 1e-9);
        assert!((fairness_score(3, 0, 7) - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_days_since_nearest() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 7, day).unwrap();
        assert_eq!(days_since_nearest(&[d(1), d(20)], d(10), 99), 9);
        assert_eq!(days_since_nearest(&[], d(10), 99), 99);
    }

    #[test]
    fn test_partition_fellows() {
        let fellows = vec![
            Fellow::new("A", TrainingLevel::Pgy4),
            Fellow::new("B", TrainingLevel::Pgy5),
        ];
        let (ok, bad) = partition_fellows(&fellows, |f| {
            if f.level == TrainingLevel::Pgy4 {
                vec![IneligibleReason::LevelNotEligible(f.level)]
            } else {
                Vec::new()
            }
        });
        assert_eq!(ok.len(), 1);
        assert_eq!(ok[0].id, "B");
        assert_eq!(bad[0].fellow.id, "A");
        assert_eq!(bad[0].reasons[0].to_string(), "PGY-4 fellows do not take this duty");
    }
}
