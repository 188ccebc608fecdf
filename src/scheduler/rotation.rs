//! Rotation and vacation block solver.
//!
//! # Algorithm
//!
//! One attempt, for one training-level cohort:
//! 1. Seed pinned entries from an existing schedule. A pinned vacation in
//!    a blackout key is dropped so it gets reseated.
//! 2. Place vacation: preferred keys first, then every block (chronological
//!    or shuffled), honouring blackout keys, the cross-level per-block cap
//!    and the minimum spacing between a fellow's vacation blocks.
//! 3. Early placement: backtracking search giving every fellow a distinct
//!    protected key for the early rotation.
//! 4. Greedy placement of each requirement in table order, fellow by
//!    fellow, as whole months or single blocks. A pinned whole-month
//!    rotation holding only half a month gets the other half first; if
//!    that half is taken the attempt fails.
//! 5. Fill every empty block with the elective label.
//! 6. Audit the whole schedule (capacity, spacing, non-consecutive,
//!    counts); local decisions can break global rules.
//!
//! Attempts work on a fresh copy and are retried by a [`RetryPolicy`].
//! Exhausting the budget yields no schedule, only the conflicts of the
//! last attempt.
//!
//! # Edits
//! [`apply_rotation_assignment`] changes a single block and the
//! eligible / ineligible queries list who may take one. They check the
//! same capacity, vacation and month rules as the bulk build; requirement
//! counts only act as upper bounds so a rotation can be moved block by
//! block.
//!
//! # Complexity
//! Greedy steps are O(f · r · b) for f fellows, r requirements and b = 24
//! blocks; the early search is O(k^f) worst case over k protected keys.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::eligibility::{partition_fellows, IneligibleFellow, IneligibleReason};
use super::retry::{RetryPolicy, Shuffler};
use crate::config::{Grouping, RotationConfig, RotationRequirement, RotationTable};
use crate::error::{EditError, EditResult};
use crate::models::{AcademicCalendar, Fellow, Rotation, RotationSchedule, TrainingLevel};
use crate::validation::audit_rotations;

/// Input of a rotation build for one cohort.
#[derive(Debug, Clone)]
pub struct RotationRequest<'a> {
    /// Cohort level.
    pub level: TrainingLevel,
    /// Cohort fellows, in input order.
    pub fellows: Vec<&'a Fellow>,
    /// Academic calendar.
    pub calendar: &'a AcademicCalendar,
    /// Rules.
    pub config: &'a RotationConfig,
    /// Schedules of other levels (read-only occupancy).
    pub other_levels: Vec<&'a RotationSchedule>,
    /// Existing assignments to preserve.
    pub existing: Option<&'a RotationSchedule>,
}

impl<'a> RotationRequest<'a> {
    /// Creates a request for the `level` cohort of a roster.
    pub fn new(
        level: TrainingLevel,
        roster: &'a [Fellow],
        calendar: &'a AcademicCalendar,
        config: &'a RotationConfig,
    ) -> Self {
        Self {
            level,
            fellows: roster.iter().filter(|f| f.level == level).collect(),
            calendar,
            config,
            other_levels: Vec::new(),
            existing: None,
        }
    }

    /// Adds schedules of other levels.
    pub fn with_other_levels(
        mut self,
        schedules: impl IntoIterator<Item = &'a RotationSchedule>,
    ) -> Self {
        self.other_levels
            .extend(schedules.into_iter().filter(|s| s.level != self.level));
        self
    }

    /// Sets existing assignments to preserve.
    pub fn with_existing(mut self, existing: &'a RotationSchedule) -> Self {
        self.existing = Some(existing);
        self
    }
}

/// Result of a rotation build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationOutcome {
    /// The schedule; `None` on failure.
    pub schedule: Option<RotationSchedule>,
    /// Whether the build succeeded.
    pub success: bool,
    /// Attempts made.
    pub attempts: usize,
    /// Constraints that could not be satisfied (last attempt).
    pub conflicts: Vec<String>,
}

impl RotationOutcome {
    fn failed(attempts: usize, conflicts: Vec<String>) -> Self {
        Self {
            schedule: None,
            success: false,
            attempts,
            conflicts,
        }
    }
}

/// Builds the rotation schedule of one cohort.
pub fn build_rotations(request: &RotationRequest<'_>, policy: &RetryPolicy) -> RotationOutcome {
    if !request.calendar.is_valid() {
        return RotationOutcome::failed(0, vec!["invalid academic calendar".to_string()]);
    }
    let Some(table) = request.config.table(request.level) else {
        return RotationOutcome::failed(
            0,
            vec![format!("no rotation table for {}", request.level)],
        );
    };

    info!(
        level = %request.level,
        fellows = request.fellows.len(),
        max_attempts = policy.max_attempts,
        randomized = policy.is_randomized(),
        pinned = request.existing.is_some(),
        "building rotation schedule"
    );

    let outcome = policy.run(|shuffler| Placement::new(request, table).attempt(shuffler));
    match outcome.result {
        Ok(schedule) => {
            info!(level = %request.level, attempts = outcome.attempts, "rotation schedule built");
            RotationOutcome {
                schedule: Some(schedule),
                success: true,
                attempts: outcome.attempts,
                conflicts: Vec::new(),
            }
        }
        Err(conflicts) => {
            warn!(
                level = %request.level,
                attempts = outcome.attempts,
                conflicts = conflicts.len(),
                "rotation schedule infeasible"
            );
            RotationOutcome::failed(outcome.attempts, conflicts)
        }
    }
}

// ================================
// Rules
// ================================

/// Placement rules of one cohort, evaluated against any schedule.
///
/// The bulk build and single-block edits both go through these checks.
struct Rules<'r, 'a> {
    request: &'r RotationRequest<'a>,
    table: &'r RotationTable,
    keys: Vec<String>,
}

impl<'r, 'a> Rules<'r, 'a> {
    fn new(request: &'r RotationRequest<'a>, table: &'r RotationTable) -> Self {
        Self {
            request,
            table,
            keys: request
                .calendar
                .blocks()
                .iter()
                .map(|b| b.key.clone())
                .collect(),
        }
    }

    fn month(i: usize) -> usize {
        i / 2
    }

    fn index_of(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    /// Block indices where `fellow` holds `rotation`, chronological.
    fn indices_of(&self, schedule: &RotationSchedule, fellow: &str, rotation: Rotation) -> Vec<usize> {
        let mut indices: Vec<usize> = schedule
            .blocks_with(fellow, rotation)
            .iter()
            .filter_map(|k| self.index_of(k))
            .collect();
        indices.sort_unstable();
        indices
    }

    fn vacation_load(&self, schedule: &RotationSchedule, i: usize) -> usize {
        let key = &self.keys[i];
        schedule.holders(key, Rotation::Vacation).len()
            + self
                .request
                .other_levels
                .iter()
                .map(|s| s.holders(key, Rotation::Vacation).len())
                .sum::<usize>()
    }

    /// Who already holds `rotation` in block `i`, in this cohort or, for
    /// cross-level labels, in another one.
    fn holder(&self, schedule: &RotationSchedule, i: usize, rotation: Rotation) -> Option<String> {
        let key = &self.keys[i];
        if let Some(holder) = schedule.holders(key, rotation).first() {
            return Some(holder.to_string());
        }
        if !self.request.config.is_cross_level(rotation) {
            return None;
        }
        self.request
            .other_levels
            .iter()
            .find_map(|s| s.holders(key, rotation).first().map(|h| h.to_string()))
    }

    fn vacation_reasons(&self, schedule: &RotationSchedule, fellow: &str, i: usize) -> Vec<IneligibleReason> {
        let rules = &self.request.config.vacation;
        let key = &self.keys[i];
        let mut reasons = Vec::new();
        if self.table.vacation_blackout.contains(key) {
            reasons.push(IneligibleReason::VacationBlackout { block: key.clone() });
        }
        if self.vacation_load(schedule, i) >= rules.max_per_block {
            reasons.push(IneligibleReason::VacationFull {
                block: key.clone(),
                max: rules.max_per_block,
            });
        }
        let held = self.indices_of(schedule, fellow, Rotation::Vacation);
        if held.len() >= rules.blocks_per_fellow {
            reasons.push(IneligibleReason::VacationLimit {
                max: rules.blocks_per_fellow,
            });
        }
        if let Some(&j) = held.iter().find(|&&j| i.abs_diff(j) < rules.min_spacing_blocks) {
            reasons.push(IneligibleReason::VacationSpacing {
                block: self.keys[j].clone(),
                min_blocks: rules.min_spacing_blocks,
            });
        }
        reasons
    }

    /// Month-level rules for `rotation` in block `i`: second half only,
    /// non-consecutive months, and rotations that may not sit next to it.
    ///
    /// For whole-month rotations the other half of the same month is the
    /// same placement, not a consecutive one.
    fn spacing_reasons(
        &self,
        schedule: &RotationSchedule,
        fellow: &str,
        i: usize,
        rotation: Rotation,
    ) -> Vec<IneligibleReason> {
        let month = Self::month(i);
        let requirement = self.table.requirement(rotation);
        let mut reasons = Vec::new();

        if requirement.is_some_and(|r| r.second_half_only) && month < 6 {
            reasons.push(IneligibleReason::SecondHalfOnly { rotation });
        }
        if let Some(r) = requirement.filter(|r| r.non_consecutive) {
            let same_month_ok = r.grouping == Grouping::WholeMonths;
            let clash = self
                .indices_of(schedule, fellow, rotation)
                .into_iter()
                .find(|&j| {
                    let m = Self::month(j);
                    month.abs_diff(m) <= 1 && !(same_month_ok && m == month)
                });
            if let Some(j) = clash {
                reasons.push(IneligibleReason::ConsecutiveMonths {
                    rotation,
                    block: self.keys[j].clone(),
                });
            }
        }

        let mut partners: Vec<Rotation> = requirement
            .and_then(|r| r.not_adjacent_to)
            .into_iter()
            .chain(
                self.table
                    .requirements
                    .iter()
                    .filter(|r| r.not_adjacent_to == Some(rotation))
                    .map(|r| r.rotation),
            )
            .collect();
        partners.sort();
        partners.dedup();
        for other in partners {
            let clash = self
                .indices_of(schedule, fellow, other)
                .into_iter()
                .find(|&j| month.abs_diff(Self::month(j)) <= 1);
            if let Some(j) = clash {
                reasons.push(IneligibleReason::AdjacentRotation {
                    rotation,
                    other,
                    block: self.keys[j].clone(),
                });
            }
        }
        reasons
    }

    /// Every reason `fellow` may not hold `rotation` in block `i`.
    ///
    /// The fellow's own entry for the block must already be cleared.
    fn assignment_reasons(
        &self,
        schedule: &RotationSchedule,
        fellow: &str,
        i: usize,
        rotation: Rotation,
    ) -> Vec<IneligibleReason> {
        if rotation.is_fill() {
            return Vec::new();
        }
        if rotation == Rotation::Vacation {
            return self.vacation_reasons(schedule, fellow, i);
        }

        let key = &self.keys[i];
        let mut reasons = Vec::new();
        if let Some(holder) = self.holder(schedule, i, rotation) {
            reasons.push(IneligibleReason::BlockTaken {
                block: key.clone(),
                rotation,
                holder,
            });
        }
        let early = self
            .table
            .early
            .as_ref()
            .filter(|e| e.rotation == rotation && e.keys.contains(key));
        if let Some(early) = early {
            let held = self
                .indices_of(schedule, fellow, rotation)
                .into_iter()
                .find(|&j| early.keys.contains(&self.keys[j]));
            if let Some(j) = held {
                reasons.push(IneligibleReason::EarlySlotHeld {
                    block: self.keys[j].clone(),
                    rotation,
                });
            }
        }
        if let Some(requirement) = self.table.requirement(rotation) {
            if schedule.count(fellow, rotation) >= requirement.blocks {
                reasons.push(IneligibleReason::RequirementMet {
                    rotation,
                    blocks: requirement.blocks,
                });
            }
        }
        reasons.extend(self.spacing_reasons(schedule, fellow, i, rotation));
        reasons
    }
}

// ================================
// Bulk placement
// ================================

/// State of a single attempt.
struct Placement<'r, 'a> {
    rules: Rules<'r, 'a>,
    schedule: RotationSchedule,
}

impl<'r, 'a> Placement<'r, 'a> {
    fn new(request: &'r RotationRequest<'a>, table: &'r RotationTable) -> Self {
        Self {
            rules: Rules::new(request, table),
            schedule: RotationSchedule::new(request.level),
        }
    }

    fn attempt(mut self, shuffler: &mut Shuffler) -> Result<RotationSchedule, Vec<String>> {
        let request = self.rules.request;
        let mut order: Vec<&str> = request.fellows.iter().map(|f| f.id.as_str()).collect();
        shuffler.fellows(&mut order);

        self.seed_pinned();
        self.place_vacations(&order, shuffler).map_err(|e| vec![e])?;
        self.place_early(&order, shuffler).map_err(|e| vec![e])?;
        self.place_requirements(&order, shuffler).map_err(|e| vec![e])?;
        self.fill_electives();

        let violations = audit_rotations(
            &self.schedule,
            &request.fellows,
            request.calendar,
            request.config,
            &request.other_levels,
        );
        if violations.is_empty() {
            Ok(self.schedule)
        } else {
            debug!(violations = violations.len(), "rotation audit failed");
            Err(violations.into_iter().map(|v| v.message).collect())
        }
    }

    fn holds(&self, fellow: &str, i: usize) -> Option<Rotation> {
        self.schedule.get(fellow, &self.rules.keys[i])
    }

    // ---------- step 1: pinned ----------

    fn seed_pinned(&mut self) {
        let request = self.rules.request;
        let Some(existing) = request.existing else {
            return;
        };
        let max_vacation = request.config.vacation.blocks_per_fellow;
        for fellow in &request.fellows {
            let Some(blocks) = existing.assignments.get(&fellow.id) else {
                continue;
            };
            for (key, rotation) in blocks {
                if rotation.is_fill() || self.rules.index_of(key).is_none() {
                    continue;
                }
                if *rotation == Rotation::Vacation {
                    if self.rules.table.vacation_blackout.contains(key) {
                        debug!(fellow = %fellow.id, block = %key, "reseating vacation from protected window");
                        continue;
                    }
                    if self.schedule.count(&fellow.id, Rotation::Vacation) >= max_vacation {
                        continue;
                    }
                }
                self.schedule.set(&fellow.id, key, *rotation);
            }
        }
    }

    // ---------- step 2: vacation ----------

    fn place_vacations(&mut self, order: &[&str], shuffler: &mut Shuffler) -> Result<(), String> {
        let request = self.rules.request;
        let per_fellow = request.config.vacation.blocks_per_fellow;
        for &fellow_id in order {
            let Some(fellow) = request.fellows.iter().find(|f| f.id == fellow_id) else {
                continue;
            };

            let mut all: Vec<usize> = (0..self.rules.keys.len()).collect();
            shuffler.slots(&mut all);
            let candidates: Vec<usize> = fellow
                .vacation_preferences
                .iter()
                .filter_map(|k| self.rules.index_of(k))
                .chain(all)
                .collect();

            for i in candidates {
                if self.schedule.count(fellow_id, Rotation::Vacation) >= per_fellow {
                    break;
                }
                if self.holds(fellow_id, i).is_some()
                    || !self.rules.vacation_reasons(&self.schedule, fellow_id, i).is_empty()
                {
                    continue;
                }
                self.schedule.set(fellow_id, &self.rules.keys[i], Rotation::Vacation);
            }

            let placed = self.schedule.count(fellow_id, Rotation::Vacation);
            if placed < per_fellow {
                return Err(format!(
                    "could not place vacation for {}: {placed} of {per_fellow} blocks",
                    fellow.display_name(),
                ));
            }
        }
        Ok(())
    }

    // ---------- step 3: early placement ----------

    fn place_early(&mut self, order: &[&str], shuffler: &mut Shuffler) -> Result<(), String> {
        let Some(early) = self.rules.table.early.clone() else {
            return Ok(());
        };
        let mut keys: Vec<usize> = Vec::with_capacity(early.keys.len());
        for key in &early.keys {
            match self.rules.index_of(key) {
                Some(i) => keys.push(i),
                None => return Err(format!("unknown protected block key {key}")),
            }
        }
        shuffler.slots(&mut keys);

        let needing: Vec<&str> = order
            .iter()
            .copied()
            .filter(|f| !keys.iter().any(|&i| self.holds(f, i) == Some(early.rotation)))
            .collect();
        if needing.len() > keys.len() {
            return Err(format!(
                "{} fellows need an early {} slot but only {} protected blocks exist",
                needing.len(),
                early.rotation,
                keys.len()
            ));
        }
        if self.assign_early(&needing, &keys, early.rotation) {
            Ok(())
        } else {
            Err(format!(
                "no distinct early {} slot in {} for every fellow",
                early.rotation,
                early.keys.join(",")
            ))
        }
    }

    fn assign_early(&mut self, fellows: &[&str], keys: &[usize], rotation: Rotation) -> bool {
        let Some((&first, rest)) = fellows.split_first() else {
            return true;
        };
        for &i in keys {
            if self.holds(first, i).is_some() || self.rules.holder(&self.schedule, i, rotation).is_some() {
                continue;
            }
            self.schedule.set(first, &self.rules.keys[i], rotation);
            if self.assign_early(rest, keys, rotation) {
                return true;
            }
            self.schedule.clear(first, &self.rules.keys[i]);
        }
        false
    }

    // ---------- step 4: requirements ----------

    fn place_requirements(&mut self, order: &[&str], shuffler: &mut Shuffler) -> Result<(), String> {
        let table = self.rules.table;
        for requirement in &table.requirements {
            let whole = requirement.grouping == Grouping::WholeMonths;
            for &fellow_id in order {
                if whole {
                    self.complete_months(fellow_id, requirement);
                }
                let have = self.schedule.count(fellow_id, requirement.rotation);
                let mut remaining = requirement.blocks.saturating_sub(have);
                if whole && remaining % 2 == 1 {
                    return Err(format!(
                        "{} for {fellow_id} needs {remaining} more block(s), which cannot form whole months",
                        requirement.rotation
                    ));
                }
                while remaining > 0 {
                    let mut units: Vec<Vec<usize>> = if whole {
                        (0..self.rules.keys.len() / 2)
                            .map(|m| vec![2 * m, 2 * m + 1])
                            .collect()
                    } else {
                        (0..self.rules.keys.len()).map(|i| vec![i]).collect()
                    };
                    shuffler.slots(&mut units);

                    let Some(unit) = units
                        .into_iter()
                        .find(|u| self.unit_fits(fellow_id, u, requirement.rotation))
                    else {
                        return Err(format!(
                            "could not place {} for {fellow_id}: {remaining} block(s) left",
                            requirement.rotation
                        ));
                    };
                    for &i in &unit {
                        self.schedule.set(fellow_id, &self.rules.keys[i], requirement.rotation);
                    }
                    remaining = remaining.saturating_sub(unit.len());
                }
            }
        }
        Ok(())
    }

    /// Fills the free other half of any month a pinned whole-month rotation
    /// only half occupies.
    fn complete_months(&mut self, fellow: &str, requirement: &RotationRequirement) {
        let rotation = requirement.rotation;
        for i in self.rules.indices_of(&self.schedule, fellow, rotation) {
            if self.schedule.count(fellow, rotation) >= requirement.blocks {
                break;
            }
            let other = i ^ 1;
            if other < self.rules.keys.len()
                && self.holds(fellow, other).is_none()
                && self.rules.holder(&self.schedule, other, rotation).is_none()
            {
                debug!(fellow, block = %self.rules.keys[other], %rotation, "completing month");
                self.schedule.set(fellow, &self.rules.keys[other], rotation);
            }
        }
    }

    fn unit_fits(&self, fellow: &str, unit: &[usize], rotation: Rotation) -> bool {
        if unit.iter().any(|&i| {
            self.holds(fellow, i).is_some() || self.rules.holder(&self.schedule, i, rotation).is_some()
        }) {
            return false;
        }
        // Protected keys only ever hold the one early placement.
        if let Some(early) = &self.rules.table.early {
            if early.rotation == rotation
                && unit.iter().any(|&i| early.keys.contains(&self.rules.keys[i]))
            {
                return false;
            }
        }
        self.rules
            .spacing_reasons(&self.schedule, fellow, unit[0], rotation)
            .is_empty()
    }

    // ---------- step 5: fill ----------

    fn fill_electives(&mut self) {
        let request = self.rules.request;
        for fellow in &request.fellows {
            for key in &self.rules.keys {
                if self.schedule.get(&fellow.id, key).is_none() {
                    self.schedule.set(&fellow.id, key, Rotation::Elective);
                }
            }
        }
    }
}

// ================================
// Edits and queries
// ================================

fn table_or_empty<'r>(request: &'r RotationRequest<'_>, empty: &'r RotationTable) -> &'r RotationTable {
    request.config.table(request.level).unwrap_or(empty)
}

/// Sets one block of a fellow to `rotation`, or back to elective with `None`.
///
/// The change is checked against the same capacity, vacation and month
/// rules as the bulk build. Counts are only checked as upper bounds, so a
/// rotation can be moved one block at a time. Returns the new schedule;
/// the input is never modified.
pub fn apply_rotation_assignment(
    schedule: &RotationSchedule,
    request: &RotationRequest<'_>,
    fellow_id: &str,
    block_key: &str,
    rotation: Option<Rotation>,
) -> EditResult<RotationSchedule> {
    let fellow = request
        .fellows
        .iter()
        .find(|f| f.id == fellow_id)
        .ok_or_else(|| EditError::UnknownFellow(fellow_id.to_string()))?;
    let empty = RotationTable::default();
    let rules = Rules::new(request, table_or_empty(request, &empty));
    let i = rules
        .index_of(block_key)
        .ok_or_else(|| EditError::UnknownBlock(block_key.to_string()))?;

    let rotation = rotation.unwrap_or(Rotation::Elective);
    let mut next = schedule.clone();
    next.clear(&fellow.id, block_key);
    let reasons = rules.assignment_reasons(&next, &fellow.id, i, rotation);
    if !reasons.is_empty() {
        return Err(EditError::Ineligible {
            fellow: fellow.id.clone(),
            reasons,
        });
    }
    next.set(&fellow.id, block_key, rotation);
    debug!(fellow = %fellow.id, block = block_key, %rotation, "rotation edited");
    Ok(next)
}

fn split_rotation_fellows<'a>(
    schedule: &RotationSchedule,
    request: &RotationRequest<'a>,
    block_key: &str,
    rotation: Rotation,
) -> (Vec<&'a Fellow>, Vec<IneligibleFellow>) {
    let empty = RotationTable::default();
    let rules = Rules::new(request, table_or_empty(request, &empty));
    let Some(i) = rules.index_of(block_key) else {
        return (Vec::new(), Vec::new());
    };
    partition_fellows(request.fellows.iter().copied(), |fellow| {
        let mut released = schedule.clone();
        released.clear(&fellow.id, block_key);
        rules.assignment_reasons(&released, &fellow.id, i, rotation)
    })
}

/// Cohort fellows who may hold `rotation` in `block_key`.
pub fn eligible_rotation_fellows<'a>(
    schedule: &RotationSchedule,
    request: &RotationRequest<'a>,
    block_key: &str,
    rotation: Rotation,
) -> Vec<&'a Fellow> {
    split_rotation_fellows(schedule, request, block_key, rotation).0
}

/// Cohort fellows who may not hold `rotation` in `block_key`, with reasons.
pub fn ineligible_rotation_fellows_with_reasons(
    schedule: &RotationSchedule,
    request: &RotationRequest<'_>,
    block_key: &str,
    rotation: Rotation,
) -> Vec<IneligibleFellow> {
    split_rotation_fellows(schedule, request, block_key, rotation).1
}
