//! Build and edit orchestration over a [`Repository`].
//!
//! Data flows strictly downstream:
//!
//! ```text
//! setup → rotations (per level) → primary call → { HF, jeopardy, clinic }
//! ```
//!
//! Each `build_*` loads everything upstream, fails with
//! [`WorkflowError::PrerequisiteMissing`] when a required schedule is
//! absent, runs its solver and saves the result. Each `assign_*` edit loads
//! the current schedule, validates the single change with the same rules
//! the bulk build uses, and saves the new schedule only if it is accepted.

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::ScheduleConfig;
use crate::error::{EditError, WorkflowError, WorkflowResult};
use crate::models::{
    cohort, AcademicCalendar, CallSchedule, ClinicSchedule, CoveragePartition, Fellow,
    HfSchedule, JeopardySchedule, Rotation, RotationSchedule, TrainingLevel,
};
use crate::repository::{Repository, ScheduleStore, Setup};
use crate::scheduler::{
    apply_call_assignment, apply_clinic_assignment, apply_hf_assignment,
    apply_jeopardy_assignment, apply_rotation_assignment, build_clinic, build_hf, build_jeopardy, build_primary_call,
    build_rotations, optimize_weekend_equity, CallOutcome, ClinicOutcome, DutyContext, DutyKpi,
    EditScope, HfOutcome, JeopardyOutcome, RetryPolicy, RotationOutcome, RotationRequest,
};
use crate::validation::validate_setup;

/// Upstream state loaded for a downstream solver.
struct Upstream {
    fellows: Vec<Fellow>,
    calendar: AcademicCalendar,
    rotations: Vec<RotationSchedule>,
}

/// Orchestrates solvers over a repository.
#[derive(Debug, Clone)]
pub struct Workflow<S> {
    repository: Repository<S>,
    config: ScheduleConfig,
}

impl<S: ScheduleStore> Workflow<S> {
    /// Creates a workflow.
    pub fn new(repository: Repository<S>, config: ScheduleConfig) -> Self {
        Self { repository, config }
    }

    /// The repository.
    pub fn repository(&self) -> &Repository<S> {
        &self.repository
    }

    /// The solver configuration.
    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    // ==== Loading ====

    fn setup(&self) -> WorkflowResult<Setup> {
        self.repository
            .load_setup()?
            .ok_or_else(|| WorkflowError::PrerequisiteMissing("setup".to_string()))
    }

    fn upstream(&self) -> WorkflowResult<Upstream> {
        let setup = self.setup()?;
        let calendar = setup.calendar();
        let mut rotations = Vec::new();
        for level in TrainingLevel::ALL {
            if cohort(&setup.fellows, level).is_empty() {
                continue;
            }
            let schedule = self.repository.load_rotations(level)?.ok_or_else(|| {
                WorkflowError::PrerequisiteMissing(format!("{level} rotation schedule"))
            })?;
            rotations.push(schedule);
        }
        Ok(Upstream {
            fellows: setup.fellows,
            calendar,
            rotations,
        })
    }

    fn primary_call(&self) -> WorkflowResult<CallSchedule> {
        self.repository
            .load_primary_call()?
            .ok_or_else(|| WorkflowError::PrerequisiteMissing("primary call schedule".to_string()))
    }

    fn partition(calendar: &AcademicCalendar) -> WorkflowResult<CoveragePartition> {
        CoveragePartition::for_calendar(calendar).map_err(|errors| {
            WorkflowError::InvalidPartition(errors.iter().map(ToString::to_string).collect())
        })
    }

    // ==== Setup ====

    /// Validates and saves the roster and academic year.
    pub fn save_setup(&self, setup: &Setup) -> WorkflowResult<()> {
        validate_setup(&setup.fellows, &setup.calendar()).map_err(|errors| {
            WorkflowError::InvalidSetup(errors.into_iter().map(|e| e.message).collect())
        })?;
        self.repository.save_setup(setup)?;
        info!(fellows = setup.fellows.len(), year_start = %setup.year_start, "setup saved");
        Ok(())
    }

    // ==== Builds ====

    /// Saved rotation schedules of every level but `level`.
    fn other_rotations(&self, level: TrainingLevel) -> WorkflowResult<Vec<RotationSchedule>> {
        let mut others = Vec::new();
        for other in TrainingLevel::ALL.into_iter().filter(|l| *l != level) {
            if let Some(schedule) = self.repository.load_rotations(other)? {
                others.push(schedule);
            }
        }
        Ok(others)
    }

    /// Builds and saves the rotation schedule of one level.
    ///
    /// Schedules already saved for other levels are respected as read-only
    /// occupancy. With `preserve_existing`, the non-elective entries of the
    /// level's saved schedule are pinned and only the rest is placed. A
    /// failed build saves nothing.
    pub fn build_rotations(
        &self,
        level: TrainingLevel,
        randomize: bool,
        seed: u64,
        preserve_existing: bool,
    ) -> WorkflowResult<RotationOutcome> {
        let setup = self.setup()?;
        let calendar = setup.calendar();
        let others = self.other_rotations(level)?;
        let existing = if preserve_existing {
            self.repository.load_rotations(level)?
        } else {
            None
        };

        let mut request = RotationRequest::new(level, &setup.fellows, &calendar, &self.config.rotation)
            .with_other_levels(others.iter());
        if let Some(existing) = &existing {
            request = request.with_existing(existing);
        }
        let outcome = build_rotations(&request, &RetryPolicy::from_flag(randomize, seed));
        match &outcome.schedule {
            Some(schedule) if outcome.success => self.repository.save_rotations(schedule)?,
            _ => warn!(level = %level, conflicts = outcome.conflicts.len(), "rotation build failed; nothing saved"),
        }
        Ok(outcome)
    }

    /// Builds and saves the primary-call schedule.
    pub fn build_primary_call(&self, randomize: bool, seed: u64) -> WorkflowResult<CallOutcome> {
        let up = self.upstream()?;
        let ctx = DutyContext::new(&up.fellows, &up.calendar).with_rotations(up.rotations.iter());
        let outcome = build_primary_call(
            &ctx,
            &self.config.call,
            &RetryPolicy::from_flag(randomize, seed),
        );
        self.repository.save_primary_call(&outcome.schedule)?;

        let roster: Vec<&Fellow> = up.fellows.iter().collect();
        let kpi = DutyKpi::primary_call(&outcome.schedule, &roster);
        info!(spread = kpi.spread, mean = kpi.mean, "primary call saved");
        Ok(outcome)
    }

    /// Builds and saves the HF coverage schedule.
    pub fn build_hf(&self, randomize: bool, seed: u64) -> WorkflowResult<HfOutcome> {
        let up = self.upstream()?;
        let call = self.primary_call()?;
        let partition = Self::partition(&up.calendar)?;
        let ctx = DutyContext::new(&up.fellows, &up.calendar)
            .with_rotations(up.rotations.iter())
            .with_call(&call);
        let outcome = build_hf(
            &ctx,
            &partition,
            &self.config.hf,
            &RetryPolicy::from_flag(randomize, seed),
        );
        self.repository.save_hf(&outcome.schedule)?;
        Ok(outcome)
    }

    /// Builds and saves the jeopardy schedule. Reads HF coverage if saved.
    pub fn build_jeopardy(&self, randomize: bool, seed: u64) -> WorkflowResult<JeopardyOutcome> {
        let up = self.upstream()?;
        let call = self.primary_call()?;
        let hf = self.repository.load_hf()?;
        let partition = Self::partition(&up.calendar)?;
        let mut ctx = DutyContext::new(&up.fellows, &up.calendar)
            .with_rotations(up.rotations.iter())
            .with_call(&call);
        if let Some(hf) = &hf {
            ctx = ctx.with_hf(hf);
        }
        let outcome = build_jeopardy(
            &ctx,
            &partition,
            &self.config.jeopardy,
            &RetryPolicy::from_flag(randomize, seed),
        );
        self.repository.save_jeopardy(&outcome.schedule)?;
        Ok(outcome)
    }

    /// Builds and saves the clinic schedule. Reads HF coverage if saved.
    pub fn build_clinic(&self) -> WorkflowResult<ClinicOutcome> {
        let up = self.upstream()?;
        let call = self.primary_call()?;
        let hf = self.repository.load_hf()?;
        let mut ctx = DutyContext::new(&up.fellows, &up.calendar)
            .with_rotations(up.rotations.iter())
            .with_call(&call);
        if let Some(hf) = &hf {
            ctx = ctx.with_hf(hf);
        }
        let outcome = build_clinic(&ctx, &self.config.clinic);
        self.repository.save_clinic(&outcome.schedule)?;
        Ok(outcome)
    }

    // ==== Edits ====

    /// Sets one rotation block of a fellow, or resets it to elective with `None`.
    pub fn assign_rotation(
        &self,
        fellow_id: &str,
        block_key: &str,
        rotation: Option<Rotation>,
    ) -> WorkflowResult<RotationSchedule> {
        let setup = self.setup()?;
        let calendar = setup.calendar();
        let level = setup
            .fellows
            .iter()
            .find(|f| f.id == fellow_id)
            .map(|f| f.level)
            .ok_or_else(|| EditError::UnknownFellow(fellow_id.to_string()))?;
        let current = self.repository.load_rotations(level)?.ok_or_else(|| {
            WorkflowError::PrerequisiteMissing(format!("{level} rotation schedule"))
        })?;
        let others = self.other_rotations(level)?;

        let request = RotationRequest::new(level, &setup.fellows, &calendar, &self.config.rotation)
            .with_other_levels(others.iter());
        let next = apply_rotation_assignment(&current, &request, fellow_id, block_key, rotation)?;
        self.repository.save_rotations(&next)?;
        info!(fellow = fellow_id, block = block_key, level = %level, "rotation edit saved");
        Ok(next)
    }

    /// Assigns or clears primary call on one date.
    pub fn assign_primary_call(
        &self,
        date: NaiveDate,
        fellow_id: Option<&str>,
    ) -> WorkflowResult<CallSchedule> {
        let up = self.upstream()?;
        let current = self.primary_call()?;
        let hf = self.repository.load_hf()?;
        let mut ctx = DutyContext::new(&up.fellows, &up.calendar).with_rotations(up.rotations.iter());
        if let Some(hf) = &hf {
            ctx = ctx.with_hf(hf);
        }
        let next = apply_call_assignment(&current, &ctx, &self.config.call, date, fellow_id)?;
        self.repository.save_primary_call(&next)?;
        Ok(next)
    }

    /// Evens weekend/holiday primary call inside a subgroup and saves the result.
    ///
    /// Returns the number of swaps made.
    pub fn balance_weekend_call(&self, subgroup: &[&str]) -> WorkflowResult<usize> {
        let up = self.upstream()?;
        let current = self.primary_call()?;
        let hf = self.repository.load_hf()?;
        let mut ctx = DutyContext::new(&up.fellows, &up.calendar).with_rotations(up.rotations.iter());
        if let Some(hf) = &hf {
            ctx = ctx.with_hf(hf);
        }
        let (next, swaps) = optimize_weekend_equity(&current, subgroup, &ctx, &self.config.call);
        if swaps > 0 {
            self.repository.save_primary_call(&next)?;
        }
        Ok(swaps)
    }

    /// Assigns or clears the HF unit containing `date`.
    pub fn assign_hf(&self, date: NaiveDate, fellow_id: Option<&str>) -> WorkflowResult<HfSchedule> {
        let up = self.upstream()?;
        let call = self.primary_call()?;
        let current = self
            .repository
            .load_hf()?
            .ok_or_else(|| WorkflowError::PrerequisiteMissing("HF schedule".to_string()))?;
        let partition = Self::partition(&up.calendar)?;
        let ctx = DutyContext::new(&up.fellows, &up.calendar)
            .with_rotations(up.rotations.iter())
            .with_call(&call);
        let next = apply_hf_assignment(&current, &ctx, &partition, &self.config.hf, date, fellow_id)?;
        self.repository.save_hf(&next)?;
        Ok(next)
    }

    /// Assigns or clears the jeopardy unit containing `date`.
    pub fn assign_jeopardy(
        &self,
        date: NaiveDate,
        fellow_id: Option<&str>,
        scope: EditScope,
    ) -> WorkflowResult<JeopardySchedule> {
        let up = self.upstream()?;
        let call = self.primary_call()?;
        let hf = self.repository.load_hf()?;
        let current = self
            .repository
            .load_jeopardy()?
            .ok_or_else(|| WorkflowError::PrerequisiteMissing("jeopardy schedule".to_string()))?;
        let partition = Self::partition(&up.calendar)?;
        let mut ctx = DutyContext::new(&up.fellows, &up.calendar)
            .with_rotations(up.rotations.iter())
            .with_call(&call);
        if let Some(hf) = &hf {
            ctx = ctx.with_hf(hf);
        }
        let next = apply_jeopardy_assignment(
            &current,
            &ctx,
            &partition,
            &self.config.jeopardy,
            date,
            fellow_id,
            scope,
        )?;
        self.repository.save_jeopardy(&next)?;
        Ok(next)
    }

    /// Assigns or removes one clinic session.
    pub fn assign_clinic(
        &self,
        date: NaiveDate,
        clinic: &str,
        fellow_id: Option<&str>,
    ) -> WorkflowResult<ClinicSchedule> {
        let up = self.upstream()?;
        let call = self.primary_call()?;
        let hf = self.repository.load_hf()?;
        let current = self
            .repository
            .load_clinic()?
            .ok_or_else(|| WorkflowError::PrerequisiteMissing("clinic schedule".to_string()))?;
        let mut ctx = DutyContext::new(&up.fellows, &up.calendar)
            .with_rotations(up.rotations.iter())
            .with_call(&call);
        if let Some(hf) = &hf {
            ctx = ctx.with_hf(hf);
        }
        let next = apply_clinic_assignment(&current, &ctx, &self.config.clinic, date, clinic, fellow_id)?;
        self.repository.save_clinic(&next)?;
        Ok(next)
    }
}
