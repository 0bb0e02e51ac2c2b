//! Running tasks — phases, duration accounting, subtasks, and teardown.
//!
//! A [`Task`] is split into its bookkeeping ([`TaskCore`]) and the
//! activity-specific phase handlers ([`TaskBehaviour`]). Each tick the
//! owner calls [`Task::perform_task`] with a time budget in millisols and
//! gets back whatever the task did not use.
//!
//! ```text
//! Created ──perform──▶ Running(phase) ──phase change──▶ Running(phase')
//!                           │                                 │
//!                           └──── duration spent / finish ────┴──▶ Done
//! ```
//!
//! `Done` is terminal and [`Task::end_task`] is idempotent.
//!
//! A task may own one active subtask, which may own another, to at most
//! `max_subtask_depth` levels below the root (3 by default). While a
//! subtask is active the parent's phase handlers do not run; time goes to
//! the deepest active task first and the remainder bubbles back up.

use crate::agent::{Worker, WorkerId, WorkerKind};
use crate::context::SchedulingContext;
use crate::error::{Result, TaskError};
use crate::event::{EventSink, TaskEvent};
use crate::history::{ActivityLog, ActivityRecord};
use crate::skills::SkillType;

/// Battery or energy spent per millisol of effort-driven work.
const EFFORT_ENERGY_PER_MILLISOL: f64 = 0.0005;

/// Stress discount stops growing at this effective skill level.
const STRESS_SKILL_CAP: f64 = 5.0;

/// Loop iterations allowed in one `perform_task` call.
const MAX_STEPS_PER_CALL: usize = 256;

/// A named step within a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskPhase(&'static str);

impl TaskPhase {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Everything a running task may touch while it executes.
pub struct TaskContext<'a> {
    pub worker: &'a mut dyn Worker,
    pub sched: &'a SchedulingContext,
    pub sink: &'a dyn EventSink,
    pub log: &'a mut ActivityLog,
}

/// Activity-specific phase handlers.
pub trait TaskBehaviour: Send + Sync {
    /// Spend up to `time` millisols in `phase`; return the unused time.
    ///
    /// Handlers change phase with [`TaskCore::set_phase`], start subtasks
    /// with [`TaskCore::add_sub_task`], and end the task with
    /// [`TaskCore::finish`].
    fn perform_phase(
        &mut self,
        phase: TaskPhase,
        time: f64,
        task: &mut TaskCore,
        ctx: &mut TaskContext<'_>,
    ) -> Result<f64>;

    /// Teardown hook, called exactly once when the task ends.
    fn clear_down(&mut self, _task: &mut TaskCore, _ctx: &mut TaskContext<'_>) {}
}

/// Bookkeeping shared by every task.
#[derive(Debug)]
pub struct TaskCore {
    name: String,
    description: String,
    owner: WorkerId,
    meta_id: Option<String>,
    phases: Vec<TaskPhase>,
    phase: Option<TaskPhase>,
    duration: Option<f64>,
    time_completed: f64,
    stress_modifier: f64,
    skills: Vec<SkillType>,
    experience_ratio: f64,
    effort_driven: bool,
    can_record: bool,
    record_completion: bool,
    finish_requested: bool,
    done: bool,
    level: u32,
    sub_task: Option<Box<Task>>,
}

impl TaskCore {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn owner(&self) -> WorkerId {
        self.owner
    }

    /// Stable ID of the descriptor that created this task, if any.
    pub fn meta_id(&self) -> Option<&str> {
        self.meta_id.as_deref()
    }

    pub fn phase(&self) -> Option<TaskPhase> {
        self.phase
    }

    pub fn phases(&self) -> &[TaskPhase] {
        &self.phases
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn time_completed(&self) -> f64 {
        self.time_completed
    }

    pub fn stress_modifier(&self) -> f64 {
        self.stress_modifier
    }

    pub fn skills(&self) -> &[SkillType] {
        &self.skills
    }

    pub fn is_effort_driven(&self) -> bool {
        self.effort_driven
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Whether phase changes go to the activity log.
    pub fn can_record(&self) -> bool {
        self.can_record
    }

    /// Depth in the subtask chain; the root task is level 0.
    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn sub_task(&self) -> Option<&Task> {
        self.sub_task.as_deref()
    }

    pub fn sub_task_mut(&mut self) -> Option<&mut Task> {
        self.sub_task.as_deref_mut()
    }

    pub fn has_active_sub_task(&self) -> bool {
        self.sub_task.as_ref().is_some_and(|s| !s.is_done())
    }

    pub fn set_description(&mut self, description: &str) {
        self.description = description.to_string();
    }

    /// Lengthen (or with a negative value shorten) a fixed duration.
    /// Tasks without a fixed duration are unaffected.
    pub fn extend_duration(&mut self, millisols: f64) {
        if let Some(d) = self.duration.as_mut() {
            *d = (*d + millisols).max(self.time_completed);
        }
    }

    /// Move to `phase`. A phase this task never registered clears the
    /// current phase instead.
    pub fn set_phase(&mut self, phase: Option<TaskPhase>, ctx: &mut TaskContext<'_>) {
        let phase = phase.filter(|p| self.phases.contains(p));
        self.phase = phase;
        let Some(phase) = phase else {
            return;
        };

        let now = ctx.sched.now();
        ctx.sink.publish(TaskEvent::PhaseChanged {
            worker: self.owner,
            task: self.name.clone(),
            phase: phase.name().to_string(),
            time: now,
        });
        if self.can_record {
            ctx.log.add(ActivityRecord {
                time: now,
                task: self.name.clone(),
                description: self.description.clone(),
                phase: phase.name().to_string(),
            });
        }
    }

    /// Ask for the task to end; teardown runs as soon as the current phase
    /// handler returns.
    pub fn finish(&mut self) {
        self.finish_requested = true;
    }

    /// Attach a subtask.
    ///
    /// With no subtask, or a finished one, `sub` becomes the child. If an
    /// active subtask with a different description exists, the call is
    /// passed down to it. Returns `Ok(false)` when an active subtask with
    /// the same description is already running.
    pub fn add_sub_task(&mut self, mut sub: Task, ctx: &mut TaskContext<'_>) -> Result<bool> {
        if let Some(existing) = self.sub_task.as_deref_mut() {
            if !existing.is_done() {
                if existing.description() == sub.description() {
                    return Ok(false);
                }
                return existing.core.add_sub_task(sub, ctx);
            }
        }

        let level = self.level + 1;
        let max = ctx.sched.config().max_subtask_depth;
        if level > max {
            return Err(TaskError::SubTaskDepth {
                task: sub.core.name.clone(),
                max,
            });
        }
        sub.core.level = level;

        ctx.sink.publish(TaskEvent::SubTaskAdded {
            worker: self.owner,
            parent: self.name.clone(),
            task: sub.core.name.clone(),
            level,
            time: ctx.sched.now(),
        });
        if sub.core.can_record {
            if let Some(phase) = sub.core.phase {
                ctx.log.add(ActivityRecord {
                    time: ctx.sched.now(),
                    task: sub.core.name.clone(),
                    description: sub.core.description.clone(),
                    phase: phase.name().to_string(),
                });
            }
        }
        self.sub_task = Some(Box::new(sub));
        Ok(true)
    }

    fn duration_spent(&self, epsilon: f64) -> bool {
        self.duration
            .is_some_and(|d| self.time_completed >= d - epsilon)
    }
}

/// A running activity.
pub struct Task {
    core: TaskCore,
    behaviour: Box<dyn TaskBehaviour>,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("core", &self.core).finish_non_exhaustive()
    }
}

impl Task {
    pub fn core(&self) -> &TaskCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut TaskCore {
        &mut self.core
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }

    pub fn description(&self) -> &str {
        self.core.description()
    }

    pub fn phase(&self) -> Option<TaskPhase> {
        self.core.phase()
    }

    pub fn duration(&self) -> Option<f64> {
        self.core.duration()
    }

    pub fn time_completed(&self) -> f64 {
        self.core.time_completed()
    }

    pub fn is_done(&self) -> bool {
        self.core.is_done()
    }

    pub fn level(&self) -> u32 {
        self.core.level()
    }

    pub fn sub_task(&self) -> Option<&Task> {
        self.core.sub_task()
    }

    /// Deepest task in the active chain, `self` if there is no active subtask.
    pub fn active_leaf(&self) -> &Task {
        match self.core.sub_task() {
            Some(sub) if !sub.is_done() => sub.active_leaf(),
            _ => self,
        }
    }

    pub fn add_sub_task(&mut self, sub: Task, ctx: &mut TaskContext<'_>) -> Result<bool> {
        self.core.add_sub_task(sub, ctx)
    }

    /// Spend up to `time` millisols on this task and its subtasks.
    /// Returns the time left over.
    pub fn perform_task(&mut self, time: f64, ctx: &mut TaskContext<'_>) -> Result<f64> {
        let epsilon = ctx.sched.config().time_epsilon;
        let mut time_left = time;
        let mut steps = 0;

        while time_left > 0.0 && !self.core.done && steps < MAX_STEPS_PER_CALL {
            steps += 1;

            if let Some(sub) = self.core.sub_task.as_deref_mut().filter(|s| !s.is_done()) {
                time_left = sub.perform_task(time_left, ctx)?;
                if !sub.is_done() {
                    break;
                }
                continue;
            }

            if self.core.effort_driven && ctx.worker.performance_rating() <= 0.0 {
                self.give_up(ctx);
                break;
            }

            let Some(phase) = self.core.phase else {
                break;
            };
            if self.core.duration_spent(epsilon) {
                self.end_task(ctx);
                break;
            }

            let budget = match self.core.duration {
                Some(d) => (d - self.core.time_completed).min(time_left),
                None => time_left,
            };
            let remaining = self
                .behaviour
                .perform_phase(phase, budget, &mut self.core, ctx)?
                .clamp(0.0, budget);
            let used = budget - remaining;
            self.core.time_completed += used;
            time_left -= used;
            if used > 0.0 {
                self.apply_effort(used, ctx);
            }

            if self.core.finish_requested || self.core.duration_spent(epsilon) {
                self.end_task(ctx);
            }
            if time_left < epsilon {
                time_left = 0.0;
            }

            // A handler that neither spent time nor moved on would spin forever
            let progressed = used > 0.0
                || self.core.phase != Some(phase)
                || self.core.has_active_sub_task();
            if !progressed {
                break;
            }
        }

        Ok(time_left)
    }

    /// Effort-driven work by a worker who can no longer perform: nudge
    /// them back toward functioning and drop the task.
    fn give_up(&mut self, ctx: &mut TaskContext<'_>) {
        let config = ctx.sched.config();
        let nudge = match ctx.worker.kind() {
            WorkerKind::Person => config.person_recovery_nudge,
            WorkerKind::Robot => config.robot_recovery_nudge,
        };
        log::debug!("{} too exhausted for {}; giving up", ctx.worker.name(), self.core.name);
        ctx.worker.recover(nudge);
        self.end_task(ctx);
    }

    /// Stress and experience for `time` millisols of work.
    fn apply_effort(&mut self, time: f64, ctx: &mut TaskContext<'_>) {
        let skill = ctx.worker.skills().average_level(&self.core.skills);

        if self.core.stress_modifier != 0.0 {
            let mut modifier = self.core.stress_modifier;
            if modifier > 0.0 {
                // Practiced hands find the work less stressful
                modifier *= 1.0 - skill.min(STRESS_SKILL_CAP) / (2.0 * STRESS_SKILL_CAP);
            }
            ctx.worker.add_stress(modifier * time);
        }

        if self.core.effort_driven {
            ctx.worker.reduce_energy(EFFORT_ENERGY_PER_MILLISOL * time);
        }

        if !self.core.skills.is_empty() && self.core.experience_ratio > 0.0 {
            let points = time / self.core.experience_ratio
                * ctx.worker.attributes().experience_multiplier()
                * ctx.worker.teacher_bonus();
            let skills = self.core.skills.clone();
            let manager = ctx.worker.skills_mut();
            for skill in skills {
                manager.add_experience(skill, points);
            }
        }
    }

    /// End the task and its whole subtask chain. Safe to call repeatedly;
    /// only the first call has any effect.
    pub fn end_task(&mut self, ctx: &mut TaskContext<'_>) {
        if self.core.done {
            return;
        }
        self.core.done = true;
        self.behaviour.clear_down(&mut self.core, ctx);

        let description = std::mem::take(&mut self.core.description);
        self.core.phase = None;

        if let Some(sub) = self.core.sub_task.as_deref_mut() {
            sub.end_task(ctx);
        }

        let now = ctx.sched.now();
        ctx.sink.publish(TaskEvent::Ended {
            worker: self.core.owner,
            task: self.core.name.clone(),
            description: description.clone(),
            level: self.core.level,
            time: now,
        });
        if self.core.record_completion {
            ctx.log.add(ActivityRecord {
                time: now,
                task: self.core.name.clone(),
                description,
                phase: "Completed".to_string(),
            });
        }
    }
}

/// Builder for [`Task`]; validates owner and duration.
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    name: String,
    description: String,
    owner: Option<WorkerId>,
    meta_id: Option<String>,
    phases: Vec<TaskPhase>,
    initial_phase: Option<TaskPhase>,
    duration: Option<f64>,
    stress_modifier: f64,
    skills: Vec<SkillType>,
    experience_ratio: f64,
    effort_driven: bool,
    can_record: bool,
    record_completion: bool,
}

impl TaskBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: name.to_string(),
            owner: None,
            meta_id: None,
            phases: Vec::new(),
            initial_phase: None,
            duration: None,
            stress_modifier: 0.0,
            skills: Vec::new(),
            experience_ratio: 0.0,
            effort_driven: true,
            can_record: true,
            record_completion: false,
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn owner(mut self, worker: &dyn Worker) -> Self {
        self.owner = Some(worker.id());
        self
    }

    pub fn owner_id(mut self, id: WorkerId) -> Self {
        self.owner = Some(id);
        self
    }

    pub fn meta_id(mut self, id: &str) -> Self {
        self.meta_id = Some(id.to_string());
        self
    }

    /// Register the phases this task may be in; the first is the starting phase.
    pub fn phases(mut self, phases: &[TaskPhase]) -> Self {
        self.phases = phases.to_vec();
        self.initial_phase = phases.first().copied();
        self
    }

    /// Override the starting phase.
    pub fn start_phase(mut self, phase: TaskPhase) -> Self {
        self.initial_phase = Some(phase);
        self
    }

    /// Fixed duration in millisols.
    pub fn duration(mut self, millisols: f64) -> Self {
        self.duration = Some(millisols);
        self
    }

    /// Stress added per millisol; negative values relieve stress.
    pub fn stress(mut self, per_millisol: f64) -> Self {
        self.stress_modifier = per_millisol;
        self
    }

    /// Skills trained by the task and millisols per experience point.
    pub fn skills(mut self, skills: &[SkillType], experience_ratio: f64) -> Self {
        self.skills = skills.to_vec();
        self.experience_ratio = experience_ratio;
        self
    }

    pub fn effort_driven(mut self, effort_driven: bool) -> Self {
        self.effort_driven = effort_driven;
        self
    }

    /// Do not write phase changes to the activity log.
    pub fn unrecorded(mut self) -> Self {
        self.can_record = false;
        self
    }

    /// Write a completion entry to the activity log when the task ends.
    pub fn record_completion(mut self) -> Self {
        self.record_completion = true;
        self
    }

    pub fn build(self, behaviour: impl TaskBehaviour + 'static) -> Result<Task> {
        let owner = self.owner.ok_or_else(|| TaskError::MissingOwner(self.name.clone()))?;
        if let Some(d) = self.duration {
            if !d.is_finite() || d <= 0.0 {
                return Err(TaskError::InvalidDuration(d));
            }
        }
        let phase = self.initial_phase.filter(|p| self.phases.contains(p));

        Ok(Task {
            core: TaskCore {
                name: self.name,
                description: self.description,
                owner,
                meta_id: self.meta_id,
                phases: self.phases,
                phase,
                duration: self.duration,
                time_completed: 0.0,
                stress_modifier: self.stress_modifier,
                skills: self.skills,
                experience_ratio: self.experience_ratio,
                effort_driven: self.effort_driven,
                can_record: self.can_record,
                record_completion: self.record_completion,
                finish_requested: false,
                done: false,
                level: 0,
                sub_task: None,
            },
            behaviour: Box::new(behaviour),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Colonist;
    use crate::event::RecordingSink;
    use crate::settlement::SettlementId;

    const WORKING: TaskPhase = TaskPhase::new("Working");
    const TIDYING: TaskPhase = TaskPhase::new("Tidying");
    const UNKNOWN: TaskPhase = TaskPhase::new("Unknown");

    /// Spends all offered time in WORKING, switching to TIDYING after
    /// `switch_after` millisols, and finishes after `finish_after`.
    struct Worklike {
        switch_after: f64,
        finish_after: Option<f64>,
        spent: f64,
        cleared: u32,
    }

    impl Worklike {
        fn new() -> Self {
            Self {
                switch_after: f64::INFINITY,
                finish_after: None,
                spent: 0.0,
                cleared: 0,
            }
        }
    }

    impl TaskBehaviour for Worklike {
        fn perform_phase(
            &mut self,
            phase: TaskPhase,
            time: f64,
            task: &mut TaskCore,
            ctx: &mut TaskContext<'_>,
        ) -> Result<f64> {
            let mut used = time;
            if phase == WORKING {
                used = used.min((self.switch_after - self.spent).max(0.0));
            }
            if let Some(limit) = self.finish_after {
                used = used.min((limit - self.spent).max(0.0));
            }
            self.spent += used;
            if phase == WORKING && self.spent >= self.switch_after {
                task.set_phase(Some(TIDYING), ctx);
            }
            if self.finish_after.is_some_and(|l| self.spent >= l) {
                task.finish();
            }
            Ok(time - used)
        }

        fn clear_down(&mut self, _task: &mut TaskCore, _ctx: &mut TaskContext<'_>) {
            self.cleared += 1;
        }
    }

    struct Harness {
        worker: Colonist,
        sched: SchedulingContext,
        sink: RecordingSink,
        log: ActivityLog,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                worker: Colonist::person(1, "Ada", SettlementId(1)),
                sched: SchedulingContext::default(),
                sink: RecordingSink::new(),
                log: ActivityLog::new(7),
            }
        }

        fn ctx(&mut self) -> TaskContext<'_> {
            TaskContext {
                worker: &mut self.worker,
                sched: &self.sched,
                sink: &self.sink,
                log: &mut self.log,
            }
        }
    }

    fn task(name: &str, behaviour: Worklike) -> Task {
        TaskBuilder::new(name)
            .owner_id(WorkerId(1))
            .phases(&[WORKING, TIDYING])
            .build(behaviour)
            .unwrap()
    }

    #[test]
    fn test_build_rejects_bad_duration() {
        for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let err = TaskBuilder::new("Bad")
                .owner_id(WorkerId(1))
                .duration(bad)
                .build(Worklike::new())
                .unwrap_err();
            assert!(matches!(err, TaskError::InvalidDuration(_)), "duration {bad}");
        }
    }

    #[test]
    fn test_build_requires_owner() {
        let err = TaskBuilder::new("Orphan").build(Worklike::new()).unwrap_err();
        assert!(matches!(err, TaskError::MissingOwner(_)));
    }

    #[test]
    fn test_build_with_duration() {
        let t = TaskBuilder::new("Fixed")
            .owner_id(WorkerId(1))
            .duration(50.0)
            .build(Worklike::new())
            .unwrap();
        assert_eq!(t.duration(), Some(50.0));
        assert_eq!(t.level(), 0);
    }

    #[test]
    fn test_fixed_duration_auto_ends_and_returns_remainder() {
        let mut h = Harness::new();
        let mut t = TaskBuilder::new("Fixed")
            .owner_id(WorkerId(1))
            .phases(&[WORKING])
            .duration(30.0)
            .build(Worklike::new())
            .unwrap();

        let left = t.perform_task(20.0, &mut h.ctx()).unwrap();
        assert_eq!(left, 0.0);
        assert!(!t.is_done());

        let left = t.perform_task(20.0, &mut h.ctx()).unwrap();
        assert!((left - 10.0).abs() < 1e-9);
        assert!(t.is_done());
        assert_eq!(t.phase(), None);
        assert_eq!(t.description(), "");
    }

    #[test]
    fn test_end_task_is_idempotent() {
        let mut h = Harness::new();
        let mut t = task("Chore", Worklike::new());
        t.end_task(&mut h.ctx());
        t.end_task(&mut h.ctx());
        assert!(t.is_done());
        assert_eq!(h.sink.count(|e| matches!(e, TaskEvent::Ended { .. })), 1);
    }

    #[test]
    fn test_finish_from_handler() {
        let mut h = Harness::new();
        let mut b = Worklike::new();
        b.finish_after = Some(15.0);
        let mut t = task("Chore", b);
        let left = t.perform_task(40.0, &mut h.ctx()).unwrap();
        assert!(t.is_done());
        assert!((left - 25.0).abs() < 1e-9);
        assert!((t.time_completed() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_phase_change_recorded() {
        let mut h = Harness::new();
        let mut b = Worklike::new();
        b.switch_after = 10.0;
        let mut t = task("Chore", b);
        t.perform_task(25.0, &mut h.ctx()).unwrap();
        assert_eq!(t.phase(), Some(TIDYING));
        assert_eq!(h.log.last().map(|r| r.phase.as_str()), Some("Tidying"));
        assert_eq!(h.sink.count(|e| matches!(e, TaskEvent::PhaseChanged { .. })), 1);
    }

    #[test]
    fn test_unregistered_phase_clears() {
        let mut h = Harness::new();
        let mut t = task("Chore", Worklike::new());
        t.core_mut().set_phase(Some(UNKNOWN), &mut h.ctx());
        assert_eq!(t.phase(), None);
        // No phase: nothing to run, all time returned
        let left = t.perform_task(10.0, &mut h.ctx()).unwrap();
        assert_eq!(left, 10.0);
    }

    #[test]
    fn test_subtask_runs_first_and_bubbles_remainder() {
        let mut h = Harness::new();
        let mut parent = task("Parent", Worklike::new());
        let sub = TaskBuilder::new("Child")
            .owner_id(WorkerId(1))
            .phases(&[WORKING])
            .duration(10.0)
            .build(Worklike::new())
            .unwrap();
        assert!(parent.add_sub_task(sub, &mut h.ctx()).unwrap());
        assert_eq!(parent.sub_task().map(|s| s.level()), Some(1));
        assert_eq!(parent.active_leaf().name(), "Child");

        parent.perform_task(25.0, &mut h.ctx()).unwrap();
        let child = parent.sub_task().unwrap();
        assert!(child.is_done());
        // Parent got the 15 millisols the child did not need
        assert!((parent.time_completed() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_subtask_chain_depth_bounded() {
        let mut h = Harness::new();
        let mut root = task("Root", Worklike::new());
        for (i, name) in ["L1", "L2", "L3"].iter().enumerate() {
            let sub = task(name, Worklike::new());
            assert!(root.add_sub_task(sub, &mut h.ctx()).unwrap());
            assert_eq!(root.active_leaf().level(), i as u32 + 1);
        }
        let err = root.add_sub_task(task("L4", Worklike::new()), &mut h.ctx()).unwrap_err();
        assert!(matches!(err, TaskError::SubTaskDepth { max: 3, .. }));
    }

    #[test]
    fn test_same_description_subtask_rejected() {
        let mut h = Harness::new();
        let mut root = task("Root", Worklike::new());
        assert!(root.add_sub_task(task("Twin", Worklike::new()), &mut h.ctx()).unwrap());
        assert!(!root.add_sub_task(task("Twin", Worklike::new()), &mut h.ctx()).unwrap());
    }

    #[test]
    fn test_end_task_ends_subtasks() {
        let mut h = Harness::new();
        let mut root = task("Root", Worklike::new());
        root.add_sub_task(task("L1", Worklike::new()), &mut h.ctx()).unwrap();
        root.add_sub_task(task("L2", Worklike::new()), &mut h.ctx()).unwrap();
        root.end_task(&mut h.ctx());
        let l1 = root.sub_task().unwrap();
        assert!(l1.is_done());
        assert!(l1.sub_task().unwrap().is_done());
        assert_eq!(h.sink.count(|e| matches!(e, TaskEvent::Ended { .. })), 3);
    }

    #[test]
    fn test_exhausted_worker_gives_up_effort_task() {
        let mut h = Harness::new();
        h.worker.condition.performance = 0.0;
        let mut t = task("Dig", Worklike::new());
        let left = t.perform_task(10.0, &mut h.ctx()).unwrap();
        assert!(t.is_done());
        assert_eq!(left, 10.0);
        assert!(h.worker.condition.performance > 0.0);
    }

    #[test]
    fn test_stress_and_experience_applied() {
        let mut h = Harness::new();
        let mut t = TaskBuilder::new("Fix")
            .owner_id(WorkerId(1))
            .phases(&[WORKING])
            .stress(0.1)
            .skills(&[SkillType::Mechanics], 1.0)
            .build(Worklike::new())
            .unwrap();
        let stress_before = h.worker.condition.stress;
        t.perform_task(30.0, &mut h.ctx()).unwrap();
        // Untrained: full 0.1 per millisol
        assert!((h.worker.condition.stress - stress_before - 3.0).abs() < 1e-9);
        assert_eq!(h.worker.skills.level(SkillType::Mechanics), 1);
    }

    #[test]
    fn test_extend_duration() {
        let mut t = TaskBuilder::new("Fixed")
            .owner_id(WorkerId(1))
            .duration(50.0)
            .build(Worklike::new())
            .unwrap();
        t.core_mut().extend_duration(20.0);
        assert_eq!(t.duration(), Some(70.0));
    }
}
