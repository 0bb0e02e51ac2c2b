//! Task descriptors — the immutable templates the scheduler chooses from.
//!
//! A [`MetaTask`] pairs a [`TaskDescriptor`] (who may do it, when, and what
//! it trains) with four hooks: base suitability and construction, each for
//! persons and robots. Every hook has an explicit "unsupported" default, so
//! the registry can hold any mix of descriptors without special cases.
//!
//! Settlement-scoped providers additionally override
//! [`MetaTask::settlement_tasks`] to publish shared, demand-limited jobs
//! into the settlement pool.

use serde::{Deserialize, Serialize};

use crate::agent::{JobType, RobotType, RoleType, Worker, WorkerKind};
use crate::context::SchedulingContext;
use crate::error::{Result, TaskError};
use crate::job::{Focus, SettlementNeed};
use crate::modifiers;
use crate::settlement::Settlement;
use crate::task::Task;

/// Which kinds of worker a descriptor supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerType {
    Person,
    Robot,
    Both,
}

impl WorkerType {
    pub fn supports(self, kind: WorkerKind) -> bool {
        match self {
            WorkerType::Both => true,
            WorkerType::Person => kind == WorkerKind::Person,
            WorkerType::Robot => kind == WorkerKind::Robot,
        }
    }
}

/// When a descriptor may be offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskScope {
    AnyHour,
    WorkHour,
    NonWorkHour,
}

impl TaskScope {
    /// Duty partition: any-hour plus work-hour tasks.
    pub fn on_duty(self) -> bool {
        matches!(self, TaskScope::AnyHour | TaskScope::WorkHour)
    }

    /// Off-duty partition: any-hour plus non-work-hour tasks.
    pub fn off_duty(self) -> bool {
        matches!(self, TaskScope::AnyHour | TaskScope::NonWorkHour)
    }

    pub fn allows(self, on_duty: bool) -> bool {
        if on_duty {
            self.on_duty()
        } else {
            self.off_duty()
        }
    }
}

/// Character of the effort a task demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskTrait {
    Academic,
    Agility,
    Artistic,
    Leadership,
    Medical,
    Organization,
    People,
    /// Passive: the task is not effort-driven.
    Relaxation,
    Strength,
    Teaching,
    Treatment,
}

/// Hobby categories a person may favour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FavoriteType {
    Astronomy,
    Cooking,
    FieldWork,
    Gaming,
    LabExperimentation,
    Operation,
    Research,
    Sport,
    Tinkering,
}

/// Immutable description of one selectable activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescriptor {
    id: String,
    name: String,
    worker_type: WorkerType,
    scope: TaskScope,
    traits: Vec<TaskTrait>,
    favorites: Vec<FavoriteType>,
    preferred_jobs: Vec<JobType>,
    preferred_roles: Vec<RoleType>,
    preferred_robots: Vec<RobotType>,
    effort_driven: bool,
    eva: bool,
}

impl TaskDescriptor {
    /// Create a descriptor. The ID is the stable lookup key; the name is
    /// what the task is called once running.
    pub fn new(id: &str, name: &str, worker_type: WorkerType, scope: TaskScope) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            worker_type,
            scope,
            traits: Vec::new(),
            favorites: Vec::new(),
            preferred_jobs: Vec::new(),
            preferred_roles: Vec::new(),
            preferred_robots: Vec::new(),
            effort_driven: true,
            eva: false,
        }
    }

    /// Set the trait list. Effort-driven unless [`TaskTrait::Relaxation`] is present.
    pub fn with_traits(mut self, traits: &[TaskTrait]) -> Self {
        self.traits = traits.to_vec();
        self.effort_driven = !self.traits.contains(&TaskTrait::Relaxation);
        self
    }

    pub fn with_favorites(mut self, favorites: &[FavoriteType]) -> Self {
        self.favorites = favorites.to_vec();
        self
    }

    pub fn with_preferred_jobs(mut self, jobs: &[JobType]) -> Self {
        self.preferred_jobs = jobs.to_vec();
        self
    }

    pub fn with_preferred_roles(mut self, roles: &[RoleType]) -> Self {
        self.preferred_roles = roles.to_vec();
        self
    }

    pub fn with_preferred_robots(mut self, robots: &[RobotType]) -> Self {
        self.preferred_robots = robots.to_vec();
        self
    }

    /// Mark as an EVA activity, subject to radiation and EVA-fitness gates.
    pub fn with_eva(mut self) -> Self {
        self.eva = true;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn worker_type(&self) -> WorkerType {
        self.worker_type
    }

    pub fn scope(&self) -> TaskScope {
        self.scope
    }

    pub fn traits(&self) -> &[TaskTrait] {
        &self.traits
    }

    pub fn favorites(&self) -> &[FavoriteType] {
        &self.favorites
    }

    pub fn preferred_jobs(&self) -> &[JobType] {
        &self.preferred_jobs
    }

    pub fn preferred_roles(&self) -> &[RoleType] {
        &self.preferred_roles
    }

    pub fn preferred_robots(&self) -> &[RobotType] {
        &self.preferred_robots
    }

    pub fn is_effort_driven(&self) -> bool {
        self.effort_driven
    }

    pub fn is_eva(&self) -> bool {
        self.eva
    }
}

/// Closed interface over every selectable activity.
///
/// Implementations hold no per-worker state; one instance is shared by all
/// workers for the life of the process.
pub trait MetaTask: Send + Sync {
    fn descriptor(&self) -> &TaskDescriptor;

    /// Base suitability for a person, before generic modifiers.
    /// `None` means the descriptor does not apply to persons.
    fn person_probability(&self, _person: &dyn Worker, _ctx: &SchedulingContext) -> Option<f64> {
        None
    }

    /// Base suitability for a robot, before generic modifiers.
    fn robot_probability(&self, _robot: &dyn Worker, _ctx: &SchedulingContext) -> Option<f64> {
        None
    }

    fn construct_for_person(
        &self,
        person: &dyn Worker,
        _ctx: &SchedulingContext,
        _focus: Option<&Focus>,
    ) -> Result<Task> {
        Err(self.unsupported(person.kind()))
    }

    fn construct_for_robot(
        &self,
        robot: &dyn Worker,
        _ctx: &SchedulingContext,
        _focus: Option<&Focus>,
    ) -> Result<Task> {
        Err(self.unsupported(robot.kind()))
    }

    /// Whether this descriptor publishes shared jobs into settlement pools.
    fn is_settlement_provider(&self) -> bool {
        false
    }

    /// Shared work this descriptor currently wants done at a settlement.
    /// The pool wraps each need into a demand-limited job.
    fn settlement_tasks(&self, _settlement: &Settlement, _ctx: &SchedulingContext) -> Vec<SettlementNeed> {
        Vec::new()
    }

    /// Per-worker multiplier applied to a shared job's score. Zero hides
    /// the job from this worker.
    fn settlement_factor(&self, worker: &dyn Worker, ctx: &SchedulingContext) -> f64 {
        if !self.descriptor().worker_type().supports(worker.kind()) {
            return 0.0;
        }
        modifiers::worker_modifier(self.descriptor(), worker, ctx)
    }

    /// Dispatch to the probability hook for this worker's kind.
    fn probability(&self, worker: &dyn Worker, ctx: &SchedulingContext) -> Option<f64> {
        match worker.kind() {
            WorkerKind::Person => self.person_probability(worker, ctx),
            WorkerKind::Robot => self.robot_probability(worker, ctx),
        }
    }

    /// Dispatch to the constructor for this worker's kind.
    fn construct(&self, worker: &dyn Worker, ctx: &SchedulingContext, focus: Option<&Focus>) -> Result<Task> {
        match worker.kind() {
            WorkerKind::Person => self.construct_for_person(worker, ctx, focus),
            WorkerKind::Robot => self.construct_for_robot(worker, ctx, focus),
        }
    }

    fn unsupported(&self, kind: WorkerKind) -> TaskError {
        TaskError::Unsupported {
            task: self.descriptor().name().to_string(),
            kind,
        }
    }
}
