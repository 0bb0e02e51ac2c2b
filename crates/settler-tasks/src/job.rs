//! Task jobs — scored handles that can build a running [`Task`].
//!
//! Three flavours:
//!
//! | Type | Created by | Identity |
//! |------|-----------|----------|
//! | [`BasicTaskJob`] | cache rebuild, pending queue | descriptor ID |
//! | [`SettlementTask`] | settlement pool rebuild | descriptor ID + focus |
//! | [`SettlementTaskProxy`] | pool query for one worker | same as its source |
//!
//! Scores are clamped into `0.0..=MAX_SCORE` on the way in, so nothing
//! downstream ever sees NaN or infinity.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::agent::{Worker, WorkerId, WorkerKind};
use crate::context::SchedulingContext;
use crate::error::{Result, TaskError};
use crate::meta::MetaTask;
use crate::pool::SettlementTaskPool;
use crate::task::Task;

/// Ceiling for any job score.
pub const MAX_SCORE: f64 = 35_000.0;

/// Clamp a raw score: NaN and negatives become 0, anything above
/// [`MAX_SCORE`] (including +inf) becomes `MAX_SCORE`.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() || score <= 0.0 {
        0.0
    } else {
        score.min(MAX_SCORE)
    }
}

/// The entity a settlement job is about, e.g. a particular facility.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Focus {
    pub id: u32,
    pub name: String,
}

impl Focus {
    pub fn new(id: u32, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
        }
    }
}

/// A scored option that can produce a running task.
pub trait TaskJob: fmt::Debug + Send + Sync {
    fn score(&self) -> f64;
    fn description(&self) -> &str;

    /// Identity within a selection cache; two jobs with the same key are
    /// the same option.
    fn key(&self) -> String;

    fn create_person_task(&self, person: &dyn Worker, _ctx: &SchedulingContext) -> Result<Task> {
        Err(self.unsupported(person.kind()))
    }

    fn create_robot_task(&self, robot: &dyn Worker, _ctx: &SchedulingContext) -> Result<Task> {
        Err(self.unsupported(robot.kind()))
    }

    fn create_task(&self, worker: &dyn Worker, ctx: &SchedulingContext) -> Result<Task> {
        match worker.kind() {
            WorkerKind::Person => self.create_person_task(worker, ctx),
            WorkerKind::Robot => self.create_robot_task(worker, ctx),
        }
    }

    fn unsupported(&self, kind: WorkerKind) -> TaskError {
        TaskError::Unsupported {
            task: self.description().to_string(),
            kind,
        }
    }
}

fn job_key(meta: &dyn MetaTask, focus: Option<&Focus>) -> String {
    let id = meta.descriptor().id().to_ascii_lowercase();
    match focus {
        Some(f) => format!("{}@{}", id, f.id),
        None => id,
    }
}

/// A job that delegates construction straight to its descriptor.
#[derive(Clone)]
pub struct BasicTaskJob {
    meta: Arc<dyn MetaTask>,
    description: String,
    score: f64,
    focus: Option<Focus>,
}

impl BasicTaskJob {
    pub fn new(meta: Arc<dyn MetaTask>, description: &str, score: f64) -> Self {
        Self {
            meta,
            description: description.to_string(),
            score: clamp_score(score),
            focus: None,
        }
    }

    pub fn with_focus(mut self, focus: Focus) -> Self {
        self.focus = Some(focus);
        self
    }

    pub fn meta(&self) -> &Arc<dyn MetaTask> {
        &self.meta
    }
}

impl fmt::Debug for BasicTaskJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicTaskJob")
            .field("meta", &self.meta.descriptor().id())
            .field("description", &self.description)
            .field("score", &self.score)
            .field("focus", &self.focus)
            .finish()
    }
}

impl TaskJob for BasicTaskJob {
    fn score(&self) -> f64 {
        self.score
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn key(&self) -> String {
        job_key(self.meta.as_ref(), self.focus.as_ref())
    }

    fn create_person_task(&self, person: &dyn Worker, ctx: &SchedulingContext) -> Result<Task> {
        self.meta.construct_for_person(person, ctx, self.focus.as_ref())
    }

    fn create_robot_task(&self, robot: &dyn Worker, ctx: &SchedulingContext) -> Result<Task> {
        self.meta.construct_for_robot(robot, ctx, self.focus.as_ref())
    }
}

/// What a settlement provider wants done, before the pool takes ownership.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementNeed {
    pub focus: Option<Focus>,
    pub description: String,
    pub score: f64,
    /// How many distinct workers may take this job before it leaves the pool.
    pub demand: u32,
}

/// A shared, demand-limited job living in a settlement pool.
pub struct SettlementTask {
    meta: Arc<dyn MetaTask>,
    focus: Option<Focus>,
    description: String,
    score: f64,
    demand: AtomicU32,
    claimants: Mutex<Vec<WorkerId>>,
}

impl SettlementTask {
    pub fn new(meta: Arc<dyn MetaTask>, need: SettlementNeed) -> Self {
        Self {
            meta,
            focus: need.focus,
            description: need.description,
            score: clamp_score(need.score),
            demand: AtomicU32::new(need.demand),
            claimants: Mutex::new(Vec::new()),
        }
    }

    pub fn meta(&self) -> &Arc<dyn MetaTask> {
        &self.meta
    }

    pub fn focus(&self) -> Option<&Focus> {
        self.focus.as_ref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn key(&self) -> String {
        job_key(self.meta.as_ref(), self.focus.as_ref())
    }

    pub fn demand(&self) -> u32 {
        self.demand.load(Ordering::Acquire)
    }

    /// Take one unit of demand. Returns the demand left, or `None` if
    /// there was none to take. Only the pool calls this, under its lock.
    pub(crate) fn take_one(&self) -> Option<u32> {
        self.demand
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |d| d.checked_sub(1))
            .ok()
            .map(|before| before - 1)
    }

    /// Whether `worker` already holds a unit of this job.
    pub fn claimed_by(&self, worker: WorkerId) -> bool {
        self.claimants.lock().contains(&worker)
    }

    pub(crate) fn record_claim(&self, worker: WorkerId) {
        self.claimants.lock().push(worker);
    }
}

impl fmt::Debug for SettlementTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettlementTask")
            .field("meta", &self.meta.descriptor().id())
            .field("focus", &self.focus)
            .field("description", &self.description)
            .field("score", &self.score)
            .field("demand", &self.demand())
            .finish()
    }
}

/// One worker's view of a [`SettlementTask`]: the source score scaled by
/// that worker's suitability. Creating a task consumes one unit of the
/// source's demand; a proxy whose source is gone creates nothing.
pub struct SettlementTaskProxy {
    source: Arc<SettlementTask>,
    pool: SettlementTaskPool,
    generation: u64,
    score: f64,
}

impl SettlementTaskProxy {
    pub(crate) fn new(
        source: Arc<SettlementTask>,
        pool: SettlementTaskPool,
        generation: u64,
        factor: f64,
    ) -> Self {
        let score = clamp_score(source.score() * factor);
        Self {
            source,
            pool,
            generation,
            score,
        }
    }

    pub fn source(&self) -> &Arc<SettlementTask> {
        &self.source
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn create(&self, worker: &dyn Worker, ctx: &SchedulingContext) -> Result<Task> {
        let task = self.source.meta().construct(worker, ctx, self.source.focus())?;
        if !self.pool.consume(&self.source, self.generation, worker.id()) {
            return Err(TaskError::JobUnavailable(self.source.description().to_string()));
        }
        log::debug!("{} took settlement job '{}'", worker.name(), self.source.description());
        Ok(task)
    }
}

impl fmt::Debug for SettlementTaskProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettlementTaskProxy")
            .field("source", &self.source)
            .field("generation", &self.generation)
            .field("score", &self.score)
            .finish()
    }
}

impl TaskJob for SettlementTaskProxy {
    fn score(&self) -> f64 {
        self.score
    }

    fn description(&self) -> &str {
        self.source.description()
    }

    fn key(&self) -> String {
        self.source.key()
    }

    fn create_person_task(&self, person: &dyn Worker, ctx: &SchedulingContext) -> Result<Task> {
        self.create(person, ctx)
    }

    fn create_robot_task(&self, robot: &dyn Worker, ctx: &SchedulingContext) -> Result<Task> {
        self.create(robot, ctx)
    }
}
