//! Per-worker task controller: current task, pending queue, selection
//! cache reuse, and the rolling activity log.
//!
//! ```text
//!        ┌────────── pending queue non-empty ──────────┐
//!        ▼                                              │
//!   Idle ──start_new_task──▶ Running ──task done──▶ Idle
//!                              │  ▲
//!                              └──┘ replace_task / check_and_replace_task
//! ```
//!
//! Selection draws from a [`TaskCache`] that is rebuilt at most once per
//! clock instant. When nothing scores above zero the controller falls back
//! to sleep/eat-drink indoors, or return-to-shelter outdoors, so a worker
//! is never left without something to do.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::agent::{Worker, WorkerId};
use crate::cache::TaskCache;
use crate::clock::MarsTime;
use crate::config::SchedulerConfig;
use crate::context::SchedulingContext;
use crate::error::{Result, TaskError};
use crate::event::{EventSink, TaskEvent};
use crate::history::{ActivityLog, ActivityRecord};
use crate::job::{BasicTaskJob, TaskJob};
use crate::modifiers;
use crate::task::{Task, TaskContext};

/// New tasks a controller may start within one `execute_task` call.
const MAX_STARTS_PER_CALL: usize = 8;

/// FIFO of jobs waiting to be started. Clones share the same queue, so
/// other systems can enqueue while the owner is executing.
#[derive(Debug, Clone, Default)]
pub struct PendingQueue {
    inner: Arc<Mutex<VecDeque<Arc<dyn TaskJob>>>>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a job. A job whose description is already queued is refused
    /// unless `allow_duplicate` is set.
    pub fn push(&self, job: Arc<dyn TaskJob>, allow_duplicate: bool) -> bool {
        let mut queue = self.inner.lock();
        if !allow_duplicate && queue.iter().any(|j| j.description() == job.description()) {
            return false;
        }
        queue.push_back(job);
        true
    }

    pub fn pop(&self) -> Option<Arc<dyn TaskJob>> {
        self.inner.lock().pop_front()
    }

    /// Remove the first queued job with this description.
    pub fn remove(&self, description: &str) -> bool {
        let mut queue = self.inner.lock();
        match queue.iter().position(|j| j.description() == description) {
            Some(index) => {
                queue.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn descriptions(&self) -> Vec<String> {
        self.inner
            .lock()
            .iter()
            .map(|j| j.description().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Everything one worker's scheduling needs between ticks.
#[derive(Debug)]
pub struct TaskController {
    worker: WorkerId,
    current: Option<Task>,
    last_task: Option<Task>,
    pending: PendingQueue,
    cache: Option<Arc<TaskCache>>,
    log: ActivityLog,
}

impl TaskController {
    pub fn new(worker: WorkerId, config: &SchedulerConfig) -> Self {
        Self {
            worker,
            current: None,
            last_task: None,
            pending: PendingQueue::new(),
            cache: None,
            log: ActivityLog::new(config.history_sols),
        }
    }

    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    pub fn current_task(&self) -> Option<&Task> {
        self.current.as_ref()
    }

    pub fn last_task(&self) -> Option<&Task> {
        self.last_task.as_ref()
    }

    pub fn has_active_task(&self) -> bool {
        self.current.as_ref().is_some_and(|t| !t.is_done())
    }

    /// Handle for enqueueing work from outside the owning tick.
    pub fn pending(&self) -> &PendingQueue {
        &self.pending
    }

    /// The last selection cache, for inspection.
    pub fn cache(&self) -> Option<&Arc<TaskCache>> {
        self.cache.as_ref()
    }

    pub fn activity_log(&self) -> &ActivityLog {
        &self.log
    }

    /// Name of the deepest active task, e.g. "Airlock" during an EVA.
    pub fn task_name(&self) -> Option<&str> {
        self.current
            .as_ref()
            .filter(|t| !t.is_done())
            .map(|t| t.active_leaf().name())
    }

    /// Selection cache for `now`, reused if one was already built at this
    /// instant, rebuilt otherwise.
    pub fn rebuild_task_cache(&mut self, worker: &dyn Worker, ctx: &SchedulingContext) -> Arc<TaskCache> {
        let now = ctx.now();
        if let Some(cache) = &self.cache {
            if cache.is_valid_for(now) {
                return cache.clone();
            }
        }

        let on_duty = worker.shift().is_on_duty(now.millisol);
        let label = if on_duty { "duty" } else { "off duty" };
        let mut cache = TaskCache::new(label, Some(now));

        for meta in ctx.registry().tasks_for(worker.kind(), on_duty) {
            if let Some(score) = modifiers::score_meta_task(meta.as_ref(), worker, ctx) {
                let job = BasicTaskJob::new(meta.clone(), meta.descriptor().name(), score);
                cache.put(Arc::new(job));
            }
        }

        if worker.is_inside() {
            if let Some(settlement) = worker.settlement().and_then(|id| ctx.settlement(id)) {
                for job in settlement.task_jobs_for(worker, ctx) {
                    cache.put(job);
                }
            }
        }

        if cache.is_empty() {
            cache = Self::fallback_cache(worker, ctx, now);
        }
        log::debug!(
            "{} rebuilt {} cache: {} jobs, total {:.1}",
            worker.name(),
            cache.context(),
            cache.len(),
            cache.total()
        );

        let cache = Arc::new(cache);
        self.cache = Some(cache.clone());
        cache
    }

    /// Guaranteed non-empty cache for a worker with nothing better to do.
    fn fallback_cache(worker: &dyn Worker, ctx: &SchedulingContext, now: MarsTime) -> TaskCache {
        if worker.is_outside() {
            let mut cache = TaskCache::new("default outside", Some(now));
            let shelter = ctx.shelter_task();
            cache.put(Arc::new(BasicTaskJob::new(shelter.clone(), shelter.descriptor().name(), 1.0)));
            return cache;
        }

        let mut cache = TaskCache::new("default inside", Some(now));
        for id in ["sleep", "eat-drink"] {
            match ctx.registry().lookup_by_id(id) {
                Some(meta) => {
                    cache.put(Arc::new(BasicTaskJob::new(meta.clone(), meta.descriptor().name(), 1.0)));
                }
                None => log::warn!("Fallback task '{}' is not registered", id),
            }
        }
        cache
    }

    /// Draw from the selection cache until a job produces a task. A job
    /// that fails (e.g. a settlement job taken by someone else) is dropped
    /// from a private copy of the cache before drawing again.
    fn select_task(
        &mut self,
        worker: &dyn Worker,
        ctx: &SchedulingContext,
        rng: &mut impl rand::Rng,
    ) -> Result<Task> {
        let now = ctx.now();
        let cache = self.rebuild_task_cache(worker, ctx);
        let mut candidates = Cow::Borrowed(cache.as_ref());

        for round in 0..2 {
            while let Some(job) = candidates.random_draw(rng) {
                match job.create_task(worker, ctx) {
                    Ok(task) => return Ok(task),
                    Err(e) => {
                        log::debug!("{} could not start '{}': {}", worker.name(), job.description(), e);
                        candidates.to_mut().remove(&job.key());
                    }
                }
            }
            if round == 0 {
                candidates = Cow::Owned(Self::fallback_cache(worker, ctx, now));
            }
        }

        Err(TaskError::JobUnavailable(format!("nothing for {} to do", worker.name())))
    }

    /// Start the next task: the first pending job if there is one,
    /// otherwise a weighted draw. The new task replaces the current one.
    pub fn start_new_task(
        &mut self,
        worker: &mut dyn Worker,
        ctx: &SchedulingContext,
        sink: &dyn EventSink,
        rng: &mut impl rand::Rng,
    ) -> Result<()> {
        while let Some(job) = self.pending.pop() {
            match job.create_task(&*worker, ctx) {
                Ok(task) => {
                    self.replace_task(task, worker, ctx, sink);
                    return Ok(());
                }
                Err(e) => log::warn!("{} dropped pending '{}': {}", worker.name(), job.description(), e),
            }
        }

        let task = self.select_task(&*worker, ctx, rng)?;
        self.replace_task(task, worker, ctx, sink);
        Ok(())
    }

    /// Install `new` as the current task, ending any unfinished one first.
    pub fn replace_task(&mut self, new: Task, worker: &mut dyn Worker, ctx: &SchedulingContext, sink: &dyn EventSink) {
        let now = ctx.now();
        if let Some(mut old) = self.current.take() {
            if !old.is_done() {
                sink.publish(TaskEvent::Replaced {
                    worker: self.worker,
                    old: old.name().to_string(),
                    new: new.name().to_string(),
                    time: now,
                });
                let mut tc = TaskContext {
                    worker: &mut *worker,
                    sched: ctx,
                    sink,
                    log: &mut self.log,
                };
                old.end_task(&mut tc);
            }
            self.last_task = Some(old);
        }

        sink.publish(TaskEvent::Started {
            worker: self.worker,
            task: new.name().to_string(),
            description: new.description().to_string(),
            time: now,
        });
        if new.core().can_record() {
            if let Some(phase) = new.phase() {
                self.log.add(ActivityRecord {
                    time: now,
                    task: new.name().to_string(),
                    description: new.description().to_string(),
                    phase: phase.name().to_string(),
                });
            }
        }
        self.current = Some(new);
    }

    /// Replace the current task unless it must not be interrupted or is
    /// already doing the same thing. Returns whether `new` was installed.
    pub fn check_and_replace_task(
        &mut self,
        new: Task,
        worker: &mut dyn Worker,
        ctx: &SchedulingContext,
        sink: &dyn EventSink,
    ) -> bool {
        if let Some(current) = self.current.as_ref().filter(|t| !t.is_done()) {
            let leaf = current.active_leaf();
            let locked = ctx.config().is_non_interruptible(current.name(), current.description())
                || ctx.config().is_non_interruptible(leaf.name(), leaf.description());
            if locked {
                log::warn!("{} cannot leave '{}' for '{}'", worker.name(), current.name(), new.name());
                return false;
            }
            if current.description() == new.description() {
                return false;
            }
        }
        self.replace_task(new, worker, ctx, sink);
        true
    }

    pub fn add_pending_task(&self, job: Arc<dyn TaskJob>, allow_duplicate: bool) -> bool {
        self.pending.push(job, allow_duplicate)
    }

    pub fn get_pending_task(&self) -> Option<Arc<dyn TaskJob>> {
        self.pending.pop()
    }

    pub fn delete_a_pending_task(&self, description: &str) -> bool {
        self.pending.remove(description)
    }

    /// Queue a registered descriptor by ID. If the current task has a
    /// fixed duration it is extended by `countdown` millisols first.
    pub fn add_pending_task_by_id(
        &mut self,
        id: &str,
        allow_duplicate: bool,
        countdown: f64,
        ctx: &SchedulingContext,
    ) -> Result<bool> {
        let Some(meta) = ctx.registry().lookup_by_id(id) else {
            log::warn!("Worker {} asked for unknown task '{}'", self.worker, id);
            return Err(TaskError::UnknownTask(id.to_string()));
        };
        let job = BasicTaskJob::new(meta.clone(), meta.descriptor().name(), 1.0);
        if !self.pending.push(Arc::new(job), allow_duplicate) {
            return Ok(false);
        }

        if countdown > 0.0 {
            if let Some(current) = self.current.as_mut().filter(|t| !t.is_done()) {
                if current.duration().is_some() {
                    current.core_mut().extend_duration(countdown);
                }
            }
        }
        Ok(true)
    }

    /// Spend `time` millisols, starting new tasks as earlier ones finish.
    /// Returns the time that could not be used.
    ///
    /// A task that fails is ended before the error is returned, so the
    /// next call starts fresh.
    pub fn execute_task(
        &mut self,
        time: f64,
        worker: &mut dyn Worker,
        ctx: &SchedulingContext,
        sink: &dyn EventSink,
        rng: &mut impl rand::Rng,
    ) -> Result<f64> {
        let epsilon = ctx.config().time_epsilon;
        let mut time_left = time;
        let mut starts = 0;

        while time_left > epsilon {
            if !self.has_active_task() {
                if starts == MAX_STARTS_PER_CALL {
                    break;
                }
                starts += 1;
                self.start_new_task(worker, ctx, sink, rng)?;
            }

            let Some(task) = self.current.as_mut() else {
                break;
            };
            let mut tc = TaskContext {
                worker: &mut *worker,
                sched: ctx,
                sink,
                log: &mut self.log,
            };
            let remaining = match task.perform_task(time_left, &mut tc) {
                Ok(remaining) => remaining,
                Err(e) => {
                    task.end_task(&mut tc);
                    self.last_task = self.current.take();
                    return Err(e);
                }
            };

            let finished = task.is_done();
            if finished {
                self.last_task = self.current.take();
            } else if remaining >= time_left {
                // Running but idle; nothing more to do this tick
                time_left = remaining;
                break;
            }
            time_left = remaining;
        }

        Ok(time_left.max(0.0))
    }

    /// Daily rollover of the activity log.
    pub fn time_pass(&mut self, now: MarsTime) {
        self.log.roll(now.sol);
    }
}
