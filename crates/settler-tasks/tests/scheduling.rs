//! Scheduling properties exercised through the public API.
//!
//! Covers: selection cache weights → settlement pool consumption → task
//! lifecycle → controller cache reuse and pending preference.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use settler_tasks::agent::{Colonist, JobType, Worker};
use settler_tasks::cache::TaskCache;
use settler_tasks::clock::{MarsClock, MarsTime};
use settler_tasks::context::SchedulingContext;
use settler_tasks::controller::TaskController;
use settler_tasks::event::{RecordingSink, TaskEvent};
use settler_tasks::history::ActivityLog;
use settler_tasks::job::{BasicTaskJob, TaskJob, MAX_SCORE};
use settler_tasks::modifiers::job_modifier;
use settler_tasks::settlement::{FacilityKind, Settlement, SettlementId};
use settler_tasks::task::{TaskBehaviour, TaskBuilder, TaskContext, TaskCore, TaskPhase};
use settler_tasks::TaskError;

// ── Helpers ────────────────────────────────────────────────────────────

const BASE: SettlementId = SettlementId(1);

fn context() -> SchedulingContext {
    let start = MarsTime::new(3, 400.0);
    let mut ctx = SchedulingContext::default().with_clock(MarsClock::new(start));
    let mut base = Settlement::new(BASE, "Jezero", 12);
    base.add_facility(FacilityKind::Workshop, "Machine Shop");
    base.add_facility(FacilityKind::Kitchen, "Galley");
    ctx.add_settlement(base);
    ctx
}

fn job(ctx: &SchedulingContext, id: &str, score: f64) -> Arc<dyn TaskJob> {
    let meta = ctx.registry().lookup_by_id(id).expect("registered");
    Arc::new(BasicTaskJob::new(meta.clone(), meta.descriptor().name(), score))
}

struct Idle;

impl TaskBehaviour for Idle {
    fn perform_phase(
        &mut self,
        _phase: TaskPhase,
        _time: f64,
        _task: &mut TaskCore,
        _ctx: &mut TaskContext<'_>,
    ) -> settler_tasks::Result<f64> {
        Ok(0.0)
    }
}

fn idle(worker: &dyn Worker, duration: f64) -> settler_tasks::Result<settler_tasks::task::Task> {
    TaskBuilder::new("Idle")
        .owner(worker)
        .phases(&[TaskPhase::new("Idling")])
        .duration(duration)
        .build(Idle)
}

// ── Selection cache ────────────────────────────────────────────────────

#[test]
fn cache_total_and_cumulative_ranges() {
    let ctx = context();
    let mut cache = TaskCache::new("test", None);
    assert!(cache.put(job(&ctx, "relax", 10.0)));
    assert!(cache.put(job(&ctx, "read", 20.0)));
    assert!(cache.put(job(&ctx, "workout", 30.0)));

    let sum: f64 = cache.entries().map(|(_, w)| w).sum();
    assert_eq!(sum, cache.total());
    assert_eq!(cache.total(), 60.0);

    let pick = |r: f64| cache.draw_at(r).map(|j| j.description().to_string());
    assert_eq!(pick(0.0).as_deref(), Some("Relax"));
    assert_eq!(pick(9.99).as_deref(), Some("Relax"));
    assert_eq!(pick(10.0).as_deref(), Some("Read"));
    assert_eq!(pick(29.99).as_deref(), Some("Read"));
    assert_eq!(pick(30.0).as_deref(), Some("Workout"));
    assert_eq!(pick(59.99).as_deref(), Some("Workout"));
}

#[test]
fn basic_job_score_is_capped() {
    let ctx = context();
    assert_eq!(job(&ctx, "relax", 50_000.0).score(), MAX_SCORE);
    assert_eq!(MAX_SCORE, 35_000.0);
}

// ── Settlement pool ────────────────────────────────────────────────────

#[test]
fn demand_one_job_is_consumed_once() {
    let ctx = context();
    let settlement = ctx.settlement(BASE).expect("settlement");
    settlement.wear_facilities(1000.0);

    let ada = Colonist::person(1, "Ada", BASE).with_job(JobType::Engineer);
    let bo = Colonist::person(2, "Bo", BASE).with_job(JobType::Technician);

    let find = |jobs: &[Arc<dyn TaskJob>]| {
        jobs.iter()
            .find(|j| j.description() == "Maintain Machine Shop")
            .cloned()
    };
    let ada_job = find(&settlement.task_jobs_for(&ada, &ctx)).expect("maintenance offered");
    let bo_job = find(&settlement.task_jobs_for(&bo, &ctx)).expect("maintenance offered");

    assert!(ada_job.create_task(&ada, &ctx).is_ok());
    assert!(matches!(bo_job.create_task(&bo, &ctx), Err(TaskError::JobUnavailable(_))));
    assert!(find(&settlement.task_jobs_for(&bo, &ctx)).is_none());
}

// ── Task lifecycle ─────────────────────────────────────────────────────

#[test]
fn duration_must_be_positive_and_finite() {
    let ada = Colonist::person(1, "Ada", BASE);
    assert!(matches!(idle(&ada, 0.0), Err(TaskError::InvalidDuration(_))));
    assert!(matches!(idle(&ada, f64::NAN), Err(TaskError::InvalidDuration(_))));
    let task = idle(&ada, 50.0).expect("valid duration");
    assert_eq!(task.duration(), Some(50.0));
}

#[test]
fn end_task_twice_emits_one_event() {
    let ctx = context();
    let sink = RecordingSink::new();
    let mut log = ActivityLog::new(7);
    let mut ada = Colonist::person(1, "Ada", BASE);
    let mut task = idle(&ada, 50.0).expect("task");

    let mut tc = TaskContext {
        worker: &mut ada,
        sched: &ctx,
        sink: &sink,
        log: &mut log,
    };
    task.end_task(&mut tc);
    task.end_task(&mut tc);

    assert!(task.is_done());
    assert_eq!(sink.count(|e| matches!(e, TaskEvent::Ended { .. })), 1);
}

// ── Modifiers ──────────────────────────────────────────────────────────

#[test]
fn job_match_modifier() {
    let preferred = [JobType::Botanist];
    assert_eq!(job_modifier(Some(JobType::Botanist), &preferred, 0.25), 1.0);
    assert_eq!(job_modifier(Some(JobType::Chef), &preferred, 0.25), 0.25);
    assert_eq!(job_modifier(Some(JobType::Chef), &[], 0.25), 1.0);
}

// ── Controller ─────────────────────────────────────────────────────────

#[test]
fn cache_reused_within_tick_and_rebuilt_after() {
    let mut ctx = context();
    let ada = Colonist::person(1, "Ada", BASE);
    let mut controller = TaskController::new(ada.id, ctx.config());

    let first = controller.rebuild_task_cache(&ada, &ctx);
    let again = controller.rebuild_task_cache(&ada, &ctx);
    assert!(Arc::ptr_eq(&first, &again));

    ctx.advance(2.0);
    let later = controller.rebuild_task_cache(&ada, &ctx);
    assert!(!Arc::ptr_eq(&first, &later));
    assert_eq!(later.created_on(), Some(ctx.now()));
}

#[test]
fn pending_entry_beats_the_draw() {
    let ctx = context();
    let sink = RecordingSink::new();
    let mut rng = StdRng::seed_from_u64(99);
    let mut ada = Colonist::person(1, "Ada", BASE);
    let mut controller = TaskController::new(ada.id, ctx.config());

    assert!(controller.add_pending_task(job(&ctx, "workout", 1.0), false));
    controller
        .start_new_task(&mut ada, &ctx, &sink, &mut rng)
        .expect("pending task starts");

    assert_eq!(controller.current_task().map(|t| t.name()), Some("Workout"));
    assert!(controller.pending().is_empty());
}
