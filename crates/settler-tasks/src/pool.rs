//! Per-settlement pool of shared, demand-limited jobs.
//!
//! The pool is rebuilt lazily from every registered settlement provider the
//! first time it is queried after [`SettlementTaskPool::invalidate`]. The
//! engine invalidates once per tick, so all workers querying in that tick
//! share one rebuild (one *generation*).
//!
//! Consumption is the one place real mutual exclusion matters: two workers
//! holding proxies for the same scarce job race to create a task, and only
//! as many as the job's demand may win.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::agent::{Worker, WorkerId};
use crate::context::SchedulingContext;
use crate::job::{SettlementTask, SettlementTaskProxy, TaskJob};
use crate::settlement::Settlement;

#[derive(Debug, Default)]
struct PoolState {
    generation: u64,
    tasks: Option<Vec<Arc<SettlementTask>>>,
}

/// Shared handle; clones refer to the same pool.
#[derive(Debug, Clone, Default)]
pub struct SettlementTaskPool {
    state: Arc<Mutex<PoolState>>,
}

impl SettlementTaskPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs from this pool the worker is suited to, each wrapped in a proxy
    /// scored for that worker. Rebuilds the pool first if it was invalidated.
    pub fn jobs_for(
        &self,
        settlement: &Settlement,
        worker: &dyn Worker,
        ctx: &SchedulingContext,
    ) -> Vec<Arc<dyn TaskJob>> {
        let (generation, tasks) = {
            let mut state = self.state.lock();
            if state.tasks.is_none() {
                let rebuilt = Self::collect(settlement, ctx);
                state.generation += 1;
                log::debug!(
                    "{} pool rebuilt: {} jobs (generation {})",
                    settlement.name(),
                    rebuilt.len(),
                    state.generation
                );
                state.tasks = Some(rebuilt);
            }
            (state.generation, state.tasks.clone().unwrap_or_default())
        };

        tasks
            .into_iter()
            .filter(|task| !task.claimed_by(worker.id()))
            .filter_map(|task| {
                let factor = task.meta().settlement_factor(worker, ctx);
                if factor > 0.0 && factor.is_finite() {
                    let proxy = SettlementTaskProxy::new(task, self.clone(), generation, factor);
                    Some(Arc::new(proxy) as Arc<dyn TaskJob>)
                } else {
                    None
                }
            })
            .collect()
    }

    fn collect(settlement: &Settlement, ctx: &SchedulingContext) -> Vec<Arc<SettlementTask>> {
        ctx.registry()
            .settlement_providers()
            .iter()
            .flat_map(|provider| {
                provider
                    .settlement_tasks(settlement, ctx)
                    .into_iter()
                    .map(move |need| SettlementTask::new(provider.clone(), need))
            })
            .filter(|task| task.demand() > 0 && task.score() > 0.0)
            .map(Arc::new)
            .collect()
    }

    /// Take one unit of demand from `source` for `worker`. Fails if the pool
    /// has been invalidated or rebuilt since the proxy was issued, if the job
    /// has already been used up, or if `worker` already holds a unit of it.
    /// A job whose demand reaches zero is removed.
    pub fn consume(&self, source: &Arc<SettlementTask>, generation: u64, worker: WorkerId) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }
        let Some(tasks) = state.tasks.as_mut() else {
            return false;
        };
        let Some(index) = tasks.iter().position(|t| Arc::ptr_eq(t, source)) else {
            return false;
        };
        if source.claimed_by(worker) {
            return false;
        }

        match source.take_one() {
            Some(left) => {
                source.record_claim(worker);
                if left == 0 {
                    tasks.remove(index);
                }
                true
            }
            None => {
                tasks.remove(index);
                false
            }
        }
    }

    /// Drop the pooled jobs; the next query rebuilds.
    pub fn invalidate(&self) {
        self.state.lock().tasks = None;
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Jobs currently pooled; zero when invalidated.
    pub fn len(&self) -> usize {
        self.state.lock().tasks.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Colonist;
    use crate::job::{Focus, SettlementNeed};
    use crate::meta::{MetaTask, TaskDescriptor, TaskScope, WorkerType};
    use crate::settlement::SettlementId;
    use crate::task::{Task, TaskBehaviour, TaskBuilder, TaskContext, TaskCore, TaskPhase};
    use crate::Result;

    struct Scrub;

    impl TaskBehaviour for Scrub {
        fn perform_phase(
            &mut self,
            _phase: TaskPhase,
            _time: f64,
            _task: &mut TaskCore,
            _ctx: &mut TaskContext<'_>,
        ) -> Result<f64> {
            Ok(0.0)
        }
    }

    /// Publishes one job per configured demand, and builds a trivial task.
    struct Provider {
        descriptor: TaskDescriptor,
        demand: u32,
    }

    impl MetaTask for Provider {
        fn descriptor(&self) -> &TaskDescriptor {
            &self.descriptor
        }

        fn is_settlement_provider(&self) -> bool {
            true
        }

        fn settlement_tasks(&self, _s: &Settlement, _ctx: &SchedulingContext) -> Vec<SettlementNeed> {
            vec![
                SettlementNeed {
                    focus: Some(Focus::new(1, "Kitchen")),
                    description: "Scrub kitchen".into(),
                    score: 100.0,
                    demand: self.demand,
                },
                SettlementNeed {
                    focus: Some(Focus::new(2, "Hab")),
                    description: "Nothing to do".into(),
                    score: 100.0,
                    demand: 0,
                },
            ]
        }

        fn construct_for_person(
            &self,
            person: &dyn Worker,
            _ctx: &SchedulingContext,
            _focus: Option<&Focus>,
        ) -> Result<Task> {
            TaskBuilder::new("Scrub")
                .owner(person)
                .phases(&[TaskPhase::new("Scrubbing")])
                .build(Scrub)
        }
    }

    fn context(demand: u32) -> SchedulingContext {
        let mut ctx = SchedulingContext::default().with_catalog(move || {
            vec![Arc::new(Provider {
                descriptor: TaskDescriptor::new("scrub", "Scrub", WorkerType::Person, TaskScope::AnyHour),
                demand,
            }) as Arc<dyn MetaTask>]
        });
        ctx.add_settlement(Settlement::new(SettlementId(1), "Base", 8));
        ctx
    }

    #[test]
    fn test_rebuild_skips_zero_demand() {
        let ctx = context(1);
        let settlement = ctx.settlement(SettlementId(1)).unwrap();
        let ada = Colonist::person(1, "Ada", SettlementId(1));
        let jobs = settlement.pool().jobs_for(settlement, &ada, &ctx);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].description(), "Scrub kitchen");
        assert_eq!(settlement.pool().generation(), 1);

        // Same generation until invalidated
        settlement.pool().jobs_for(settlement, &ada, &ctx);
        assert_eq!(settlement.pool().generation(), 1);
        settlement.pool().invalidate();
        assert!(settlement.pool().is_empty());
        settlement.pool().jobs_for(settlement, &ada, &ctx);
        assert_eq!(settlement.pool().generation(), 2);
    }

    #[test]
    fn test_demand_one_consumed_once() {
        let ctx = context(1);
        let settlement = ctx.settlement(SettlementId(1)).unwrap();
        let ada = Colonist::person(1, "Ada", SettlementId(1));
        let bo = Colonist::person(2, "Bo", SettlementId(1));

        let for_ada = settlement.pool().jobs_for(settlement, &ada, &ctx);
        let for_bo = settlement.pool().jobs_for(settlement, &bo, &ctx);
        assert!(for_ada[0].create_task(&ada, &ctx).is_ok());

        let err = for_bo[0].create_task(&bo, &ctx).unwrap_err();
        assert!(matches!(err, crate::TaskError::JobUnavailable(_)));
        assert!(settlement.pool().jobs_for(settlement, &bo, &ctx).is_empty());
    }

    #[test]
    fn test_demand_counts_down() {
        let ctx = context(2);
        let settlement = ctx.settlement(SettlementId(1)).unwrap();
        let ada = Colonist::person(1, "Ada", SettlementId(1));
        let bo = Colonist::person(2, "Bo", SettlementId(1));
        let cy = Colonist::person(3, "Cy", SettlementId(1));

        let first = settlement.pool().jobs_for(settlement, &ada, &ctx);
        assert!(first[0].create_task(&ada, &ctx).is_ok());
        let second = settlement.pool().jobs_for(settlement, &bo, &ctx);
        assert_eq!(second.len(), 1);
        assert!(second[0].create_task(&bo, &ctx).is_ok());
        assert!(settlement.pool().jobs_for(settlement, &cy, &ctx).is_empty());
    }

    #[test]
    fn test_one_worker_takes_one_unit() {
        let ctx = context(2);
        let settlement = ctx.settlement(SettlementId(1)).unwrap();
        let ada = Colonist::person(1, "Ada", SettlementId(1));
        let bo = Colonist::person(2, "Bo", SettlementId(1));

        let for_ada = settlement.pool().jobs_for(settlement, &ada, &ctx);
        assert!(for_ada[0].create_task(&ada, &ctx).is_ok());

        // Reusing the same proxy does not take the second unit
        let err = for_ada[0].create_task(&ada, &ctx).unwrap_err();
        assert!(matches!(err, crate::TaskError::JobUnavailable(_)));
        assert!(settlement.pool().jobs_for(settlement, &ada, &ctx).is_empty());

        let for_bo = settlement.pool().jobs_for(settlement, &bo, &ctx);
        assert_eq!(for_bo.len(), 1);
        assert!(for_bo[0].create_task(&bo, &ctx).is_ok());
        assert!(settlement.pool().is_empty());
    }

    #[test]
    fn test_stale_proxy_refused() {
        let ctx = context(1);
        let settlement = ctx.settlement(SettlementId(1)).unwrap();
        let ada = Colonist::person(1, "Ada", SettlementId(1));

        let stale = settlement.pool().jobs_for(settlement, &ada, &ctx);
        settlement.pool().invalidate();
        assert!(stale[0].create_task(&ada, &ctx).is_err());
    }

    #[test]
    fn test_concurrent_consume_grants_once() {
        let ctx = context(1);
        let settlement = ctx.settlement(SettlementId(1)).unwrap();
        let workers: Vec<Colonist> = (0..8)
            .map(|i| Colonist::person(i, "Crew", SettlementId(1)))
            .collect();
        let offers: Vec<_> = workers
            .iter()
            .map(|w| settlement.pool().jobs_for(settlement, w, &ctx))
            .collect();

        let granted = std::thread::scope(|scope| {
            let handles: Vec<_> = workers
                .iter()
                .zip(&offers)
                .map(|(w, jobs)| {
                    let ctx = &ctx;
                    scope.spawn(move || jobs[0].create_task(w, ctx).is_ok())
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or(false))
                .filter(|ok| *ok)
                .count()
        });
        assert_eq!(granted, 1);
    }
}
