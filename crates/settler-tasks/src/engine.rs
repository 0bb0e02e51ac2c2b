//! Colony engine - drives every agent's task controller once per tick

use std::sync::Arc;

use hecs::{Entity, World};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::agent::{Colonist, Worker, WorkerId, WorkerKind};
use crate::context::SchedulingContext;
use crate::controller::{PendingQueue, TaskController};
use crate::error::Result;
use crate::event::EventSink;

/// What happened during one [`ColonyEngine::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// A new sol began this tick
    pub new_sol: bool,
    /// Agents whose controller ran
    pub agents: usize,
    /// Agents whose tick ended in an error
    pub failures: usize,
}

/// Read-only view of what an agent is doing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentSummary {
    pub id: WorkerId,
    pub name: String,
    pub kind: WorkerKind,
    /// Top-level task name, if busy
    pub task: Option<String>,
    pub description: Option<String>,
    pub phase: Option<String>,
    /// Deepest active subtask, e.g. "Airlock" during an EVA
    pub leaf: Option<String>,
}

/// Main scheduling engine
pub struct ColonyEngine {
    /// ECS world holding `(Colonist, TaskController)` agents
    world: World,
    ctx: SchedulingContext,
    sink: Arc<dyn EventSink>,
    rng: StdRng,
}

impl ColonyEngine {
    /// Create an engine with no agents. The registry is built here so the
    /// first tick does not pay for it.
    pub fn new(ctx: SchedulingContext, sink: Arc<dyn EventSink>, seed: u64) -> Self {
        let registry = ctx.initialize();
        log::info!("Task registry ready: {} descriptors", registry.len());
        Self {
            world: World::new(),
            ctx,
            sink,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Add an agent. Persons count towards their settlement's population.
    pub fn spawn_colonist(&mut self, colonist: Colonist) -> Entity {
        if colonist.kind == WorkerKind::Person {
            if let Some(settlement) = colonist.settlement().and_then(|id| self.ctx.settlement_mut(id)) {
                settlement.population += 1;
            }
        }
        let controller = TaskController::new(colonist.id, self.ctx.config());
        log::debug!("Spawned {} ({:?})", colonist.name, colonist.kind);
        self.world.spawn((colonist, controller))
    }

    /// Advance the clock by `pulse` millisols and run every agent.
    pub fn update(&mut self, pulse: f64) -> TickReport {
        let new_sol = self.ctx.advance(pulse);
        let now = self.ctx.now();
        self.ctx.invalidate_pools();

        let mut report = TickReport {
            new_sol,
            ..TickReport::default()
        };

        for (_entity, (colonist, controller)) in self.world.query_mut::<(&mut Colonist, &mut TaskController)>() {
            report.agents += 1;
            if colonist.kind == WorkerKind::Person {
                colonist.condition.decay(pulse);
            }
            if new_sol {
                controller.time_pass(now);
            }
            if let Err(e) = controller.execute_task(pulse, colonist, &self.ctx, &*self.sink, &mut self.rng) {
                log::warn!("{} abandoned this tick: {}", colonist.name, e);
                report.failures += 1;
            }
        }

        for settlement in self.ctx.settlements() {
            settlement.wear_facilities(pulse);
        }
        if new_sol {
            log::info!("Sol {} begins", now.sol);
        }
        report
    }

    pub fn context(&self) -> &SchedulingContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut SchedulingContext {
        &mut self.ctx
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn agent_count(&self) -> usize {
        self.world.query::<&TaskController>().iter().count()
    }

    /// Entity for a worker ID
    pub fn entity_of(&self, id: WorkerId) -> Option<Entity> {
        let mut query = self.world.query::<&Colonist>();
        let found = query.iter().find(|(_, c)| c.id == id).map(|(e, _)| e);
        found
    }

    pub fn agent_summary(&self, entity: Entity) -> Option<AgentSummary> {
        let mut query = self.world.query_one::<(&Colonist, &TaskController)>(entity).ok()?;
        let summary = query.get().map(|(c, tc)| summarize(c, tc));
        summary
    }

    /// Summaries of every agent, in spawn order.
    pub fn summaries(&self) -> Vec<AgentSummary> {
        let mut query = self.world.query::<(&Colonist, &TaskController)>();
        let mut out: Vec<(Entity, AgentSummary)> = query.iter().map(|(e, (c, tc))| (e, summarize(c, tc))).collect();
        out.sort_by_key(|(e, _)| e.id());
        out.into_iter().map(|(_, s)| s).collect()
    }

    /// Shared handle to a worker's pending queue.
    pub fn pending_queue(&self, id: WorkerId) -> Option<PendingQueue> {
        let entity = self.entity_of(id)?;
        let tc = self.world.get::<&TaskController>(entity).ok()?;
        Some(tc.pending().clone())
    }

    /// Queue a registered task for a worker by descriptor ID.
    pub fn add_pending_task_by_id(&mut self, worker: WorkerId, task_id: &str, countdown: f64) -> Result<bool> {
        let Some(entity) = self.entity_of(worker) else {
            return Ok(false);
        };
        match self.world.query_one_mut::<&mut TaskController>(entity) {
            Ok(tc) => tc.add_pending_task_by_id(task_id, false, countdown, &self.ctx),
            Err(_) => Ok(false),
        }
    }

    /// Run `f` against each agent's controller.
    pub fn for_each_controller(&self, mut f: impl FnMut(&Colonist, &TaskController)) {
        let mut query = self.world.query::<(&Colonist, &TaskController)>();
        for (_, (c, tc)) in query.iter() {
            f(c, tc);
        }
    }
}

fn summarize(colonist: &Colonist, controller: &TaskController) -> AgentSummary {
    let current = controller.current_task().filter(|t| !t.is_done());
    AgentSummary {
        id: colonist.id,
        name: colonist.name.clone(),
        kind: colonist.kind,
        task: current.map(|t| t.name().to_string()),
        description: current.map(|t| t.description().to_string()),
        phase: current.and_then(|t| t.phase()).map(|p| p.name().to_string()),
        leaf: controller.task_name().map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::RobotType;
    use crate::error::TaskError;
    use crate::event::{RecordingSink, TaskEvent};
    use crate::job::Focus;
    use crate::meta::{MetaTask, TaskDescriptor, TaskScope, WorkerType};
    use crate::settlement::{FacilityKind, Settlement, SettlementId};
    use crate::task::{Task, TaskBehaviour, TaskBuilder, TaskContext, TaskCore, TaskPhase};

    fn colony() -> (ColonyEngine, Arc<RecordingSink>) {
        let mut ctx = SchedulingContext::default();
        let mut base = Settlement::new(SettlementId(1), "Jezero", 10);
        base.add_facility(FacilityKind::Kitchen, "Galley");
        base.add_facility(FacilityKind::Greenhouse, "Dome");
        ctx.add_settlement(base);
        let sink = Arc::new(RecordingSink::new());
        let engine = ColonyEngine::new(ctx, sink.clone(), 42);
        (engine, sink)
    }

    #[test]
    fn test_spawn_counts_persons() {
        let (mut engine, _) = colony();
        engine.spawn_colonist(Colonist::person(1, "Ada", SettlementId(1)));
        engine.spawn_colonist(Colonist::person(2, "Bo", SettlementId(1)));
        engine.spawn_colonist(Colonist::robot(3, "R1", SettlementId(1), RobotType::Deliverybot));

        assert_eq!(engine.agent_count(), 3);
        let population = engine.context().settlement(SettlementId(1)).map(|s| s.population);
        assert_eq!(population, Some(2));
        assert!(engine.entity_of(WorkerId(3)).is_some());
        assert!(engine.entity_of(WorkerId(9)).is_none());
    }

    #[test]
    fn test_every_agent_busy_after_tick() {
        let (mut engine, sink) = colony();
        for i in 1..=4 {
            engine.spawn_colonist(Colonist::person(i, &format!("P{}", i), SettlementId(1)));
        }
        engine.spawn_colonist(Colonist::robot(10, "R1", SettlementId(1), RobotType::Chefbot));

        let report = engine.update(5.0);
        assert_eq!(report.agents, 5);
        assert_eq!(report.failures, 0);
        for summary in engine.summaries() {
            assert!(summary.task.is_some(), "{} idle", summary.name);
        }
        assert!(sink.count(|e| matches!(e, TaskEvent::Started { .. })) >= 5);
    }

    #[test]
    fn test_runs_a_full_sol() {
        let (mut engine, _) = colony();
        engine.spawn_colonist(Colonist::person(1, "Ada", SettlementId(1)));
        engine.spawn_colonist(Colonist::robot(2, "R1", SettlementId(1), RobotType::Repairbot));

        let mut sols = 0;
        for _ in 0..220 {
            let report = engine.update(5.0);
            assert_eq!(report.failures, 0);
            if report.new_sol {
                sols += 1;
            }
        }
        assert_eq!(sols, 1);
        assert_eq!(engine.context().now().sol, 2);
    }

    #[test]
    fn test_pending_by_id_through_engine() {
        let (mut engine, _) = colony();
        engine.spawn_colonist(Colonist::person(1, "Ada", SettlementId(1)));
        assert!(engine.add_pending_task_by_id(WorkerId(1), "read", 0.0).unwrap());
        assert!(matches!(
            engine.add_pending_task_by_id(WorkerId(1), "juggle", 0.0),
            Err(TaskError::UnknownTask(_))
        ));
        assert_eq!(engine.pending_queue(WorkerId(1)).map(|q| q.len()), Some(1));

        engine.update(1.0);
        let entity = engine.entity_of(WorkerId(1)).unwrap();
        let summary = engine.agent_summary(entity).unwrap();
        assert_eq!(summary.task.as_deref(), Some("Read"));
        assert_eq!(summary.leaf.as_deref(), Some("Read"));
    }

    struct Broken {
        descriptor: TaskDescriptor,
    }

    struct Fails;

    impl TaskBehaviour for Fails {
        fn perform_phase(
            &mut self,
            _phase: TaskPhase,
            _time: f64,
            _task: &mut TaskCore,
            _ctx: &mut TaskContext<'_>,
        ) -> crate::Result<f64> {
            Err(TaskError::JobUnavailable("tool missing".into()))
        }
    }

    impl MetaTask for Broken {
        fn descriptor(&self) -> &TaskDescriptor {
            &self.descriptor
        }

        fn person_probability(&self, _person: &dyn Worker, _ctx: &SchedulingContext) -> Option<f64> {
            Some(10.0)
        }

        fn construct_for_person(
            &self,
            person: &dyn Worker,
            _ctx: &SchedulingContext,
            _focus: Option<&Focus>,
        ) -> crate::Result<Task> {
            TaskBuilder::new("Broken")
                .owner(person)
                .phases(&[TaskPhase::new("Failing")])
                .build(Fails)
        }
    }

    #[test]
    fn test_failing_agent_is_isolated() {
        let mut ctx = SchedulingContext::default().with_catalog(|| {
            vec![
                Arc::new(Broken {
                    descriptor: TaskDescriptor::new("broken", "Broken", WorkerType::Person, TaskScope::AnyHour),
                }) as Arc<dyn MetaTask>,
                Arc::new(crate::catalog::ChargeMeta::new()),
            ]
        });
        ctx.add_settlement(Settlement::new(SettlementId(1), "Jezero", 4));
        let mut engine = ColonyEngine::new(ctx, Arc::new(RecordingSink::new()), 7);
        engine.spawn_colonist(Colonist::person(1, "Ada", SettlementId(1)));
        let mut bot = Colonist::robot(2, "R1", SettlementId(1), RobotType::Deliverybot);
        bot.condition.energy = 0.5;
        engine.spawn_colonist(bot);

        let report = engine.update(5.0);
        assert_eq!(report.agents, 2);
        assert_eq!(report.failures, 1);

        let mut robot_busy = false;
        engine.for_each_controller(|c, tc| {
            if c.kind == WorkerKind::Robot {
                robot_busy = tc.has_active_task();
            } else {
                assert!(tc.last_task().is_some_and(|t| t.is_done()));
                assert!(!tc.has_active_task());
            }
        });
        assert!(robot_busy);

        assert_eq!(engine.update(5.0).failures, 1);
    }
}
