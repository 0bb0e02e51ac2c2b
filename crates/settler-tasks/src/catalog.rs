//! Built-in descriptors: the everyday activities of a small settlement.
//!
//! | ID | Workers | Scope | Notes |
//! |----|---------|-------|-------|
//! | `sleep` | both | any hour | robots idle in low-power mode |
//! | `eat-drink` | person | any hour | drinking, then eating |
//! | `relax`, `read`, `workout` | person | off duty | leisure |
//! | `maintain-facility` | both | on duty | settlement pool, one job per worn facility |
//! | `cook-meal` | both | on duty | settlement pool, demand scales with population |
//! | `walk-outside` | person | on duty | EVA, airlock subtasks out and back |
//! | `tend-greenhouse` | both | on duty | needs a greenhouse |
//! | `charge` | robot | any hour | battery top-up |
//!
//! `return-to-shelter` is not registered; the controller uses it as the
//! fallback for a worker stranded outside.

use std::sync::Arc;

use crate::agent::{JobType, Location, RobotType, Worker};
use crate::context::SchedulingContext;
use crate::error::{Result, TaskError};
use crate::job::{Focus, SettlementNeed};
use crate::meta::{FavoriteType, MetaTask, TaskDescriptor, TaskScope, TaskTrait, WorkerType};
use crate::settlement::{FacilityKind, Settlement, SettlementId};
use crate::skills::SkillType;
use crate::task::{Task, TaskBehaviour, TaskBuilder, TaskContext, TaskCore, TaskPhase};

pub const SLEEPING: TaskPhase = TaskPhase::new("Sleeping");
pub const IDLING: TaskPhase = TaskPhase::new("Idling");
pub const DRINKING: TaskPhase = TaskPhase::new("Drinking");
pub const EATING: TaskPhase = TaskPhase::new("Eating");
pub const RELAXING: TaskPhase = TaskPhase::new("Relaxing");
pub const READING: TaskPhase = TaskPhase::new("Reading");
pub const EXERCISING: TaskPhase = TaskPhase::new("Exercising");
pub const MAINTAINING: TaskPhase = TaskPhase::new("Maintaining");
pub const COOKING: TaskPhase = TaskPhase::new("Cooking");
pub const WALKING: TaskPhase = TaskPhase::new("Walking");
pub const RETURNING: TaskPhase = TaskPhase::new("Returning");
pub const CYCLING: TaskPhase = TaskPhase::new("Cycling Airlock");
pub const TENDING: TaskPhase = TaskPhase::new("Tending Crops");
pub const CHARGING: TaskPhase = TaskPhase::new("Charging");

const THIRST_RELIEF_PER_MILLISOL: f64 = 0.05;
const HUNGER_RELIEF_PER_MILLISOL: f64 = 0.03;
const AIRLOCK_CYCLE: f64 = 10.0;
const EVA_WALK_LENGTH: f64 = 60.0;
const COOKING_TIME: f64 = 40.0;
const CHARGE_PER_MILLISOL: f64 = 0.01;

/// Every registered built-in descriptor.
pub fn standard_catalog() -> Vec<Arc<dyn MetaTask>> {
    vec![
        Arc::new(SleepMeta::new()),
        Arc::new(EatDrinkMeta::new()),
        Arc::new(LeisureMeta::relax()),
        Arc::new(LeisureMeta::read()),
        Arc::new(LeisureMeta::workout()),
        Arc::new(MaintainFacilityMeta::new()),
        Arc::new(CookMealMeta::new()),
        Arc::new(WalkOutsideMeta::new()),
        Arc::new(TendGreenhouseMeta::new()),
        Arc::new(ChargeMeta::new()),
    ]
}

/// The unregistered return-to-shelter descriptor.
pub fn shelter_task() -> Arc<dyn MetaTask> {
    Arc::new(ReturnToShelterMeta::new())
}

fn builder(descriptor: &TaskDescriptor, worker: &dyn Worker) -> TaskBuilder {
    TaskBuilder::new(descriptor.name())
        .owner(worker)
        .meta_id(descriptor.id())
        .effort_driven(descriptor.is_effort_driven())
}

fn home_settlement<'c>(worker: &dyn Worker, ctx: &'c SchedulingContext, task: &str) -> Result<&'c Settlement> {
    worker
        .settlement()
        .and_then(|id| ctx.settlement(id))
        .ok_or_else(|| TaskError::JobUnavailable(format!("{} needs a settlement", task)))
}

/// Spends every millisol offered, applying `effect` for the time spent.
/// Finishes early once `satisfied` holds.
struct Steady {
    effect: fn(&mut dyn Worker, f64),
    satisfied: Option<fn(&dyn Worker) -> bool>,
}

impl Steady {
    fn new(effect: fn(&mut dyn Worker, f64)) -> Self {
        Self {
            effect,
            satisfied: None,
        }
    }

    fn until(mut self, satisfied: fn(&dyn Worker) -> bool) -> Self {
        self.satisfied = Some(satisfied);
        self
    }
}

impl TaskBehaviour for Steady {
    fn perform_phase(
        &mut self,
        _phase: TaskPhase,
        time: f64,
        task: &mut TaskCore,
        ctx: &mut TaskContext<'_>,
    ) -> Result<f64> {
        if self.satisfied.is_some_and(|done| done(&*ctx.worker)) {
            task.finish();
            return Ok(time);
        }
        (self.effect)(&mut *ctx.worker, time);
        Ok(0.0)
    }
}

fn no_effect(_worker: &mut dyn Worker, _time: f64) {}

// ── Sleep ───────────────────────────────────────────────────────────────

pub struct SleepMeta {
    descriptor: TaskDescriptor,
}

impl SleepMeta {
    pub fn new() -> Self {
        Self {
            descriptor: TaskDescriptor::new("sleep", "Sleep", WorkerType::Both, TaskScope::AnyHour)
                .with_traits(&[TaskTrait::Relaxation]),
        }
    }
}

impl Default for SleepMeta {
    fn default() -> Self {
        Self::new()
    }
}

fn rest(worker: &mut dyn Worker, time: f64) {
    let c = worker.condition_mut();
    c.fatigue = (c.fatigue - time / 250.0).max(0.0);
    c.refresh_performance();
}

fn trickle_charge(worker: &mut dyn Worker, time: f64) {
    worker.recover(time * CHARGE_PER_MILLISOL / 10.0);
}

impl MetaTask for SleepMeta {
    fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    fn person_probability(&self, person: &dyn Worker, ctx: &SchedulingContext) -> Option<f64> {
        if !person.is_inside() {
            return None;
        }
        let fatigue = person.condition().fatigue;
        let mut p = fatigue * fatigue * 300.0;
        if person.shift().is_sleep_time(ctx.now().millisol) {
            p += 400.0;
        }
        (p > 0.0).then_some(p)
    }

    fn construct_for_person(&self, person: &dyn Worker, ctx: &SchedulingContext, _focus: Option<&Focus>) -> Result<Task> {
        builder(&self.descriptor, person)
            .description("Sleeping in quarters")
            .phases(&[SLEEPING])
            .duration(ctx.config().sleep_duration)
            .stress(-0.02)
            .record_completion()
            .build(Steady::new(rest))
    }

    fn construct_for_robot(&self, robot: &dyn Worker, ctx: &SchedulingContext, _focus: Option<&Focus>) -> Result<Task> {
        builder(&self.descriptor, robot)
            .description("Standing by in low-power mode")
            .phases(&[IDLING])
            .duration(ctx.config().default_task_duration)
            .build(Steady::new(trickle_charge))
    }
}

// ── Eat & drink ─────────────────────────────────────────────────────────

pub struct EatDrinkMeta {
    descriptor: TaskDescriptor,
}

impl EatDrinkMeta {
    pub fn new() -> Self {
        Self {
            descriptor: TaskDescriptor::new("eat-drink", "Eat Drink", WorkerType::Person, TaskScope::AnyHour)
                .with_traits(&[TaskTrait::Relaxation])
                .with_favorites(&[FavoriteType::Cooking]),
        }
    }
}

impl Default for EatDrinkMeta {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaTask for EatDrinkMeta {
    fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    fn person_probability(&self, person: &dyn Worker, ctx: &SchedulingContext) -> Option<f64> {
        if !person.is_inside() {
            return None;
        }
        let c = person.condition();
        let need = c.hunger.max(c.thirst);
        if need < 0.25 {
            return None;
        }
        let mut p = need * 120.0;
        if crate::shift::is_meal_time(ctx.now().millisol) {
            p *= 2.5;
        }
        Some(p)
    }

    fn construct_for_person(&self, person: &dyn Worker, _ctx: &SchedulingContext, _focus: Option<&Focus>) -> Result<Task> {
        builder(&self.descriptor, person)
            .description("Having a meal")
            .phases(&[DRINKING, EATING])
            .stress(-0.01)
            .build(EatDrink)
    }
}

struct EatDrink;

impl TaskBehaviour for EatDrink {
    fn perform_phase(
        &mut self,
        phase: TaskPhase,
        time: f64,
        task: &mut TaskCore,
        ctx: &mut TaskContext<'_>,
    ) -> Result<f64> {
        let c = ctx.worker.condition_mut();
        if phase == DRINKING {
            if c.thirst <= 0.0 {
                task.set_phase(Some(EATING), ctx);
                return Ok(time);
            }
            Ok(relieve(&mut c.thirst, THIRST_RELIEF_PER_MILLISOL, time))
        } else {
            if c.hunger <= 0.0 {
                c.refresh_performance();
                task.finish();
                return Ok(time);
            }
            Ok(relieve(&mut c.hunger, HUNGER_RELIEF_PER_MILLISOL, time))
        }
    }
}

/// Lower `need` at `rate` per millisol for up to `time`; returns time left.
fn relieve(need: &mut f64, rate: f64, time: f64) -> f64 {
    let needed = *need / rate;
    if time >= needed {
        *need = 0.0;
        time - needed
    } else {
        *need -= time * rate;
        0.0
    }
}

// ── Leisure ─────────────────────────────────────────────────────────────

/// Off-duty pastimes that differ only in numbers.
pub struct LeisureMeta {
    descriptor: TaskDescriptor,
    phase: TaskPhase,
    base: f64,
    /// Extra score per point of stress.
    stress_weight: f64,
    /// Stress relieved per millisol.
    relief: f64,
    /// Not offered above this fatigue.
    max_fatigue: f64,
    effect: fn(&mut dyn Worker, f64),
}

fn tire(worker: &mut dyn Worker, time: f64) {
    let c = worker.condition_mut();
    c.fatigue = (c.fatigue + time / 400.0).min(1.0);
}

impl LeisureMeta {
    pub fn relax() -> Self {
        Self {
            descriptor: TaskDescriptor::new("relax", "Relax", WorkerType::Person, TaskScope::NonWorkHour)
                .with_traits(&[TaskTrait::Relaxation])
                .with_favorites(&[FavoriteType::Gaming]),
            phase: RELAXING,
            base: 10.0,
            stress_weight: 0.5,
            relief: 0.1,
            max_fatigue: 1.0,
            effect: no_effect,
        }
    }

    pub fn read() -> Self {
        Self {
            descriptor: TaskDescriptor::new("read", "Read", WorkerType::Person, TaskScope::NonWorkHour)
                .with_traits(&[TaskTrait::Academic, TaskTrait::Relaxation])
                .with_favorites(&[FavoriteType::Research, FavoriteType::Astronomy]),
            phase: READING,
            base: 15.0,
            stress_weight: 0.1,
            relief: 0.05,
            max_fatigue: 0.9,
            effect: no_effect,
        }
    }

    pub fn workout() -> Self {
        Self {
            descriptor: TaskDescriptor::new("workout", "Workout", WorkerType::Person, TaskScope::NonWorkHour)
                .with_traits(&[TaskTrait::Strength, TaskTrait::Agility])
                .with_favorites(&[FavoriteType::Sport]),
            phase: EXERCISING,
            base: 20.0,
            stress_weight: 0.2,
            relief: 0.08,
            max_fatigue: 0.5,
            effect: tire,
        }
    }
}

impl MetaTask for LeisureMeta {
    fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    fn person_probability(&self, person: &dyn Worker, ctx: &SchedulingContext) -> Option<f64> {
        let c = person.condition();
        if !person.is_inside() || c.fatigue > self.max_fatigue {
            return None;
        }
        let mut p = self.base + c.stress * self.stress_weight;
        // Hard to unwind in a packed habitat
        if let Some(s) = person.settlement().and_then(|id| ctx.settlement(id)) {
            p /= s.crowding().max(1.0);
        }
        Some(p)
    }

    fn construct_for_person(&self, person: &dyn Worker, ctx: &SchedulingContext, _focus: Option<&Focus>) -> Result<Task> {
        builder(&self.descriptor, person)
            .phases(&[self.phase])
            .duration(ctx.config().default_task_duration)
            .stress(-self.relief)
            .build(Steady::new(self.effect))
    }
}

// ── Facility maintenance ────────────────────────────────────────────────

pub struct MaintainFacilityMeta {
    descriptor: TaskDescriptor,
}

/// Wear at which a facility is put on the maintenance list.
const MAINTENANCE_WEAR: f64 = 0.25;

impl MaintainFacilityMeta {
    pub fn new() -> Self {
        Self {
            descriptor: TaskDescriptor::new(
                "maintain-facility",
                "Maintenance",
                WorkerType::Both,
                TaskScope::WorkHour,
            )
            .with_traits(&[TaskTrait::Strength])
            .with_favorites(&[FavoriteType::Tinkering])
            .with_preferred_jobs(&[JobType::Engineer, JobType::Technician])
            .with_preferred_robots(&[RobotType::Repairbot]),
        }
    }

    fn build(&self, worker: &dyn Worker, ctx: &SchedulingContext, focus: Option<&Focus>) -> Result<Task> {
        let focus = focus.ok_or_else(|| TaskError::JobUnavailable("maintenance without a facility".into()))?;
        let settlement = home_settlement(worker, ctx, self.descriptor.name())?;
        builder(&self.descriptor, worker)
            .description(&format!("Maintaining {}", focus.name))
            .phases(&[MAINTAINING])
            .duration(ctx.config().default_task_duration)
            .stress(0.05)
            .skills(&[SkillType::Mechanics], 10.0)
            .build(Maintain {
                settlement: settlement.id(),
                facility: focus.id,
            })
    }
}

impl Default for MaintainFacilityMeta {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaTask for MaintainFacilityMeta {
    fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    fn construct_for_person(&self, person: &dyn Worker, ctx: &SchedulingContext, focus: Option<&Focus>) -> Result<Task> {
        self.build(person, ctx, focus)
    }

    fn construct_for_robot(&self, robot: &dyn Worker, ctx: &SchedulingContext, focus: Option<&Focus>) -> Result<Task> {
        self.build(robot, ctx, focus)
    }

    fn is_settlement_provider(&self) -> bool {
        true
    }

    fn settlement_tasks(&self, settlement: &Settlement, _ctx: &SchedulingContext) -> Vec<SettlementNeed> {
        settlement
            .facilities()
            .into_iter()
            .filter(|f| f.wear >= MAINTENANCE_WEAR)
            .map(|f| SettlementNeed {
                description: format!("Maintain {}", f.name),
                score: f.wear * 300.0,
                demand: 1,
                focus: Some(Focus::new(f.id, &f.name)),
            })
            .collect()
    }
}

struct Maintain {
    settlement: SettlementId,
    facility: u32,
}

impl TaskBehaviour for Maintain {
    fn perform_phase(
        &mut self,
        _phase: TaskPhase,
        _time: f64,
        _task: &mut TaskCore,
        _ctx: &mut TaskContext<'_>,
    ) -> Result<f64> {
        Ok(0.0)
    }

    fn clear_down(&mut self, task: &mut TaskCore, ctx: &mut TaskContext<'_>) {
        let Some(duration) = task.duration() else {
            return;
        };
        let share = (task.time_completed() / duration).clamp(0.0, 1.0);
        if let Some(s) = ctx.sched.settlement(self.settlement) {
            if !s.service_facility(self.facility, share) {
                log::warn!("Facility {} vanished from {}", self.facility, s.name());
            }
        }
    }
}

// ── Cooking ─────────────────────────────────────────────────────────────

pub struct CookMealMeta {
    descriptor: TaskDescriptor,
}

/// Diners served by one cook.
const DINERS_PER_COOK: u32 = 8;

impl CookMealMeta {
    pub fn new() -> Self {
        Self {
            descriptor: TaskDescriptor::new("cook-meal", "Cook Meal", WorkerType::Both, TaskScope::WorkHour)
                .with_traits(&[TaskTrait::Artistic])
                .with_favorites(&[FavoriteType::Cooking])
                .with_preferred_jobs(&[JobType::Chef])
                .with_preferred_robots(&[RobotType::Chefbot]),
        }
    }

    fn build(&self, worker: &dyn Worker, ctx: &SchedulingContext, focus: Option<&Focus>) -> Result<Task> {
        let description = match focus {
            Some(kitchen) => format!("Cooking in {}", kitchen.name),
            None => "Cooking".to_string(),
        };
        builder(&self.descriptor, worker)
            .description(&description)
            .phases(&[COOKING])
            .duration(COOKING_TIME.min(ctx.config().default_task_duration))
            .stress(0.02)
            .skills(&[SkillType::Cooking], 12.0)
            .build(Steady::new(no_effect))
    }
}

impl Default for CookMealMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// The 150 millisols leading up to a meal window.
fn before_meal(millisol: f64) -> bool {
    [250.0, 500.0, 750.0]
        .iter()
        .any(|meal| (meal - 150.0..*meal).contains(&millisol))
}

impl MetaTask for CookMealMeta {
    fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    fn construct_for_person(&self, person: &dyn Worker, ctx: &SchedulingContext, focus: Option<&Focus>) -> Result<Task> {
        self.build(person, ctx, focus)
    }

    fn construct_for_robot(&self, robot: &dyn Worker, ctx: &SchedulingContext, focus: Option<&Focus>) -> Result<Task> {
        self.build(robot, ctx, focus)
    }

    fn is_settlement_provider(&self) -> bool {
        true
    }

    fn settlement_tasks(&self, settlement: &Settlement, ctx: &SchedulingContext) -> Vec<SettlementNeed> {
        if settlement.population == 0 || !before_meal(ctx.now().millisol) {
            return Vec::new();
        }
        let Some(kitchen) = settlement
            .facilities()
            .into_iter()
            .find(|f| f.kind == FacilityKind::Kitchen)
        else {
            return Vec::new();
        };
        vec![SettlementNeed {
            description: format!("Cook a meal in {}", kitchen.name),
            score: 200.0,
            demand: settlement.population.div_ceil(DINERS_PER_COOK),
            focus: Some(Focus::new(kitchen.id, &kitchen.name)),
        }]
    }
}

// ── EVA walk and airlock ────────────────────────────────────────────────

pub struct WalkOutsideMeta {
    descriptor: TaskDescriptor,
}

impl WalkOutsideMeta {
    pub fn new() -> Self {
        Self {
            descriptor: TaskDescriptor::new("walk-outside", "Walk Outside", WorkerType::Person, TaskScope::WorkHour)
                .with_traits(&[TaskTrait::Agility, TaskTrait::Strength])
                .with_favorites(&[FavoriteType::FieldWork])
                .with_preferred_jobs(&[JobType::Areologist])
                .with_eva(),
        }
    }
}

impl Default for WalkOutsideMeta {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaTask for WalkOutsideMeta {
    fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    fn person_probability(&self, person: &dyn Worker, _ctx: &SchedulingContext) -> Option<f64> {
        person.is_inside().then_some(40.0)
    }

    fn construct_for_person(&self, person: &dyn Worker, ctx: &SchedulingContext, _focus: Option<&Focus>) -> Result<Task> {
        let settlement = home_settlement(person, ctx, self.descriptor.name())?;
        builder(&self.descriptor, person)
            .description("EVA walk near the habitat")
            .phases(&[WALKING, RETURNING])
            .stress(0.03)
            .skills(&[SkillType::EvaOperations, SkillType::Areology], 15.0)
            .record_completion()
            .build(WalkOutside {
                settlement: settlement.id(),
                walked: 0.0,
                exited: false,
            })
    }
}

struct WalkOutside {
    settlement: SettlementId,
    walked: f64,
    exited: bool,
}

impl TaskBehaviour for WalkOutside {
    fn perform_phase(
        &mut self,
        phase: TaskPhase,
        time: f64,
        task: &mut TaskCore,
        ctx: &mut TaskContext<'_>,
    ) -> Result<f64> {
        if phase == RETURNING {
            if ctx.worker.is_outside() {
                let airlock = airlock_task(&*ctx.worker, self.settlement, false)?;
                task.add_sub_task(airlock, ctx)?;
            } else {
                task.finish();
            }
            return Ok(time);
        }

        if !self.exited {
            self.exited = true;
            let airlock = airlock_task(&*ctx.worker, self.settlement, true)?;
            task.add_sub_task(airlock, ctx)?;
            return Ok(time);
        }
        if !ctx.worker.is_outside() {
            // Never made it through the airlock
            task.finish();
            return Ok(time);
        }

        let used = time.min(EVA_WALK_LENGTH - self.walked).max(0.0);
        self.walked += used;
        if self.walked >= EVA_WALK_LENGTH - ctx.sched.config().time_epsilon {
            task.set_phase(Some(RETURNING), ctx);
            let airlock = airlock_task(&*ctx.worker, self.settlement, false)?;
            task.add_sub_task(airlock, ctx)?;
        }
        Ok(time - used)
    }
}

/// A fixed-length airlock cycle that moves the worker through on completion.
fn airlock_task(worker: &dyn Worker, settlement: SettlementId, exiting: bool) -> Result<Task> {
    let description = if exiting { "Exit Airlock" } else { "Enter Airlock" };
    TaskBuilder::new("Airlock")
        .owner(worker)
        .description(description)
        .phases(&[CYCLING])
        .duration(AIRLOCK_CYCLE)
        .stress(0.01)
        .skills(&[SkillType::EvaOperations], 20.0)
        .effort_driven(false)
        .build(Airlock { settlement, exiting })
}

struct Airlock {
    settlement: SettlementId,
    exiting: bool,
}

impl TaskBehaviour for Airlock {
    fn perform_phase(
        &mut self,
        _phase: TaskPhase,
        _time: f64,
        _task: &mut TaskCore,
        _ctx: &mut TaskContext<'_>,
    ) -> Result<f64> {
        Ok(0.0)
    }

    fn clear_down(&mut self, task: &mut TaskCore, ctx: &mut TaskContext<'_>) {
        let epsilon = ctx.sched.config().time_epsilon;
        let cycled = task
            .duration()
            .is_some_and(|d| task.time_completed() >= d - epsilon);
        if !cycled {
            return;
        }
        let location = if self.exiting {
            Location::Outside(self.settlement)
        } else {
            Location::Inside(self.settlement)
        };
        ctx.worker.set_location(location);
    }
}

/// Gets a worker stranded outside back in through the airlock.
pub struct ReturnToShelterMeta {
    descriptor: TaskDescriptor,
}

impl ReturnToShelterMeta {
    pub fn new() -> Self {
        Self {
            descriptor: TaskDescriptor::new(
                "return-to-shelter",
                "Return to Shelter",
                WorkerType::Both,
                TaskScope::AnyHour,
            )
            .with_traits(&[TaskTrait::Relaxation]),
        }
    }

    fn build(&self, worker: &dyn Worker) -> Result<Task> {
        let Location::Outside(settlement) = worker.location() else {
            return Err(TaskError::JobUnavailable(format!("{} is not outside", worker.name())));
        };
        builder(&self.descriptor, worker)
            .description("Heading back inside")
            .phases(&[RETURNING])
            .build(ReturnInside { settlement })
    }
}

impl Default for ReturnToShelterMeta {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaTask for ReturnToShelterMeta {
    fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    fn construct_for_person(&self, person: &dyn Worker, _ctx: &SchedulingContext, _focus: Option<&Focus>) -> Result<Task> {
        self.build(person)
    }

    fn construct_for_robot(&self, robot: &dyn Worker, _ctx: &SchedulingContext, _focus: Option<&Focus>) -> Result<Task> {
        self.build(robot)
    }
}

struct ReturnInside {
    settlement: SettlementId,
}

impl TaskBehaviour for ReturnInside {
    fn perform_phase(
        &mut self,
        _phase: TaskPhase,
        time: f64,
        task: &mut TaskCore,
        ctx: &mut TaskContext<'_>,
    ) -> Result<f64> {
        if ctx.worker.is_outside() {
            let airlock = airlock_task(&*ctx.worker, self.settlement, false)?;
            task.add_sub_task(airlock, ctx)?;
        } else {
            task.finish();
        }
        Ok(time)
    }
}

// ── Greenhouse ──────────────────────────────────────────────────────────

pub struct TendGreenhouseMeta {
    descriptor: TaskDescriptor,
}

impl TendGreenhouseMeta {
    pub fn new() -> Self {
        Self {
            descriptor: TaskDescriptor::new("tend-greenhouse", "Tend Greenhouse", WorkerType::Both, TaskScope::WorkHour)
                .with_traits(&[TaskTrait::Agility])
                .with_favorites(&[FavoriteType::Tinkering])
                .with_preferred_jobs(&[JobType::Botanist])
                .with_preferred_robots(&[RobotType::Gardenbot]),
        }
    }

    fn probability(&self, worker: &dyn Worker, ctx: &SchedulingContext, base: f64) -> Option<f64> {
        if !worker.is_inside() {
            return None;
        }
        let settlement = worker.settlement().and_then(|id| ctx.settlement(id))?;
        settlement.has_facility(FacilityKind::Greenhouse).then_some(base)
    }

    fn build(&self, worker: &dyn Worker, ctx: &SchedulingContext) -> Result<Task> {
        builder(&self.descriptor, worker)
            .description("Tending crops")
            .phases(&[TENDING])
            .duration(ctx.config().default_task_duration)
            .stress(0.01)
            .skills(&[SkillType::Botany], 10.0)
            .build(Steady::new(no_effect))
    }
}

impl Default for TendGreenhouseMeta {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaTask for TendGreenhouseMeta {
    fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    fn person_probability(&self, person: &dyn Worker, ctx: &SchedulingContext) -> Option<f64> {
        self.probability(person, ctx, 25.0)
    }

    fn robot_probability(&self, robot: &dyn Worker, ctx: &SchedulingContext) -> Option<f64> {
        self.probability(robot, ctx, 40.0)
    }

    fn construct_for_person(&self, person: &dyn Worker, ctx: &SchedulingContext, _focus: Option<&Focus>) -> Result<Task> {
        self.build(person, ctx)
    }

    fn construct_for_robot(&self, robot: &dyn Worker, ctx: &SchedulingContext, _focus: Option<&Focus>) -> Result<Task> {
        self.build(robot, ctx)
    }
}

// ── Robot charging ──────────────────────────────────────────────────────

pub struct ChargeMeta {
    descriptor: TaskDescriptor,
}

impl ChargeMeta {
    pub fn new() -> Self {
        Self {
            descriptor: TaskDescriptor::new("charge", "Charge", WorkerType::Robot, TaskScope::AnyHour)
                .with_traits(&[TaskTrait::Relaxation]),
        }
    }
}

impl Default for ChargeMeta {
    fn default() -> Self {
        Self::new()
    }
}

fn charge(worker: &mut dyn Worker, time: f64) {
    worker.recover(time * CHARGE_PER_MILLISOL);
}

fn full_battery(worker: &dyn Worker) -> bool {
    worker.condition().energy >= 1.0
}

impl MetaTask for ChargeMeta {
    fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    fn robot_probability(&self, robot: &dyn Worker, _ctx: &SchedulingContext) -> Option<f64> {
        let energy = robot.condition().energy;
        (energy < 0.8).then(|| (1.0 - energy) * 300.0)
    }

    fn construct_for_robot(&self, robot: &dyn Worker, _ctx: &SchedulingContext, _focus: Option<&Focus>) -> Result<Task> {
        builder(&self.descriptor, robot)
            .description("Recharging battery")
            .phases(&[CHARGING])
            .build(Steady::new(charge).until(full_battery))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Colonist;
    use crate::event::RecordingSink;
    use crate::history::ActivityLog;

    fn base() -> SchedulingContext {
        let mut ctx = SchedulingContext::default();
        let mut s = Settlement::new(SettlementId(1), "Base", 8);
        s.population = 9;
        s.add_facility(FacilityKind::Kitchen, "Galley");
        s.add_facility(FacilityKind::Greenhouse, "Greenhouse A");
        ctx.add_settlement(s);
        ctx
    }

    fn run(task: &mut Task, worker: &mut Colonist, ctx: &SchedulingContext, time: f64) -> f64 {
        let sink = RecordingSink::new();
        let mut log = ActivityLog::new(7);
        let mut tc = TaskContext {
            worker,
            sched: ctx,
            sink: &sink,
            log: &mut log,
        };
        task.perform_task(time, &mut tc).unwrap()
    }

    #[test]
    fn test_catalog_ids_unique() {
        let catalog = standard_catalog();
        let mut ids: Vec<_> = catalog.iter().map(|m| m.descriptor().id().to_string()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), catalog.len());
    }

    #[test]
    fn test_eat_drink_drinks_then_eats() {
        let ctx = base();
        let mut ada = Colonist::person(1, "Ada", SettlementId(1));
        ada.condition.thirst = 0.5;
        ada.condition.hunger = 0.3;
        let mut task = EatDrinkMeta::new().construct_for_person(&ada, &ctx, None).unwrap();
        assert_eq!(task.phase(), Some(DRINKING));

        run(&mut task, &mut ada, &ctx, 5.0);
        assert!(ada.condition.thirst < 0.5);
        assert_eq!(ada.condition.hunger, 0.3);

        let left = run(&mut task, &mut ada, &ctx, 100.0);
        assert!(task.is_done());
        assert_eq!(ada.condition.thirst, 0.0);
        assert_eq!(ada.condition.hunger, 0.0);
        assert!(left > 0.0);
    }

    #[test]
    fn test_cook_demand_scales_with_population() {
        let ctx = base().with_clock(crate::clock::MarsClock::new(crate::clock::MarsTime::new(1, 200.0)));
        let s = ctx.settlement(SettlementId(1)).unwrap();
        let needs = CookMealMeta::new().settlement_tasks(s, &ctx);
        assert_eq!(needs.len(), 1);
        assert_eq!(needs[0].demand, 2);
    }

    #[test]
    fn test_no_cooking_outside_meal_prep() {
        let ctx = base().with_clock(crate::clock::MarsClock::new(crate::clock::MarsTime::new(1, 300.0)));
        let s = ctx.settlement(SettlementId(1)).unwrap();
        assert!(CookMealMeta::new().settlement_tasks(s, &ctx).is_empty());
    }

    #[test]
    fn test_worn_facilities_need_maintenance() {
        let ctx = base();
        let s = ctx.settlement(SettlementId(1)).unwrap();
        assert!(MaintainFacilityMeta::new().settlement_tasks(s, &ctx).is_empty());
        s.wear_facilities(1000.0);
        let needs = MaintainFacilityMeta::new().settlement_tasks(s, &ctx);
        assert_eq!(needs.len(), 2);
        assert!(needs.iter().all(|n| n.demand == 1 && n.focus.is_some()));
    }

    #[test]
    fn test_maintenance_services_facility() {
        let ctx = base();
        let s = ctx.settlement(SettlementId(1)).unwrap();
        s.wear_facilities(1000.0);
        let galley = s.facilities()[0].clone();
        let mut bot = Colonist::robot(5, "RB-5", SettlementId(1), RobotType::Repairbot);
        let mut task = MaintainFacilityMeta::new()
            .construct_for_robot(&bot, &ctx, Some(&Focus::new(galley.id, &galley.name)))
            .unwrap();
        run(&mut task, &mut bot, &ctx, 100.0);
        assert!(task.is_done());
        assert_eq!(s.facility(galley.id).map(|f| f.wear), Some(0.0));
    }

    #[test]
    fn test_maintenance_requires_focus() {
        let ctx = base();
        let ada = Colonist::person(1, "Ada", SettlementId(1));
        assert!(MaintainFacilityMeta::new().construct_for_person(&ada, &ctx, None).is_err());
    }

    #[test]
    fn test_walk_outside_round_trip() {
        let ctx = base();
        let mut ada = Colonist::person(1, "Ada", SettlementId(1));
        let mut task = WalkOutsideMeta::new().construct_for_person(&ada, &ctx, None).unwrap();

        run(&mut task, &mut ada, &ctx, 5.0);
        assert!(ada.is_inside(), "still cycling out");
        assert_eq!(task.active_leaf().description(), "Exit Airlock");

        run(&mut task, &mut ada, &ctx, 30.0);
        assert!(ada.is_outside());

        for _ in 0..10 {
            run(&mut task, &mut ada, &ctx, 20.0);
        }
        assert!(task.is_done());
        assert!(ada.is_inside());
        assert!(ada.skills.experience(SkillType::EvaOperations) > 0.0 || ada.skills.level(SkillType::EvaOperations) > 0);
    }

    #[test]
    fn test_shelter_brings_worker_in() {
        let ctx = base();
        let mut ada = Colonist::person(1, "Ada", SettlementId(1));
        assert!(ReturnToShelterMeta::new().construct_for_person(&ada, &ctx, None).is_err());

        ada.location = Location::Outside(SettlementId(1));
        let mut task = ReturnToShelterMeta::new().construct_for_person(&ada, &ctx, None).unwrap();
        run(&mut task, &mut ada, &ctx, 30.0);
        assert!(ada.is_inside());
        assert!(task.is_done());
    }

    #[test]
    fn test_charge_until_full() {
        let ctx = base();
        let mut bot = Colonist::robot(5, "CB-1", SettlementId(1), RobotType::Chefbot);
        bot.condition.energy = 0.5;
        let meta = ChargeMeta::new();
        assert!(meta.robot_probability(&bot, &ctx).is_some());
        let mut task = meta.construct_for_robot(&bot, &ctx, None).unwrap();
        for _ in 0..10 {
            run(&mut task, &mut bot, &ctx, 20.0);
        }
        assert!(task.is_done());
        assert_eq!(bot.condition.energy, 1.0);
        assert!(meta.robot_probability(&bot, &ctx).is_none());
    }

    #[test]
    fn test_sleep_probability_peaks_in_window() {
        let ada = Colonist::person(1, "Ada", SettlementId(1));
        let night = base().with_clock(crate::clock::MarsClock::new(crate::clock::MarsTime::new(1, 900.0)));
        let day = base().with_clock(crate::clock::MarsClock::new(crate::clock::MarsTime::new(1, 400.0)));
        let meta = SleepMeta::new();
        let p_night = meta.person_probability(&ada, &night).unwrap_or(0.0);
        let p_day = meta.person_probability(&ada, &day).unwrap_or(0.0);
        assert!(p_night > p_day);
    }

    #[test]
    fn test_indoor_needs_not_offered_outside() {
        let ctx = base();
        let mut ada = Colonist::person(1, "Ada", SettlementId(1));
        ada.condition.fatigue = 0.5;
        ada.condition.hunger = 0.8;
        assert!(SleepMeta::new().person_probability(&ada, &ctx).is_some());
        assert!(EatDrinkMeta::new().person_probability(&ada, &ctx).is_some());
        assert!(LeisureMeta::relax().person_probability(&ada, &ctx).is_some());

        ada.location = Location::Outside(SettlementId(1));
        assert!(SleepMeta::new().person_probability(&ada, &ctx).is_none());
        assert!(EatDrinkMeta::new().person_probability(&ada, &ctx).is_none());
        assert!(LeisureMeta::relax().person_probability(&ada, &ctx).is_none());
        assert!(LeisureMeta::read().person_probability(&ada, &ctx).is_none());
    }
}
