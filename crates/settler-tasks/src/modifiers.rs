//! Generic scoring modifiers applied on top of a descriptor's base score.
//!
//! Every function returns a multiplier ≥ 0. [`worker_modifier`] folds them
//! together for one worker and [`score_meta_task`] applies the result to a
//! descriptor's base suitability.
//!
//! | Modifier | Applies when | Effect |
//! |----------|-------------|--------|
//! | effort | descriptor is effort-driven | × performance rating |
//! | job | person has a job, descriptor lists preferred jobs | × penalty if not listed |
//! | role | person's role is preferred | × bonus |
//! | robot | descriptor lists preferred robot types | × penalty if not listed |
//! | preference | person | × `1 + pref / divisor` |
//! | settlement | worker is at a settlement | × configured modifier |
//! | radiation, EVA fitness | descriptor is EVA | 0 when unsafe |

use crate::agent::{JobType, RobotType, RoleType, Worker, WorkerKind};
use crate::clock::MarsTime;
use crate::context::SchedulingContext;
use crate::job::clamp_score;
use crate::meta::{MetaTask, TaskDescriptor};
use crate::settlement::{RadiationStatus, Settlement};
use crate::shift;

/// Hunger above which a meal-time EVA is ruled out.
const EVA_MEAL_HUNGER: f64 = 0.5;
/// Fatigue above which a worker is too tired for EVA.
const EVA_MAX_FATIGUE: f64 = 0.8;

pub fn effort_modifier(descriptor: &TaskDescriptor, worker: &dyn Worker) -> f64 {
    if descriptor.is_effort_driven() {
        worker.performance_rating().max(0.0)
    } else {
        1.0
    }
}

/// 1.0 with no job, no preferred jobs, or a matching job; `penalty` otherwise.
pub fn job_modifier(job: Option<JobType>, preferred: &[JobType], penalty: f64) -> f64 {
    match job {
        Some(job) if !preferred.is_empty() && !preferred.contains(&job) => penalty,
        _ => 1.0,
    }
}

pub fn role_modifier(role: Option<RoleType>, preferred: &[RoleType], bonus: f64) -> f64 {
    match role {
        Some(role) if preferred.contains(&role) => bonus,
        _ => 1.0,
    }
}

pub fn robot_modifier(robot: Option<RobotType>, preferred: &[RobotType], penalty: f64) -> f64 {
    match robot {
        Some(robot) if !preferred.is_empty() && !preferred.contains(&robot) => penalty,
        _ => 1.0,
    }
}

/// `1 + preference / divisor`, floored at zero.
pub fn preference_modifier(preference: f64, divisor: f64) -> f64 {
    if divisor <= 0.0 {
        return 1.0;
    }
    (1.0 + preference / divisor).max(0.0)
}

pub fn radiation_modifier(status: RadiationStatus) -> f64 {
    match status {
        RadiationStatus::Clear => 1.0,
        RadiationStatus::Baseline => 0.8,
        RadiationStatus::Gcr => 0.5,
        RadiationStatus::SolarParticleEvent => 0.0,
    }
}

/// 1.0 if the worker may go outside now, 0.0 otherwise.
pub fn eva_fitness(worker: &dyn Worker, settlement: &Settlement, now: MarsTime) -> f64 {
    let condition = worker.condition();
    let blocked = settlement.usable_airlocks == 0
        || shift::is_dark(now.millisol)
        || (shift::is_meal_time(now.millisol) && condition.hunger > EVA_MEAL_HUNGER)
        || !condition.fit_for_eva
        || condition.fatigue > EVA_MAX_FATIGUE;
    if blocked {
        0.0
    } else {
        1.0
    }
}

/// Combined generic multiplier for one worker and descriptor.
pub fn worker_modifier(descriptor: &TaskDescriptor, worker: &dyn Worker, ctx: &SchedulingContext) -> f64 {
    let config = ctx.config();
    let mut modifier = effort_modifier(descriptor, worker);

    match worker.kind() {
        WorkerKind::Person => {
            modifier *= job_modifier(worker.job(), descriptor.preferred_jobs(), config.job_mismatch_penalty);
            modifier *= role_modifier(worker.role(), descriptor.preferred_roles(), config.preferred_role_bonus);
            modifier *= preference_modifier(worker.preference(descriptor), config.preference_divisor);
        }
        WorkerKind::Robot => {
            modifier *= robot_modifier(
                worker.robot_type(),
                descriptor.preferred_robots(),
                config.job_mismatch_penalty,
            );
        }
    }

    match worker.settlement().and_then(|id| ctx.settlement(id)) {
        Some(settlement) => {
            modifier *= settlement.preference_modifier(descriptor.id());
            if descriptor.is_eva() {
                modifier *= radiation_modifier(settlement.radiation);
                modifier *= eva_fitness(worker, settlement, ctx.now());
            }
        }
        // No airlock to leave through
        None if descriptor.is_eva() => modifier = 0.0,
        None => {}
    }

    modifier.max(0.0)
}

/// Final score for a descriptor, or `None` if it does not apply to this
/// worker right now.
pub fn score_meta_task(meta: &dyn MetaTask, worker: &dyn Worker, ctx: &SchedulingContext) -> Option<f64> {
    let base = clamp_score(meta.probability(worker, ctx)?);
    if base <= 0.0 {
        return None;
    }
    let score = clamp_score(base * worker_modifier(meta.descriptor(), worker, ctx));
    (score > 0.0).then_some(score)
}
