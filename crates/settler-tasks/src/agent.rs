//! Worker contract and the concrete colonist used by the engine.
//!
//! The scheduler only sees workers through the [`Worker`] trait. The
//! physical simulation behind it (metabolism, battery chemistry, walking)
//! lives elsewhere; [`Colonist`] is a plain-data implementation good enough
//! to drive the scheduler headless.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::meta::{FavoriteType, TaskDescriptor};
use crate::settlement::SettlementId;
use crate::shift::WorkShift;
use crate::skills::{NaturalAttributes, SkillManager};

/// Stable worker identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub u32);

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The two kinds of agent the scheduler serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerKind {
    Person,
    Robot,
}

/// Assigned job of a person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    Areologist,
    Botanist,
    Chef,
    Doctor,
    Engineer,
    Technician,
}

/// Settlement leadership or specialist role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleType {
    Commander,
    EngineeringSpecialist,
    ResourceSpecialist,
    SafetySpecialist,
    ScienceSpecialist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RobotType {
    Chefbot,
    Deliverybot,
    Gardenbot,
    Medicbot,
    Repairbot,
}

/// Where a worker currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    /// Inside the habitat of a settlement.
    Inside(SettlementId),
    /// On the surface near a settlement.
    Outside(SettlementId),
    InVehicle,
}

/// Physiological state. Needs are 0.0 (satisfied) to 1.0 (desperate);
/// stress is 0–100; energy doubles as battery charge for robots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub hunger: f64,
    pub thirst: f64,
    pub fatigue: f64,
    pub stress: f64,
    pub energy: f64,
    pub performance: f64,
    pub fit_for_eva: bool,
}

impl Default for Condition {
    fn default() -> Self {
        Self {
            hunger: 0.2,
            thirst: 0.2,
            fatigue: 0.2,
            stress: 10.0,
            energy: 1.0,
            performance: 1.0,
            fit_for_eva: true,
        }
    }
}

impl Condition {
    /// Needs rise over time; `millisols` of wakefulness.
    pub fn decay(&mut self, millisols: f64) {
        self.hunger = (self.hunger + millisols / 500.0).clamp(0.0, 1.0);
        self.thirst = (self.thirst + millisols / 300.0).clamp(0.0, 1.0);
        self.fatigue = (self.fatigue + millisols / 800.0).clamp(0.0, 1.0);
        self.refresh_performance();
    }

    /// Performance drops as fatigue, hunger, and stress pile up.
    pub fn refresh_performance(&mut self) {
        let fatigue_penalty = (self.fatigue - 0.6).max(0.0) * 1.5;
        let hunger_penalty = (self.hunger - 0.7).max(0.0);
        let stress_penalty = (self.stress - 60.0).max(0.0) / 80.0;
        self.performance =
            (1.0 - fatigue_penalty - hunger_penalty - stress_penalty).clamp(0.0, 1.0);
    }

    /// Ease fatigue and stress enough to lift performance by about `amount`.
    /// Acts on the inputs of [`Condition::refresh_performance`], so the
    /// gain survives the next decay.
    pub fn recover(&mut self, amount: f64) {
        self.fatigue = (self.fatigue - amount / 1.5).max(0.0);
        self.stress = (self.stress - amount * 80.0).max(0.0);
        self.refresh_performance();
    }
}

/// Everything the scheduler needs to know about, and do to, an agent.
pub trait Worker {
    fn id(&self) -> WorkerId;
    fn name(&self) -> &str;
    fn kind(&self) -> WorkerKind;
    fn job(&self) -> Option<JobType>;
    fn role(&self) -> Option<RoleType>;
    fn robot_type(&self) -> Option<RobotType>;
    fn shift(&self) -> WorkShift;
    fn location(&self) -> Location;
    fn set_location(&mut self, location: Location);

    /// Performance rating, 0.0 (incapacitated) to 1.0.
    fn performance_rating(&self) -> f64;
    fn condition(&self) -> &Condition;
    fn condition_mut(&mut self) -> &mut Condition;

    /// Personal liking for an activity, -5 (hates) to +5 (loves).
    fn preference(&self, descriptor: &TaskDescriptor) -> f64;

    fn skills(&self) -> &SkillManager;
    fn skills_mut(&mut self) -> &mut SkillManager;
    fn attributes(&self) -> &NaturalAttributes;

    /// Experience multiplier while a teacher is helping; 1.0 when alone.
    fn teacher_bonus(&self) -> f64 {
        1.0
    }

    fn add_stress(&mut self, amount: f64) {
        let c = self.condition_mut();
        c.stress = (c.stress + amount).clamp(0.0, 100.0);
    }

    fn reduce_energy(&mut self, amount: f64) {
        let c = self.condition_mut();
        c.energy = (c.energy - amount).clamp(0.0, 1.0);
    }

    /// Small recovery applied when an effort task had to give up because
    /// the worker can no longer perform.
    fn recover(&mut self, amount: f64) {
        self.condition_mut().recover(amount);
    }

    /// Settlement the worker is in or next to.
    fn settlement(&self) -> Option<SettlementId> {
        match self.location() {
            Location::Inside(id) | Location::Outside(id) => Some(id),
            Location::InVehicle => None,
        }
    }

    fn is_inside(&self) -> bool {
        matches!(self.location(), Location::Inside(_))
    }

    fn is_outside(&self) -> bool {
        matches!(self.location(), Location::Outside(_))
    }

    fn in_vehicle(&self) -> bool {
        matches!(self.location(), Location::InVehicle)
    }
}

/// Plain-data worker, person or robot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Colonist {
    pub id: WorkerId,
    pub name: String,
    pub kind: WorkerKind,
    pub job: Option<JobType>,
    pub role: Option<RoleType>,
    pub robot_type: Option<RobotType>,
    pub shift: WorkShift,
    pub location: Location,
    pub condition: Condition,
    pub skills: SkillManager,
    pub attributes: NaturalAttributes,
    pub favorite: Option<FavoriteType>,
    /// Explicit per-descriptor-ID likes and dislikes, -5..=5.
    pub preferences: HashMap<String, f64>,
    pub teacher_bonus: f64,
}

impl Colonist {
    /// A person with default condition and no skills.
    pub fn person(id: u32, name: &str, settlement: SettlementId) -> Self {
        Self {
            id: WorkerId(id),
            name: name.to_string(),
            kind: WorkerKind::Person,
            job: None,
            role: None,
            robot_type: None,
            shift: WorkShift::default(),
            location: Location::Inside(settlement),
            condition: Condition::default(),
            skills: SkillManager::default(),
            attributes: NaturalAttributes::default(),
            favorite: None,
            preferences: HashMap::new(),
            teacher_bonus: 1.0,
        }
    }

    /// A robot of the given type; robots are on call around the clock.
    pub fn robot(id: u32, name: &str, settlement: SettlementId, robot_type: RobotType) -> Self {
        Self {
            kind: WorkerKind::Robot,
            robot_type: Some(robot_type),
            shift: WorkShift::OnCall,
            ..Self::person(id, name, settlement)
        }
    }

    pub fn with_job(mut self, job: JobType) -> Self {
        self.job = Some(job);
        self
    }

    pub fn with_favorite(mut self, favorite: FavoriteType) -> Self {
        self.favorite = Some(favorite);
        self
    }

    pub fn with_shift(mut self, shift: WorkShift) -> Self {
        self.shift = shift;
        self
    }
}

impl Worker for Colonist {
    fn id(&self) -> WorkerId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> WorkerKind {
        self.kind
    }

    fn job(&self) -> Option<JobType> {
        self.job
    }

    fn role(&self) -> Option<RoleType> {
        self.role
    }

    fn robot_type(&self) -> Option<RobotType> {
        self.robot_type
    }

    fn shift(&self) -> WorkShift {
        self.shift
    }

    fn location(&self) -> Location {
        self.location
    }

    fn set_location(&mut self, location: Location) {
        self.location = location;
    }

    fn performance_rating(&self) -> f64 {
        match self.kind {
            WorkerKind::Person => self.condition.performance,
            // A flat battery is the robot equivalent of exhaustion
            WorkerKind::Robot => self.condition.performance.min(self.condition.energy * 4.0),
        }
    }

    fn condition(&self) -> &Condition {
        &self.condition
    }

    fn condition_mut(&mut self) -> &mut Condition {
        &mut self.condition
    }

    fn preference(&self, descriptor: &TaskDescriptor) -> f64 {
        let mut score = self
            .preferences
            .iter()
            .find(|(id, _)| id.eq_ignore_ascii_case(descriptor.id()))
            .map(|(_, v)| *v)
            .unwrap_or(0.0);
        if let Some(fav) = self.favorite {
            if descriptor.favorites().contains(&fav) {
                score += 2.0;
            }
        }
        score.clamp(-5.0, 5.0)
    }

    fn skills(&self) -> &SkillManager {
        &self.skills
    }

    fn skills_mut(&mut self) -> &mut SkillManager {
        &mut self.skills
    }

    fn attributes(&self) -> &NaturalAttributes {
        &self.attributes
    }

    fn teacher_bonus(&self) -> f64 {
        self.teacher_bonus
    }

    fn recover(&mut self, amount: f64) {
        let c = &mut self.condition;
        match self.kind {
            WorkerKind::Person => c.recover(amount),
            WorkerKind::Robot => c.energy = (c.energy + amount).clamp(0.0, 1.0),
        }
    }
}
