//! Settlement state the scheduler reads: crowding, radiation, airlocks,
//! facility wear, and per-descriptor preference modifiers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::agent::Worker;
use crate::context::SchedulingContext;
use crate::job::TaskJob;
use crate::pool::SettlementTaskPool;

/// Facility wear gained per millisol of operation.
const WEAR_PER_MILLISOL: f64 = 0.0004;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SettlementId(pub u32);

impl std::fmt::Display for SettlementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// Current radiation exposure outside the habitat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RadiationStatus {
    #[default]
    Clear,
    Baseline,
    /// Galactic cosmic ray event.
    Gcr,
    SolarParticleEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FacilityKind {
    Habitat,
    Kitchen,
    Greenhouse,
    Workshop,
    Airlock,
}

/// A building or module that wears out with use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: u32,
    pub name: String,
    pub kind: FacilityKind,
    /// 0.0 (pristine) to 1.0 (broken down).
    pub wear: f64,
}

pub struct Settlement {
    id: SettlementId,
    name: String,
    capacity: u32,
    pub population: u32,
    pub radiation: RadiationStatus,
    pub usable_airlocks: u32,
    /// Lower-cased descriptor ID → score multiplier.
    preferences: HashMap<String, f64>,
    facilities: RwLock<Vec<Facility>>,
    pool: SettlementTaskPool,
}

impl Settlement {
    pub fn new(id: SettlementId, name: &str, capacity: u32) -> Self {
        Self {
            id,
            name: name.to_string(),
            capacity,
            population: 0,
            radiation: RadiationStatus::Clear,
            usable_airlocks: 1,
            preferences: HashMap::new(),
            facilities: RwLock::new(Vec::new()),
            pool: SettlementTaskPool::new(),
        }
    }

    pub fn id(&self) -> SettlementId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Population over capacity; above 1.0 the habitat is overcrowded.
    pub fn crowding(&self) -> f64 {
        if self.capacity == 0 {
            return 1.0;
        }
        f64::from(self.population) / f64::from(self.capacity)
    }

    /// Configured multiplier for a descriptor ID, 1.0 when unset.
    pub fn preference_modifier(&self, task_id: &str) -> f64 {
        self.preferences
            .get(&task_id.to_ascii_lowercase())
            .copied()
            .unwrap_or(1.0)
    }

    pub fn set_preference(&mut self, task_id: &str, modifier: f64) {
        self.preferences
            .insert(task_id.to_ascii_lowercase(), modifier.max(0.0));
    }

    /// Add a facility and return its ID.
    pub fn add_facility(&mut self, kind: FacilityKind, name: &str) -> u32 {
        let facilities = self.facilities.get_mut();
        let id = facilities.iter().map(|f| f.id).max().map_or(1, |m| m + 1);
        facilities.push(Facility {
            id,
            name: name.to_string(),
            kind,
            wear: 0.0,
        });
        id
    }

    pub fn facilities(&self) -> Vec<Facility> {
        self.facilities.read().clone()
    }

    pub fn facility(&self, id: u32) -> Option<Facility> {
        self.facilities.read().iter().find(|f| f.id == id).cloned()
    }

    pub fn has_facility(&self, kind: FacilityKind) -> bool {
        self.facilities.read().iter().any(|f| f.kind == kind)
    }

    /// Undo `amount` of wear on a facility. Returns false if no such facility.
    pub fn service_facility(&self, id: u32, amount: f64) -> bool {
        let mut facilities = self.facilities.write();
        match facilities.iter_mut().find(|f| f.id == id) {
            Some(f) => {
                f.wear = (f.wear - amount.max(0.0)).clamp(0.0, 1.0);
                true
            }
            None => false,
        }
    }

    /// Age every facility by `millisols` of use.
    pub fn wear_facilities(&self, millisols: f64) {
        for f in self.facilities.write().iter_mut() {
            f.wear = (f.wear + millisols * WEAR_PER_MILLISOL).min(1.0);
        }
    }

    pub fn pool(&self) -> &SettlementTaskPool {
        &self.pool
    }

    /// Shared jobs at this settlement the worker may take.
    pub fn task_jobs_for(&self, worker: &dyn Worker, ctx: &SchedulingContext) -> Vec<Arc<dyn TaskJob>> {
        self.pool.jobs_for(self, worker, ctx)
    }
}

impl std::fmt::Debug for Settlement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settlement")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("population", &self.population)
            .field("capacity", &self.capacity)
            .field("radiation", &self.radiation)
            .field("pooled_jobs", &self.pool.len())
            .finish_non_exhaustive()
    }
}
