//! The scheduling context threaded through every scheduler call.
//!
//! Holds what would otherwise be global: configuration, the master clock,
//! the lazily built descriptor registry, and the settlements.

use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::catalog;
use crate::clock::{MarsClock, MarsTime};
use crate::config::SchedulerConfig;
use crate::meta::MetaTask;
use crate::registry::MetaTaskRegistry;
use crate::settlement::{Settlement, SettlementId};

type CatalogFn = dyn Fn() -> Vec<Arc<dyn MetaTask>> + Send + Sync;

pub struct SchedulingContext {
    config: SchedulerConfig,
    clock: MarsClock,
    catalog: Box<CatalogFn>,
    registry: OnceCell<MetaTaskRegistry>,
    shelter: Arc<dyn MetaTask>,
    settlements: BTreeMap<SettlementId, Settlement>,
}

impl SchedulingContext {
    /// Context using the built-in catalog.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            clock: MarsClock::default(),
            catalog: Box::new(catalog::standard_catalog),
            registry: OnceCell::new(),
            shelter: catalog::shelter_task(),
            settlements: BTreeMap::new(),
        }
    }

    /// Replace the descriptor catalog. Any registry already built from the
    /// previous catalog is discarded.
    pub fn with_catalog<F>(mut self, catalog: F) -> Self
    where
        F: Fn() -> Vec<Arc<dyn MetaTask>> + Send + Sync + 'static,
    {
        self.catalog = Box::new(catalog);
        self.registry = OnceCell::new();
        self
    }

    pub fn with_clock(mut self, clock: MarsClock) -> Self {
        self.clock = clock;
        self
    }

    /// The descriptor registry, built on first use. Concurrent first
    /// callers block until the single build finishes.
    pub fn registry(&self) -> &MetaTaskRegistry {
        self.registry
            .get_or_init(|| MetaTaskRegistry::new((self.catalog)()))
    }

    /// Build the registry now rather than on the first scheduling call.
    pub fn initialize(&self) -> &MetaTaskRegistry {
        self.registry()
    }

    pub fn is_initialized(&self) -> bool {
        self.registry.get().is_some()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn clock(&self) -> &MarsClock {
        &self.clock
    }

    pub fn now(&self) -> MarsTime {
        self.clock.now()
    }

    /// Advance the clock; true if a new sol began.
    pub fn advance(&mut self, pulse: f64) -> bool {
        self.clock.advance(pulse)
    }

    pub fn add_settlement(&mut self, settlement: Settlement) {
        self.settlements.insert(settlement.id(), settlement);
    }

    pub fn settlement(&self, id: SettlementId) -> Option<&Settlement> {
        self.settlements.get(&id)
    }

    pub fn settlement_mut(&mut self, id: SettlementId) -> Option<&mut Settlement> {
        self.settlements.get_mut(&id)
    }

    pub fn settlements(&self) -> impl Iterator<Item = &Settlement> {
        self.settlements.values()
    }

    /// Clear every settlement pool so the next query rebuilds it.
    pub fn invalidate_pools(&self) {
        for settlement in self.settlements.values() {
            settlement.pool().invalidate();
        }
    }

    /// Synthetic descriptor used when a worker outside has nothing to do.
    pub fn shelter_task(&self) -> &Arc<dyn MetaTask> {
        &self.shelter
    }
}

impl Default for SchedulingContext {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl std::fmt::Debug for SchedulingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulingContext")
            .field("now", &self.clock.now())
            .field("initialized", &self.is_initialized())
            .field("settlements", &self.settlements.len())
            .finish_non_exhaustive()
    }
}
