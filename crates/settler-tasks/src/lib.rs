//! Task scheduling for settlement agents.
//!
//! This crate decides, once per tick, what each colonist or robot should be
//! doing, and runs that activity until it is done. It holds no engine or
//! renderer state: agents implement [`agent::Worker`], the host owns a
//! [`context::SchedulingContext`], and events leave through an
//! [`event::EventSink`].
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`agent`] | `Worker` trait, worker kinds, jobs, locations, `Colonist` |
//! | [`cache`] | Per-worker scored selection cache with roulette-wheel draw |
//! | [`catalog`] | Built-in descriptors (sleep, meals, leisure, maintenance, EVA, charging) |
//! | [`clock`] | Sol/millisol timestamps and the master clock |
//! | [`config`] | Scheduler tuning, JSON overrides |
//! | [`context`] | Scheduling context: config, clock, lazy registry, settlements |
//! | [`controller`] | Per-worker controller: pending queue, selection, replacement |
//! | [`engine`] | hecs-backed colony loop |
//! | [`error`] | `TaskError` and `Result` |
//! | [`event`] | Task lifecycle events and sinks |
//! | [`history`] | Rolling per-sol activity log |
//! | [`job`] | Scored jobs, settlement tasks and proxies |
//! | [`meta`] | Activity descriptors and the `MetaTask` interface |
//! | [`modifiers`] | Generic score modifiers (job fit, preference, radiation, EVA) |
//! | [`pool`] | Shared demand-limited settlement task pool |
//! | [`registry`] | Descriptor registry with kind and duty partitions |
//! | [`settlement`] | Settlement state: crowding, facilities, preferences |
//! | [`shift`] | Work shifts, sleep windows, daylight and meal times |
//! | [`skills`] | Skill levels, experience, natural attributes |
//! | [`task`] | Hierarchical task state machine and builder |
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use settler_tasks::prelude::*;
//!
//! let mut ctx = SchedulingContext::default();
//! ctx.add_settlement(Settlement::new(SettlementId(1), "Jezero", 8));
//! let mut engine = ColonyEngine::new(ctx, Arc::new(LogSink), 1);
//! engine.spawn_colonist(Colonist::person(1, "Ada", SettlementId(1)));
//!
//! let report = engine.update(5.0);
//! assert_eq!(report.failures, 0);
//! ```

pub mod agent;
pub mod cache;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod context;
pub mod controller;
pub mod engine;
pub mod error;
pub mod event;
pub mod history;
pub mod job;
pub mod meta;
pub mod modifiers;
pub mod pool;
pub mod registry;
pub mod settlement;
pub mod shift;
pub mod skills;
pub mod task;

pub use error::{Result, TaskError};

/// The types most hosts need.
pub mod prelude {
    pub use crate::agent::{Colonist, JobType, Location, RobotType, RoleType, Worker, WorkerId, WorkerKind};
    pub use crate::clock::{MarsClock, MarsTime};
    pub use crate::config::SchedulerConfig;
    pub use crate::context::SchedulingContext;
    pub use crate::controller::{PendingQueue, TaskController};
    pub use crate::engine::{AgentSummary, ColonyEngine, TickReport};
    pub use crate::error::{Result, TaskError};
    pub use crate::event::{EventSink, LogSink, RecordingSink, TaskEvent};
    pub use crate::meta::{MetaTask, TaskDescriptor, TaskScope, WorkerType};
    pub use crate::settlement::{FacilityKind, RadiationStatus, Settlement, SettlementId};
    pub use crate::shift::WorkShift;
    pub use crate::task::{Task, TaskBuilder, TaskPhase};
}
