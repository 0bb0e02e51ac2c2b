//! Descriptor registry — the full catalog and its precomputed partitions.
//!
//! Built once (see [`SchedulingContext::registry`](crate::context::SchedulingContext::registry))
//! and read-only afterwards, so lookups need no locking.

use std::sync::Arc;

use crate::agent::WorkerKind;
use crate::meta::MetaTask;

/// All registered descriptors, partitioned by worker kind and duty scope.
pub struct MetaTaskRegistry {
    all: Vec<Arc<dyn MetaTask>>,
    person: Vec<Arc<dyn MetaTask>>,
    robot: Vec<Arc<dyn MetaTask>>,
    duty: Vec<Arc<dyn MetaTask>>,
    non_duty: Vec<Arc<dyn MetaTask>>,
    settlement_providers: Vec<Arc<dyn MetaTask>>,
}

impl MetaTaskRegistry {
    /// Build the registry. A descriptor whose ID is already registered
    /// (case-insensitive) is skipped with a warning.
    pub fn new(tasks: Vec<Arc<dyn MetaTask>>) -> Self {
        let mut all: Vec<Arc<dyn MetaTask>> = Vec::with_capacity(tasks.len());
        for task in tasks {
            let id = task.descriptor().id();
            if all.iter().any(|t| t.descriptor().id().eq_ignore_ascii_case(id)) {
                log::warn!("Duplicate task id '{}' ignored", id);
                continue;
            }
            all.push(task);
        }

        let filter = |pred: &dyn Fn(&Arc<dyn MetaTask>) -> bool| -> Vec<Arc<dyn MetaTask>> {
            all.iter().filter(|t| pred(t)).cloned().collect()
        };

        let person = filter(&|t| t.descriptor().worker_type().supports(WorkerKind::Person));
        let robot = filter(&|t| t.descriptor().worker_type().supports(WorkerKind::Robot));
        let duty = filter(&|t| t.descriptor().scope().on_duty());
        let non_duty = filter(&|t| t.descriptor().scope().off_duty());
        let settlement_providers = filter(&|t| t.is_settlement_provider());

        log::info!(
            "Task registry built: {} tasks ({} person, {} robot, {} settlement providers)",
            all.len(),
            person.len(),
            robot.len(),
            settlement_providers.len()
        );

        Self {
            all,
            person,
            robot,
            duty,
            non_duty,
            settlement_providers,
        }
    }

    pub fn all(&self) -> &[Arc<dyn MetaTask>] {
        &self.all
    }

    pub fn person_tasks(&self) -> &[Arc<dyn MetaTask>] {
        &self.person
    }

    pub fn robot_tasks(&self) -> &[Arc<dyn MetaTask>] {
        &self.robot
    }

    /// Any-hour plus work-hour descriptors.
    pub fn duty_tasks(&self) -> &[Arc<dyn MetaTask>] {
        &self.duty
    }

    /// Any-hour plus non-work-hour descriptors.
    pub fn non_duty_tasks(&self) -> &[Arc<dyn MetaTask>] {
        &self.non_duty
    }

    pub fn settlement_providers(&self) -> &[Arc<dyn MetaTask>] {
        &self.settlement_providers
    }

    /// Descriptors for the worker kind in the given duty partition.
    pub fn tasks_for(&self, kind: WorkerKind, on_duty: bool) -> impl Iterator<Item = &Arc<dyn MetaTask>> {
        let partition = if on_duty { &self.duty } else { &self.non_duty };
        partition
            .iter()
            .filter(move |t| t.descriptor().worker_type().supports(kind))
    }

    /// Case-insensitive lookup by stable ID.
    pub fn lookup_by_id(&self, id: &str) -> Option<Arc<dyn MetaTask>> {
        self.all
            .iter()
            .find(|t| t.descriptor().id().eq_ignore_ascii_case(id))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}
