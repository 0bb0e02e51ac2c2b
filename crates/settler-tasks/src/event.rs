//! Task lifecycle notifications.
//!
//! The scheduler publishes through [`EventSink`]; what the sink does with
//! the events (log them, feed a UI, count them in tests) is up to the host.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::agent::WorkerId;
use crate::clock::MarsTime;

/// Something that happened to a worker's task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskEvent {
    Started {
        worker: WorkerId,
        task: String,
        description: String,
        time: MarsTime,
    },
    Ended {
        worker: WorkerId,
        task: String,
        description: String,
        level: u32,
        time: MarsTime,
    },
    PhaseChanged {
        worker: WorkerId,
        task: String,
        phase: String,
        time: MarsTime,
    },
    SubTaskAdded {
        worker: WorkerId,
        parent: String,
        task: String,
        level: u32,
        time: MarsTime,
    },
    /// An unfinished task was cut short by a new one.
    Replaced {
        worker: WorkerId,
        old: String,
        new: String,
        time: MarsTime,
    },
}

impl TaskEvent {
    pub fn worker(&self) -> WorkerId {
        match self {
            TaskEvent::Started { worker, .. }
            | TaskEvent::Ended { worker, .. }
            | TaskEvent::PhaseChanged { worker, .. }
            | TaskEvent::SubTaskAdded { worker, .. }
            | TaskEvent::Replaced { worker, .. } => *worker,
        }
    }
}

/// Receiver for task events.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: TaskEvent);
}

/// Writes every event through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn publish(&self, event: TaskEvent) {
        match &event {
            TaskEvent::Started { worker, task, description, time } => {
                log::info!("[{}] {} started {} ({})", time, worker, task, description)
            }
            TaskEvent::Ended { worker, task, level, time, .. } => {
                log::info!("[{}] {} ended {} (level {})", time, worker, task, level)
            }
            TaskEvent::PhaseChanged { worker, task, phase, time } => {
                log::debug!("[{}] {} {} -> {}", time, worker, task, phase)
            }
            TaskEvent::SubTaskAdded { worker, parent, task, level, time } => {
                log::debug!("[{}] {} {} added subtask {} (level {})", time, worker, parent, task, level)
            }
            TaskEvent::Replaced { worker, old, new, time } => {
                log::info!("[{}] {} dropped {} for {}", time, worker, old, new)
            }
        }
    }
}

/// Keeps every event in memory, for tests and the simtest harness.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TaskEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TaskEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&TaskEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: TaskEvent) {
        self.events.lock().push(event);
    }
}
