//! Rolling per-worker activity log, bucketed by sol.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::clock::MarsTime;

/// One line of a worker's activity history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub time: MarsTime,
    pub task: String,
    pub description: String,
    pub phase: String,
}

/// Activity history kept for a fixed number of sols.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLog {
    max_sols: u32,
    sols: BTreeMap<u32, Vec<ActivityRecord>>,
}

impl ActivityLog {
    pub fn new(max_sols: u32) -> Self {
        Self {
            max_sols: max_sols.max(1),
            sols: BTreeMap::new(),
        }
    }

    /// Append a record. Consecutive duplicates (same task and phase) are
    /// collapsed into the first.
    pub fn add(&mut self, record: ActivityRecord) {
        let bucket = self.sols.entry(record.time.sol).or_default();
        if let Some(last) = bucket.last() {
            if last.task == record.task && last.phase == record.phase {
                return;
            }
        }
        bucket.push(record);
    }

    /// Drop sols that have fallen out of the window ending at `current_sol`.
    pub fn roll(&mut self, current_sol: u32) {
        let oldest_kept = current_sol.saturating_sub(self.max_sols - 1);
        self.sols.retain(|&sol, _| sol >= oldest_kept);
    }

    pub fn records_for(&self, sol: u32) -> &[ActivityRecord] {
        self.sols.get(&sol).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sols that currently have records, oldest first.
    pub fn sols(&self) -> Vec<u32> {
        self.sols.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sols.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<&ActivityRecord> {
        self.sols.values().next_back().and_then(|v| v.last())
    }
}
