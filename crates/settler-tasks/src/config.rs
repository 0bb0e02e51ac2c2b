//! Scheduler tuning — modifier constants, history length, execution limits.
//!
//! Every field has a sensible default so a missing or partial JSON file
//! still yields a working scheduler. Overrides are loaded with
//! [`SchedulerConfig::from_json_str`] or [`SchedulerConfig::from_path`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Tunable constants for task scoring, selection, and execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Multiplier applied when a worker's job is not in a descriptor's preferred set.
    pub job_mismatch_penalty: f64,
    /// Multiplier applied when a person's role is in a descriptor's preferred set.
    pub preferred_role_bonus: f64,
    /// Preference scores are divided by this before being added to 1.0.
    pub preference_divisor: f64,
    /// Number of sols kept in each worker's activity log.
    pub history_sols: u32,
    /// Task name fragments (case-insensitive) that cannot be interrupted
    /// by `check_and_replace_task`.
    pub non_interruptible: Vec<String>,
    /// Residual time below this is snapped to zero.
    pub time_epsilon: f64,
    /// Deepest allowed subtask level below the root task.
    pub max_subtask_depth: u32,
    /// Performance recovered by a person whose rating has hit zero.
    pub person_recovery_nudge: f64,
    /// Battery recovered by a robot whose rating has hit zero.
    pub robot_recovery_nudge: f64,
    /// Millisols of a full sleep.
    pub sleep_duration: f64,
    /// Millisols used by built-in tasks that have no better estimate.
    pub default_task_duration: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            job_mismatch_penalty: 0.25,
            preferred_role_bonus: 1.5,
            preference_divisor: 5.0,
            history_sols: 7,
            non_interruptible: vec!["sleep".into(), "eva".into(), "airlock".into()],
            time_epsilon: 1e-6,
            max_subtask_depth: 3,
            person_recovery_nudge: 0.05,
            robot_recovery_nudge: 0.05,
            sleep_duration: 300.0,
            default_task_duration: 50.0,
        }
    }
}

impl SchedulerConfig {
    /// Parse a config from JSON; missing fields fall back to defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Whether a task with this name or description may not be interrupted.
    pub fn is_non_interruptible(&self, name: &str, description: &str) -> bool {
        let name = name.to_lowercase();
        let description = description.to_lowercase();
        self.non_interruptible.iter().any(|frag| {
            let frag = frag.to_lowercase();
            name.contains(&frag) || description.contains(&frag)
        })
    }
}
