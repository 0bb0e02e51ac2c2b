//! Skill levels, experience gain, and natural attributes.
//!
//! Each skill has an integer level and an experience pool. Performing a
//! task adds experience to every skill the task is associated with; once
//! the pool reaches the threshold for the next level the skill levels up
//! and the remainder carries over.
//!
//! ```
//! use settler_tasks::skills::{SkillManager, SkillType};
//!
//! let mut skills = SkillManager::default();
//! skills.add_experience(SkillType::Mechanics, 30.0);
//! assert_eq!(skills.level(SkillType::Mechanics), 1);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Skill categories a worker can train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SkillType {
    Mechanics,
    Cooking,
    EvaOperations,
    Areology,
    Botany,
    Medicine,
    Psychology,
}

impl SkillType {
    /// All skill types in order.
    pub const ALL: [SkillType; 7] = [
        SkillType::Mechanics,
        SkillType::Cooking,
        SkillType::EvaOperations,
        SkillType::Areology,
        SkillType::Botany,
        SkillType::Medicine,
        SkillType::Psychology,
    ];
}

/// Experience needed to advance from `level` to `level + 1`.
pub fn experience_for_next_level(level: u32) -> f64 {
    25.0 * 2f64.powi(level.min(30) as i32)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
struct Skill {
    level: u32,
    experience: f64,
}

/// Per-worker skill levels and accumulated experience.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillManager {
    skills: BTreeMap<SkillType, Skill>,
}

impl SkillManager {
    /// Create a manager with the given starting levels.
    pub fn with_levels(levels: &[(SkillType, u32)]) -> Self {
        let skills = levels
            .iter()
            .map(|&(t, level)| {
                (
                    t,
                    Skill {
                        level,
                        experience: 0.0,
                    },
                )
            })
            .collect();
        Self { skills }
    }

    /// Current level of a skill; untrained skills are level 0.
    pub fn level(&self, skill: SkillType) -> u32 {
        self.skills.get(&skill).map(|s| s.level).unwrap_or(0)
    }

    /// Experience banked toward the next level.
    pub fn experience(&self, skill: SkillType) -> f64 {
        self.skills.get(&skill).map(|s| s.experience).unwrap_or(0.0)
    }

    /// Average level across a set of skills, 0 for an empty set.
    pub fn average_level(&self, skills: &[SkillType]) -> f64 {
        if skills.is_empty() {
            return 0.0;
        }
        let total: u32 = skills.iter().map(|&s| self.level(s)).sum();
        total as f64 / skills.len() as f64
    }

    /// Add experience points, levelling up as thresholds are crossed.
    /// Non-positive or non-finite amounts are ignored.
    pub fn add_experience(&mut self, skill: SkillType, points: f64) {
        if !points.is_finite() || points <= 0.0 {
            return;
        }
        let entry = self.skills.entry(skill).or_default();
        entry.experience += points;
        loop {
            let needed = experience_for_next_level(entry.level);
            if entry.experience < needed {
                break;
            }
            entry.experience -= needed;
            entry.level += 1;
        }
    }
}

/// Innate attributes, 0–100, that scale how a worker learns and copes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NaturalAttributes {
    pub experience_aptitude: f64,
    pub stress_resilience: f64,
    pub endurance: f64,
}

impl Default for NaturalAttributes {
    fn default() -> Self {
        Self {
            experience_aptitude: 50.0,
            stress_resilience: 50.0,
            endurance: 50.0,
        }
    }
}

impl NaturalAttributes {
    /// Generate random attributes around the average.
    pub fn random(rng: &mut impl rand::Rng) -> Self {
        Self {
            experience_aptitude: rng.gen_range(20.0..=80.0),
            stress_resilience: rng.gen_range(20.0..=80.0),
            endurance: rng.gen_range(20.0..=80.0),
        }
    }

    /// Experience multiplier: aptitude 50 is neutral, 100 doubles gain
    /// relative to 0.
    pub fn experience_multiplier(&self) -> f64 {
        1.0 + (self.experience_aptitude - 50.0) / 100.0
    }
}
