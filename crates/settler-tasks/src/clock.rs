//! Simulation clock — sols and millisols.
//!
//! One sol is 1000 millisols. All task durations and time budgets are
//! expressed in millisols.

use serde::{Deserialize, Serialize};

/// Millisols in one sol.
pub const MILLISOLS_PER_SOL: f64 = 1000.0;

/// A point in simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MarsTime {
    /// Sol number, starting at 1.
    pub sol: u32,
    /// Time of sol in millisols, 0.0..1000.0.
    pub millisol: f64,
}

impl MarsTime {
    pub fn new(sol: u32, millisol: f64) -> Self {
        Self { sol, millisol }
    }

    /// Return a new time `millisols` later, rolling over sols as needed.
    pub fn add_time(&self, millisols: f64) -> Self {
        let total = self.millisol + millisols.max(0.0);
        let extra_sols = (total / MILLISOLS_PER_SOL).floor();
        Self {
            sol: self.sol + extra_sols as u32,
            millisol: total - extra_sols * MILLISOLS_PER_SOL,
        }
    }

    /// Millisols elapsed since `earlier`. Negative if `earlier` is later.
    pub fn since(&self, earlier: &MarsTime) -> f64 {
        (self.sol as f64 - earlier.sol as f64) * MILLISOLS_PER_SOL + (self.millisol - earlier.millisol)
    }
}

impl std::fmt::Display for MarsTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sol {} {:07.3}", self.sol, self.millisol)
    }
}

/// Master clock advanced once per control-loop tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarsClock {
    now: MarsTime,
    ticks: u64,
}

impl MarsClock {
    pub fn new(start: MarsTime) -> Self {
        Self {
            now: start,
            ticks: 0,
        }
    }

    pub fn now(&self) -> MarsTime {
        self.now
    }

    /// Number of ticks since the clock started.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Advance by one tick of `pulse` millisols. Returns true if a new sol began.
    pub fn advance(&mut self, pulse: f64) -> bool {
        let before = self.now.sol;
        self.now = self.now.add_time(pulse);
        self.ticks += 1;
        self.now.sol != before
    }
}

impl Default for MarsClock {
    fn default() -> Self {
        Self::new(MarsTime::new(1, 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_time_rolls_sol() {
        let t = MarsTime::new(1, 950.0).add_time(100.0);
        assert_eq!(t.sol, 2);
        assert!((t.millisol - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_since() {
        let a = MarsTime::new(1, 900.0);
        let b = MarsTime::new(2, 100.0);
        assert!((b.since(&a) - 200.0).abs() < 1e-9);
        assert!(a.since(&b) < 0.0);
    }

    #[test]
    fn test_clock_reports_new_sol() {
        let mut clock = MarsClock::new(MarsTime::new(1, 990.0));
        assert!(!clock.advance(5.0));
        assert!(clock.advance(10.0));
        assert_eq!(clock.now().sol, 2);
        assert_eq!(clock.ticks(), 2);
    }
}
