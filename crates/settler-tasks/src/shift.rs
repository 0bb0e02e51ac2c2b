//! Work shift scheduling — which part of the sol a worker is on duty.
//!
//! The duty scope of a descriptor is matched against this: work-hour
//! activities are only offered while on shift, non-work-hour ones only
//! while off shift.

use serde::{Deserialize, Serialize};

/// Shift rota. Three 8-hour-equivalent shifts cover the sol; `OnCall`
/// workers are treated as always on duty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WorkShift {
    /// 0 – 333 millisols
    X,
    /// 333 – 666 millisols
    #[default]
    Y,
    /// 666 – 1000 millisols
    Z,
    OnCall,
}

impl WorkShift {
    /// Check whether the shift covers this time of sol.
    pub fn is_on_duty(self, millisol: f64) -> bool {
        let m = millisol.rem_euclid(1000.0);
        match self {
            WorkShift::X => (0.0..333.0).contains(&m),
            WorkShift::Y => (333.0..666.0).contains(&m),
            WorkShift::Z => (666.0..1000.0).contains(&m),
            WorkShift::OnCall => true,
        }
    }

    /// Sleep window (start, end) in millisols, furthest from the shift.
    pub fn sleep_window(self) -> (f64, f64) {
        match self {
            WorkShift::X => (500.0, 833.0),
            WorkShift::Y => (833.0, 166.0),
            WorkShift::Z => (166.0, 500.0),
            WorkShift::OnCall => (900.0, 250.0),
        }
    }

    /// Check whether it's sleep time for this shift.
    pub fn is_sleep_time(self, millisol: f64) -> bool {
        let (start, end) = self.sleep_window();
        let m = millisol.rem_euclid(1000.0);
        if start < end {
            (start..end).contains(&m)
        } else {
            // Wraps midnight
            !(end..start).contains(&m)
        }
    }
}

/// Night on the surface: EVA is not allowed without light.
pub fn is_dark(millisol: f64) -> bool {
    let m = millisol.rem_euclid(1000.0);
    !(250.0..750.0).contains(&m)
}

/// Meal windows, when a hungry worker should not start an EVA.
pub fn is_meal_time(millisol: f64) -> bool {
    let m = millisol.rem_euclid(1000.0);
    (250.0..300.0).contains(&m) || (500.0..550.0).contains(&m) || (750.0..800.0).contains(&m)
}
