use crate::limits::UnitLimits;
use crate::state::PlcState;
use serde::{Deserialize, Serialize};

/// Read-only view of one unit after a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub temperature: i32,
    pub actual_speed: i32,
    pub target_speed: i32,
    pub state: PlcState,
    pub overheat_warning: bool,
}

impl UnitSnapshot {
    pub fn is_alarm(&self, limits: &UnitLimits) -> bool {
        limits.is_alarm(self.state, self.temperature)
    }
}

/// A unit changed state during a tick. `unit` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateChange {
    pub unit: u32,
    pub from: PlcState,
    pub to: PlcState,
    pub temperature: i32,
}
