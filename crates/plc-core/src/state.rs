use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlcState {
    /// Motor running under operator control.
    #[default]
    Normal,
    /// Mechanical stop: speed is cut to zero on the spot.
    EmergencyStop,
    /// Overheated for too long. Power is cut and the motor coasts down; there
    /// is no way back within a run.
    MaintenanceNeeded,
}

impl PlcState {
    pub const fn name(self) -> &'static str {
        match self {
            PlcState::Normal => "Normal",
            PlcState::EmergencyStop => "EmergencyStop",
            PlcState::MaintenanceNeeded => "MaintenanceNeeded",
        }
    }

    /// Stable numeric code for gauges.
    pub const fn code(self) -> u8 {
        match self {
            PlcState::Normal => 0,
            PlcState::EmergencyStop => 1,
            PlcState::MaintenanceNeeded => 2,
        }
    }

    pub const fn is_failure(self) -> bool {
        !matches!(self, PlcState::Normal)
    }
}

impl fmt::Display for PlcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown PLC state name: {0}")]
pub struct UnknownState(pub String);

impl FromStr for PlcState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Normal" => Ok(PlcState::Normal),
            "EmergencyStop" => Ok(PlcState::EmergencyStop),
            "MaintenanceNeeded" => Ok(PlcState::MaintenanceNeeded),
            other => Err(UnknownState(other.to_string())),
        }
    }
}
