pub mod command;
pub mod entropy;
pub mod fleet;
pub mod limits;
pub mod snapshot;
pub mod state;
pub mod tags;
pub mod timebase;
pub mod unit;
mod unit_proptest;

pub use command::{CommandSlot, PendingCommands};
pub use entropy::{Entropy, ScriptedEntropy, SeededEntropy};
pub use fleet::{
    CommandAction, ExecutionStats, Fleet, FleetConfig, FleetError, FleetObserver, FleetRunner,
    OperatorCommand,
};
pub use limits::{
    Setpoint, SetpointError, UnitLimits, Unvalidated, Validated, AMBIENT_TEMPERATURE,
    MAX_SPEED_RPM, TEMPERATURE_LIMIT,
};
pub use snapshot::{StateChange, UnitSnapshot};
pub use state::{PlcState, UnknownState};
pub use timebase::TickClock;
pub use unit::{ThermalProfile, Unit, UnstartedUnit};
