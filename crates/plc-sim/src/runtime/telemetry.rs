use plc_core::{
    ExecutionStats, FleetError, FleetObserver, OperatorCommand, StateChange, UnitSnapshot,
};
use plc_io::metrics::{COMMANDS_REJECTED, STATE_CHANGES, TICKS_EXECUTED, TICKS_MISSED};
use plc_io::{init_metrics, record_units, serve_metrics};
use std::thread;
use tracing::info;

pub fn init() {
    init_metrics();
}

pub fn start_metrics_server(addr: &Option<String>) -> Option<thread::JoinHandle<()>> {
    addr.as_ref().map(|addr| {
        info!(addr = %addr, "Starting metrics server");
        serve_metrics(addr.clone())
    })
}

/// Mirrors runner statistics and unit state into the Prometheus registry.
#[derive(Default)]
pub struct MetricsObserver {
    last_ticks: u64,
    last_missed: u64,
}

impl FleetObserver for MetricsObserver {
    fn on_tick(&mut self, stats: &ExecutionStats, units: &[UnitSnapshot]) {
        record_units(units);
        TICKS_EXECUTED.inc_by(stats.ticks_executed.saturating_sub(self.last_ticks));
        TICKS_MISSED.inc_by(stats.ticks_missed.saturating_sub(self.last_missed));
        self.last_ticks = stats.ticks_executed;
        self.last_missed = stats.ticks_missed;
    }

    fn on_transition(&mut self, change: &StateChange) {
        STATE_CHANGES
            .with_label_values(&[change.unit.to_string().as_str(), change.to.name()])
            .inc();
    }

    fn on_command(&mut self, _command: &OperatorCommand, outcome: Result<(), FleetError>) {
        if outcome.is_err() {
            COMMANDS_REJECTED.inc();
        }
    }
}
