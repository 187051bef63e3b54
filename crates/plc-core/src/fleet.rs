use crate::entropy::{Entropy, SeededEntropy};
use crate::limits::{Setpoint, UnitLimits};
use crate::snapshot::{StateChange, UnitSnapshot};
use crate::state::PlcState;
use crate::timebase::TickClock;
use crate::unit::{Unit, UnstartedUnit};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant, SystemTime};

#[derive(Clone, Debug)]
pub struct FleetConfig {
    pub unit_count: u32,
    pub tick_interval: Duration,
    pub snapshot_interval: Duration,
    /// Base seed; unit `n` draws from stream `n` under it.
    pub seed: u64,
    pub limits: UnitLimits,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            unit_count: 1,
            tick_interval: Duration::from_millis(100),
            snapshot_interval: Duration::from_secs(1),
            seed: 0,
            limits: UnitLimits::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandAction {
    EmergencyStop,
    Start,
    SetTargetSpeed { rpm: i32 },
}

/// An operator action addressed to one unit. `unit` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorCommand {
    pub unit: u32,
    #[serde(flatten)]
    pub action: CommandAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FleetError {
    #[error("unknown unit {unit}, fleet has {count} units")]
    UnknownUnit { unit: u32, count: u32 },
}

#[derive(Clone, Default, Debug)]
pub struct ExecutionStats {
    pub ticks_executed: u64,
    pub ticks_missed: u64,
    pub max_lateness_us: u64,
    pub commands_applied: u64,
    pub commands_rejected: u64,
    pub state_changes: u64,
    pub snapshots_emitted: u64,
}

/// Receives everything the runner produces. All methods run on the control
/// thread, so implementations must not block for long.
pub trait FleetObserver: Send {
    fn on_tick(&mut self, _stats: &ExecutionStats, _units: &[UnitSnapshot]) {}

    fn on_snapshot(&mut self, _taken_at: SystemTime, _units: &[UnitSnapshot]) {}

    fn on_transition(&mut self, _change: &StateChange) {}

    fn on_command(&mut self, _command: &OperatorCommand, _outcome: Result<(), FleetError>) {}
}

/// Independent units addressed by 1-based index.
pub struct Fleet<E: Entropy = SeededEntropy> {
    units: Vec<Unit<E>>,
    limits: UnitLimits,
}

impl Fleet<SeededEntropy> {
    pub fn new(config: &FleetConfig) -> Self {
        let units = (1..=config.unit_count)
            .map(|index| {
                let entropy = SeededEntropy::for_unit(config.seed, u64::from(index));
                UnstartedUnit::new(config.limits.clone(), entropy).start()
            })
            .collect();
        Self::from_units(units, config.limits.clone())
    }
}

impl<E: Entropy> Fleet<E> {
    pub fn from_units(units: Vec<Unit<E>>, limits: UnitLimits) -> Self {
        Self { units, limits }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn unit(&self, index: u32) -> Option<&Unit<E>> {
        let slot = usize::try_from(index).ok()?.checked_sub(1)?;
        self.units.get(slot)
    }

    fn unit_mut(&mut self, index: u32) -> Result<&mut Unit<E>, FleetError> {
        let count = self.units.len() as u32;
        usize::try_from(index)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|slot| self.units.get_mut(slot))
            .ok_or(FleetError::UnknownUnit { unit: index, count })
    }

    pub fn apply(&mut self, command: OperatorCommand) -> Result<(), FleetError> {
        let limits = self.limits.clone();
        let unit = self.unit_mut(command.unit)?;
        match command.action {
            CommandAction::EmergencyStop => unit.request_emergency_stop(),
            CommandAction::Start => unit.request_start(),
            CommandAction::SetTargetSpeed { rpm } => {
                unit.set_target_speed(Setpoint::new(rpm).clamp(&limits))
            }
        }
        Ok(())
    }

    /// Advance every unit by `dt` and report the state changes that happened.
    ///
    /// An emergency stop lifted by a start in the same tick is reported as
    /// two changes, Normal to EmergencyStop and back.
    pub fn tick(&mut self, dt: Duration) -> Vec<StateChange> {
        let mut changes = Vec::new();
        for (slot, unit) in self.units.iter_mut().enumerate() {
            let index = slot as u32 + 1;
            let mut from = unit.state();
            let stop_applies = from == PlcState::Normal && unit.pending_commands().emergency_stop;
            unit.update(dt);

            let temperature = unit.temperature();
            if stop_applies {
                changes.push(StateChange {
                    unit: index,
                    from,
                    to: PlcState::EmergencyStop,
                    temperature,
                });
                from = PlcState::EmergencyStop;
            }
            if unit.state() != from {
                changes.push(StateChange {
                    unit: index,
                    from,
                    to: unit.state(),
                    temperature,
                });
            }
        }
        changes
    }

    pub fn snapshots(&self) -> Vec<UnitSnapshot> {
        self.units.iter().map(Unit::snapshot).collect()
    }
}

/// Drives a fleet at a fixed cadence on the calling thread.
pub struct FleetRunner<E: Entropy = SeededEntropy> {
    fleet: Fleet<E>,
    config: FleetConfig,
    commands: Receiver<OperatorCommand>,
    observers: Vec<Box<dyn FleetObserver>>,
    stats: ExecutionStats,
    clock: TickClock,
    since_snapshot: Duration,
}

impl<E: Entropy> FleetRunner<E> {
    pub fn new(fleet: Fleet<E>, config: FleetConfig, commands: Receiver<OperatorCommand>) -> Self {
        Self {
            fleet,
            config,
            commands,
            observers: Vec::new(),
            stats: ExecutionStats::default(),
            clock: TickClock::new(),
            since_snapshot: Duration::ZERO,
        }
    }

    pub fn observe(&mut self, observer: Box<dyn FleetObserver>) {
        self.observers.push(observer);
    }

    pub fn run(&mut self, stop: &AtomicBool) {
        let interval = self.config.tick_interval;
        let mut next_cycle = Instant::now() + interval;
        self.clock.lap();

        while !stop.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now < next_cycle {
                std::thread::sleep(next_cycle - now);
            } else {
                let lateness = now.duration_since(next_cycle);
                self.stats.ticks_missed += 1;
                self.stats.max_lateness_us =
                    self.stats.max_lateness_us.max(lateness.as_micros() as u64);
                if lateness > interval {
                    // Too far behind to catch up tick by tick; the real dt covers the gap.
                    next_cycle = now;
                }
            }

            let dt = self.clock.lap();
            self.step(dt);
            next_cycle += interval;
        }
    }

    /// One cycle: apply queued commands, tick the fleet, notify observers.
    pub fn step(&mut self, dt: Duration) {
        self.drain_commands();

        let changes = self.fleet.tick(dt);
        self.stats.ticks_executed += 1;
        self.stats.state_changes += changes.len() as u64;
        for change in &changes {
            for observer in &mut self.observers {
                observer.on_transition(change);
            }
        }

        let snapshots = self.fleet.snapshots();
        for observer in &mut self.observers {
            observer.on_tick(&self.stats, &snapshots);
        }

        self.since_snapshot += dt;
        if self.since_snapshot >= self.config.snapshot_interval {
            self.since_snapshot = Duration::ZERO;
            self.stats.snapshots_emitted += 1;
            let taken_at = self.clock.wall();
            for observer in &mut self.observers {
                observer.on_snapshot(taken_at, &snapshots);
            }
        }
    }

    fn drain_commands(&mut self) {
        loop {
            let command = match self.commands.try_recv() {
                Ok(command) => command,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            };
            let outcome = self.fleet.apply(command);
            match outcome {
                Ok(()) => self.stats.commands_applied += 1,
                Err(_) => self.stats.commands_rejected += 1,
            }
            for observer in &mut self.observers {
                observer.on_command(&command, outcome);
            }
        }
    }

    pub fn fleet(&self) -> &Fleet<E> {
        &self.fleet
    }

    pub fn stats(&self) -> &ExecutionStats {
        &self.stats
    }

    pub fn uptime(&self) -> Duration {
        self.clock.uptime()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};

    const TICK: Duration = Duration::from_millis(100);

    #[derive(Default)]
    struct Recorded {
        ticks: u64,
        snapshots: Vec<Vec<UnitSnapshot>>,
        changes: Vec<StateChange>,
        rejected: Vec<OperatorCommand>,
    }

    struct Recorder(Arc<Mutex<Recorded>>);

    impl FleetObserver for Recorder {
        fn on_tick(&mut self, _stats: &ExecutionStats, _units: &[UnitSnapshot]) {
            self.0.lock().unwrap().ticks += 1;
        }

        fn on_snapshot(&mut self, _taken_at: SystemTime, units: &[UnitSnapshot]) {
            self.0.lock().unwrap().snapshots.push(units.to_vec());
        }

        fn on_transition(&mut self, change: &StateChange) {
            self.0.lock().unwrap().changes.push(*change);
        }

        fn on_command(&mut self, command: &OperatorCommand, outcome: Result<(), FleetError>) {
            if outcome.is_err() {
                self.0.lock().unwrap().rejected.push(*command);
            }
        }
    }

    fn config(units: u32) -> FleetConfig {
        FleetConfig {
            unit_count: units,
            seed: 42,
            ..FleetConfig::default()
        }
    }

    #[test]
    fn units_are_one_based() {
        let mut fleet = Fleet::new(&config(3));
        assert_eq!(fleet.len(), 3);
        assert!(fleet.unit(0).is_none());
        assert!(fleet.unit(3).is_some());
        assert!(fleet.unit(4).is_none());
        assert_eq!(
            fleet.apply(OperatorCommand {
                unit: 4,
                action: CommandAction::Start
            }),
            Err(FleetError::UnknownUnit { unit: 4, count: 3 })
        );
        assert!(fleet
            .apply(OperatorCommand {
                unit: 0,
                action: CommandAction::Start
            })
            .is_err());
    }

    #[test]
    fn target_speed_is_clamped() {
        let mut fleet = Fleet::new(&config(1));
        fleet
            .apply(OperatorCommand {
                unit: 1,
                action: CommandAction::SetTargetSpeed { rpm: 5000 },
            })
            .unwrap();
        assert_eq!(fleet.unit(1).unwrap().target_speed(), 2000);
        fleet
            .apply(OperatorCommand {
                unit: 1,
                action: CommandAction::SetTargetSpeed { rpm: -10 },
            })
            .unwrap();
        assert_eq!(fleet.unit(1).unwrap().target_speed(), 0);
    }

    #[test]
    fn units_draw_distinct_profiles() {
        let fleet = Fleet::new(&config(8));
        let profiles: Vec<_> = (1..=8).map(|i| fleet.unit(i).unwrap().profile()).collect();
        assert!(profiles.windows(2).any(|w| w[0] != w[1]));

        let again = Fleet::new(&config(8));
        for i in 1..=8 {
            assert_eq!(again.unit(i).unwrap().profile(), profiles[i as usize - 1]);
        }
    }

    #[test]
    fn tick_reports_transitions() {
        let mut fleet = Fleet::new(&config(2));
        fleet
            .apply(OperatorCommand {
                unit: 2,
                action: CommandAction::EmergencyStop,
            })
            .unwrap();
        let changes = fleet.tick(TICK);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].unit, 2);
        assert_eq!(changes[0].from, PlcState::Normal);
        assert_eq!(changes[0].to, PlcState::EmergencyStop);
        assert!(fleet.tick(TICK).is_empty());
    }

    #[test]
    fn stop_lifted_in_same_tick_reports_both_changes() {
        let mut fleet = Fleet::new(&config(1));
        fleet
            .apply(OperatorCommand {
                unit: 1,
                action: CommandAction::SetTargetSpeed { rpm: 300 },
            })
            .unwrap();
        for _ in 0..10 {
            fleet.tick(TICK);
        }
        let speed = fleet.unit(1).unwrap().actual_speed();
        assert_eq!(speed, 100);

        for action in [CommandAction::EmergencyStop, CommandAction::Start] {
            fleet.apply(OperatorCommand { unit: 1, action }).unwrap();
        }
        let changes = fleet.tick(TICK);

        let path: Vec<_> = changes.iter().map(|c| (c.from, c.to)).collect();
        assert_eq!(
            path,
            vec![
                (PlcState::Normal, PlcState::EmergencyStop),
                (PlcState::EmergencyStop, PlcState::Normal),
            ]
        );
        let unit = fleet.unit(1).unwrap();
        assert_eq!(unit.state(), PlcState::Normal);
        assert_eq!(unit.target_speed(), 0);
        assert_eq!(unit.actual_speed(), speed - 10);
    }

    #[test]
    fn runner_emits_snapshots_on_interval() {
        let (tx, rx) = mpsc::channel();
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let mut runner = FleetRunner::new(Fleet::new(&config(2)), config(2), rx);
        runner.observe(Box::new(Recorder(Arc::clone(&recorded))));

        tx.send(OperatorCommand {
            unit: 1,
            action: CommandAction::EmergencyStop,
        })
        .unwrap();
        tx.send(OperatorCommand {
            unit: 9,
            action: CommandAction::Start,
        })
        .unwrap();

        for _ in 0..25 {
            runner.step(TICK);
        }

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.ticks, 25);
        assert_eq!(recorded.snapshots.len(), 2);
        assert_eq!(recorded.snapshots[0].len(), 2);
        assert_eq!(recorded.snapshots[0][0].state, PlcState::EmergencyStop);
        assert_eq!(recorded.changes.len(), 1);
        assert_eq!(recorded.rejected.len(), 1);
        assert_eq!(runner.stats().commands_applied, 1);
        assert_eq!(runner.stats().commands_rejected, 1);
        assert_eq!(runner.stats().snapshots_emitted, 2);
    }

    #[test]
    fn run_stops_on_flag() {
        let (_tx, rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let cfg = FleetConfig {
            tick_interval: Duration::from_millis(5),
            ..config(1)
        };
        let stop_runner = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            let mut runner = FleetRunner::new(Fleet::new(&cfg), cfg, rx);
            runner.run(&stop_runner);
            runner.stats().clone()
        });
        std::thread::sleep(Duration::from_millis(60));
        stop.store(true, Ordering::Relaxed);
        let stats = handle.join().unwrap();
        assert!(stats.ticks_executed > 0);
    }
}
