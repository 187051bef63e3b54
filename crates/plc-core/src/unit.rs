//! Single motor controller: thermal drift, speed ramping and the
//! Normal / EmergencyStop / MaintenanceNeeded state machine.
//!
//! A unit is created as an [`UnstartedUnit`] and becomes a runnable [`Unit`]
//! once its thermal profile has been drawn, so ticking a unit that was never
//! started cannot be expressed.

use crate::command::{CommandSlot, PendingCommands};
use crate::entropy::{Entropy, SeededEntropy};
use crate::limits::{Setpoint, UnitLimits, Validated};
use crate::snapshot::UnitSnapshot;
use crate::state::PlcState;
use log::{debug, info, warn};
use std::time::Duration;

/// Per-unit thermal character, drawn once at start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThermalProfile {
    /// At or above this speed the motor heats regardless of temperature.
    pub heating_threshold_rpm: i32,
    /// Temperature the running motor settles around below the threshold.
    pub operating_temperature: i32,
}

impl ThermalProfile {
    pub fn draw<E: Entropy>(limits: &UnitLimits, entropy: &mut E) -> Self {
        let heating_threshold_rpm = entropy.roll(
            limits.heating_threshold_rpm.start,
            limits.heating_threshold_rpm.end,
        );
        let operating_temperature = entropy.roll(
            limits.operating_temperature.start,
            limits.operating_temperature.end,
        );
        Self {
            heating_threshold_rpm,
            operating_temperature,
        }
    }
}

#[derive(Debug)]
pub struct UnstartedUnit<E: Entropy = SeededEntropy> {
    limits: UnitLimits,
    entropy: E,
}

impl<E: Entropy> UnstartedUnit<E> {
    pub fn new(limits: UnitLimits, entropy: E) -> Self {
        Self { limits, entropy }
    }

    /// Draw the thermal profile and hand back a runnable unit.
    pub fn start(mut self) -> Unit<E> {
        let profile = ThermalProfile::draw(&self.limits, &mut self.entropy);
        debug!(
            "unit started: heating threshold {} RPM, operating temperature {}",
            profile.heating_threshold_rpm, profile.operating_temperature
        );
        self.start_with_profile(profile)
    }

    /// Start with a known profile instead of drawing one.
    pub fn start_with_profile(self, profile: ThermalProfile) -> Unit<E> {
        Unit {
            temperature: self.limits.ambient_temperature,
            actual_speed: 0,
            target_speed: 0,
            state: PlcState::Normal,
            commands: CommandSlot::default(),
            time_above_limit: Duration::ZERO,
            profile,
            limits: self.limits,
            entropy: self.entropy,
        }
    }
}

#[derive(Debug)]
pub struct Unit<E: Entropy = SeededEntropy> {
    temperature: i32,
    actual_speed: i32,
    target_speed: i32,
    state: PlcState,
    commands: CommandSlot,
    time_above_limit: Duration,
    profile: ThermalProfile,
    limits: UnitLimits,
    entropy: E,
}

impl<E: Entropy> Unit<E> {
    pub fn temperature(&self) -> i32 {
        self.temperature
    }

    pub fn actual_speed(&self) -> i32 {
        self.actual_speed
    }

    pub fn target_speed(&self) -> i32 {
        self.target_speed
    }

    pub fn state(&self) -> PlcState {
        self.state
    }

    pub fn time_above_limit(&self) -> Duration {
        self.time_above_limit
    }

    pub fn profile(&self) -> ThermalProfile {
        self.profile
    }

    /// Requests not yet seen by a tick.
    pub fn pending_commands(&self) -> PendingCommands {
        self.commands.peek()
    }

    pub fn is_overheat_warning(&self) -> bool {
        self.state == PlcState::Normal && self.temperature > self.limits.temperature_limit
    }

    pub fn snapshot(&self) -> UnitSnapshot {
        UnitSnapshot {
            temperature: self.temperature,
            actual_speed: self.actual_speed,
            target_speed: self.target_speed,
            state: self.state,
            overheat_warning: self.is_overheat_warning(),
        }
    }

    pub fn request_emergency_stop(&mut self) {
        self.commands.push_emergency_stop();
    }

    pub fn request_start(&mut self) {
        self.commands.push_start();
    }

    /// Stored as given; the next tick zeroes it again unless the unit is Normal.
    pub fn set_target_speed(&mut self, setpoint: Setpoint<Validated>) {
        self.target_speed = setpoint.rpm();
    }

    pub fn entropy(&self) -> &E {
        &self.entropy
    }

    /// Advance the unit by `dt`. Steps run in a fixed order: commands,
    /// temperature, state, speed.
    pub fn update(&mut self, dt: Duration) {
        let commands = self.commands.drain();
        if commands.emergency_stop {
            self.emergency_stop();
        }

        self.update_temperature();
        self.update_state(dt, commands.start);
        self.update_speed(dt);
    }

    fn emergency_stop(&mut self) {
        match self.state {
            PlcState::MaintenanceNeeded => {
                debug!("emergency stop ignored, unit awaiting maintenance");
            }
            PlcState::EmergencyStop => {}
            PlcState::Normal => {
                info!(
                    "emergency stop requested at {} RPM, temperature {}",
                    self.actual_speed, self.temperature
                );
                self.state = PlcState::EmergencyStop;
            }
        }
    }

    fn update_temperature(&mut self) {
        let ambient = self.limits.ambient_temperature;
        let operating = self.profile.operating_temperature;

        if self.actual_speed > 0 {
            if self.temperature < operating - 2
                || self.actual_speed >= self.profile.heating_threshold_rpm
            {
                self.temperature += self.entropy.roll(0, 3);
            } else if self.temperature > operating + 2 {
                self.temperature -= self.entropy.roll(1, 3);
            } else {
                self.temperature += self.entropy.roll(-1, 2);
            }
        } else if self.temperature > ambient {
            self.temperature = (self.temperature - self.entropy.roll(0, 2)).max(ambient);
        } else if self.temperature < ambient {
            self.temperature += 1;
        }
    }

    fn update_state(&mut self, dt: Duration, start_requested: bool) {
        match self.state {
            PlcState::Normal => self.normal_state_update(dt),
            PlcState::EmergencyStop => self.emergency_stop_state_update(start_requested),
            PlcState::MaintenanceNeeded => self.target_speed = 0,
        }
    }

    fn normal_state_update(&mut self, dt: Duration) {
        if self.temperature <= self.limits.temperature_limit {
            self.time_above_limit = Duration::ZERO;
            return;
        }

        self.time_above_limit += dt;
        if self.time_above_limit >= self.limits.overheat_hold {
            warn!(
                "temperature {} held above limit for {:?}, maintenance needed",
                self.temperature, self.time_above_limit
            );
            self.state = PlcState::MaintenanceNeeded;
            self.time_above_limit = Duration::ZERO;
            self.target_speed = 0;
        }
    }

    fn emergency_stop_state_update(&mut self, start_requested: bool) {
        self.target_speed = 0;
        if !start_requested {
            return;
        }
        if self.temperature < self.limits.temperature_limit {
            info!("restart from emergency stop at temperature {}", self.temperature);
            self.state = PlcState::Normal;
        } else {
            debug!(
                "start discarded, temperature {} not below limit {}",
                self.temperature, self.limits.temperature_limit
            );
        }
    }

    fn update_speed(&mut self, dt: Duration) {
        let rate = match self.state {
            PlcState::EmergencyStop => {
                self.actual_speed = 0;
                return;
            }
            PlcState::Normal => self.limits.ramp_rate_rpm_s,
            PlcState::MaintenanceNeeded => self.limits.coast_down_rate_rpm_s,
        };

        let allowance = speed_allowance(rate, dt);
        let actual = i64::from(self.actual_speed);
        let target = i64::from(self.target_speed);
        let next = if actual < target {
            (actual + allowance).min(target)
        } else {
            (actual - allowance).max(target)
        };
        // `next` lies between actual and target, both of which fit in i32.
        self.actual_speed = next as i32;
    }
}

/// Largest whole-RPM change permitted at `rate` over `dt`, truncated.
pub fn speed_allowance(rate_rpm_s: i64, dt: Duration) -> i64 {
    let micros = i64::try_from(dt.as_micros()).unwrap_or(i64::MAX);
    rate_rpm_s.saturating_mul(micros) / 1_000_000
}
