use crate::state::PlcState;
use std::marker::PhantomData;
use std::ops::Range;
use std::time::Duration;

/// Temperature above which a running unit starts accumulating overheat time.
pub const TEMPERATURE_LIMIT: i32 = 105;
pub const AMBIENT_TEMPERATURE: i32 = 25;
pub const MAX_SPEED_RPM: i32 = 2000;

#[derive(Debug, Clone, Copy)]
pub struct Unvalidated;

#[derive(Debug, Clone, Copy)]
pub struct Validated;

/// Operating envelope shared by the simulator and everything that reads its
/// output (alarm queries, panels, metrics).
#[derive(Debug, Clone, PartialEq)]
pub struct UnitLimits {
    pub temperature_limit: i32,
    pub ambient_temperature: i32,
    pub max_speed_rpm: i32,
    /// Ramp rate while running normally, RPM per second.
    pub ramp_rate_rpm_s: i64,
    /// Power-cut coast-down rate while waiting for maintenance, RPM per second.
    pub coast_down_rate_rpm_s: i64,
    /// Continuous time above the limit before the unit is taken out of service.
    pub overheat_hold: Duration,
    pub heating_threshold_rpm: Range<i32>,
    pub operating_temperature: Range<i32>,
}

impl Default for UnitLimits {
    fn default() -> Self {
        Self {
            temperature_limit: TEMPERATURE_LIMIT,
            ambient_temperature: AMBIENT_TEMPERATURE,
            max_speed_rpm: MAX_SPEED_RPM,
            ramp_rate_rpm_s: 100,
            coast_down_rate_rpm_s: 500,
            overheat_hold: Duration::from_secs(10),
            heating_threshold_rpm: 1200..1900,
            operating_temperature: 70..90,
        }
    }
}

impl UnitLimits {
    pub fn with_temperature_limit(mut self, limit: i32) -> Self {
        self.temperature_limit = limit;
        self
    }

    /// Alarm predicate used by the snapshot log: any failure state, or a
    /// temperature at or above the limit.
    pub fn is_alarm(&self, state: PlcState, temperature: i32) -> bool {
        state != PlcState::Normal || temperature >= self.temperature_limit
    }
}

/// Target speed that has (or has not yet) been checked against the envelope.
#[derive(Debug, Clone, Copy)]
pub struct Setpoint<State = Unvalidated> {
    rpm: i32,
    _state: PhantomData<State>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SetpointError {
    #[error("target speed {requested} RPM exceeds limit {limit} RPM")]
    ExceedsMaxSpeed { requested: i32, limit: i32 },
    #[error("target speed {requested} RPM is negative")]
    Negative { requested: i32 },
}

impl Setpoint<Unvalidated> {
    pub fn new(rpm: i32) -> Self {
        Self {
            rpm,
            _state: PhantomData,
        }
    }

    pub fn validate(self, limits: &UnitLimits) -> Result<Setpoint<Validated>, SetpointError> {
        if self.rpm < 0 {
            return Err(SetpointError::Negative {
                requested: self.rpm,
            });
        }
        if self.rpm > limits.max_speed_rpm {
            return Err(SetpointError::ExceedsMaxSpeed {
                requested: self.rpm,
                limit: limits.max_speed_rpm,
            });
        }
        Ok(Setpoint {
            rpm: self.rpm,
            _state: PhantomData,
        })
    }

    /// Slider semantics: anything outside `[0, max]` is pinned to the nearest edge.
    pub fn clamp(self, limits: &UnitLimits) -> Setpoint<Validated> {
        Setpoint {
            rpm: self.rpm.clamp(0, limits.max_speed_rpm),
            _state: PhantomData,
        }
    }
}

impl Setpoint<Validated> {
    pub fn rpm(&self) -> i32 {
        self.rpm
    }
}
