//! Operator panel view model.
//!
//! A panel is derived purely from a unit snapshot plus the blink phase, so
//! any front end (the log-based status board here, or a GUI) renders the
//! same thing.

use plc_core::{ExecutionStats, FleetObserver, PlcState, UnitLimits, UnitSnapshot};
use serde::Serialize;
use std::fmt;
use std::time::SystemTime;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Colour {
    Green,
    Yellow,
    OrangeRed,
    Red,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelView {
    pub label: &'static str,
    pub status_light: Colour,
    pub temperature_bar: Colour,
    pub temperature: i32,
    pub actual_speed: i32,
    pub target_speed: i32,
    pub speed_control_enabled: bool,
    pub start_enabled: bool,
    pub stop_enabled: bool,
    /// Row would show up in an alarm-only report.
    pub alarm: bool,
}

impl PanelView {
    pub fn render(unit: &UnitSnapshot, limits: &UnitLimits, flash: bool) -> Self {
        let temperature_bar = if unit.temperature >= limits.temperature_limit {
            Colour::Red
        } else {
            Colour::Green
        };

        let (label, status_light) = match unit.state {
            PlcState::Normal if unit.overheat_warning => (
                "Overheating!",
                if flash { Colour::OrangeRed } else { Colour::Yellow },
            ),
            PlcState::Normal => ("Normal", Colour::Green),
            PlcState::EmergencyStop => ("Emergency Stop", Colour::Red),
            PlcState::MaintenanceNeeded => ("Maintenance Needed", Colour::Yellow),
        };

        let (speed_control_enabled, start_enabled, stop_enabled) = match unit.state {
            PlcState::Normal => (true, false, unit.actual_speed > 0),
            PlcState::EmergencyStop => (false, unit.temperature < limits.temperature_limit, false),
            PlcState::MaintenanceNeeded => (false, false, false),
        };

        Self {
            label,
            status_light,
            temperature_bar,
            temperature: unit.temperature,
            actual_speed: unit.actual_speed,
            target_speed: unit.target_speed,
            speed_control_enabled,
            start_enabled,
            stop_enabled,
            alarm: unit.is_alarm(limits),
        }
    }
}

impl fmt::Display for PanelView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] {} | {} °C | {}/{} RPM",
            self.status_light, self.label, self.temperature, self.actual_speed, self.target_speed
        )?;
        let controls: Vec<&str> = [
            (self.speed_control_enabled, "speed"),
            (self.start_enabled, "start"),
            (self.stop_enabled, "stop"),
        ]
        .iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, name)| *name)
        .collect();
        if !controls.is_empty() {
            write!(f, " | controls: {}", controls.join(","))?;
        }
        Ok(())
    }
}

/// Blink phase for the overheat light; advances once per refresh.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverheatBlinker {
    lit: bool,
}

impl OverheatBlinker {
    pub fn advance(&mut self, warning: bool) -> bool {
        self.lit = warning && !self.lit;
        self.lit
    }
}

/// Refreshes one panel per unit every tick and prints the board each time a
/// snapshot batch is taken.
pub struct StatusBoard {
    limits: UnitLimits,
    blinkers: Vec<OverheatBlinker>,
    panels: Vec<PanelView>,
}

impl StatusBoard {
    pub fn new(limits: UnitLimits) -> Self {
        Self {
            limits,
            blinkers: Vec::new(),
            panels: Vec::new(),
        }
    }

    pub fn panels(&self) -> &[PanelView] {
        &self.panels
    }

    fn refresh(&mut self, units: &[UnitSnapshot]) {
        self.blinkers.resize(units.len(), OverheatBlinker::default());
        self.panels = units
            .iter()
            .zip(self.blinkers.iter_mut())
            .map(|(unit, blinker)| {
                let flash = blinker.advance(unit.overheat_warning);
                PanelView::render(unit, &self.limits, flash)
            })
            .collect();
    }
}

impl FleetObserver for StatusBoard {
    fn on_tick(&mut self, _stats: &ExecutionStats, units: &[UnitSnapshot]) {
        self.refresh(units);
    }

    fn on_snapshot(&mut self, _taken_at: SystemTime, _units: &[UnitSnapshot]) {
        for (slot, panel) in self.panels().iter().enumerate() {
            if panel.alarm {
                warn!(unit = slot + 1, "PLC {}: {}", slot + 1, panel);
            } else {
                info!(unit = slot + 1, "PLC {}: {}", slot + 1, panel);
            }
        }
    }
}
