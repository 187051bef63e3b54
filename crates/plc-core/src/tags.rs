/// Naming of one snapshot field across the outward surfaces.
#[derive(Debug, Clone, Copy)]
pub struct Tag {
    pub metric: &'static str,
    pub help: &'static str,
}

pub const TEMPERATURE: Tag = Tag {
    metric: "plc_temperature_celsius",
    help: "Unit temperature in degrees Celsius",
};

pub const ACTUAL_SPEED: Tag = Tag {
    metric: "plc_actual_speed_rpm",
    help: "Unit actual speed in RPM",
};

pub const TARGET_SPEED: Tag = Tag {
    metric: "plc_target_speed_rpm",
    help: "Unit target speed in RPM",
};

pub const STATE: Tag = Tag {
    metric: "plc_state",
    help: "Unit state (0=normal,1=emergency stop,2=maintenance needed)",
};

pub const OVERHEAT_WARNING: Tag = Tag {
    metric: "plc_overheat_warning",
    help: "Unit running above the temperature limit (1=warning)",
};
