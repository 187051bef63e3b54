use chrono::NaiveDate;
use plc_core::{FleetConfig, UnitLimits, TEMPERATURE_LIMIT};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {flag}")]
    InvalidValue { flag: &'static str, value: String },
    #[error("missing value for {0}")]
    MissingValue(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Simulate,
    Report,
    ClearLog,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportArgs {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub unit: Option<u32>,
    pub only_alarms: bool,
    pub json: bool,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub show_help: bool,
    pub mode: Mode,
    pub units: u32,
    pub tick_interval: Duration,
    pub log_interval: Duration,
    pub seed: Option<u64>,
    pub run_seconds: Option<u64>,
    pub temperature_limit: i32,
    pub db_path: PathBuf,
    pub db_enabled: bool,
    pub console_enabled: bool,
    pub json_logs: bool,
    pub log_dir: Option<PathBuf>,
    pub metrics_addr: Option<String>,
    pub audit_path: Option<PathBuf>,
    pub report: ReportArgs,
    pub confirm_clear: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            show_help: false,
            mode: Mode::Simulate,
            units: 1,
            tick_interval: Duration::from_millis(100),
            log_interval: Duration::from_secs(1),
            seed: None,
            run_seconds: None,
            temperature_limit: TEMPERATURE_LIMIT,
            db_path: PathBuf::from("plc_log.db"),
            db_enabled: true,
            console_enabled: true,
            json_logs: false,
            log_dir: None,
            metrics_addr: None,
            audit_path: None,
            report: ReportArgs::default(),
            confirm_clear: false,
        }
    }
}

fn value<'a>(args: &'a [String], i: usize, flag: &'static str) -> Result<&'a str, ConfigError> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or(ConfigError::MissingValue(flag))
}

fn parsed<T: std::str::FromStr>(raw: &str, flag: &'static str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        flag,
        value: raw.to_string(),
    })
}

fn date(raw: &str, flag: &'static str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| ConfigError::InvalidValue {
        flag,
        value: raw.to_string(),
    })
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args)
    }

    pub fn from_args(args: &[String]) -> Result<Self, ConfigError> {
        let mut cfg = RuntimeConfig::default();
        let mut i = 1;

        match args.get(1).map(String::as_str) {
            Some("report") => {
                cfg.mode = Mode::Report;
                i += 1;
            }
            Some("clear-log") => {
                cfg.mode = Mode::ClearLog;
                i += 1;
            }
            _ => {}
        }

        while i < args.len() {
            match args[i].as_str() {
                "--units" => {
                    let units: u32 = parsed(value(args, i, "--units")?, "--units")?;
                    if units == 0 {
                        return Err(ConfigError::InvalidValue {
                            flag: "--units",
                            value: "0".to_string(),
                        });
                    }
                    cfg.units = units;
                    i += 1;
                }
                "--tick-ms" => {
                    let ms: u64 = parsed(value(args, i, "--tick-ms")?, "--tick-ms")?;
                    cfg.tick_interval = Duration::from_millis(ms.max(1));
                    i += 1;
                }
                "--log-interval-ms" => {
                    let ms: u64 =
                        parsed(value(args, i, "--log-interval-ms")?, "--log-interval-ms")?;
                    cfg.log_interval = Duration::from_millis(ms.max(1));
                    i += 1;
                }
                "--seed" => {
                    cfg.seed = Some(parsed(value(args, i, "--seed")?, "--seed")?);
                    i += 1;
                }
                "--run-seconds" => {
                    cfg.run_seconds =
                        Some(parsed(value(args, i, "--run-seconds")?, "--run-seconds")?);
                    i += 1;
                }
                "--temp-limit" => {
                    cfg.temperature_limit =
                        parsed(value(args, i, "--temp-limit")?, "--temp-limit")?;
                    i += 1;
                }
                "--db" => {
                    cfg.db_path = PathBuf::from(value(args, i, "--db")?);
                    i += 1;
                }
                "--no-db" => {
                    cfg.db_enabled = false;
                }
                "--no-console" => {
                    cfg.console_enabled = false;
                }
                "--json-logs" => {
                    cfg.json_logs = true;
                }
                "--log-dir" => {
                    cfg.log_dir = Some(PathBuf::from(value(args, i, "--log-dir")?));
                    i += 1;
                }
                "--metrics-addr" => {
                    cfg.metrics_addr = Some(value(args, i, "--metrics-addr")?.to_string());
                    i += 1;
                }
                "--audit-log" => {
                    cfg.audit_path = Some(PathBuf::from(value(args, i, "--audit-log")?));
                    i += 1;
                }
                "--from" => {
                    cfg.report.from = Some(date(value(args, i, "--from")?, "--from")?);
                    i += 1;
                }
                "--to" => {
                    cfg.report.to = Some(date(value(args, i, "--to")?, "--to")?);
                    i += 1;
                }
                "--unit" => {
                    cfg.report.unit = Some(parsed(value(args, i, "--unit")?, "--unit")?);
                    i += 1;
                }
                "--alarms" => {
                    cfg.report.only_alarms = true;
                }
                "--json" => {
                    cfg.report.json = true;
                }
                "--yes" => {
                    cfg.confirm_clear = true;
                }
                "--help" | "-h" => {
                    cfg.show_help = true;
                    break;
                }
                _ => {}
            }
            i += 1;
        }
        Ok(cfg)
    }

    pub fn limits(&self) -> UnitLimits {
        UnitLimits::default().with_temperature_limit(self.temperature_limit)
    }

    pub fn fleet_config(&self, seed: u64) -> FleetConfig {
        FleetConfig {
            unit_count: self.units,
            tick_interval: self.tick_interval,
            snapshot_interval: self.log_interval,
            seed,
            limits: self.limits(),
        }
    }

    pub fn print_help() {
        println!(
            r#"plc-sim - Motor controller fleet simulator

USAGE:
    plc-sim [OPTIONS]
    plc-sim report [--from DATE] [--to DATE] [--unit N] [--alarms] [--json] [--db PATH]
    plc-sim clear-log --yes [--db PATH]

SIMULATION OPTIONS:
    --units <N>             Number of simulated PLCs [default: 1]
    --tick-ms <MS>          Simulation tick interval [default: 100]
    --log-interval-ms <MS>  Snapshot logging interval [default: 1000]
    --seed <N>              Seed for the per-unit random streams [default: random]
    --run-seconds <SECS>    Run for a fixed duration then exit
    --temp-limit <DEG>      Temperature limit for warnings and alarms [default: 105]
    --db <PATH>             Snapshot log database [default: plc_log.db]
    --no-db                 Do not persist snapshots
    --no-console            Do not read operator commands from stdin
    --json-logs             Output logs in JSON format
    --log-dir <PATH>        Also write daily-rolling log files to this directory
    --metrics-addr <ADDR>   Enable Prometheus metrics server on address (e.g., 0.0.0.0:9090)
    --audit-log <PATH>      Enable audit logging to specified JSONL file
    -h, --help              Print this help message

REPORT OPTIONS:
    --from <YYYY-MM-DD>     First UTC day to include
    --to <YYYY-MM-DD>       Last UTC day to include
    --unit <N>              Only rows for this PLC
    --alarms                Only rows not in Normal state or at/above the temperature limit
    --json                  One JSON object per row

CONSOLE (stdin, one JSON object per line):
    {{"type":"set_target_speed","unit":1,"rpm":1500}}
    {{"type":"emergency_stop","unit":1}}
    {{"type":"start","unit":1}}

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log filter (e.g., RUST_LOG=debug,plc_core=trace)
"#
        );
    }
}
