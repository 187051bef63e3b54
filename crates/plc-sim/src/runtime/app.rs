use crate::infra::audit::{AuditEventType, AuditLogger, AuditObserver};
use crate::infra::snapshot_log::SnapshotLogger;
use crate::presentation::panel::StatusBoard;
use crate::runtime::config::{ConfigError, Mode, RuntimeConfig};
use crate::runtime::logging::init_tracing;
use crate::runtime::report;
use crate::runtime::telemetry::{self, MetricsObserver};
use plc_core::{Fleet, FleetRunner};
use plc_io::{spawn_console, SnapshotStore, StoreError};
use std::io::{self, BufReader};
use std::process::ExitCode;
use std::sync::mpsc;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("snapshot log: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("refusing to clear the snapshot log without --yes")]
    ClearNotConfirmed,
    #[error("control thread panicked")]
    ControlThread,
}

pub fn run_from_args() -> ExitCode {
    let config = match RuntimeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("Run with --help for usage.");
            return ExitCode::from(2);
        }
    };
    if config.show_help {
        RuntimeConfig::print_help();
        return ExitCode::SUCCESS;
    }

    let _log_guard = init_tracing(config.json_logs, config.log_dir.as_deref());

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "plc-sim failed");
            ExitCode::FAILURE
        }
    }
}

pub fn run(config: RuntimeConfig) -> Result<(), AppError> {
    match config.mode {
        Mode::Simulate => simulate(&config),
        Mode::Report => report::print_report(&config),
        Mode::ClearLog => report::clear_log(&config),
    }
}

fn simulate(config: &RuntimeConfig) -> Result<(), AppError> {
    telemetry::init();
    let _metrics_handle = telemetry::start_metrics_server(&config.metrics_addr);

    let audit = match &config.audit_path {
        Some(path) => {
            info!(path = %path.display(), "Audit logging enabled");
            Some(Arc::new(AuditLogger::new(path)?))
        }
        None => None,
    };

    let seed = config.seed.unwrap_or_else(rand::random);
    let fleet_config = config.fleet_config(seed);
    info!(
        units = config.units,
        seed,
        tick_ms = config.tick_interval.as_millis() as u64,
        log_interval_ms = config.log_interval.as_millis() as u64,
        temperature_limit = config.temperature_limit,
        "Starting PLC fleet"
    );
    if let Some(audit) = &audit {
        audit.log_event(
            AuditEventType::SystemStart,
            serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "units": config.units,
                "seed": seed,
                "tick_ms": config.tick_interval.as_millis() as u64,
            }),
        )?;
    }

    let (command_tx, command_rx) = mpsc::channel();
    let mut runner = FleetRunner::new(Fleet::new(&fleet_config), fleet_config, command_rx);
    runner.observe(Box::new(MetricsObserver::default()));
    runner.observe(Box::new(StatusBoard::new(config.limits())));
    if config.db_enabled {
        let store = SnapshotStore::open(&config.db_path)?;
        info!(path = %config.db_path.display(), "Logging snapshots");
        runner.observe(Box::new(SnapshotLogger::new(store)));
    }
    if let Some(audit) = &audit {
        runner.observe(Box::new(AuditObserver::new(Arc::clone(audit))));
    }

    if config.console_enabled {
        spawn_console(BufReader::new(io::stdin()), command_tx);
        info!("Operator console reading JSON commands from stdin");
    } else {
        drop(command_tx);
    }

    let stop = Arc::new(AtomicBool::new(false));
    let control = {
        let stop = Arc::clone(&stop);
        thread::Builder::new()
            .name("plc-control".to_string())
            .spawn(move || {
                runner.run(&stop);
                runner
            })?
    };

    if let Some(secs) = config.run_seconds {
        thread::sleep(Duration::from_secs(secs));
        stop.store(true, Ordering::Relaxed);
    }

    let runner = control.join().map_err(|_| AppError::ControlThread)?;
    let stats = runner.stats();
    info!(
        ticks = stats.ticks_executed,
        missed = stats.ticks_missed,
        max_lateness_us = stats.max_lateness_us,
        commands_applied = stats.commands_applied,
        commands_rejected = stats.commands_rejected,
        state_changes = stats.state_changes,
        snapshots = stats.snapshots_emitted,
        "Run complete"
    );
    if stats.ticks_missed > 0 {
        warn!(missed = stats.ticks_missed, "Control loop overran its tick interval");
    }

    if let Some(audit) = &audit {
        audit.log_event(
            AuditEventType::SystemShutdown,
            serde_json::json!({
                "uptime_ms": runner.uptime().as_millis() as u64,
                "ticks": stats.ticks_executed,
                "state_changes": stats.state_changes,
            }),
        )?;
    }
    Ok(())
}
