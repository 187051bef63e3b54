use crate::infra::audit::{AuditEventType, AuditLogger};
use crate::runtime::app::AppError;
use crate::runtime::config::{ReportArgs, RuntimeConfig};
use plc_io::store::format_timestamp;
use plc_io::{LogQuery, LogRecord, SnapshotStore};
use std::io::{self, Write};
use tracing::info;

fn build_query(args: &ReportArgs, config: &RuntimeConfig) -> LogQuery {
    let query = LogQuery {
        from: args.from,
        to: args.to,
        plc_index: args.unit,
        alarms_at: None,
    };
    if args.only_alarms {
        query.only_alarms(&config.limits())
    } else {
        query
    }
}

pub fn write_table<W: Write>(out: &mut W, records: &[LogRecord]) -> io::Result<()> {
    writeln!(
        out,
        "{:>8}  {:<27}  {:>3}  {:>5}  {:>6}  {:>6}  {}",
        "ID", "Timestamp (UTC)", "PLC", "Temp", "Actual", "Target", "State"
    )?;
    for record in records {
        writeln!(
            out,
            "{:>8}  {:<27}  {:>3}  {:>5}  {:>6}  {:>6}  {}",
            record.id,
            format_timestamp(record.timestamp_utc),
            record.plc_index,
            record.temperature,
            record.actual_speed,
            record.target_speed,
            record.state
        )?;
    }
    Ok(())
}

pub fn write_json_lines<W: Write>(out: &mut W, records: &[LogRecord]) -> io::Result<()> {
    for record in records {
        serde_json::to_writer(&mut *out, record)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

pub fn print_report(config: &RuntimeConfig) -> Result<(), AppError> {
    let store = SnapshotStore::open_existing(&config.db_path)?;
    let records = store.query(&build_query(&config.report, config))?;
    info!(rows = records.len(), path = %config.db_path.display(), "Report query complete");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if config.report.json {
        write_json_lines(&mut out, &records)?;
    } else {
        write_table(&mut out, &records)?;
    }
    out.flush()?;
    Ok(())
}

pub fn clear_log(config: &RuntimeConfig) -> Result<(), AppError> {
    if !config.confirm_clear {
        return Err(AppError::ClearNotConfirmed);
    }
    let mut store = SnapshotStore::open_existing(&config.db_path)?;
    let removed = store.clear()?;
    info!(rows = removed, path = %config.db_path.display(), "Snapshot log cleared");

    if let Some(path) = &config.audit_path {
        AuditLogger::new(path)?.log_event(
            AuditEventType::LogCleared,
            serde_json::json!({ "rows": removed, "db": config.db_path.display().to_string() }),
        )?;
    }
    println!("Removed {removed} rows");
    Ok(())
}
