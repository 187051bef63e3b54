//! Audit trail for operator-visible events.
//!
//! Every command the console delivers, every state change and every log
//! clear ends up here as one JSON object per line.

use plc_core::{CommandAction, FleetError, FleetObserver, OperatorCommand, StateChange};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    SystemStart,
    SystemShutdown,
    /// Command reached its unit
    CommandApplied,
    /// Command addressed a unit that does not exist
    CommandRejected,
    StateChanged,
    LogCleared,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Wall-clock Unix timestamp in microseconds
    pub unix_us: u64,
    pub event_type: AuditEventType,
    pub details: serde_json::Value,
}

/// Thread-safe audit logger that writes to a JSONL file
pub struct AuditLogger {
    writer: Mutex<BufWriter<File>>,
}

impl AuditLogger {
    /// Opens `path` in append mode, creating parent directories as needed.
    pub fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: Mutex::new(BufWriter::with_capacity(8192, file)),
        })
    }

    pub fn log(&self, entry: &AuditEntry) -> io::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| io::Error::other("audit writer poisoned"))?;
        serde_json::to_writer(&mut *writer, entry)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    /// Log an event stamped with the current wall clock.
    pub fn log_event(
        &self,
        event_type: AuditEventType,
        details: serde_json::Value,
    ) -> io::Result<()> {
        self.log(&AuditEntry {
            unix_us: unix_micros(SystemTime::now()),
            event_type,
            details,
        })
    }
}

fn unix_micros(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Serialize)]
struct CommandDetails<'a> {
    unit: u32,
    #[serde(flatten)]
    action: &'a CommandAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

/// Forwards fleet events to an [`AuditLogger`]. Write failures are logged
/// and otherwise ignored so the control loop never stalls on disk.
pub struct AuditObserver {
    logger: Arc<AuditLogger>,
}

impl AuditObserver {
    pub fn new(logger: Arc<AuditLogger>) -> Self {
        Self { logger }
    }

    fn record(&self, event_type: AuditEventType, details: serde_json::Value) {
        if let Err(e) = self.logger.log_event(event_type, details) {
            warn!(error = %e, ?event_type, "Audit write failed");
        }
    }
}

impl FleetObserver for AuditObserver {
    fn on_transition(&mut self, change: &StateChange) {
        self.record(
            AuditEventType::StateChanged,
            serde_json::to_value(change).unwrap_or_default(),
        );
    }

    fn on_command(&mut self, command: &OperatorCommand, outcome: Result<(), FleetError>) {
        let (event_type, reason) = match outcome {
            Ok(()) => (AuditEventType::CommandApplied, None),
            Err(e) => (AuditEventType::CommandRejected, Some(e.to_string())),
        };
        let details = CommandDetails {
            unit: command.unit,
            action: &command.action,
            reason,
        };
        self.record(event_type, serde_json::to_value(details).unwrap_or_default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plc_core::PlcState;
    use std::io::Read;
    use tempfile::tempdir;

    fn read_entries(path: &Path) -> Vec<AuditEntry> {
        let mut content = String::new();
        File::open(path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_audit_logger_writes_jsonl() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit").join("audit.jsonl");

        let logger = AuditLogger::new(&path).unwrap();
        logger
            .log_event(
                AuditEventType::SystemStart,
                serde_json::json!({"units": 3, "seed": 42}),
            )
            .unwrap();
        logger
            .log_event(AuditEventType::LogCleared, serde_json::json!({"rows": 10}))
            .unwrap();

        let entries = read_entries(&path);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event_type, AuditEventType::SystemStart);
        assert_eq!(entries[0].details["seed"], 42);
        assert_eq!(entries[1].event_type, AuditEventType::LogCleared);
        assert!(entries[1].unix_us >= entries[0].unix_us);
    }

    #[test]
    fn observer_records_commands_and_transitions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let logger = Arc::new(AuditLogger::new(&path).unwrap());
        let mut observer = AuditObserver::new(logger);

        let stop = OperatorCommand {
            unit: 1,
            action: CommandAction::EmergencyStop,
        };
        observer.on_command(&stop, Ok(()));
        observer.on_command(
            &OperatorCommand {
                unit: 9,
                action: CommandAction::SetTargetSpeed { rpm: 1500 },
            },
            Err(FleetError::UnknownUnit { unit: 9, count: 2 }),
        );
        observer.on_transition(&StateChange {
            unit: 1,
            from: PlcState::Normal,
            to: PlcState::EmergencyStop,
            temperature: 80,
        });

        let entries = read_entries(&path);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].event_type, AuditEventType::CommandApplied);
        assert_eq!(entries[0].details["type"], "emergency_stop");
        assert_eq!(entries[1].event_type, AuditEventType::CommandRejected);
        assert_eq!(entries[1].details["rpm"], 1500);
        assert!(entries[1].details["reason"]
            .as_str()
            .unwrap()
            .contains("unknown unit 9"));
        assert_eq!(entries[2].event_type, AuditEventType::StateChanged);
        assert_eq!(entries[2].details["to"], "EmergencyStop");
    }
}
