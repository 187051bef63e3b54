//! Persistent snapshot log.
//!
//! Rows are written once per snapshot interval for every unit and queried by
//! the `report` command. Timestamps are stored as RFC 3339 UTC strings with a
//! fixed microsecond precision, so string order equals time order and range
//! filters can compare text directly.

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use plc_core::{PlcState, UnitLimits, UnitSnapshot};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to create log directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("no snapshot log at {}", .0.display())]
    Missing(PathBuf),
    #[error("malformed timestamp {value:?} in row {id}")]
    Timestamp { id: i64, value: String },
}

/// One persisted snapshot row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub id: i64,
    pub timestamp_utc: DateTime<Utc>,
    pub plc_index: u32,
    pub temperature: i32,
    pub actual_speed: i32,
    pub target_speed: i32,
    pub state: String,
}

impl LogRecord {
    pub fn is_alarm(&self, limits: &UnitLimits) -> bool {
        let state = self.state.parse().unwrap_or(PlcState::EmergencyStop);
        limits.is_alarm(state, self.temperature)
    }
}

/// Row filter. Dates are UTC calendar days; both ends are inclusive.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub plc_index: Option<u32>,
    /// Only rows in a failure state or at/above this temperature limit.
    pub alarms_at: Option<i32>,
}

impl LogQuery {
    pub fn only_alarms(mut self, limits: &UnitLimits) -> Self {
        self.alarms_at = Some(limits.temperature_limit);
        self
    }

    fn to_sql(&self) -> (String, Vec<Value>) {
        let mut sql = String::from(
            "SELECT id, timestamp_utc, plc_index, temperature, actual_speed, target_speed, state
             FROM plc_log WHERE 1 = 1",
        );
        let mut values = Vec::new();

        if let Some(from) = self.from {
            sql.push_str(" AND timestamp_utc >= ?");
            values.push(Value::Text(day_start(from)));
        }
        if let Some(to) = self.to {
            // Inclusive end day: everything before the next midnight.
            if let Some(next) = to.succ_opt() {
                sql.push_str(" AND timestamp_utc < ?");
                values.push(Value::Text(day_start(next)));
            }
        }
        if let Some(index) = self.plc_index {
            sql.push_str(" AND plc_index = ?");
            values.push(Value::Integer(i64::from(index)));
        }
        if let Some(limit) = self.alarms_at {
            sql.push_str(" AND (state <> ? OR temperature >= ?)");
            values.push(Value::Text(PlcState::Normal.name().to_string()));
            values.push(Value::Integer(i64::from(limit)));
        }

        sql.push_str(" ORDER BY timestamp_utc DESC, id DESC");
        (sql, values)
    }
}

pub struct SnapshotStore {
    conn: Connection,
}

impl SnapshotStore {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS plc_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp_utc TEXT NOT NULL,
            plc_index INTEGER NOT NULL,
            temperature INTEGER NOT NULL,
            actual_speed INTEGER NOT NULL,
            target_speed INTEGER NOT NULL,
            state TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_plc_log_time ON plc_log(timestamp_utc);
    ";

    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    /// Open a log that must already exist. Nothing is created on disk.
    pub fn open_existing(path: &Path) -> Result<Self, StoreError> {
        if !path.is_file() {
            return Err(StoreError::Missing(path.to_path_buf()));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        Self::init(Connection::open_with_flags(path, flags)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(Self::SCHEMA)?;
        Ok(Self { conn })
    }

    /// Persist one snapshot batch; unit `n` is `units[n - 1]`.
    pub fn append(
        &mut self,
        taken_at: SystemTime,
        units: &[UnitSnapshot],
    ) -> Result<usize, StoreError> {
        let timestamp = format_timestamp(DateTime::<Utc>::from(taken_at));
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO plc_log
                 (timestamp_utc, plc_index, temperature, actual_speed, target_speed, state)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (slot, unit) in units.iter().enumerate() {
                stmt.execute(params![
                    timestamp,
                    slot as i64 + 1,
                    unit.temperature,
                    unit.actual_speed,
                    unit.target_speed,
                    unit.state.name(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(units.len())
    }

    pub fn query(&self, query: &LogQuery) -> Result<Vec<LogRecord>, StoreError> {
        let (sql, values) = query.to_sql();
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i32>(3)?,
                row.get::<_, i32>(4)?,
                row.get::<_, i32>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, timestamp, plc_index, temperature, actual_speed, target_speed, state) = row?;
            let timestamp_utc = DateTime::parse_from_rfc3339(&timestamp)
                .map_err(|_| StoreError::Timestamp {
                    id,
                    value: timestamp.clone(),
                })?
                .with_timezone(&Utc);
            records.push(LogRecord {
                id,
                timestamp_utc,
                plc_index: plc_index as u32,
                temperature,
                actual_speed,
                target_speed,
                state,
            });
        }
        Ok(records)
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM plc_log", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Delete every row. Returns how many were removed.
    pub fn clear(&mut self) -> Result<usize, StoreError> {
        Ok(self.conn.execute("DELETE FROM plc_log", [])?)
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn day_start(day: NaiveDate) -> String {
    format_timestamp(Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN)))
}
