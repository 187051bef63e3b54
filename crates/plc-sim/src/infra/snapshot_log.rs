use plc_core::{FleetObserver, UnitSnapshot};
use plc_io::metrics::{SNAPSHOTS_LOGGED, STORE_ERRORS};
use plc_io::SnapshotStore;
use std::time::SystemTime;
use tracing::{debug, warn};

/// Persists every periodic snapshot batch. A failed write loses that batch
/// only; the next one is attempted as usual.
pub struct SnapshotLogger {
    store: SnapshotStore,
    failures: u64,
}

impl SnapshotLogger {
    pub fn new(store: SnapshotStore) -> Self {
        Self { store, failures: 0 }
    }
}

impl FleetObserver for SnapshotLogger {
    fn on_snapshot(&mut self, taken_at: SystemTime, units: &[UnitSnapshot]) {
        match self.store.append(taken_at, units) {
            Ok(rows) => {
                SNAPSHOTS_LOGGED.inc_by(rows as u64);
                debug!(rows, "Snapshot batch logged");
            }
            Err(e) => {
                self.failures += 1;
                STORE_ERRORS.inc();
                warn!(error = %e, failures = self.failures, "Failed to log snapshot batch");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plc_core::PlcState;
    use plc_io::LogQuery;
    use tempfile::tempdir;

    #[test]
    fn logs_one_row_per_unit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plc_log.db");
        let mut logger = SnapshotLogger::new(SnapshotStore::open(&path).unwrap());

        let units = [
            UnitSnapshot {
                temperature: 40,
                actual_speed: 300,
                target_speed: 1000,
                state: PlcState::Normal,
                overheat_warning: false,
            },
            UnitSnapshot {
                temperature: 25,
                actual_speed: 0,
                target_speed: 0,
                state: PlcState::EmergencyStop,
                overheat_warning: false,
            },
        ];
        logger.on_snapshot(SystemTime::now(), &units);
        logger.on_snapshot(SystemTime::now(), &units);

        let store = SnapshotStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 4);
        let second = store
            .query(&LogQuery {
                plc_index: Some(2),
                ..LogQuery::default()
            })
            .unwrap();
        assert_eq!(second.len(), 2);
        assert!(second.iter().all(|r| r.state == "EmergencyStop"));
    }
}
