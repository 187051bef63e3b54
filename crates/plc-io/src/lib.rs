pub mod metrics;
pub mod protocol;
pub mod store;

pub use metrics::{init_metrics, record_units, serve_metrics};
pub use protocol::{parse_command, spawn_console, ConsoleError};
pub use store::{LogQuery, LogRecord, SnapshotStore, StoreError};
