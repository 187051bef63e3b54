pub mod audit;
pub mod snapshot_log;
