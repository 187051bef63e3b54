mod app;
mod config;
mod logging;
mod report;
mod telemetry;

pub use app::run_from_args;
