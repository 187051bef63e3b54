//! Prometheus metrics for the PLC fleet.
//!
//! Per-unit gauges carry a `unit` label with the 1-based unit index.

use plc_core::{tags, UnitSnapshot};
use prometheus::{Encoder, GaugeVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::thread;
use tiny_http::{Response, Server};

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn unit_gauge(tag: tags::Tag) -> GaugeVec {
    let gauge = GaugeVec::new(Opts::new(tag.metric, tag.help), &["unit"]).unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
}

fn counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
}

// ============================================================================
// Unit State Metrics
// ============================================================================

pub static TEMPERATURE: LazyLock<GaugeVec> = LazyLock::new(|| unit_gauge(tags::TEMPERATURE));

pub static ACTUAL_SPEED: LazyLock<GaugeVec> = LazyLock::new(|| unit_gauge(tags::ACTUAL_SPEED));

pub static TARGET_SPEED: LazyLock<GaugeVec> = LazyLock::new(|| unit_gauge(tags::TARGET_SPEED));

pub static STATE: LazyLock<GaugeVec> = LazyLock::new(|| unit_gauge(tags::STATE));

pub static OVERHEAT_WARNING: LazyLock<GaugeVec> =
    LazyLock::new(|| unit_gauge(tags::OVERHEAT_WARNING));

/// State transitions by target state
pub static STATE_CHANGES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "plc_state_changes_total",
            "Unit state transitions by resulting state",
        ),
        &["unit", "to"],
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

// ============================================================================
// Runner Metrics
// ============================================================================

pub static TICKS_EXECUTED: LazyLock<IntCounter> =
    LazyLock::new(|| counter("plc_ticks_executed_total", "Simulation ticks executed"));

pub static TICKS_MISSED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "plc_ticks_missed_total",
        "Simulation ticks started after their deadline",
    )
});

pub static COMMANDS_REJECTED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "plc_commands_rejected_total",
        "Operator commands addressed to unknown units",
    )
});

// ============================================================================
// Snapshot Log Metrics
// ============================================================================

pub static SNAPSHOTS_LOGGED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "plc_snapshot_rows_logged_total",
        "Snapshot rows written to the log store",
    )
});

pub static STORE_ERRORS: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "plc_store_errors_total",
        "Snapshot batches that failed to persist",
    )
});

/// Publish the latest view of every unit.
pub fn record_units(units: &[UnitSnapshot]) {
    for (slot, unit) in units.iter().enumerate() {
        let label = (slot + 1).to_string();
        let labels = [label.as_str()];
        TEMPERATURE
            .with_label_values(&labels)
            .set(f64::from(unit.temperature));
        ACTUAL_SPEED
            .with_label_values(&labels)
            .set(f64::from(unit.actual_speed));
        TARGET_SPEED
            .with_label_values(&labels)
            .set(f64::from(unit.target_speed));
        STATE
            .with_label_values(&labels)
            .set(f64::from(unit.state.code()));
        OVERHEAT_WARNING
            .with_label_values(&labels)
            .set(if unit.overheat_warning { 1.0 } else { 0.0 });
    }
}

/// Render the registry in the Prometheus text format.
pub fn render() -> Result<Vec<u8>, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(buffer)
}

// ============================================================================
// Metrics HTTP Server
// ============================================================================

/// Start the metrics HTTP server on the given address.
/// Returns a join handle for the server thread.
pub fn serve_metrics(bind_addr: String) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let server = match Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to start metrics server on {}: {}", bind_addr, e);
                return;
            }
        };

        tracing::info!("Metrics server listening on http://{}/metrics", bind_addr);

        for request in server.incoming_requests() {
            let response = match request.url() {
                "/metrics" => match render() {
                    Ok(buffer) => {
                        let mut response = Response::from_data(buffer);
                        if let Ok(header) = tiny_http::Header::from_bytes(
                            &b"Content-Type"[..],
                            &b"text/plain; version=0.0.4"[..],
                        ) {
                            response.add_header(header);
                        }
                        response
                    }
                    Err(e) => {
                        tracing::warn!("Failed to encode metrics: {}", e);
                        Response::from_string("Internal Server Error").with_status_code(500)
                    }
                },
                "/health" => Response::from_string("OK"),
                // Ready once the simulation has ticked at least once.
                "/ready" if TICKS_EXECUTED.get() > 0 => Response::from_string("Ready"),
                "/ready" => Response::from_string("Not Ready").with_status_code(503),
                _ => Response::from_string("Not Found").with_status_code(404),
            };
            let _ = request.respond(response);
        }
    })
}

/// Initialize all metrics (forces lazy initialization)
pub fn init_metrics() {
    LazyLock::force(&TEMPERATURE);
    LazyLock::force(&ACTUAL_SPEED);
    LazyLock::force(&TARGET_SPEED);
    LazyLock::force(&STATE);
    LazyLock::force(&OVERHEAT_WARNING);
    LazyLock::force(&STATE_CHANGES);
    LazyLock::force(&TICKS_EXECUTED);
    LazyLock::force(&TICKS_MISSED);
    LazyLock::force(&COMMANDS_REJECTED);
    LazyLock::force(&SNAPSHOTS_LOGGED);
    LazyLock::force(&STORE_ERRORS);
}

#[cfg(test)]
mod tests {
    use super::*;
    use plc_core::PlcState;

    #[test]
    fn renders_labelled_unit_gauges() {
        init_metrics();
        record_units(&[
            UnitSnapshot {
                temperature: 71,
                actual_speed: 1500,
                target_speed: 1500,
                state: PlcState::Normal,
                overheat_warning: false,
            },
            UnitSnapshot {
                temperature: 30,
                actual_speed: 0,
                target_speed: 0,
                state: PlcState::EmergencyStop,
                overheat_warning: false,
            },
        ]);
        let text = String::from_utf8(render().unwrap()).unwrap();
        assert!(text.contains("plc_temperature_celsius{unit=\"1\"} 71"));
        assert!(text.contains("plc_state{unit=\"2\"} 1"));
        assert!(text.contains("plc_ticks_executed_total"));
    }
}
