use std::net::SocketAddr;

use crate::pipeline::PipelineError;

// ── Cycle metrics ───────────────────────────────────────────────

/// Counter: fetch/aggregate cycles started (one per detected selection change).
pub const CYCLES_STARTED_TOTAL: &str = "seatgrid_cycles_started_total";

/// Counter: cycles whose grid was installed in the presenter.
pub const CYCLES_COMMITTED_TOTAL: &str = "seatgrid_cycles_committed_total";

/// Counter: cycle results dropped because a newer cycle had started.
pub const CYCLES_STALE_TOTAL: &str = "seatgrid_cycles_stale_total";

// ── Feed metrics ────────────────────────────────────────────────

/// Histogram: reservation feed round trip in seconds.
pub const FETCH_DURATION_SECONDS: &str = "seatgrid_fetch_duration_seconds";

/// Counter: failed feed requests (transport, status or body shape).
pub const FETCH_FAILURES_TOTAL: &str = "seatgrid_fetch_failures_total";

/// Counter: feed records skipped during aggregation.
pub const MALFORMED_RECORDS_TOTAL: &str = "seatgrid_malformed_records_total";

// ── Store metrics ───────────────────────────────────────────────

/// Counter: failed reads of the selection store, and stored values that are
/// missing pieces or do not decode.
pub const STORE_READ_ERRORS_TOTAL: &str = "seatgrid_store_read_errors_total";

/// Counter: stored selections naming a facility with no catalog.
pub const UNKNOWN_FACILITY_TOTAL: &str = "seatgrid_unknown_facility_total";

/// Counter name for a selection that was stored but could not be used.
pub fn rejection_counter(err: &PipelineError) -> &'static str {
    match err {
        PipelineError::UnknownFacility(_) => UNKNOWN_FACILITY_TOTAL,
        _ => STORE_READ_ERRORS_TOTAL,
    }
}

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_facility_has_its_own_counter() {
        assert_eq!(
            rejection_counter(&PipelineError::UnknownFacility("mars".into())),
            UNKNOWN_FACILITY_TOTAL
        );
        assert_eq!(
            rejection_counter(&PipelineError::StoreRead("corrupt formData".into())),
            STORE_READ_ERRORS_TOTAL
        );
    }
}
