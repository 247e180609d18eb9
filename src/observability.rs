use std::net::SocketAddr;

use crate::engine::EngineError;

// ── Booking metrics ─────────────────────────────────────────────

/// Counter: `reserve` calls. Labels: outcome.
pub const RESERVATIONS_TOTAL: &str = "fleetbook_reservations_total";

/// Histogram: end-to-end `reserve` latency in seconds, lock wait included.
pub const RESERVE_DURATION_SECONDS: &str = "fleetbook_reserve_duration_seconds";

/// Histogram: time spent waiting for a resource's lock, in seconds.
pub const LOCK_WAIT_SECONDS: &str = "fleetbook_lock_wait_seconds";

// ── Storage metrics ─────────────────────────────────────────────

/// Gauge: resources held by the durable store.
pub const RESOURCES_ACTIVE: &str = "fleetbook_resources_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "fleetbook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "fleetbook_wal_flush_batch_size";

/// Counter: completed WAL compactions.
pub const WAL_COMPACTIONS_TOTAL: &str = "fleetbook_wal_compactions_total";

/// Install the fmt subscriber. Safe to call more than once.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a `reserve` result to a short label for metrics.
pub fn outcome_label<T>(result: &Result<T, EngineError>) -> &'static str {
    match result {
        Ok(_) => "accepted",
        Err(EngineError::InvalidRange(_)) => "invalid_range",
        Err(EngineError::ResourceNotFound(_)) => "not_found",
        Err(EngineError::DateConflict(_)) => "date_conflict",
        Err(EngineError::Timeout(_)) => "timeout",
        Err(EngineError::StorageFailure(_)) => "storage_failure",
    }
}
