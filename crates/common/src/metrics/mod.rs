//! Metrics and observability utilities
//!
//! Prometheus metrics with standardized naming for the query, upload,
//! and store-management paths.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all RagBridge metrics
pub const METRICS_PREFIX: &str = "ragbridge";

/// Histogram buckets for request latency (in seconds). Grounded
/// generation calls dominate, so the spread leans long.
pub const LATENCY_BUCKETS: &[f64] = &[
    0.010, // 10ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
    30.00, // 30s
    60.00, // 60s
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of search queries"
    );

    describe_histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Search query latency in seconds"
    );

    describe_gauge!(
        format!("{}_citations_returned", METRICS_PREFIX),
        Unit::Count,
        "Citations returned by the last query"
    );

    describe_counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        Unit::Count,
        "Total document uploads forwarded to the provider"
    );

    describe_histogram!(
        format!("{}_upload_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Document upload latency in seconds, including ingestion polling"
    );

    tracing::info!("Metrics registered");
}

/// Record one completed query
pub fn record_query(duration_secs: f64, endpoint: &str, citations: usize) {
    counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        "endpoint" => endpoint.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        "endpoint" => endpoint.to_string()
    )
    .record(duration_secs);

    gauge!(format!("{}_citations_returned", METRICS_PREFIX)).set(citations as f64);
}

/// Record one upload attempt
pub fn record_upload(duration_secs: f64, success: bool) {
    counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        "status" => if success { "ok" } else { "error" }
    )
    .increment(1);

    histogram!(format!("{}_upload_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}
