use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, register_int_gauge,
    CounterVec, Encoder, HistogramVec, IntCounter, IntGauge, TextEncoder,
};

lazy_static! {
    // Cache metrics
    pub static ref CACHE_HIT_COUNTER: CounterVec = register_counter_vec!(
        "orders_cache_requests_total",
        "Total number of order cache lookups",
        &["status"]
    )
    .expect("metric cannot be created");

    pub static ref CACHE_SIZE: IntGauge = register_int_gauge!(
        "orders_cache_entries",
        "Number of entries currently held by the order cache"
    )
    .expect("metric cannot be created");

    pub static ref CACHE_EVICTIONS: IntCounter = register_int_counter!(
        "orders_cache_evictions_total",
        "Expired entries removed by the cache janitor"
    )
    .expect("metric cannot be created");

    // Ingestion metrics
    pub static ref INGESTION_COUNTER: CounterVec = register_counter_vec!(
        "orders_ingested_messages_total",
        "Stream messages processed by the ingestion pipeline",
        &["outcome"]
    )
    .expect("metric cannot be created");

    pub static ref INGESTION_DURATION: HistogramVec = register_histogram_vec!(
        "orders_ingestion_duration_seconds",
        "Time spent handling one stream message",
        &["outcome"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("metric cannot be created");

    // Store metrics
    pub static ref STORE_OPERATIONS: CounterVec = register_counter_vec!(
        "orders_store_operations_total",
        "Total number of order store operations",
        &["operation", "status"]
    )
    .expect("metric cannot be created");

    pub static ref STORE_DURATION: HistogramVec = register_histogram_vec!(
        "orders_store_duration_seconds",
        "Order store operation duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("metric cannot be created");
}

/// Get all metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Helper function to record cache hit/miss
pub fn record_cache_request(hit: bool) {
    let status = if hit { "hit" } else { "miss" };
    CACHE_HIT_COUNTER.with_label_values(&[status]).inc();
}

pub fn set_cache_size(entries: usize) {
    CACHE_SIZE.set(entries as i64);
}

pub fn record_cache_evictions(count: usize) {
    CACHE_EVICTIONS.inc_by(count as u64);
}

/// Helper function to record one handled stream message.
///
/// `outcome` is one of `stored`, `duplicate`, `poison` or `retry`.
pub fn record_ingestion(outcome: &str, duration_secs: f64) {
    INGESTION_COUNTER.with_label_values(&[outcome]).inc();
    INGESTION_DURATION
        .with_label_values(&[outcome])
        .observe(duration_secs);
}

/// Helper function to record order store operation
pub fn record_store_operation(operation: &str, success: bool, duration_secs: f64) {
    let status = if success { "success" } else { "error" };
    STORE_OPERATIONS
        .with_label_values(&[operation, status])
        .inc();
    STORE_DURATION
        .with_label_values(&[operation])
        .observe(duration_secs);
}
