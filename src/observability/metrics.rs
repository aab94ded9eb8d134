//! Prometheus metrics definitions.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Pipeline loads started.
pub static PIPELINE_LOADS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "docsearch_pipeline_loads_total",
        "Number of embedding pipeline loads started"
    )
    .unwrap()
});

/// Pipeline loads that failed.
pub static PIPELINE_LOAD_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "docsearch_pipeline_load_failures_total",
        "Number of embedding pipeline loads that failed"
    )
    .unwrap()
});

/// Pipeline load latency.
pub static PIPELINE_LOAD_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "docsearch_pipeline_load_seconds",
        "Time to load the embedding pipeline",
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .unwrap()
});

/// Per-request inference latency.
pub static INFERENCE_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "docsearch_inference_seconds",
        "Time to embed one request",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap()
});

/// Outbound worker messages by status.
pub static RELAY_MESSAGES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "docsearch_worker_messages_total",
        "Messages posted by the embedding worker",
        &["status"]
    )
    .unwrap()
});

/// Requests waiting in the worker queue.
pub static WORKER_QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "docsearch_worker_queue_depth",
        "Requests waiting for the embedding worker"
    )
    .unwrap()
});

/// Initialize all metrics (call once at startup).
pub fn init_metrics() {
    let _ = &*PIPELINE_LOADS;
    let _ = &*PIPELINE_LOAD_FAILURES;
    let _ = &*PIPELINE_LOAD_SECONDS;
    let _ = &*INFERENCE_SECONDS;
    let _ = &*RELAY_MESSAGES;
    let _ = &*WORKER_QUEUE_DEPTH;

    tracing::debug!("Prometheus metrics initialized");
}

/// Render the default registry in the text exposition format.
#[must_use]
pub fn render() -> String {
    use prometheus::Encoder;

    let mut buffer = Vec::new();
    let encoder = prometheus::TextEncoder::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
