//! Integration tests for telemetry initialization, span helpers and metrics.

use opentelemetry::KeyValue;
use uuid::Uuid;

#[test]
fn telemetry_initializes_without_endpoint() {
    // A tracing subscriber can only be set once per process; this may return
    // Err if another test already installed one.
    let config = beanstalk_worker::telemetry::TelemetryConfig::new("beanstalk-worker-test");
    if let Ok(guard) = beanstalk_worker::telemetry::init_telemetry(config) {
        assert!(!guard.exporting());
        guard.force_flush();
    }
}

#[test]
fn worker_span_creates_and_records_stop() {
    let id = Uuid::new_v4();
    let span = beanstalk_worker::telemetry::work::start_worker_span("echo", &id);
    beanstalk_worker::telemetry::work::record_stop(&span, "cancelled_by_caller", 12);
}

#[test]
fn metric_instruments_accept_recordings_without_a_provider() {
    use beanstalk_worker::telemetry::metrics;

    let labels = [KeyValue::new("worker", "echo")];
    metrics::worker_iterations().add(1, &labels);
    metrics::worker_failures().add(1, &labels);
    metrics::worker_memory_usage().record(1_024, &labels);
    metrics::queue_operations().add(
        1,
        &[
            KeyValue::new("queue", "default"),
            KeyValue::new("operation", "reserve"),
        ],
    );
}
