//! Worker span helpers.

use tracing::Span;
use uuid::Uuid;

/// Start the span that wraps one worker's whole run.
///
/// `worker.iterations` and `worker.stop_reason` are declared empty and
/// filled in by [`record_stop`].
pub fn start_worker_span(worker: &str, instance_id: &Uuid) -> Span {
    tracing::info_span!(
        "worker.run",
        "worker.name" = worker,
        "worker.instance_id" = %instance_id,
        "worker.iterations" = tracing::field::Empty,
        "worker.stop_reason" = tracing::field::Empty,
    )
}

/// Record how and after how many iterations a worker stopped.
pub fn record_stop(span: &Span, reason: &str, iterations: u64) {
    span.record("worker.stop_reason", reason);
    span.record("worker.iterations", iterations);
    span.in_scope(|| {
        tracing::info!(reason, iterations, "worker stopped");
    });
}
