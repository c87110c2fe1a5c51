//! Metric instrument factories for beanstalk-worker.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"beanstalk-worker"` meter.

use opentelemetry::metrics::{Counter, Gauge, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("beanstalk-worker")
}

/// Counter: completed loop iterations.
/// Labels: `worker`.
pub fn worker_iterations() -> Counter<u64> {
    meter()
        .u64_counter("worker.iterations")
        .with_description("Number of successful worker loop iterations")
        .build()
}

/// Counter: work-step failures that ended a worker loop.
/// Labels: `worker`.
pub fn worker_failures() -> Counter<u64> {
    meter()
        .u64_counter("worker.failures")
        .with_description("Number of worker loops ended by a failed work step")
        .build()
}

/// Gauge: process memory sampled after each iteration, in bytes.
/// Labels: `worker`.
pub fn worker_memory_usage() -> Gauge<u64> {
    meter()
        .u64_gauge("worker.memory.usage")
        .with_description("Process memory sampled after each iteration")
        .with_unit("By")
        .build()
}

/// Counter: queue facade operations (reserve, delete, bury).
/// Labels: `queue`, `operation`.
pub fn queue_operations() -> Counter<u64> {
    meter()
        .u64_counter("queue.operations")
        .with_description("Number of queue operations")
        .build()
}
