//! Metric instrument factories for eventq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"eventq"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for eventq instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("eventq")
}

/// Counter: events created.
/// Labels: `mode` ("async" | "sync"), `result` ("ok" | "error").
pub fn events_created() -> Counter<u64> {
    meter()
        .u64_counter("eventq.events.created")
        .with_description("Number of events created")
        .build()
}

/// Counter: worker loop iterations.
/// Labels: `outcome` ("completed" | "empty" | "exhausted" | "error").
pub fn worker_iterations() -> Counter<u64> {
    meter()
        .u64_counter("eventq.worker.iterations")
        .with_description("Number of claim-and-complete iterations")
        .build()
}

/// Counter: candidate values rejected because another event already holds them.
pub fn candidate_collisions() -> Counter<u64> {
    meter()
        .u64_counter("eventq.worker.candidate_collisions")
        .with_description("Candidate values that collided with a completed event")
        .build()
}

/// Histogram: time a synchronous create spent waiting for completion.
/// Labels: `result` ("completed" | "timeout" | "error").
pub fn sync_wait_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("eventq.sync.wait_ms")
        .with_description("Time spent waiting for a synchronous event to complete")
        .with_unit("ms")
        .build()
}
