//! Worker iteration span helpers.
//!
//! One span per claimed event, covering compute, candidate search, and
//! commit or release.

use tracing::Span;
use uuid::Uuid;

use crate::model::EventId;

/// Start a span for processing one claimed event.
///
/// The `event.value` field is declared empty and filled by
/// [`record_completion`].
pub fn start_claim_span(worker_id: &Uuid, event_id: EventId) -> Span {
    tracing::info_span!(
        "event.process",
        "worker.id" = %worker_id,
        "event.id" = event_id.0,
        "event.value" = tracing::field::Empty,
        "candidate.attempts" = tracing::field::Empty,
    )
}

/// Record the committed value and how many candidates it took.
pub fn record_completion(span: &Span, value: &str, attempts: u32) {
    span.record("event.value", value);
    span.record("candidate.attempts", attempts);
    span.in_scope(|| {
        tracing::info!(from = "pending", to = "completed", "state_transition");
    });
}
