//! Event service: the producer-facing façade.
//!
//! `create_async` returns as soon as the pending row is committed.
//! `create_sync` builds on it and polls until a worker fills in the value or
//! the wait budget runs out. A timeout only abandons the wait; the event stays
//! pending and will still be completed.

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{Event, EventId};
use crate::store::EventStore;
use crate::telemetry::metrics;

/// Timing for synchronous creation.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// How often `create_sync` re-reads the event.
    pub poll_interval: Duration,
    /// How long `create_sync` waits before giving up.
    pub sync_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
            sync_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Clone)]
pub struct EventService {
    store: Arc<dyn EventStore>,
    config: ServiceConfig,
}

impl EventService {
    pub fn new(store: Arc<dyn EventStore>, config: ServiceConfig) -> Self {
        Self { store, config }
    }

    /// Create a pending event and return it immediately.
    pub async fn create_async(&self) -> Result<Event> {
        self.create("async").await
    }

    /// Create an event and wait until a worker completes it.
    ///
    /// Fails with [`Error::Timeout`] once `sync_timeout` elapses. If the value
    /// shows up on the same poll that hits the deadline, the value wins.
    pub async fn create_sync(&self) -> Result<Event> {
        let event = self.create("sync").await?;
        let id = event.id;
        let started = Instant::now();

        let result = self.wait_for_completion(id, started).await;

        let label = match &result {
            Ok(_) => "completed",
            Err(Error::Timeout { .. }) => "timeout",
            Err(_) => "error",
        };
        metrics::sync_wait_ms().record(
            started.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("result", label)],
        );
        result
    }

    async fn wait_for_completion(&self, id: EventId, started: Instant) -> Result<Event> {
        let deadline = started + self.config.sync_timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(self.config.poll_interval.min(remaining)).await;

            if let Some(event) = self.store.get_by_id(id).await? {
                if event.is_completed() {
                    debug!(id = %id, "sync event completed");
                    return Ok(event);
                }
            }

            if Instant::now() >= deadline {
                let waited = started.elapsed();
                warn!(id = %id, waited_ms = waited.as_millis() as u64, "sync event timed out");
                return Err(Error::Timeout { id, waited });
            }
        }
    }

    /// Look up an event. A missing id is `Ok(None)`.
    pub async fn get_by_id(&self, id: EventId) -> Result<Option<Event>> {
        self.store.get_by_id(id).await
    }

    /// Number of events created so far.
    pub async fn count(&self) -> Result<i64> {
        self.store.count().await
    }

    pub async fn health_check(&self) -> Result<()> {
        self.store.health_check().await
    }

    async fn create(&self, mode: &'static str) -> Result<Event> {
        let result = self.store.create_pending().await;
        metrics::events_created().add(
            1,
            &[
                KeyValue::new("mode", mode),
                KeyValue::new("result", if result.is_ok() { "ok" } else { "error" }),
            ],
        );
        if let Ok(ref event) = result {
            debug!(id = %event.id, mode, "event created");
        }
        result
    }
}
