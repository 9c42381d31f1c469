//! Claim-and-complete worker loop.
//!
//! Each iteration claims one pending event, computes a candidate value,
//! checks it against completed events, and commits. Iterations that find
//! nothing to do, or cannot find a free value, back off before the next try.
//! Errors never escape the loop; they are logged and retried.

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{Event, EventId};
use crate::store::EventStore;
use crate::telemetry::metrics;
use crate::telemetry::worker::{record_completion, start_claim_span};
use crate::words::CandidateSource;

/// Tuning for the worker loop.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Pause after an iteration that found no work.
    pub idle_interval: Duration,
    /// Pause after an iteration that failed.
    pub error_backoff: Duration,
    /// Simulated compute latency while the claim is held.
    pub compute_delay: Duration,
    /// Candidate draws per claim before giving the event back.
    pub max_candidate_attempts: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_interval: Duration::from_millis(100),
            error_backoff: Duration::from_secs(1),
            compute_delay: Duration::from_millis(100),
            max_candidate_attempts: 10,
        }
    }
}

/// What a single iteration accomplished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Iteration {
    /// The claimed event was completed with a fresh value.
    Completed(Event),
    /// Nothing pending (or everything pending is claimed elsewhere).
    Empty,
    /// Every candidate collided; the event was released and stays pending.
    Exhausted(EventId),
}

impl Iteration {
    /// Whether the next iteration should start immediately.
    pub fn did_work(&self) -> bool {
        matches!(self, Iteration::Completed(_))
    }

    fn label(&self) -> &'static str {
        match self {
            Iteration::Completed(_) => "completed",
            Iteration::Empty => "empty",
            Iteration::Exhausted(_) => "exhausted",
        }
    }
}

/// A single logical worker. Many may run against the same store.
#[derive(Clone)]
pub struct Worker {
    id: Uuid,
    store: Arc<dyn EventStore>,
    source: Arc<dyn CandidateSource>,
    config: WorkerConfig,
    shutdown: Arc<Notify>,
}

impl Worker {
    pub fn new(
        store: Arc<dyn EventStore>,
        source: Arc<dyn CandidateSource>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            store,
            source,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Ask the loop to stop after the current iteration.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Run iterations until [`Worker::shutdown`] is called.
    pub async fn run(&self) {
        info!(worker_id = %self.id, "worker started");

        loop {
            let pause = match self.run_once().await {
                Ok(iteration) => {
                    metrics::worker_iterations()
                        .add(1, &[KeyValue::new("outcome", iteration.label())]);
                    if iteration.did_work() {
                        Duration::ZERO
                    } else {
                        self.config.idle_interval
                    }
                }
                Err(e) => {
                    metrics::worker_iterations().add(1, &[KeyValue::new("outcome", "error")]);
                    error!(
                        worker_id = %self.id,
                        transient = e.is_transient(),
                        "iteration failed: {e}"
                    );
                    self.config.error_backoff
                }
            };

            tokio::select! {
                biased;
                _ = self.shutdown.notified() => {
                    info!(worker_id = %self.id, "worker shutting down");
                    return;
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    /// Run one claim → compute → commit iteration.
    pub async fn run_once(&self) -> Result<Iteration> {
        let Some(mut claim) = self.store.claim_one_pending().await? else {
            return Ok(Iteration::Empty);
        };
        let id = claim.event().id;
        let span = start_claim_span(&self.id, id);
        let claim_span = span.clone();

        async move {
            if !self.config.compute_delay.is_zero() {
                tokio::time::sleep(self.config.compute_delay).await;
            }

            for attempt in 1..=self.config.max_candidate_attempts {
                let candidate = self.source.candidate();
                if claim.value_in_use(&candidate).await? {
                    metrics::candidate_collisions().add(1, &[]);
                    debug!(attempt, candidate = %candidate, "candidate already taken");
                    continue;
                }

                let event = claim.complete(candidate).await?;
                if let Some(ref value) = event.value {
                    record_completion(&claim_span, value, attempt);
                }
                info!(id = %event.id, "processed event");
                return Ok(Iteration::Completed(event));
            }

            warn!(
                id = %id,
                attempts = self.config.max_candidate_attempts,
                "no unique value found, leaving event pending"
            );
            claim.release().await?;
            Ok(Iteration::Exhausted(id))
        }
        .instrument(span)
        .await
    }
}

/// A set of workers spawned on the tokio runtime.
pub struct WorkerPool {
    workers: Vec<Worker>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers sharing one store and candidate source.
    pub fn spawn(
        size: usize,
        store: Arc<dyn EventStore>,
        source: Arc<dyn CandidateSource>,
        config: WorkerConfig,
    ) -> Self {
        let workers: Vec<Worker> = (0..size)
            .map(|_| Worker::new(Arc::clone(&store), Arc::clone(&source), config.clone()))
            .collect();

        let handles = workers
            .iter()
            .map(|worker| {
                debug!(worker_id = %worker.id(), "spawning worker");
                let worker = worker.clone();
                tokio::spawn(async move { worker.run().await })
            })
            .collect();

        info!(size, "worker pool started");
        Self { workers, handles }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Signal every worker to stop after its current iteration.
    pub fn shutdown(&self) {
        for worker in &self.workers {
            worker.shutdown();
        }
    }

    /// Wait for every worker task to exit.
    pub async fn join(self) -> Result<()> {
        for handle in self.handles {
            handle
                .await
                .map_err(|e| Error::Other(format!("worker task failed: {e}")))?;
        }
        Ok(())
    }
}
