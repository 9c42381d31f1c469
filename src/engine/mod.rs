//! Coordination engine: the producer-facing service and the worker loop.

pub mod service;
pub mod worker;

pub use service::{EventService, ServiceConfig};
pub use worker::{Iteration, Worker, WorkerConfig, WorkerPool};
