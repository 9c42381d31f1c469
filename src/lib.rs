//! # eventq
//!
//! Postgres-backed event queue. Producers create events that need a value;
//! workers claim pending events with `FOR UPDATE SKIP LOCKED`, pick a unique
//! value from a word list, and commit. Callers may wait synchronously for
//! completion.
//!
//! Provides the store ([`db`], [`store`]), the coordination engine
//! ([`engine`]), an HTTP adapter ([`api`]), and OpenTelemetry observability.

pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod model;
pub mod store;
pub mod telemetry;
pub mod words;
