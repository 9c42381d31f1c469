//! Event store abstraction.
//!
//! The store is the single shared mutable resource: counter, event rows, and
//! claim locks all live behind it. [`crate::db::Db`] is the Postgres
//! implementation; [`MemoryStore`] gives the same semantics in-process.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Event, EventId};

/// Durable storage for events.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Issue the next id and insert a pending event in one transaction.
    async fn create_pending(&self) -> Result<Event>;

    /// Point lookup. A missing id is `Ok(None)`.
    async fn get_by_id(&self, id: EventId) -> Result<Option<Event>>;

    /// Number of events ever created.
    async fn count(&self) -> Result<i64>;

    /// Exclusively claim one pending event, skipping events already claimed
    /// by someone else. Never waits on another claimant.
    async fn claim_one_pending(&self) -> Result<Option<Box<dyn Claim>>>;

    /// Cheap liveness probe.
    async fn health_check(&self) -> Result<()>;
}

/// An open claim on a single pending event.
///
/// The claim holds the event's lock until it is completed or released.
/// Dropping a claim releases it.
#[async_trait]
pub trait Claim: Send {
    /// The claimed event, as read when the claim was taken.
    fn event(&self) -> &Event;

    /// Whether `value` is already assigned to a completed event.
    async fn value_in_use(&mut self, value: &str) -> Result<bool>;

    /// Assign `value` to the claimed event and commit.
    async fn complete(self: Box<Self>, value: String) -> Result<Event>;

    /// Give the event back to the pending pool without changing it.
    async fn release(self: Box<Self>) -> Result<()>;
}
