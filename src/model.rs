//! Core data model.
//!
//! An event is something that needs a value. It is created pending by a
//! producer and completed exactly once by a worker, after which its value is
//! frozen and unique among completed events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A unit of work tracked by the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Identifier issued by the durable counter.
    pub id: EventId,

    /// Assigned value. `None` while the event is pending.
    pub value: Option<String>,

    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Event {
    /// A freshly created pending event.
    pub fn pending(id: EventId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            value: None,
            created_at,
            completed_at: None,
        }
    }

    pub fn state(&self) -> State {
        if self.value.is_some() {
            State::Completed
        } else {
            State::Pending
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state() == State::Completed
    }
}

/// Newtype for event IDs. Always positive once issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub i64);

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EventId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(EventId)
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle state of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Waiting for a worker to assign a value.
    Pending,
    /// Value assigned. Terminal.
    Completed,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            State::Pending => "pending",
            State::Completed => "completed",
        };
        write!(f, "{s}")
    }
}
