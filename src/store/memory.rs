//! In-process event store.
//!
//! Mirrors the Postgres store's guarantees with a mutex-guarded table: the
//! counter increments under the lock, claims skip ids in the claimed set, and
//! a dropped claim releases its id the way a dropped transaction rolls back.
//! Used by the test-suite and by `eventq serve --in-memory`.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use super::{Claim, EventStore};
use crate::error::{Error, Result};
use crate::model::{Event, EventId};

/// Event store backed by process memory. Clones share the same table.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Table>>,
}

#[derive(Default)]
struct Table {
    last_id: i64,
    events: BTreeMap<EventId, Event>,
    values: HashSet<String>,
    claimed: HashSet<EventId>,
}

impl Table {
    fn issue_id(&mut self) -> EventId {
        self.last_id += 1;
        EventId(self.last_id)
    }

    fn insert(&mut self, id: EventId, value: Option<String>) -> Result<Event> {
        if self.events.contains_key(&id) {
            return Err(Error::DuplicateId(id));
        }
        let now = Utc::now();
        let mut event = Event::pending(id, now);
        if let Some(value) = value {
            if self.values.contains(&value) {
                return Err(Error::ValueTaken(value));
            }
            self.values.insert(value.clone());
            event.value = Some(value);
            event.completed_at = Some(now);
        }
        self.events.insert(id, event.clone());
        Ok(event)
    }
}

fn lock(table: &Mutex<Table>) -> MutexGuard<'_, Table> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row under an explicit id, bypassing the counter.
    ///
    /// Fails with [`Error::DuplicateId`] if the id is taken, and with
    /// [`Error::ValueTaken`] if `value` is already assigned.
    pub fn insert(&self, id: EventId, value: Option<String>) -> Result<Event> {
        lock(&self.inner).insert(id, value)
    }

    /// Ids currently held by open claims.
    pub fn claimed_ids(&self) -> Vec<EventId> {
        let mut ids: Vec<_> = lock(&self.inner).claimed.iter().copied().collect();
        ids.sort();
        ids
    }

    /// Snapshot of every event, ordered by id.
    pub fn events(&self) -> Vec<Event> {
        lock(&self.inner).events.values().cloned().collect()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn create_pending(&self) -> Result<Event> {
        let mut table = lock(&self.inner);
        let id = table.issue_id();
        table.insert(id, None)
    }

    async fn get_by_id(&self, id: EventId) -> Result<Option<Event>> {
        Ok(lock(&self.inner).events.get(&id).cloned())
    }

    async fn count(&self) -> Result<i64> {
        Ok(lock(&self.inner).events.len() as i64)
    }

    async fn claim_one_pending(&self) -> Result<Option<Box<dyn Claim>>> {
        let claimed = {
            let mut table = lock(&self.inner);
            let next = table
                .events
                .values()
                .find(|e| e.value.is_none() && !table.claimed.contains(&e.id))
                .cloned();
            if let Some(ref event) = next {
                table.claimed.insert(event.id);
            }
            next
        };

        Ok(claimed.map(|event| {
            Box::new(MemoryClaim {
                inner: Arc::clone(&self.inner),
                event,
                held: true,
            }) as Box<dyn Claim>
        }))
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

struct MemoryClaim {
    inner: Arc<Mutex<Table>>,
    event: Event,
    held: bool,
}

impl MemoryClaim {
    fn finish(&mut self, value: Option<String>) -> Result<Event> {
        let inner = Arc::clone(&self.inner);
        let mut table = lock(&inner);
        let id = self.event.id;

        let result = match value {
            None => Ok(self.event.clone()),
            Some(value) => {
                if table.values.contains(&value) {
                    return Err(Error::ValueTaken(value));
                }
                let row = table.events.get_mut(&id).ok_or(Error::NotPending(id))?;
                if row.value.is_some() {
                    return Err(Error::NotPending(id));
                }
                row.value = Some(value.clone());
                row.completed_at = Some(Utc::now());
                let event = row.clone();
                table.values.insert(value);
                Ok(event)
            }
        };

        table.claimed.remove(&id);
        self.held = false;
        result
    }
}

#[async_trait]
impl Claim for MemoryClaim {
    fn event(&self) -> &Event {
        &self.event
    }

    async fn value_in_use(&mut self, value: &str) -> Result<bool> {
        Ok(lock(&self.inner).values.contains(value))
    }

    async fn complete(self: Box<Self>, value: String) -> Result<Event> {
        let mut claim = self;
        claim.finish(Some(value))
    }

    async fn release(self: Box<Self>) -> Result<()> {
        let mut claim = self;
        claim.finish(None).map(|_| ())
    }
}

impl Drop for MemoryClaim {
    fn drop(&mut self) {
        if self.held {
            lock(&self.inner).claimed.remove(&self.event.id);
        }
    }
}
