//! Event rows: insert, lookup, count, and skip-locked claiming.

use async_trait::async_trait;
use sqlx::{PgConnection, Postgres, Transaction};
use tracing::debug;

use super::{Db, counter};
use crate::error::{Error, Result};
use crate::model::{Event, EventId};
use crate::store::{Claim, EventStore};

const PRIMARY_KEY: &str = "events_pkey";
const UNIQUE_VALUE: &str = "events_value_key";

/// Map a unique violation on one of the `events` constraints to its domain error.
fn classify_unique(err: sqlx::Error, id: EventId, value: Option<&str>) -> Error {
    let constraint = err
        .as_database_error()
        .filter(|db| db.is_unique_violation())
        .and_then(|db| db.constraint().map(str::to_owned));

    match (constraint.as_deref(), value) {
        (Some(PRIMARY_KEY), _) => Error::DuplicateId(id),
        (Some(UNIQUE_VALUE), Some(v)) => Error::ValueTaken(v.to_string()),
        _ => Error::Database(err),
    }
}

/// Insert an event row inside the caller's transaction.
///
/// A `Some` value inserts the event already completed.
pub async fn insert(conn: &mut PgConnection, id: EventId, value: Option<&str>) -> Result<Event> {
    let row: EventRow = sqlx::query_as(
        "INSERT INTO events (id, value, created_at, completed_at)
         VALUES ($1, $2, now(), CASE WHEN $2::text IS NULL THEN NULL ELSE now() END)
         RETURNING id, value, created_at, completed_at",
    )
    .bind(id.0)
    .bind(value)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| classify_unique(e, id, value))?;

    Ok(row.into())
}

impl Db {
    /// Insert an event under an explicit id, outside the counter.
    pub async fn insert_event(&self, id: EventId, value: Option<&str>) -> Result<Event> {
        let mut tx = self.pool().begin().await?;
        let event = insert(&mut tx, id, value).await?;
        tx.commit().await?;
        Ok(event)
    }
}

#[async_trait]
impl EventStore for Db {
    async fn create_pending(&self) -> Result<Event> {
        let mut tx = self.pool().begin().await?;
        let id = counter::issue_id(&mut tx).await?;
        let event = insert(&mut tx, id, None).await?;
        tx.commit().await?;
        debug!(id = %id, "pending event inserted");
        Ok(event)
    }

    async fn get_by_id(&self, id: EventId) -> Result<Option<Event>> {
        let row: Option<EventRow> = sqlx::query_as(
            "SELECT id, value, created_at, completed_at FROM events WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(Event::from))
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events")
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }

    async fn claim_one_pending(&self) -> Result<Option<Box<dyn Claim>>> {
        let mut tx = self.pool().begin().await?;

        // SKIP LOCKED: rows held by other claimants are invisible here, so
        // concurrent workers partition the pending set without waiting.
        let row: Option<EventRow> = sqlx::query_as(
            "SELECT id, value, created_at, completed_at FROM events
             WHERE value IS NULL
             ORDER BY id
             LIMIT 1
             FOR UPDATE SKIP LOCKED",
        )
        .fetch_optional(&mut *tx)
        .await?;

        match row {
            Some(row) => Ok(Some(Box::new(PgClaim {
                tx,
                event: row.into(),
            }))),
            None => {
                tx.rollback().await?;
                Ok(None)
            }
        }
    }

    async fn health_check(&self) -> Result<()> {
        Db::health_check(self).await
    }
}

/// A claimed row. The open transaction holds the row lock; dropping it
/// rolls back and releases the row.
struct PgClaim {
    tx: Transaction<'static, Postgres>,
    event: Event,
}

#[async_trait]
impl Claim for PgClaim {
    fn event(&self) -> &Event {
        &self.event
    }

    async fn value_in_use(&mut self, value: &str) -> Result<bool> {
        let taken: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM events WHERE value = $1)")
            .bind(value)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(taken)
    }

    async fn complete(self: Box<Self>, value: String) -> Result<Event> {
        let PgClaim { mut tx, event } = *self;
        let id = event.id;

        let row: Option<EventRow> = sqlx::query_as(
            "UPDATE events SET value = $1, completed_at = now()
             WHERE id = $2 AND value IS NULL
             RETURNING id, value, created_at, completed_at",
        )
        .bind(&value)
        .bind(id.0)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| classify_unique(e, id, Some(value.as_str())))?;

        let row = row.ok_or(Error::NotPending(id))?;
        tx.commit().await?;
        Ok(row.into())
    }

    async fn release(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct EventRow {
    id: i64,
    value: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Self {
            id: EventId(row.id),
            value: row.value,
            created_at: row.created_at,
            completed_at: row.completed_at,
        }
    }
}
