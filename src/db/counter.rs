//! Durable id counter.
//!
//! A single `event_counter` row holds the last issued id. Issuing locks that
//! row, so concurrent issuers serialize and never see the same value. The
//! caller's transaction must also insert the event the id belongs to; both
//! commit or roll back together.

use sqlx::PgConnection;

use crate::error::Result;
use crate::model::EventId;

/// Issue the next event id inside the caller's transaction.
pub async fn issue_id(conn: &mut PgConnection) -> Result<EventId> {
    let current: i64 =
        sqlx::query_scalar("SELECT last_id FROM event_counter WHERE singleton FOR UPDATE")
            .fetch_one(&mut *conn)
            .await?;

    let next = current + 1;
    sqlx::query("UPDATE event_counter SET last_id = $1 WHERE singleton")
        .bind(next)
        .execute(&mut *conn)
        .await?;

    Ok(EventId(next))
}
