//! Database connection pool, migrations, and health check.
//!
//! The pool is shared by the event service and every worker loop; all
//! coordination between them happens inside Postgres transactions.
//!
//! An open claim pins one pooled connection until it commits or rolls back,
//! so the pool must hold one connection per concurrent claimant plus
//! [`RESERVED_CONNECTIONS`] for everything else. [`pool_size`] enforces that.

pub mod counter;
pub mod events;

use std::time::Duration;

use crate::error::{Error, Result};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

/// Connections kept free for inserts, reads, and counts that do not hold a claim.
pub const RESERVED_CONNECTIONS: u32 = 4;

/// Pool size for `claimants` concurrent worker loops.
///
/// With no explicit size the pool gets one connection per claimant plus
/// [`RESERVED_CONNECTIONS`]. An explicit size smaller than that is a config
/// error: claimants would queue for connections behind each other and starve
/// the API.
pub fn pool_size(claimants: usize, configured: Option<u32>) -> Result<u32> {
    let claimants = u32::try_from(claimants)
        .map_err(|_| Error::Config(format!("worker count {claimants} is out of range")))?;
    let needed = claimants.saturating_add(RESERVED_CONNECTIONS);

    match configured {
        None => Ok(needed),
        Some(size) if size >= needed => Ok(size),
        Some(size) => Err(Error::Config(format!(
            "DB_MAX_CONNECTIONS={size} cannot serve {claimants} workers; \
             need at least {needed} ({RESERVED_CONNECTIONS} reserved)"
        ))),
    }
}

/// Database handle. Owns the connection pool shared across all modules.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Connect to Postgres with a pool of `max_connections`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Connect, retrying up to `attempts` times with a fixed `backoff`.
    ///
    /// Used at startup when the database may still be coming up. The last
    /// connection error is returned once the attempts run out.
    pub async fn connect_with_retry(
        url: &str,
        max_connections: u32,
        attempts: u32,
        backoff: Duration,
    ) -> Result<Self> {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            match Self::connect(url, max_connections).await {
                Ok(db) => {
                    info!(attempt, max_connections, "database connection successful");
                    return Ok(db);
                }
                Err(e) if attempt < attempts => {
                    warn!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "database connection failed, retrying: {e}"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Upper bound on pooled connections.
    pub fn max_connections(&self) -> u32 {
        self.pool.options().get_max_connections()
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("database schema verified");
        Ok(())
    }

    /// Simple health check: run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Get a reference to the connection pool (for submodules).
    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_covers_workers_and_reserve() {
        assert_eq!(pool_size(0, None).unwrap(), RESERVED_CONNECTIONS);
        assert_eq!(pool_size(16, None).unwrap(), 16 + RESERVED_CONNECTIONS);
    }

    #[test]
    fn explicit_pool_size_is_kept_when_large_enough() {
        assert_eq!(pool_size(4, Some(50)).unwrap(), 50);
        assert_eq!(pool_size(6, Some(10)).unwrap(), 10);
    }

    #[test]
    fn undersized_pool_is_rejected() {
        let err = pool_size(10, Some(10)).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("DB_MAX_CONNECTIONS")));
        assert!(pool_size(7, Some(10)).is_err());
    }
}
