use serde::Serialize;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

const CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_BACKOFF: Duration = Duration::from_secs(3);

pub async fn create_pool(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await
}

/// Connects to the database, retrying a few times before giving up.
pub async fn connect_with_retry(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool, sqlx::Error> {
    let mut attempt = 1;
    loop {
        match create_pool(database_url, max_connections, acquire_timeout).await {
            Ok(pool) => return Ok(pool),
            Err(e) if attempt < CONNECT_ATTEMPTS => {
                tracing::error!(error = %e, attempt, "Error opening database, trying again");
                tokio::time::sleep(CONNECT_BACKOFF).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(error = %e, attempt, "Fatal error opening database");
                return Err(e);
            }
        }
    }
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

/// Connection pool gauges, exposed on /stat.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PoolStats {
    pub acquire_count: u64,
    pub acquired_conns: u32,
    pub idle_conns: u32,
    pub total_conns: u32,
    pub max_conns: u32,
}

impl PoolStats {
    pub fn collect(pool: &PgPool, acquire_count: u64) -> Self {
        let total_conns = pool.size();
        let idle_conns = pool.num_idle() as u32;

        Self {
            acquire_count,
            acquired_conns: total_conns.saturating_sub(idle_conns),
            idle_conns,
            total_conns,
            max_conns: pool.options().get_max_connections(),
        }
    }
}
