//! Connection pool for a harvest run.
//!
//! A run issues its statements strictly in sequence and holds at most one
//! transaction at a time, so the pool stays small and is not tunable.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use termsync_core::{Error, Result};

const MAX_CONNECTIONS: u32 = 2;

/// How long a statement waits for a free connection.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

fn pool_options() -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
}

/// Connect to the term catalog.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let start = Instant::now();
    let pool = pool_options()
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "connect",
        max_connections = MAX_CONNECTIONS,
        duration_ms = start.elapsed().as_millis() as u64,
        "Connected to term catalog"
    );
    Ok(pool)
}

/// Log pool usage at the end of a run.
pub fn log_pool_metrics(pool: &PgPool) {
    let size = pool.size();
    let idle = pool.num_idle();
    debug!(
        subsystem = "db",
        component = "pool",
        op = "metrics",
        pool_size = size,
        pool_idle = idle,
        "Pool usage"
    );
    // Every statement has finished by now, so a busy connection leaked.
    if idle < size as usize {
        warn!(
            subsystem = "db",
            component = "pool",
            pool_size = size,
            pool_idle = idle,
            "Connections still checked out after the run"
        );
    }
}
