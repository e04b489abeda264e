//! Connection pool setup and health reporting.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use memo_core::{Error, Result};

/// Pool sizing and timeouts.
///
/// The defaults suit a single API process; `DB_MAX_CONNECTIONS` overrides
/// the upper bound at startup.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_connections: u32,
    /// How long a request waits for a free connection.
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    /// Connections are recycled after this long.
    pub max_lifetime: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(10 * 60),
            max_lifetime: Duration::from_secs(30 * 60),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_connections(self, max_connections: u32) -> Self {
        Self {
            max_connections,
            ..self
        }
    }

    pub fn acquire_timeout(self, acquire_timeout: Duration) -> Self {
        Self {
            acquire_timeout,
            ..self
        }
    }

    fn options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections.min(self.max_connections))
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
            .max_lifetime(self.max_lifetime)
    }
}

/// Connect eagerly, failing fast when the database is unreachable.
pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    let started = Instant::now();
    let pool = config
        .options()
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "connect",
        max_connections = config.max_connections,
        acquire_timeout_secs = config.acquire_timeout.as_secs(),
        pool_size = pool.size(),
        duration_ms = started.elapsed().as_millis() as u64,
        "Connection pool ready"
    );
    Ok(pool)
}

/// Build a pool that connects on first use.
///
/// Lets the HTTP layer start (and reject unauthenticated requests) before
/// the database is reachable.
pub fn create_lazy_pool(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    PoolConfig {
        min_connections: 0,
        ..config
    }
    .options()
    .connect_lazy(database_url)
    .map_err(Error::Database)
}

/// Open and idle connection counts at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub size: u32,
    pub idle: usize,
}

impl PoolStatus {
    pub fn of(pool: &PgPool) -> Self {
        Self {
            size: pool.size(),
            idle: pool.num_idle(),
        }
    }

    /// Every open connection is checked out.
    pub fn is_saturated(&self) -> bool {
        self.size > 0 && self.idle == 0
    }
}

/// Log the pool's current status, warning when it is saturated.
pub fn log_pool_status(pool: &PgPool) -> PoolStatus {
    let status = PoolStatus::of(pool);
    if status.is_saturated() {
        warn!(
            subsystem = "db",
            component = "pool",
            pool_size = status.size,
            "No idle database connections"
        );
    } else {
        debug!(
            subsystem = "db",
            component = "pool",
            pool_size = status.size,
            pool_idle = status.idle,
            "Pool status"
        );
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_only_named_fields() {
        let config = PoolConfig::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(10));
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.acquire_timeout, Duration::from_secs(10));
        assert_eq!(config.min_connections, PoolConfig::default().min_connections);
    }

    #[test]
    fn test_saturation() {
        assert!(PoolStatus { size: 3, idle: 0 }.is_saturated());
        assert!(!PoolStatus { size: 3, idle: 1 }.is_saturated());
        assert!(!PoolStatus { size: 0, idle: 0 }.is_saturated());
    }

    #[tokio::test]
    async fn test_lazy_pool_does_not_connect() {
        let pool = create_lazy_pool("postgres://nobody@127.0.0.1:1/none", PoolConfig::default())
            .expect("lazy pool should build without connecting");
        let status = log_pool_status(&pool);
        assert_eq!(status, PoolStatus { size: 0, idle: 0 });
    }
}
