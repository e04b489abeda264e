//! # memo-db
//!
//! PostgreSQL database layer for memo.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for every core entity
//! - The entry reconciler (tags and metrics replaced in one transaction)
//! - Analytics aggregations
//! - An append-only audit trail for entry writes
//!
//! Every repository method takes a [`UserScope`]; rows owned by another
//! user are reported as `NotFound`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use memo_db::{CreateEntryRequest, Database, EntryRepository, PoolConfig, UserScope};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect_with_config("postgres://localhost/memo", PoolConfig::new()).await?;
//!     let scope = UserScope::new(user_id);
//!
//!     let entry = db.entries.create(scope, CreateEntryRequest {
//!         title: "Run log".to_string(),
//!         tags: vec!["fitness".to_string()],
//!         ..Default::default()
//!     }).await?;
//!
//!     println!("Created entry: {}", entry.id);
//!     Ok(())
//! }
//! ```
pub mod analytics;
pub mod audit;
pub mod categories;
pub mod entries;
pub mod filter;
pub mod metrics;
pub mod pool;
pub mod reconcile;
pub mod tags;
pub mod users;

// Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use memo_core::*;

pub use analytics::PgAnalyticsRepository;
pub use audit::PgAuditRepository;
pub use categories::PgCategoryRepository;
pub use entries::PgEntryRepository;
pub use filter::{bind_params, FilterBuilder, QueryParam};
pub use metrics::PgMetricRepository;
pub use pool::{create_lazy_pool, create_pool_with_config, log_pool_status, PoolConfig, PoolStatus};
pub use reconcile::{plan_metrics, plan_tags, round_metric_value, PlannedMetric};
pub use tags::PgTagRepository;
pub use users::{hash_password, verify_password, PgTokenRepository, PgUserRepository};

/// Map a unique-constraint violation to `Conflict`, passing the violated
/// constraint name to `message`. Other errors stay `Database`.
pub(crate) fn unique_violation_as_conflict(
    e: sqlx::Error,
    message: impl FnOnce(Option<&str>) -> String,
) -> Error {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return Error::Conflict(message(db_err.constraint()));
        }
    }
    Error::Database(e)
}

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Accounts and password verification.
    pub users: PgUserRepository,
    /// Opaque bearer tokens.
    pub tokens: PgTokenRepository,
    pub categories: PgCategoryRepository,
    /// Shared tag namespace, read through the caller's entries.
    pub tags: PgTagRepository,
    /// Entries with reconciled tags and metrics.
    pub entries: PgEntryRepository,
    pub metrics: PgMetricRepository,
    /// Read-only aggregations.
    pub analytics: PgAnalyticsRepository,
    /// Audit trail of entry writes.
    pub audit: PgAuditRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            users: PgUserRepository::new(pool.clone()),
            tokens: PgTokenRepository::new(pool.clone()),
            categories: PgCategoryRepository::new(pool.clone()),
            tags: PgTagRepository::new(pool.clone()),
            entries: PgEntryRepository::new(pool.clone()),
            metrics: PgMetricRepository::new(pool.clone()),
            analytics: PgAnalyticsRepository::new(pool.clone()),
            audit: PgAuditRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect to `url` with the given pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
