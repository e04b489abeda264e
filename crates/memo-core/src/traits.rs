//! Repository traits.
//!
//! Every data-access method takes the caller's [`UserScope`]; rows owned by
//! another user are reported as `Error::NotFound`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;
use crate::scope::UserScope;
use crate::temporal::{AnalyticsWindow, NamedRange};

// =============================================================================
// USER & TOKEN REPOSITORY TRAITS
// =============================================================================

/// Repository for accounts and credentials.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Register a new account. Duplicate email or username is a `Conflict`.
    async fn register(&self, req: RegisterUserRequest) -> Result<User>;

    /// Check a login (email or username) and password.
    ///
    /// Bad credentials are `Unauthorized`; a non-active account is
    /// `InvalidInput`. Updates `last_login` on success.
    async fn verify_credentials(&self, login: &str, password: &str) -> Result<User>;

    /// Get the caller's own account.
    async fn get(&self, scope: UserScope) -> Result<User>;

    /// Delete the caller's account and everything it owns.
    async fn delete(&self, scope: UserScope) -> Result<()>;
}

/// Repository for opaque bearer tokens.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Issue a new token for `user_id` that expires after `lifetime_minutes`.
    async fn issue(&self, user_id: Uuid, lifetime_minutes: i64) -> Result<IssuedToken>;

    /// Resolve a presented token to its active user, if valid.
    async fn validate(&self, token: &str) -> Result<Option<UserScope>>;

    /// Revoke a presented token. Returns whether a live token was revoked.
    async fn revoke(&self, token: &str) -> Result<bool>;
}

// =============================================================================
// CATEGORY REPOSITORY TRAITS
// =============================================================================

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn create(&self, scope: UserScope, req: CreateCategoryRequest) -> Result<Category>;

    async fn get(&self, scope: UserScope, id: Uuid) -> Result<Category>;

    async fn list(&self, scope: UserScope, page: Page) -> Result<Vec<Category>>;

    async fn update(&self, scope: UserScope, id: Uuid, req: UpdateCategoryRequest) -> Result<Category>;

    /// Delete a category, detaching children, entries and metrics.
    async fn delete(&self, scope: UserScope, id: Uuid) -> Result<()>;
}

// =============================================================================
// TAG REPOSITORY TRAITS
// =============================================================================

/// Repository for the shared tag namespace.
///
/// Reads only see tags attached to at least one of the caller's entries.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Find or create a tag by exact name.
    async fn find_or_create(&self, name: &str) -> Result<Tag>;

    async fn list(&self, scope: UserScope, page: Page) -> Result<Vec<Tag>>;

    async fn get(&self, scope: UserScope, id: Uuid) -> Result<Tag>;

    /// Re-point the caller's associations from `id` to the tag named `name`.
    async fn rename(&self, scope: UserScope, id: Uuid, name: &str) -> Result<Tag>;

    /// Detach the tag from the caller's entries; drop it when orphaned.
    async fn delete(&self, scope: UserScope, id: Uuid) -> Result<()>;

    /// Attach an existing tag to one of the caller's entries.
    async fn attach(&self, scope: UserScope, entry_id: Uuid, tag_id: Uuid) -> Result<()>;

    /// Detach a tag from one of the caller's entries.
    async fn detach(&self, scope: UserScope, entry_id: Uuid, tag_id: Uuid) -> Result<()>;
}

// =============================================================================
// ENTRY REPOSITORY TRAITS
// =============================================================================

/// Repository for entries. Writes reconcile tags and metrics in the same
/// transaction as the entry row.
#[async_trait]
pub trait EntryRepository: Send + Sync {
    async fn create(&self, scope: UserScope, req: CreateEntryRequest) -> Result<Entry>;

    async fn get(&self, scope: UserScope, id: Uuid) -> Result<Entry>;

    async fn list(&self, scope: UserScope, req: ListEntriesRequest) -> Result<Vec<Entry>>;

    async fn update(&self, scope: UserScope, id: Uuid, req: UpdateEntryRequest) -> Result<Entry>;

    async fn delete(&self, scope: UserScope, id: Uuid) -> Result<()>;
}

// =============================================================================
// METRIC REPOSITORY TRAITS
// =============================================================================

#[async_trait]
pub trait MetricRepository: Send + Sync {
    async fn create(&self, scope: UserScope, req: CreateMetricRequest) -> Result<Metric>;

    async fn get(&self, scope: UserScope, id: Uuid) -> Result<Metric>;

    async fn list(&self, scope: UserScope, req: ListMetricsRequest) -> Result<Vec<Metric>>;

    async fn update(&self, scope: UserScope, id: Uuid, req: UpdateMetricRequest) -> Result<Metric>;

    async fn delete(&self, scope: UserScope, id: Uuid) -> Result<()>;
}

// =============================================================================
// ANALYTICS REPOSITORY TRAITS
// =============================================================================

/// Optional metric filters shared by the metric analytics views.
#[derive(Debug, Clone, Default)]
pub struct MetricFilter {
    /// Exact category label.
    pub category: Option<String>,
    pub metric_name: Option<String>,
    pub window: AnalyticsWindow,
}

/// Read-only aggregations over the caller's data.
#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    /// Avg/min/max/count per (category label, metric name).
    async fn metric_summary(&self, scope: UserScope, filter: MetricFilter) -> Result<Vec<MetricSummary>>;

    /// Sparse per-day average, ascending by date.
    async fn metric_trend(&self, scope: UserScope, filter: MetricFilter) -> Result<Vec<TrendPoint>>;

    /// Entry counts per category id within the window.
    async fn entry_counts(&self, scope: UserScope, window: AnalyticsWindow) -> Result<Vec<CategoryEntryCount>>;

    async fn dashboard(&self, scope: UserScope) -> Result<Dashboard>;

    async fn report(&self, scope: UserScope, range: NamedRange) -> Result<AnalyticsReport>;

    async fn metrics_by_category(&self, scope: UserScope, filter: MetricFilter) -> Result<MetricsByCategory>;

    /// Metrics ranked by value descending, at most `limit`.
    async fn metrics_by_value(
        &self,
        scope: UserScope,
        filter: MetricFilter,
        limit: i64,
    ) -> Result<Vec<RankedMetric>>;
}
