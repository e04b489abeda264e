//! Centralized default constants.
//!
//! Shared limits and windows used by the database layer and the HTTP API.

// ─── Pagination ────────────────────────────────────────────────────────────

/// Default `limit` for list endpoints.
pub const PAGE_LIMIT: i64 = 100;

/// Largest accepted `limit` for list endpoints.
pub const PAGE_LIMIT_MAX: i64 = 1000;

// ─── Analytics ─────────────────────────────────────────────────────────────

/// Entries shown in the dashboard's recent list.
pub const DASHBOARD_RECENT_ENTRIES: i64 = 5;

/// Days covered by the dashboard's daily series.
pub const DASHBOARD_DAYS: i64 = 30;

/// Default `days` for trend and entries-count.
pub const ANALYTICS_DAYS: i64 = 30;

/// Default named window for comprehensive analytics.
pub const ANALYTICS_TIME_RANGE: &str = "30d";

/// Default `limit` for metrics-by-value.
pub const TOP_METRICS_LIMIT: i64 = 10;

/// Largest accepted `limit` for metrics-by-value.
pub const TOP_METRICS_LIMIT_MAX: i64 = 100;

/// Most dates in a report's zero-filled daily series. Older days still
/// count towards the totals.
pub const REPORT_SERIES_MAX_DAYS: u64 = 3660;

/// Label used when no most-used item exists.
pub const NOT_AVAILABLE: &str = "N/A";

// ─── Values ────────────────────────────────────────────────────────────────

/// Exclusive bound on metric magnitude (NUMERIC(10,2)).
pub const METRIC_VALUE_LIMIT: f64 = 100_000_000.0;

// ─── Field lengths ─────────────────────────────────────────────────────────

pub const ENTRY_TITLE_MAX_LEN: usize = 255;
pub const CATEGORY_NAME_MAX_LEN: usize = 100;
pub const TAG_NAME_MAX_LEN: usize = 50;
pub const METRIC_NAME_MAX_LEN: usize = 100;
pub const METRIC_UNIT_MAX_LEN: usize = 50;
pub const USERNAME_MAX_LEN: usize = 50;
pub const EMAIL_MAX_LEN: usize = 255;

/// Shortest accepted password.
pub const PASSWORD_MIN_LEN: usize = 8;

// ─── Auth ──────────────────────────────────────────────────────────────────

/// Access token lifetime in minutes.
pub const ACCESS_TOKEN_EXPIRE_MINUTES: i64 = 30;

/// Prefix on issued bearer tokens.
pub const ACCESS_TOKEN_PREFIX: &str = "memo_at_";

/// Random characters after the prefix.
pub const ACCESS_TOKEN_SECRET_LEN: usize = 48;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_limits_ordered() {
        assert!(PAGE_LIMIT > 0);
        assert!(PAGE_LIMIT <= PAGE_LIMIT_MAX);
        assert!(TOP_METRICS_LIMIT <= TOP_METRICS_LIMIT_MAX);
    }

    #[test]
    fn test_metric_value_limit_matches_numeric_10_2() {
        assert!(99_999_999.99 < METRIC_VALUE_LIMIT);
    }
}
